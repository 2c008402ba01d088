//! Utility module for the player core
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Configuration management
//! - Logging setup

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{BufferingSettings, Config, ControllerSettings, GeneralConfig, PlayerSettings};
pub use error::{AvPlayerError, IntoPlayerError, Result};

/// Initialize the application configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Initialize env_logger with the given default filter
///
/// `RUST_LOG` still takes precedence. Calling this twice is harmless.
pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

/// Format a millisecond timestamp for display
///
/// Returns "HH:MM:SS.mmm" or "MM:SS.mmm" for timestamps under an hour.
pub fn format_timestamp(ms: u64) -> String {
    let total_secs = ms / 1000;
    let millis = ms % 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
    }
}
