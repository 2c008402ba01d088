//! Configuration management for the player core
//!
//! This module handles loading and managing the player configuration
//! from config files and environment variables. Only the fields that affect
//! control flow live here: auto-start, default language, controller thread
//! settings and buffering watermarks.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::utils::error::{AvPlayerError, IntoPlayerError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Player behaviour
    pub player: PlayerSettings,

    /// Controller thread configuration
    pub controller: ControllerSettings,

    /// Buffering gate watermarks
    pub buffering: BufferingSettings,

    /// General application settings
    pub general: GeneralConfig,
}

/// Player behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Select streams and start playback as soon as a source is attached
    pub auto_start: bool,

    /// Preferred audio/subtitle language, e.g. "en" or "jpn"
    pub default_language: String,
}

/// Controller thread configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Scheduling priority hint for the controller thread
    pub priority: i32,

    /// CPU affinity mask hint (0 = any core)
    pub affinity: u64,

    /// Upper bound on how long the controller idles between buffering checks
    pub poll_interval_ms: u64,
}

/// Buffering watermarks, in decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferingSettings {
    /// Below this many frames playback switches to buffering
    pub low_watermark: u32,

    /// At or above this many frames buffering resumes playback
    pub high_watermark: u32,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            auto_start: false,
            default_language: String::new(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            priority: 0,
            affinity: 0,
            poll_interval_ms: 5,
        }
    }
}

impl Default for BufferingSettings {
    fn default() -> Self {
        Self {
            low_watermark: 1,
            high_watermark: 10,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/avplayer/config.toml on Linux)
    /// 3. User config file (~/.config/avplayer/config.toml on Linux)
    /// 4. Environment variables (AVPLAYER_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config = Self::read_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config = Self::read_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load and validate a single TOML file, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given file, or the user config file
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::user_config_path()
                .ok_or_else(|| AvPlayerError::Config("Cannot determine user config path".to_string()))?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self)
            .config_err("Failed to serialize config")?;

        std::fs::write(&path, toml)
            .config_err("Failed to write config file")?;

        Ok(())
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .config_err("Failed to read config file")?;

        toml::from_str(&contents)
            .config_err("Failed to parse config file")
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(auto_start) = std::env::var("AVPLAYER_AUTO_START") {
            self.player.auto_start = auto_start.parse()
                .map_err(|_| AvPlayerError::Config("Invalid AVPLAYER_AUTO_START".to_string()))?;
        }

        if let Ok(language) = std::env::var("AVPLAYER_DEFAULT_LANGUAGE") {
            self.player.default_language = language;
        }

        if let Ok(interval) = std::env::var("AVPLAYER_POLL_INTERVAL_MS") {
            self.controller.poll_interval_ms = interval.parse()
                .map_err(|_| AvPlayerError::Config("Invalid AVPLAYER_POLL_INTERVAL_MS".to_string()))?;
        }

        if let Ok(log_level) = std::env::var("AVPLAYER_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let language = &self.player.default_language;
        if language.len() > 4 || !language.is_ascii() {
            return Err(AvPlayerError::Config(format!(
                "Default language '{}' must be at most 4 ASCII characters",
                language
            )));
        }

        if self.buffering.high_watermark == 0 {
            return Err(AvPlayerError::Config("High watermark must be non-zero".to_string()));
        }

        if self.buffering.low_watermark > self.buffering.high_watermark {
            return Err(AvPlayerError::Config(format!(
                "Low watermark {} exceeds high watermark {}",
                self.buffering.low_watermark, self.buffering.high_watermark
            )));
        }

        if !(1..=1000).contains(&self.controller.poll_interval_ms) {
            return Err(AvPlayerError::Config(
                "Controller poll interval must be between 1 and 1000 ms".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(AvPlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level,
                valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/avplayer/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA").ok()
            .map(|p| PathBuf::from(p).join("AvPlayer").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/AvPlayer/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return dirs::config_dir()
            .map(|p| p.join("avplayer").join("config.toml"));

        #[cfg(any(target_os = "windows", target_os = "macos"))]
        return dirs::config_dir()
            .map(|p| p.join("AvPlayer").join("config.toml"));

        #[allow(unreachable_code)]
        None
    }
}
