//! Error types for the player core
//!
//! This module defines the error type returned by every fallible player
//! operation. We use thiserror for the library error and anyhow in the
//! binary and integration tests.

use thiserror::Error;

use crate::decoder::SourceType;
use crate::player::LifecycleState;

/// Main error type for the player core
#[derive(Error, Debug)]
pub enum AvPlayerError {
    /// An operation needed an attached source and there is none
    #[error("No source attached")]
    NoSource,

    /// A second source was added before teardown
    #[error("A source is already attached")]
    SourceAlreadyAttached,

    /// The source type is not handled by the configured opener
    #[error("Unsupported source type: {0:?}")]
    UnsupportedSourceType(SourceType),

    /// Stream index past the end of the descriptor set
    #[error("Stream index {index} out of range (stream count {count})")]
    StreamIndexOutOfRange { index: u32, count: usize },

    /// Operation not permitted in the current lifecycle state
    #[error("Operation not allowed in state {0:?}")]
    InvalidState(LifecycleState),

    /// Transition rejected by the state table
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Start requested before any stream was enabled
    #[error("No stream enabled")]
    NoStreamEnabled,

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure reported by the source or decoder collaborator
    #[error("Source error: {0}")]
    Source(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Controller thread could not be spawned or joined
    #[error("Controller error: {0}")]
    Controller(String),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AvPlayerError {
    /// Create a source error from string
    pub fn source_error<S: Into<String>>(msg: S) -> Self {
        AvPlayerError::Source(msg.into())
    }

    /// Whether the error is a synchronous validation failure that left the
    /// player state untouched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AvPlayerError::NoSource
                | AvPlayerError::SourceAlreadyAttached
                | AvPlayerError::UnsupportedSourceType(_)
                | AvPlayerError::StreamIndexOutOfRange { .. }
                | AvPlayerError::InvalidState(_)
                | AvPlayerError::InvalidTransition { .. }
                | AvPlayerError::NoStreamEnabled
                | AvPlayerError::InvalidInput(_)
        )
    }
}

/// Convenience type alias for Results in the player core
pub type Result<T> = std::result::Result<T, AvPlayerError>;

/// Extension trait for converting other errors to AvPlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into an AvPlayerError with the given context
    fn source_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn source_err(self, context: &str) -> Result<T> {
        self.map_err(|e| AvPlayerError::Source(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| AvPlayerError::Config(format!("{}: {}", context, e)))
    }
}

/// Helper macro for creating internal errors with file and line information
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::utils::error::AvPlayerError::Internal(
            format!("{} at {}:{}", $msg, file!(), line!())
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::AvPlayerError::Internal(
            format!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
        )
    };
}
