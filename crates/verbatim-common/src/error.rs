//! Error types for Verbatim
//!
//! Configuration and usage-level failures shared by the engine and the
//! command-line tools. Storage failures live in `verbatim-index`.

use thiserror::Error;

/// Common result type for Verbatim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Verbatim
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Check if this error stems from user input rather than the environment
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidArgument(_))
    }
}
