//! Error types for the patchsync core library

use thiserror::Error;

/// Main error type for patchsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest or file could not be retrieved
    #[error("Network error: {0}")]
    Network(String),

    /// Every download source for a file failed
    #[error("All download sources failed for {filename}: {}", .attempts.join("; "))]
    AllSourcesFailed {
        /// File that could not be fetched
        filename: String,
        /// One message per attempt, in attempt order
        attempts: Vec<String>,
    },

    /// Content did not hash to the expected checksum
    #[error("Checksum mismatch for {filename}: expected {expected}, got {actual}")]
    Integrity {
        /// File that failed verification
        filename: String,
        /// Checksum listed in the manifest
        expected: String,
        /// Checksum computed from the local content
        actual: String,
    },

    /// IO error while reading or writing local state
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed manifest or cache line
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A session is already running
    #[error("A patch session is already in progress")]
    SessionBusy,
}

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote side unreachable or misbehaving
    Network,
    /// Checksum mismatch
    Integrity,
    /// Local disk failure
    Io,
    /// Malformed input line
    Parse,
    /// Bad configuration value
    Config,
    /// Re-entrant start request
    Busy,
}

impl Error {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) | Self::AllSourcesFailed { .. } => ErrorCategory::Network,
            Self::Integrity { .. } => ErrorCategory::Integrity,
            Self::Io(_) => ErrorCategory::Io,
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::InvalidConfig(_) => ErrorCategory::Config,
            Self::SessionBusy => ErrorCategory::Busy,
        }
    }

    /// Whether a retry against another source could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Network)
    }
}

/// Result type alias using the patchsync error type
pub type Result<T> = std::result::Result<T, Error>;
