//! Error types for the exchange protocol.
//!
//! Protocol-level failures (malformed headers, unreadable files, failed
//! writes) are reported as values or log lines and never surface here. These
//! enums cover the conditions a caller can actually act on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors raised by a [`crate::fs::FileSystem`] implementation.
#[derive(Error, Debug)]
pub enum FsError {
    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path resolves outside the working directory
    #[error("path `{path}` escapes the working directory")]
    Escape { path: String },

    /// Path does not exist
    #[error("{path} not found")]
    NotFound { path: PathBuf },
}

impl FsError {
    /// True when the failure means "nothing there" rather than a real error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Escape { .. } => false,
        }
    }
}

/// Errors raised while assembling a [`crate::commands::CommandRegistry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two constructors registered under the same name
    #[error("command `@{name}` is already registered")]
    Duplicate { name: String },

    /// Names must be non-empty and must not carry the `@` prefix
    #[error("invalid command name `{name}`")]
    InvalidName { name: String },
}

/// Umbrella error for the exchange library.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A glob pattern failed to compile
    #[error("invalid pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// Reading the response source failed mid-parse
    #[error("failed to read response: {0}")]
    Read(#[from] std::io::Error),
}
