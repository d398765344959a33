//! Unified error types for the connwatch workspace.
//!
//! Crates with their own failure domains (record decoding, channel reads)
//! define dedicated error enums; everything that crosses a crate boundary
//! at startup is expressed with [`ConnwatchError`].

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ConnwatchError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Loading or attaching the kernel instrumentation failed.
    #[error("failed to attach kernel probes: {message}")]
    Attach {
        /// Description of the failed step.
        message: String,
    },

    /// The requested capability is not available in this build or on this platform.
    #[error("unsupported: {message}")]
    Unsupported {
        /// What is missing.
        message: String,
    },
}

impl ConnwatchError {
    /// Builds an [`ConnwatchError::Attach`] from anything displayable.
    pub fn attach(message: impl std::fmt::Display) -> Self {
        Self::Attach {
            message: message.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConnwatchError>;
