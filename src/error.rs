//! Error types with actionable diagnostics.
//!
//! All errors include enough context to resolve the problem without
//! consulting external documentation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for endurecer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling data or training.
#[derive(Error, Debug)]
pub enum Error {
    /// Attack name not present in the registry.
    #[error("Unknown attack '{name}'\n  → known attacks: {known}")]
    UnknownAttack { name: String, known: String },

    /// Adversarial artifact file missing.
    #[error("Adversarial artifact not found: {path}\n  → generate examples for this attack or check --data-dir")]
    ArtifactNotFound { path: PathBuf },

    /// Checkpoint file missing on resume.
    #[error("Checkpoint not found: {path}\n  → train first, or check the --resume epoch")]
    CheckpointNotFound { path: PathBuf },

    /// Tensor shape does not match what the consumer expects.
    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// Configuration value is invalid.
    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValue { field: String, message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a configuration-value error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue { field: field.into(), message: message.into() }
    }

    /// Check if this error is user-recoverable (bad flags, missing files).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAttack { .. }
                | Self::ArtifactNotFound { .. }
                | Self::CheckpointNotFound { .. }
                | Self::ConfigValue { .. }
        )
    }
}
