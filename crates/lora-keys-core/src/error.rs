//! Error types for key handling.

use thiserror::Error;

/// Core error type for key input, validation and payload construction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("You must provide values for {0}.")]
    MissingInput(String),

    #[error("{name} must be {expected} characters long.")]
    InvalidLength { name: String, expected: usize },

    #[error("{name} must be a hex string.")]
    InvalidFormat { name: String },

    #[error("Failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("Request payload must be {expected} bytes, got {actual}")]
    PayloadSize { expected: usize, actual: usize },
}

impl Error {
    /// Name of the key this error refers to, if any.
    #[must_use]
    pub fn key_name(&self) -> Option<&str> {
        match self {
            Self::InvalidLength { name, .. }
            | Self::InvalidFormat { name }
            | Self::Decode { name, .. } => Some(name),
            Self::MissingInput(_) | Self::PayloadSize { .. } => None,
        }
    }
}

/// Result type alias for key handling operations.
pub type Result<T> = std::result::Result<T, Error>;
