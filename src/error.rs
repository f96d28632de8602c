//! Error types for remover operations

use crate::types::Role;
use thiserror::Error;

/// Result type alias for remover operations
pub type Result<T> = std::result::Result<T, RemoverError>;

/// Error taxonomy surfaced to the request layer
///
/// Every variant maps to a stable [`RemoverError::kind`] string so transport
/// layers can build responses without matching on display text.
#[derive(Error, Debug)]
pub enum RemoverError {
    /// Backend construction or model session acquisition failed
    #[error("Backend unavailable for role '{role}': {reason}")]
    BackendUnavailable { role: Role, reason: String },

    /// Input is not a valid or readable image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Filesystem failure reading input or writing output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown role string supplied by the caller
    #[error("Invalid role: '{0}' (expected 'ultra' or 'advanced')")]
    InvalidRole(String),

    /// Invalid configuration or request options
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RemoverError {
    /// Create a backend-unavailable error for a role
    pub fn backend_unavailable<S: Into<String>>(role: Role, reason: S) -> Self {
        Self::BackendUnavailable {
            role,
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an invalid role error
    pub fn invalid_role<S: Into<String>>(role: S) -> Self {
        Self::InvalidRole(role.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an IO-class error for an unexpected failure, preserving its message
    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        Self::Io(std::io::Error::new(std::io::ErrorKind::Other, msg.into()))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create image decode error with format context
    pub fn decode_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let path_display = path.as_ref().display();
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::Decode(format!(
            "Failed to decode image '{}' (extension: {}): {}",
            path_display, extension, error
        ))
    }

    /// Stable machine-readable error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::Decode(_) => "decode_error",
            Self::Io(_) => "io_error",
            Self::InvalidRole(_) => "invalid_role",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Whether repeating the same request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. } | Self::Io(_))
    }
}
