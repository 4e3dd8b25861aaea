//! Error types for the execution engine.
//!
//! Construction-time failures (invalid retry policies, malformed test specs) propagate
//! as [`Error`]. Everything that happens once a dispatch is running — transport failures,
//! validator failures, artifact write failures — is captured into records instead; see
//! [`crate::types::AttemptRecord`] and [`crate::client::TransportErrorKind`].

use thiserror::Error;

/// Errors surfaced by the engine at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A `TestSpec`, `PerformanceSpec`, or `RetryPolicy` failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing the JSON artifact failed. Never fails a run; carried for callers that
    /// want to surface it (e.g. via logging) without re-deriving the message.
    #[error("failed to write artifact to {path}: {message}")]
    WriteArtifact {
        /// Destination path that could not be written.
        path: String,
        /// Underlying I/O or serialization message.
        message: String,
    },
}

/// Specialized result type for engine construction.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::WriteArtifact { .. } => "WRITE_ARTIFACT_ERROR",
        }
    }
}
