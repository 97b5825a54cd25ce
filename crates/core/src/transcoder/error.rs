//! Error types for the transcoding services.

use thiserror::Error;

use crate::format::MediaFormat;

/// Errors that can occur while transcoding on the server.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Missing or unparseable parameters, or a pair the family does not serve.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Request body was empty.
    #[error("Request body is empty")]
    EmptyInput,

    /// Binary could not be started.
    #[error("{binary} is not available")]
    BinaryNotFound { binary: String },

    /// Binary exited unsuccessfully. `stderr` has sandbox paths redacted.
    #[error("{binary} failed ({status}): {stderr}")]
    ExternalBinaryFailure {
        binary: String,
        status: String,
        stderr: String,
    },

    /// Binary exited successfully but produced nothing.
    #[error("Conversion produced no output")]
    EmptyOutput,

    /// Binary did not finish in time and was killed.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The recipe table is missing an entry for a supported output.
    #[error("No recipe for {format}")]
    MissingRecipe { format: MediaFormat },

    /// Concurrency limiter was shut down.
    #[error("Transcoder is shutting down")]
    Unavailable,

    /// I/O error inside the sandbox.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn binary_failure(
        binary: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalBinaryFailure {
            binary: binary.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the caller sent something we refuse to process.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. } | Self::EmptyInput)
    }
}
