//! Error taxonomy for conversion attempts.

use thiserror::Error;

use crate::transcoder::TranscodeError;

/// Why a conversion attempt failed.
///
/// Only the fallback controller looks at [`ConversionError::kind`] to decide
/// whether another venue gets a try; everything else propagates as-is.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The format pair is not declared.
    #[error("Unsupported conversion: {from} -> {to}")]
    UnsupportedFormat { from: String, to: String },

    /// The venue cannot decode the input or has no encoder for the target.
    #[error("Decode unsupported: {reason}")]
    DecodeUnsupported { reason: String },

    /// The isolated execution context crashed, hung or went away.
    #[error("Execution channel fault: {reason}")]
    ChannelFault { reason: String },

    /// Input decoded but the output could not be produced.
    #[error("Encode failed: {reason}")]
    EncodeFailed { reason: String },

    /// The isolated channel already has a job in flight.
    #[error("Execution channel is busy")]
    Busy,

    /// The remote service answered with an error.
    #[error("Remote conversion failed ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The remote service could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the fallback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedFormat,
    DecodeUnsupported,
    ChannelFault,
    EncodeFailed,
    Busy,
    Remote,
    Transport,
    Timeout,
    Io,
}

impl ConversionError {
    pub fn decode_unsupported(reason: impl Into<String>) -> Self {
        Self::DecodeUnsupported {
            reason: reason.into(),
        }
    }

    pub fn channel_fault(reason: impl Into<String>) -> Self {
        Self::ChannelFault {
            reason: reason.into(),
        }
    }

    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::DecodeUnsupported { .. } => ErrorKind::DecodeUnsupported,
            Self::ChannelFault { .. } => ErrorKind::ChannelFault,
            Self::EncodeFailed { .. } => ErrorKind::EncodeFailed,
            Self::Busy => ErrorKind::Busy,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Local venues drive the same binaries as the server. A binary that is
/// missing or rejects the input means this venue cannot decode it; a hung
/// binary is treated like a hung execution context.
impl From<TranscodeError> for ConversionError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::InvalidRequest { reason } => Self::decode_unsupported(reason),
            TranscodeError::BinaryNotFound { binary } => {
                Self::decode_unsupported(format!("{binary} is not available"))
            }
            TranscodeError::ExternalBinaryFailure {
                binary,
                status,
                stderr,
            } => Self::decode_unsupported(format!("{binary} failed ({status}): {stderr}")),
            TranscodeError::EmptyOutput => Self::encode_failed("conversion produced no output"),
            TranscodeError::Timeout { timeout_secs } => {
                Self::channel_fault(format!("timed out after {timeout_secs} seconds"))
            }
            TranscodeError::MissingRecipe { format } => {
                Self::decode_unsupported(format!("no recipe for {format}"))
            }
            TranscodeError::EmptyInput => Self::decode_unsupported("input is empty"),
            TranscodeError::Unavailable => Self::channel_fault("transcoder unavailable"),
            TranscodeError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_failures_map_to_decode_unsupported() {
        let err: ConversionError =
            TranscodeError::binary_failure("ffmpeg", "exit code 1", "Invalid data").into();
        assert_eq!(err.kind(), ErrorKind::DecodeUnsupported);
        assert!(err.to_string().contains("Invalid data"));

        let err: ConversionError = TranscodeError::BinaryNotFound {
            binary: "pdftoppm".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DecodeUnsupported);
    }

    #[test]
    fn test_timeouts_map_to_channel_fault() {
        let err: ConversionError = TranscodeError::Timeout { timeout_secs: 5 }.into();
        assert_eq!(err.kind(), ErrorKind::ChannelFault);
    }

    #[test]
    fn test_empty_output_maps_to_encode_failed() {
        let err: ConversionError = TranscodeError::EmptyOutput.into();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
    }
}
