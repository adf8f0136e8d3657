//! Public error taxonomy of the pipeline runtime
//!
//! The wrapper layers report raw FFmpeg codes; this module lowers them into
//! the stable categories user code matches on. Transient EAGAIN conditions
//! are handled inside the drivers and never reach this type.

use crate::codec::CodecError;
use crate::ffi::FFmpegError;

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A named codec, filter, or bitstream filter does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Unsupported or missing configuration
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Allocation failure reported by the backend
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Terminal stream marker; lazy sequences translate this into
    /// termination before user code ever sees it
    #[error("end of stream")]
    EndOfStream,

    /// File, path, or callback I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation on a closed or uninitialized stage
    #[error("invalid state: {0}")]
    State(String),

    /// Anything else the backend reports
    #[error("{0}")]
    Fatal(String),
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<FFmpegError> for Error {
    fn from(err: FFmpegError) -> Self {
        if err.is_eof() {
            Error::EndOfStream
        } else if err.is_not_found() {
            Error::NotFound(err.message)
        } else if err.is_oom() {
            Error::ResourceExhausted(err.message)
        } else if err.is_invalid() {
            Error::ConfigInvalid(err.message)
        } else if err.is_io() {
            Error::Io(std::io::Error::other(err.message))
        } else {
            Error::Fatal(err.message)
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Ffmpeg(e) => e.into(),
            CodecError::CodecNotFound(name) => Error::NotFound(format!("codec {name}")),
            CodecError::BsfNotFound(name) => Error::NotFound(format!("bitstream filter {name}")),
            CodecError::FilterNotFound(name) => Error::NotFound(format!("filter {name}")),
            CodecError::AllocationFailed(what) => Error::ResourceExhausted(what.to_string()),
            CodecError::InvalidConfig(msg) => Error::ConfigInvalid(msg),
            CodecError::InvalidState(msg) => Error::State(msg),
            CodecError::HardwareError(msg) => Error::ConfigInvalid(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::error::{
        AVERROR_DECODER_NOT_FOUND, AVERROR_EINVAL, AVERROR_ENOMEM, AVERROR_EOF,
    };

    #[test]
    fn ffmpeg_codes_lower_into_categories() {
        assert!(matches!(
            Error::from(FFmpegError::new(AVERROR_EOF, "eof")),
            Error::EndOfStream
        ));
        assert!(matches!(
            Error::from(FFmpegError::new(AVERROR_DECODER_NOT_FOUND, "dec")),
            Error::NotFound(_)
        ));
        assert!(matches!(
            Error::from(FFmpegError::new(AVERROR_ENOMEM, "oom")),
            Error::ResourceExhausted(_)
        ));
        assert!(matches!(
            Error::from(FFmpegError::new(AVERROR_EINVAL, "inval")),
            Error::ConfigInvalid(_)
        ));
        assert!(matches!(
            Error::from(FFmpegError::new(-1234567, "weird")),
            Error::Fatal(_)
        ));
    }

    #[test]
    fn codec_errors_lower_into_categories() {
        assert!(matches!(
            Error::from(CodecError::BsfNotFound("x".into())),
            Error::NotFound(_)
        ));
        assert!(matches!(
            Error::from(CodecError::InvalidState("closed".into())),
            Error::State(_)
        ));
    }
}
