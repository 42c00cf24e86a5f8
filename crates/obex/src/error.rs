//! Error types for the OBEX crate.

use thiserror::Error;

use crate::headers::{HeaderEncoding, HeaderId};

/// OBEX error type covering header access and stream failures.
#[derive(Debug, Error)]
pub enum ObexError {
    /// A header value does not match the encoding class of its identifier.
    #[error("header {id} expects {expected:?} value, got {got:?}")]
    HeaderTypeMismatch {
        /// Header identifier.
        id: HeaderId,
        /// Encoding required by the identifier.
        expected: HeaderEncoding,
        /// Encoding of the supplied value.
        got: HeaderEncoding,
    },

    /// A text header carried bytes that are not valid UTF-8.
    #[error("header {0} is not valid UTF-8")]
    InvalidText(HeaderId),

    /// A stream was requested twice or after the operation was closed.
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    /// IO error raised by the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OBEX operations.
pub type Result<T> = std::result::Result<T, ObexError>;

impl From<ObexError> for std::io::Error {
    fn from(err: ObexError) -> Self {
        match err {
            ObexError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_type_mismatch_display() {
        let err = ObexError::HeaderTypeMismatch {
            id: HeaderId::NAME,
            expected: HeaderEncoding::Unicode,
            got: HeaderEncoding::FourBytes,
        };
        assert_eq!(
            err.to_string(),
            "header 0x01 expects Unicode value, got FourBytes"
        );
    }

    #[test]
    fn test_invalid_text_display() {
        let err = ObexError::InvalidText(HeaderId::TYPE);
        assert_eq!(err.to_string(), "header 0x42 is not valid UTF-8");
    }

    #[test]
    fn test_into_io_error_keeps_io_kind() {
        let err = ObexError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_into_io_error_other_is_invalid_data() {
        let err = ObexError::StreamUnavailable("output already open".to_string());
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ObexError>();
    }
}
