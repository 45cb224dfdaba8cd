//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete value could be read.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the value being read.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// A length prefix was negative and not the null marker.
    #[error("invalid length prefix: {length}")]
    InvalidLength {
        /// The offending length.
        length: i32,
    },

    /// A length prefix claims more bytes than the decoder accepts.
    #[error("length {claimed} exceeds maximum allowed {max_allowed}")]
    SizeLimitExceeded {
        /// The claimed length.
        claimed: usize,
        /// The maximum accepted length.
        max_allowed: usize,
    },

    /// String bytes were not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A decoded value is outside its permitted range.
    #[error("invalid value: {message}")]
    InvalidValue {
        /// Description of the problem.
        message: String,
    },

    /// A value cannot be represented in the wire format.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }
}
