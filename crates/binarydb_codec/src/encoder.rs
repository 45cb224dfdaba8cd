//! Binary encoder.

use crate::decoder::MAX_BLOB_LENGTH;
use crate::error::{CodecError, CodecResult};
use bytes::{BufMut, BytesMut};

/// Length prefix written for a null string or blob.
pub const NULL_LENGTH: i32 = -1;

/// A little-endian binary encoder.
///
/// Fixed-width integers are written as-is; strings and blobs carry an
/// `i32` length prefix where `-1` stands for null. Optional integers carry
/// a one-byte presence flag.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: BytesMut,
}

impl Encoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Write a boolean as one byte (0 or 1).
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.put_u8(u8::from(value));
    }

    /// Write a 32-bit signed integer.
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32_le(value);
    }

    /// Write a 64-bit signed integer.
    pub fn write_i64(&mut self, value: i64) {
        self.buffer.put_i64_le(value);
    }

    /// Write an optional 32-bit integer: presence flag, then the value.
    pub fn write_opt_i32(&mut self, value: Option<i32>) {
        self.write_bool(value.is_some());
        if let Some(v) = value {
            self.write_i32(v);
        }
    }

    /// Write an optional 64-bit integer: presence flag, then the value.
    pub fn write_opt_i64(&mut self, value: Option<i64>) {
        self.write_bool(value.is_some());
        if let Some(v) = value {
            self.write_i64(v);
        }
    }

    /// Write a length-prefixed blob.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SizeLimitExceeded`] if the blob is longer than
    /// [`MAX_BLOB_LENGTH`], the most a decoder will accept back.
    pub fn write_blob(&mut self, value: Option<&[u8]>) -> CodecResult<()> {
        match value {
            None => self.write_i32(NULL_LENGTH),
            Some(bytes) => {
                if bytes.len() > MAX_BLOB_LENGTH {
                    return Err(CodecError::SizeLimitExceeded {
                        claimed: bytes.len(),
                        max_allowed: MAX_BLOB_LENGTH,
                    });
                }
                let len = i32::try_from(bytes.len()).map_err(|_| {
                    CodecError::encoding_failed(format!(
                        "blob of {} bytes does not fit a 32-bit length",
                        bytes.len()
                    ))
                })?;
                self.write_i32(len);
                self.buffer.put_slice(bytes);
            }
        }
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is longer than [`MAX_BLOB_LENGTH`] bytes.
    pub fn write_string(&mut self, value: Option<&str>) -> CodecResult<()> {
        self.write_blob(value.map(str::as_bytes))
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get a reference to the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume this encoder and return the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let mut enc = Encoder::new();
        enc.write_i32(1);
        enc.write_i64(-2);
        assert_eq!(
            enc.as_bytes(),
            &[1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn null_blob_is_minus_one() {
        let mut enc = Encoder::new();
        enc.write_blob(None).unwrap();
        assert_eq!(enc.as_bytes(), &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut enc = Encoder::new();
        enc.write_string(Some("ab")).unwrap();
        assert_eq!(enc.as_bytes(), &[2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn empty_string_differs_from_null() {
        let mut empty = Encoder::new();
        empty.write_string(Some("")).unwrap();
        let mut null = Encoder::new();
        null.write_string(None).unwrap();
        assert_eq!(empty.as_bytes(), &[0, 0, 0, 0]);
        assert_ne!(empty.as_bytes(), null.as_bytes());
    }

    #[test]
    fn optional_integers_carry_flag() {
        let mut enc = Encoder::new();
        enc.write_opt_i32(None);
        enc.write_opt_i32(Some(7));
        assert_eq!(enc.as_bytes(), &[0, 1, 7, 0, 0, 0]);
        assert_eq!(enc.len(), 6);
    }

    #[test]
    fn blob_at_limit_is_accepted() {
        let mut enc = Encoder::new();
        enc.write_blob(Some(&vec![0u8; MAX_BLOB_LENGTH])).unwrap();
        assert_eq!(enc.len(), 4 + MAX_BLOB_LENGTH);
    }

    #[test]
    fn blob_over_limit_is_rejected_before_writing() {
        let mut enc = Encoder::new();
        enc.write_u8(7);
        let result = enc.write_blob(Some(&vec![0u8; MAX_BLOB_LENGTH + 1]));
        assert!(matches!(
            result,
            Err(CodecError::SizeLimitExceeded { claimed, max_allowed })
                if claimed == MAX_BLOB_LENGTH + 1 && max_allowed == MAX_BLOB_LENGTH
        ));
        assert_eq!(enc.as_bytes(), &[7]);
    }
}
