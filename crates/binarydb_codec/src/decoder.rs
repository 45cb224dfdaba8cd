//! Binary decoder.

use crate::encoder::NULL_LENGTH;
use crate::error::{CodecError, CodecResult};
use bytes::Buf;

/// Maximum blob or string length, enforced on both encode and decode.
/// Guards against allocating from a corrupted length prefix.
pub const MAX_BLOB_LENGTH: usize = 256 * 1024 * 1024;

/// A little-endian binary decoder over a borrowed slice.
///
/// Every read checks the remaining length first, so truncated input yields
/// [`CodecError::UnexpectedEof`] rather than a panic.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, needed: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?.get_u8())
    }

    /// Read a boolean byte. Any non-zero value is `true`.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a 32-bit signed integer.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(self.take(4)?.get_i32_le())
    }

    /// Read a 64-bit signed integer.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(self.take(8)?.get_i64_le())
    }

    /// Read an optional 32-bit integer.
    pub fn read_opt_i32(&mut self) -> CodecResult<Option<i32>> {
        if self.read_bool()? {
            Ok(Some(self.read_i32()?))
        } else {
            Ok(None)
        }
    }

    /// Read an optional 64-bit integer.
    pub fn read_opt_i64(&mut self) -> CodecResult<Option<i64>> {
        if self.read_bool()? {
            Ok(Some(self.read_i64()?))
        } else {
            Ok(None)
        }
    }

    /// Read a length-prefixed blob.
    pub fn read_blob(&mut self) -> CodecResult<Option<Vec<u8>>> {
        let length = self.read_i32()?;
        if length == NULL_LENGTH {
            return Ok(None);
        }
        let len = usize::try_from(length).map_err(|_| CodecError::InvalidLength { length })?;
        if len > MAX_BLOB_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_BLOB_LENGTH,
            });
        }
        Ok(Some(self.take(len)?.to_vec()))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> CodecResult<Option<String>> {
        match self.read_blob()? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| CodecError::InvalidUtf8),
        }
    }
}
