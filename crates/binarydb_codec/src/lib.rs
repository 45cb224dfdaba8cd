//! # BinaryDB Codec
//!
//! Little-endian binary codec for BinaryDB.
//!
//! Every on-disk structure in BinaryDB is built from a handful of
//! primitives:
//!
//! - Fixed-width integers (`i32`, `i64`) in little-endian order
//! - Single bytes and booleans
//! - Optional integers: one presence byte, then the value if present
//! - Blobs and strings: `i32` byte length (`-1` = null), then the bytes
//!
//! ## Usage
//!
//! ```
//! use binarydb_codec::{Decoder, Encoder};
//!
//! let mut enc = Encoder::new();
//! enc.write_i64(42);
//! enc.write_string(Some("r1")).unwrap();
//! let bytes = enc.into_bytes();
//!
//! let mut dec = Decoder::new(&bytes);
//! assert_eq!(dec.read_i64().unwrap(), 42);
//! assert_eq!(dec.read_string().unwrap().as_deref(), Some("r1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::{Decoder, MAX_BLOB_LENGTH};
pub use encoder::{Encoder, NULL_LENGTH};
pub use error::{CodecError, CodecResult};

/// Trait for types with a binary wire form.
pub trait Encode {
    /// Write this value to the encoder.
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<()>;

    /// Encode this value into a fresh buffer.
    fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut encoder = Encoder::new();
        self.encode(&mut encoder)?;
        Ok(encoder.into_bytes())
    }
}

/// Trait for types that can be read back from their wire form.
pub trait Decode: Sized {
    /// Read one value from the decoder.
    fn decode(decoder: &mut Decoder<'_>) -> CodecResult<Self>;

    /// Decode a value that must occupy all of `bytes`.
    fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut decoder = Decoder::new(bytes);
        let value = Self::decode(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(CodecError::invalid_value(format!(
                "{} trailing bytes after value",
                decoder.remaining()
            )));
        }
        Ok(value)
    }
}
