//! PKWare DCL explode (decompression)
//!
//! MPQ sectors flagged as imploded, and sectors tagged 0x08 inside a
//! compressed sector, carry a PKWare DCL stream. This module decodes the
//! binary-literal variant of that format into a buffer of known size.
//!
//! The stream starts with a two byte header (literal mode and dictionary
//! bits) followed by an LSB-first bitstream of literals and repetitions.

mod decoder;

pub use decoder::{Exploder, Literal};

use crate::{CompressionMode, DictionarySize, MpqError, Result};

/// Literal value that terminates the stream (length code 15, extra 0xFF)
pub const LITERAL_END_OF_STREAM: u32 = 0x305;

/// Size of the two byte stream header
pub const HEADER_SIZE: usize = 2;

/// Decompress a PKWare DCL stream
///
/// Output is capped at `expected_size` bytes and truncated to what the
/// stream actually produced.
pub fn explode(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if data.len() < HEADER_SIZE {
        return Err(MpqError::short_read(HEADER_SIZE, data.len()));
    }

    match CompressionMode::from_u8(data[0])? {
        CompressionMode::Binary => {}
        CompressionMode::ASCII => {
            return Err(MpqError::UnsupportedFeature(
                "ASCII literal mode in explode stream".to_string(),
            ))
        }
    }
    let dict_size = DictionarySize::from_bits(data[1])?;

    let mut exploder = Exploder::new(&data[HEADER_SIZE..], dict_size);
    exploder.expand(expected_size)
}
