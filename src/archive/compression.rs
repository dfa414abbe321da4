//! Sector codec dispatch
//!
//! A sector of a file flagged COMPRESSED starts with one tag byte naming the
//! codec (or codec pair) that produced the rest of the sector.

use crate::{adpcm, explode, huffman, MpqError, Result, MAX_PREALLOCATION};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Huffman coding
pub const TAG_HUFFMAN: u8 = 0x01;
/// zlib deflate
pub const TAG_ZLIB: u8 = 0x02;
/// PKWare DCL implode
pub const TAG_PKWARE: u8 = 0x08;
/// bzip2
pub const TAG_BZIP2: u8 = 0x10;
/// LZMA
pub const TAG_LZMA: u8 = 0x12;
/// Sparse then zlib
pub const TAG_SPARSE_ZLIB: u8 = 0x22;
/// Sparse then bzip2
pub const TAG_SPARSE_BZIP2: u8 = 0x30;
/// IMA ADPCM mono
pub const TAG_ADPCM_MONO: u8 = 0x40;
/// Huffman then ADPCM mono
pub const TAG_HUFFMAN_ADPCM_MONO: u8 = 0x41;
/// PKWare DCL then ADPCM mono
pub const TAG_PKWARE_ADPCM_MONO: u8 = 0x48;
/// IMA ADPCM stereo
pub const TAG_ADPCM_STEREO: u8 = 0x80;
/// Huffman then ADPCM stereo
pub const TAG_HUFFMAN_ADPCM_STEREO: u8 = 0x81;
/// PKWare DCL then ADPCM stereo
pub const TAG_PKWARE_ADPCM_STEREO: u8 = 0x88;

/// Human readable name of a sector tag
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        TAG_HUFFMAN => "huffman",
        TAG_ZLIB => "zlib",
        TAG_PKWARE => "pkware",
        TAG_BZIP2 => "bzip2",
        TAG_LZMA => "lzma",
        TAG_SPARSE_ZLIB => "sparse+zlib",
        TAG_SPARSE_BZIP2 => "sparse+bzip2",
        TAG_ADPCM_MONO => "adpcm mono",
        TAG_HUFFMAN_ADPCM_MONO => "huffman+adpcm mono",
        TAG_PKWARE_ADPCM_MONO => "pkware+adpcm mono",
        TAG_ADPCM_STEREO => "adpcm stereo",
        TAG_HUFFMAN_ADPCM_STEREO => "huffman+adpcm stereo",
        TAG_PKWARE_ADPCM_STEREO => "pkware+adpcm stereo",
        _ => "unknown",
    }
}

/// Decode a tagged sector into at most `expected_len` bytes
pub fn decompress_sector(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let (&tag, payload) = data
        .split_first()
        .ok_or_else(|| MpqError::short_read(1, 0))?;

    log::trace!(
        "sector tag 0x{:02X} ({}), {} -> {} bytes",
        tag,
        tag_name(tag),
        payload.len(),
        expected_len
    );

    match tag {
        TAG_HUFFMAN => {
            let mut output = huffman::decompress(payload)?;
            output.truncate(expected_len);
            Ok(output)
        }
        TAG_ZLIB => decompress_zlib(payload, expected_len),
        TAG_PKWARE => explode::explode(payload, expected_len),
        TAG_BZIP2 => decompress_bzip2(payload),
        TAG_ADPCM_MONO => adpcm::decompress(payload, 1),
        TAG_ADPCM_STEREO => adpcm::decompress(payload, 2),
        TAG_HUFFMAN_ADPCM_MONO => adpcm::decompress(&huffman::decompress(payload)?, 1),
        TAG_HUFFMAN_ADPCM_STEREO => adpcm::decompress(&huffman::decompress(payload)?, 2),
        TAG_PKWARE_ADPCM_MONO => {
            let exploded = explode::explode(payload, expected_len)?;
            adpcm::decompress(&exploded, 1)
        }
        TAG_PKWARE_ADPCM_STEREO => {
            let exploded = explode::explode(payload, expected_len)?;
            adpcm::decompress(&exploded, 2)
        }
        _ => Err(MpqError::UnsupportedCompression {
            tag,
            name: tag_name(tag),
        }),
    }
}

/// Inflate a zlib stream, stopping after `expected_len` bytes
fn decompress_zlib(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_len.min(MAX_PREALLOCATION));
    ZlibDecoder::new(data)
        .take(expected_len as u64)
        .read_to_end(&mut output)
        .map_err(|e| MpqError::CorruptStream(format!("zlib: {}", e)))?;
    Ok(output)
}

fn decompress_bzip2(data: &[u8]) -> Result<Vec<u8>> {
    oxiarc_bzip2::decompress(data).map_err(|e| MpqError::CorruptStream(format!("bzip2: {}", e)))
}
