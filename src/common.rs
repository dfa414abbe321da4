//! Common types and constants for MPQ archives and their codecs
//!
//! This module defines the error type shared by every decoder in the crate,
//! plus the format constants used by the archive reader and the explode
//! decompressor.

use thiserror::Error;

/// Literal coding mode of a PKWare DCL stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Binary mode - literals are stored as raw 8-bit values
    Binary = 0,
    /// ASCII mode - literals are Shannon-Fano coded
    ASCII = 1,
}

impl CompressionMode {
    /// Create a CompressionMode from a raw value
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionMode::Binary),
            1 => Ok(CompressionMode::ASCII),
            _ => Err(MpqError::InvalidCompressionMode(value)),
        }
    }
}

/// Dictionary size of a PKWare DCL stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionarySize {
    /// 1024 bytes (1KB) dictionary
    Size1K = 1024,
    /// 2048 bytes (2KB) dictionary
    Size2K = 2048,
    /// 4096 bytes (4KB) dictionary
    Size4K = 4096,
}

impl DictionarySize {
    /// Get the number of low distance bits for this dictionary size
    pub fn bits(&self) -> u8 {
        match self {
            DictionarySize::Size1K => 4, // 2^10 = 1024, needs 10 bits, 10-6=4
            DictionarySize::Size2K => 5, // 2^11 = 2048, needs 11 bits, 11-6=5
            DictionarySize::Size4K => 6, // 2^12 = 4096, needs 12 bits, 12-6=6
        }
    }

    /// Create a DictionarySize from the number of bits
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            4 => Ok(DictionarySize::Size1K),
            5 => Ok(DictionarySize::Size2K),
            6 => Ok(DictionarySize::Size4K),
            _ => Err(MpqError::InvalidDictionaryBits(bits)),
        }
    }
}

/// Error type for archive and codec operations
#[derive(Debug, Error)]
pub enum MpqError {
    /// Signature or header layout is not a version 0 MPQ header
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Archive format version other than 0
    #[error("Unsupported MPQ format version: {0}")]
    UnsupportedVersion(u16),

    /// Hash or block table does not fit inside the archive
    #[error("{table} at 0x{offset:08X} ({entries} entries) lies outside the archive ({archive_size} bytes)")]
    BadTableOffset {
        /// Which table was rejected
        table: &'static str,
        /// Table position in the archive
        offset: u32,
        /// Number of 16-byte entries
        entries: u32,
        /// Size of the archive source in bytes
        archive_size: u64,
    },

    /// No hash record matches the requested name
    #[error("File not found: {0}")]
    NotFound(String),

    /// Hash record references a block record that does not exist
    #[error("Corrupt table: {0}")]
    CorruptTable(String),

    /// The derived key does not decrypt the data
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Sector compression tag that is not implemented
    #[error("Unsupported compression: 0x{tag:02X} ({name})")]
    UnsupportedCompression {
        /// Leading tag byte of the sector
        tag: u8,
        /// Human readable codec name
        name: &'static str,
    },

    /// Valid format feature this crate does not decode
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Bitstream or sector payload is internally inconsistent
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// Source ended before the announced amount of data
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData {
        /// Bytes that were required
        expected: usize,
        /// Bytes that were available
        actual: usize,
    },

    /// Hash type outside 0..=3
    #[error("Invalid hash type: {0} (expected 0, 1, 2 or 3)")]
    InvalidHashType(u32),

    /// Invalid compression mode value
    #[error("Invalid compression mode: {0}")]
    InvalidCompressionMode(u8),

    /// Invalid dictionary size bits
    #[error("Invalid dictionary bits: {0} (expected 4, 5, or 6)")]
    InvalidDictionaryBits(u8),

    /// Seek target before the start or at/after the end of a file
    #[error("Seek out of range: {target} (file length {length})")]
    SeekOutOfRange {
        /// Requested absolute position
        target: i64,
        /// Length of the file
        length: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MpqError {
    /// Shorthand for a short read of `expected` bytes
    pub(crate) fn short_read(expected: usize, actual: usize) -> Self {
        MpqError::InsufficientData { expected, actual }
    }
}

/// Result type alias for archive and codec operations
pub type Result<T> = std::result::Result<T, MpqError>;

// MPQ format constants

/// Archive signature `"MPQ\x1A"`
pub const MPQ_SIGNATURE: [u8; 4] = *b"MPQ\x1A";

/// Size of a version 0 archive header, signature included
pub const MPQ_HEADER_SIZE: u32 = 0x20;

/// The only supported archive format version
pub const MPQ_FORMAT_VERSION: u16 = 0;

/// Size of one hash or block table record
pub const TABLE_ENTRY_SIZE: usize = 16;

/// Base sector size, shifted left by the header's sector-size shift
pub const SECTOR_SIZE_BASE: u32 = 0x200;

/// Name of the file listing every path stored in an archive
pub const LISTFILE_NAME: &str = "(listfile)";

/// Key string of the hash table
pub const HASH_TABLE_KEY: &str = "(hash table)";

/// Key string of the block table
pub const BLOCK_TABLE_KEY: &str = "(block table)";

/// Largest output buffer reserved up front from a size field
///
/// Sizes come from block records, so decoders grow past this as output
/// actually arrives.
pub const MAX_PREALLOCATION: usize = 1 << 20;
