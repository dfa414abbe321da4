//! mpqkit - Rust reader for MPQ archives and the codecs stored in them
//!
//! This crate reads version 0 MPQ archives, the container format of late
//! 1990s Blizzard games, and decodes the formats found inside them. It is a
//! pure Rust implementation with no C dependencies.
//!
//! # Features
//!
//! - ✅ **Archive reading** - encrypted hash and block tables, file lookup by
//!   path hash, sector-by-sector streaming via `Read`/`Seek`
//! - ✅ **Sector codecs** - zlib, bzip2, PKWare DCL explode, adaptive
//!   Huffman and IMA ADPCM, including the combined audio tags
//! - ✅ **Encrypted files** - key derivation from the file name, with key
//!   recovery for files opened by block index
//! - ✅ **Archive sets** - several archives of one data directory searched
//!   as one, expansion archives overriding base archives
//! - ✅ **DCC sprites** - directional animation frames decoded to palette
//!   indices
//!
//! # Example - Reading a file
//!
//! ```no_run
//! use mpqkit::Archive;
//!
//! let archive = Archive::open("d2data.mpq")?;
//! let armor = archive.read_file("data\\global\\excel\\armor.txt")?;
//! println!("{} bytes", armor.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - Decoding a sprite
//!
//! ```no_run
//! use mpqkit::{Archive, DccFile};
//!
//! let archive = Archive::open("d2data.mpq")?;
//! let data = archive.read_file("data\\global\\monsters\\cr\\tr\\crtrlitnuhth.dcc")?;
//! let dcc = DccFile::parse(&data)?;
//! for direction in dcc.directions()? {
//!     println!("{} frames in a {:?} box", direction.frame_count(), direction.bounds);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod adpcm;
pub mod archive;
pub mod bits;
pub mod common;
pub mod crypto;
pub mod dcc;
pub mod error;
pub mod explode;
pub mod huffman;
pub mod tables;

// Re-export commonly used types
pub use archive::{
    Archive, ArchiveHeader, ArchiveSet, ArchiveSetConfig, ArchiveSource, BlockFlags, BlockRecord,
    FileEntry, HashRecord, SectorStream,
};
pub use common::{
    CompressionMode, DictionarySize, MpqError, Result, BLOCK_TABLE_KEY, HASH_TABLE_KEY,
    LISTFILE_NAME, MAX_PREALLOCATION, MPQ_FORMAT_VERSION, MPQ_HEADER_SIZE, MPQ_SIGNATURE,
    SECTOR_SIZE_BASE, TABLE_ENTRY_SIZE,
};
pub use crypto::{hash_string, HashType};
pub use dcc::{DccFile, Direction, FrameImage};

// Convenience functions

/// Decompress a PKWare DCL stream
///
/// # Arguments
/// * `data` - The compressed data, starting with the two header bytes
/// * `expected_size` - Upper bound on the output size
///
/// # Returns
/// A vector containing at most `expected_size` decompressed bytes
pub fn explode_bytes(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    explode::explode(data, expected_size)
}

/// Read one file out of an archive on disk
///
/// # Arguments
/// * `archive` - Path of the archive
/// * `name` - Path of the file inside the archive
///
/// # Returns
/// The file's contents, `file_size` bytes long
pub fn read_archive_file<P: AsRef<std::path::Path>>(archive: P, name: &str) -> Result<Vec<u8>> {
    Archive::open(archive)?.read_file(name)
}
