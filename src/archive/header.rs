//! Archive header

use crate::common::{MPQ_FORMAT_VERSION, MPQ_HEADER_SIZE, MPQ_SIGNATURE, SECTOR_SIZE_BASE};
use crate::{MpqError, Result, TABLE_ENTRY_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

/// Version 0 archive header (32 bytes including the signature)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Size of the header in bytes
    pub header_size: u32,
    /// Size of the archive as recorded in the header
    pub archive_size: u32,
    /// Format version (always 0)
    pub format_version: u16,
    /// Sector size is `0x200 << sector_size_shift`
    pub sector_size_shift: u16,
    /// Position of the hash table
    pub hash_table_pos: u32,
    /// Position of the block table
    pub block_table_pos: u32,
    /// Number of hash table entries
    pub hash_table_entries: u32,
    /// Number of block table entries
    pub block_table_entries: u32,
}

impl ArchiveHeader {
    /// Read and check the header, signature included
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MpqError::MalformedHeader("file is too short to hold a signature".to_string())
            } else {
                MpqError::Io(e)
            }
        })?;
        if signature != MPQ_SIGNATURE {
            return Err(MpqError::MalformedHeader(format!(
                "bad signature {:02X?}",
                signature
            )));
        }

        let header = Self {
            header_size: reader.read_u32::<LittleEndian>()?,
            archive_size: reader.read_u32::<LittleEndian>()?,
            format_version: reader.read_u16::<LittleEndian>()?,
            sector_size_shift: reader.read_u16::<LittleEndian>()?,
            hash_table_pos: reader.read_u32::<LittleEndian>()?,
            block_table_pos: reader.read_u32::<LittleEndian>()?,
            hash_table_entries: reader.read_u32::<LittleEndian>()?,
            block_table_entries: reader.read_u32::<LittleEndian>()?,
        };

        if header.format_version != MPQ_FORMAT_VERSION {
            return Err(MpqError::UnsupportedVersion(header.format_version));
        }
        if header.header_size != MPQ_HEADER_SIZE {
            return Err(MpqError::MalformedHeader(format!(
                "header size {} (expected {})",
                header.header_size, MPQ_HEADER_SIZE
            )));
        }
        if header.sector_size_shift > 22 {
            return Err(MpqError::MalformedHeader(format!(
                "sector size shift {} is too large",
                header.sector_size_shift
            )));
        }
        if !header.hash_table_entries.is_power_of_two() {
            return Err(MpqError::MalformedHeader(format!(
                "hash table size {} is not a power of two",
                header.hash_table_entries
            )));
        }

        Ok(header)
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        SECTOR_SIZE_BASE << self.sector_size_shift
    }

    /// Check that both tables lie within a source of `source_len` bytes
    pub fn validate_tables(&self, source_len: u64) -> Result<()> {
        check_table_range(
            "hash table",
            self.hash_table_pos,
            self.hash_table_entries,
            source_len,
        )?;
        check_table_range(
            "block table",
            self.block_table_pos,
            self.block_table_entries,
            source_len,
        )
    }
}

fn check_table_range(table: &'static str, offset: u32, entries: u32, source_len: u64) -> Result<()> {
    let end = u64::from(offset) + u64::from(entries) * TABLE_ENTRY_SIZE as u64;
    if end > source_len {
        return Err(MpqError::BadTableOffset {
            table,
            offset,
            entries,
            archive_size: source_len,
        });
    }
    Ok(())
}
