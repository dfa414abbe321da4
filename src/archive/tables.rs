//! Hash and block table records

use crate::crypto::{decrypt_bytes, hash_string, HashType};
use crate::{MpqError, Result, TABLE_ENTRY_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

/// File attribute bits of a block record
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockFlags(pub u32);

impl BlockFlags {
    /// Data is PKWare DCL imploded
    pub const IMPLODED: u32 = 0x0000_0100;
    /// Data is compressed with a tagged codec
    pub const COMPRESSED: u32 = 0x0000_0200;
    /// Data is encrypted
    pub const ENCRYPTED: u32 = 0x0001_0000;
    /// Key is adjusted by block offset and file size
    pub const KEY_ADJUSTED: u32 = 0x0002_0000;
    /// File is a patch against an older archive
    pub const PATCH_FILE: u32 = 0x0010_0000;
    /// File is stored as one unit instead of sectors
    pub const SINGLE_UNIT: u32 = 0x0100_0000;
    /// File is a deletion marker
    pub const DELETE_FILE: u32 = 0x0200_0000;
    /// Record describes a file
    pub const IS_FILE: u32 = 0x8000_0000;

    /// Raw flag bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Test a flag constant
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Whether the record describes a file
    pub fn is_file(&self) -> bool {
        self.contains(Self::IS_FILE)
    }

    /// Whether the data is stored as one unit
    pub fn is_single_unit(&self) -> bool {
        self.contains(Self::SINGLE_UNIT)
    }

    /// Whether the key is adjusted
    pub fn is_key_adjusted(&self) -> bool {
        self.contains(Self::KEY_ADJUSTED)
    }

    /// Whether the data is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    /// Whether sectors carry a codec tag
    pub fn is_compressed(&self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    /// Whether sectors are imploded
    pub fn is_imploded(&self) -> bool {
        self.contains(Self::IMPLODED)
    }

    /// Whether the file is a patch
    pub fn is_patch_file(&self) -> bool {
        self.contains(Self::PATCH_FILE)
    }

    /// Whether the file is a deletion marker
    pub fn is_delete_file(&self) -> bool {
        self.contains(Self::DELETE_FILE)
    }
}

impl fmt::Debug for BlockFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u32, &str); 8] = [
            (BlockFlags::IS_FILE, "IS_FILE"),
            (BlockFlags::SINGLE_UNIT, "SINGLE_UNIT"),
            (BlockFlags::DELETE_FILE, "DELETE_FILE"),
            (BlockFlags::PATCH_FILE, "PATCH_FILE"),
            (BlockFlags::KEY_ADJUSTED, "KEY_ADJUSTED"),
            (BlockFlags::ENCRYPTED, "ENCRYPTED"),
            (BlockFlags::COMPRESSED, "COMPRESSED"),
            (BlockFlags::IMPLODED, "IMPLODED"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "BlockFlags(0x{:08X}: {})", self.0, set.join(" | "))
    }
}

/// Hash table record (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRecord {
    /// Name hash with [`HashType::NameA`]
    pub name_a: u32,
    /// Name hash with [`HashType::NameB`]
    pub name_b: u32,
    /// Windows LANGID of the file
    pub locale: u16,
    /// Platform of the file
    pub platform: u16,
    /// Index into the block table, or a sentinel
    pub block_index: u32,
}

impl HashRecord {
    /// Slot has never been used
    pub const EMPTY: u32 = 0xFFFF_FFFF;
    /// Slot held a file that was deleted
    pub const DELETED: u32 = 0xFFFF_FFFE;

    /// Whether the slot was never used
    pub fn is_empty(&self) -> bool {
        self.block_index == Self::EMPTY
    }

    /// Whether the slot was deleted
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::DELETED
    }

    /// Whether the slot refers to a block
    pub fn is_valid(&self) -> bool {
        self.block_index < Self::DELETED
    }

    fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            name_a: cursor.read_u32::<LittleEndian>()?,
            name_b: cursor.read_u32::<LittleEndian>()?,
            locale: cursor.read_u16::<LittleEndian>()?,
            platform: cursor.read_u16::<LittleEndian>()?,
            block_index: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// Block table record (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// Position of the file data in the archive
    pub offset: u32,
    /// Stored size in bytes
    pub compressed_size: u32,
    /// Uncompressed size in bytes
    pub file_size: u32,
    /// Attribute bits
    pub flags: BlockFlags,
}

impl BlockRecord {
    fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            offset: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            file_size: cursor.read_u32::<LittleEndian>()?,
            flags: BlockFlags(cursor.read_u32::<LittleEndian>()?),
        })
    }
}

fn decrypt_table(raw: &mut [u8], entries: u32, key_name: &str) -> Result<()> {
    let expected = entries as usize * TABLE_ENTRY_SIZE;
    if raw.len() < expected {
        return Err(MpqError::short_read(expected, raw.len()));
    }
    decrypt_bytes(raw, hash_string(key_name, HashType::FileKey));
    Ok(())
}

/// Decrypt and parse a raw hash table
pub fn parse_hash_table(mut raw: Vec<u8>, entries: u32) -> Result<Vec<HashRecord>> {
    decrypt_table(&mut raw, entries, crate::HASH_TABLE_KEY)?;
    let mut cursor = Cursor::new(raw.as_slice());
    (0..entries).map(|_| HashRecord::parse(&mut cursor)).collect()
}

/// Decrypt and parse a raw block table
pub fn parse_block_table(mut raw: Vec<u8>, entries: u32) -> Result<Vec<BlockRecord>> {
    decrypt_table(&mut raw, entries, crate::BLOCK_TABLE_KEY)?;
    let mut cursor = Cursor::new(raw.as_slice());
    (0..entries).map(|_| BlockRecord::parse(&mut cursor)).collect()
}
