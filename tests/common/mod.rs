//! Shared helpers for the integration tests
//!
//! - [`BitWriter`] packs values LSB first, the bit order of explode and DCC
//!   streams.
//! - [`ArchiveBuilder`] lays out a version 0 archive in memory, with
//!   encrypted tables and per-file storage options.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use mpqkit::crypto::{decrypt_bytes, encrypt_bytes, file_key, hash_string, HashType};
use mpqkit::tables::{DIST_BITS, DIST_CODE, EX_LEN_BITS, LEN_BASE, LEN_BITS, LEN_CODE};
use mpqkit::{BlockFlags, BLOCK_TABLE_KEY, HASH_TABLE_KEY, LISTFILE_NAME};
use std::io::Write;

/// LSB-first bit packer
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`
    pub fn write_bits(&mut self, value: u32, bits: u32) -> &mut Self {
        for i in 0..bits {
            if self.bit_count % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (self.bit_count % 8);
            }
            self.bit_count += 1;
        }
        self
    }

    /// Append every bit written to `other`
    pub fn append(&mut self, other: &BitWriter) -> &mut Self {
        for i in 0..other.bit_count {
            let bit = (other.bytes[i / 8] >> (i % 8)) & 1;
            self.write_bits(u32::from(bit), 1);
        }
        self
    }

    /// Number of bits written so far
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Binary-mode explode stream made only of literals
///
/// Always longer than its input, so an archive stores it as is.
pub fn implode_literals(data: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for &byte in data {
        writer.write_bits(0, 1).write_bits(u32::from(byte), 8);
    }
    let mut stream = vec![0x00, 0x04];
    stream.extend(writer.finish());
    stream
}

/// Binary-mode explode stream writer
#[derive(Debug)]
pub struct DclWriter {
    bits: BitWriter,
    dict_bits: u32,
}

impl DclWriter {
    /// Start a stream with 4, 5 or 6 dictionary bits
    pub fn new(dict_bits: u8) -> Self {
        let mut bits = BitWriter::new();
        bits.write_bits(0, 8).write_bits(u32::from(dict_bits), 8);
        Self {
            bits,
            dict_bits: u32::from(dict_bits),
        }
    }

    pub fn literal(&mut self, byte: u8) -> &mut Self {
        self.bits.write_bits(0, 1).write_bits(u32::from(byte), 8);
        self
    }

    pub fn literals(&mut self, bytes: &[u8]) -> &mut Self {
        for &byte in bytes {
            self.literal(byte);
        }
        self
    }

    fn length_code(&mut self, value: u32) {
        let code = (0..16)
            .find(|&i| {
                let base = u32::from(LEN_BASE[i]);
                value >= base && value < base + (1 << EX_LEN_BITS[i])
            })
            .unwrap();
        self.bits
            .write_bits(1, 1)
            .write_bits(u32::from(LEN_CODE[code]), u32::from(LEN_BITS[code]))
            .write_bits(value - u32::from(LEN_BASE[code]), u32::from(EX_LEN_BITS[code]));
    }

    /// Repeat `length` bytes (2..=518) found `distance` bytes back
    pub fn repeat(&mut self, length: u32, distance: u32) -> &mut Self {
        self.length_code(length - 2);
        let low_bits = if length == 2 { 2 } else { self.dict_bits };
        let value = distance - 1;
        let position = (value >> low_bits) as usize;
        self.bits
            .write_bits(u32::from(DIST_CODE[position]), u32::from(DIST_BITS[position]))
            .write_bits(value & ((1 << low_bits) - 1), low_bits);
        self
    }

    /// Append the end-of-stream code and return the stream
    pub fn finish(mut self) -> Vec<u8> {
        self.length_code(0x205);
        self.bits.finish()
    }

    /// Return the stream without an end-of-stream code
    pub fn finish_unterminated(self) -> Vec<u8> {
        self.bits.finish()
    }
}

/// Zlib sector with its tag byte
pub fn zlib_sector(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(vec![0x02], Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// How a file's units are stored
#[derive(Debug, Clone)]
pub enum Storage {
    /// Uncompressed, no offset table
    Plain,
    /// Zlib sectors, raw when compression does not help
    Zlib,
    /// Imploded sectors
    Implode,
    /// Compressed flag with the given units stored verbatim
    Units(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
pub struct TestFile {
    pub name: String,
    pub data: Vec<u8>,
    pub storage: Storage,
    pub single_unit: bool,
    pub encrypted: bool,
    pub key_adjusted: bool,
    pub slot: Option<usize>,
}

impl TestFile {
    pub fn new(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
            storage: Storage::Plain,
            single_unit: false,
            encrypted: false,
            key_adjusted: false,
            slot: None,
        }
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn single_unit(mut self) -> Self {
        self.single_unit = true;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn key_adjusted(mut self) -> Self {
        self.encrypted = true;
        self.key_adjusted = true;
        self
    }

    /// Force the hash table slot instead of probing from the home slot
    pub fn at_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    fn flags(&self) -> u32 {
        let mut flags = BlockFlags::IS_FILE;
        match self.storage {
            Storage::Plain => {}
            Storage::Zlib | Storage::Units(_) => flags |= BlockFlags::COMPRESSED,
            Storage::Implode => flags |= BlockFlags::IMPLODED,
        }
        if self.single_unit {
            flags |= BlockFlags::SINGLE_UNIT;
        }
        if self.encrypted {
            flags |= BlockFlags::ENCRYPTED;
        }
        if self.key_adjusted {
            flags |= BlockFlags::KEY_ADJUSTED;
        }
        flags
    }

    fn encode_unit(&self, index: usize, unit: &[u8]) -> Vec<u8> {
        match &self.storage {
            Storage::Plain => unit.to_vec(),
            Storage::Zlib => {
                let sector = zlib_sector(unit);
                if sector.len() < unit.len() {
                    sector
                } else {
                    unit.to_vec()
                }
            }
            Storage::Implode => implode_literals(unit),
            Storage::Units(units) => units[index].clone(),
        }
    }
}

/// In-memory version 0 archive
#[derive(Debug)]
pub struct ArchiveBuilder {
    sector_shift: u16,
    hash_count: u32,
    files: Vec<TestFile>,
    deleted_slots: Vec<usize>,
    listfile: bool,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            sector_shift: 0,
            hash_count: 16,
            files: Vec::new(),
            deleted_slots: Vec::new(),
            listfile: false,
        }
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    pub fn hash_count(mut self, count: u32) -> Self {
        self.hash_count = count;
        self
    }

    pub fn file(mut self, file: TestFile) -> Self {
        self.files.push(file);
        self
    }

    /// Mark a hash slot as deleted
    pub fn deleted_slot(mut self, slot: usize) -> Self {
        self.deleted_slots.push(slot);
        self
    }

    /// Add a `(listfile)` naming every file
    pub fn with_listfile(mut self) -> Self {
        self.listfile = true;
        self
    }

    pub fn sector_size(&self) -> usize {
        0x200 << self.sector_shift
    }

    pub fn build(mut self) -> Vec<u8> {
        if self.listfile {
            let names: Vec<&str> = self.files.iter().map(|f| f.name.as_str()).collect();
            let text = names.join("\r\n");
            self.files
                .push(TestFile::new(LISTFILE_NAME, text.as_bytes()).storage(Storage::Zlib));
        }

        let sector_size = self.sector_size();
        let mut data = vec![0u8; 32];
        let mut block_table = Vec::new();

        for file in &self.files {
            let offset = data.len() as u32;
            let file_size = file.data.len() as u32;
            let key = file_key(&file.name, offset, file_size, file.key_adjusted);

            let units: Vec<&[u8]> = if file.single_unit {
                vec![file.data.as_slice()]
            } else {
                file.data.chunks(sector_size).collect()
            };
            let mut encoded: Vec<Vec<u8>> = units
                .iter()
                .enumerate()
                .map(|(i, unit)| file.encode_unit(i, unit))
                .collect();
            // Files of three bytes or less keep their units in the clear
            if file.encrypted && file.data.len() > 3 {
                for (i, unit) in encoded.iter_mut().enumerate() {
                    encrypt_bytes(unit, key.wrapping_add(i as u32));
                }
            }

            let with_table = !file.single_unit
                && !matches!(file.storage, Storage::Plain)
                && !file.data.is_empty();
            let mut stored = Vec::new();
            if with_table {
                let mut table = Vec::new();
                let mut position = ((encoded.len() + 1) * 4) as u32;
                table.extend_from_slice(&position.to_le_bytes());
                for unit in &encoded {
                    position += unit.len() as u32;
                    table.extend_from_slice(&position.to_le_bytes());
                }
                if file.encrypted {
                    encrypt_bytes(&mut table, key.wrapping_sub(1));
                }
                stored.extend(table);
            }
            for unit in &encoded {
                stored.extend_from_slice(unit);
            }

            data.extend_from_slice(&stored);
            for value in [offset, stored.len() as u32, file_size, file.flags()] {
                block_table.extend_from_slice(&value.to_le_bytes());
            }
        }

        let count = self.hash_count as usize;
        let mut hash_table = vec![0xFFu8; count * 16];
        let is_free = |table: &[u8], slot: usize| table[slot * 16 + 12..slot * 16 + 16] == [0xFF; 4];
        for &slot in &self.deleted_slots {
            hash_table[slot * 16 + 12..slot * 16 + 16].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        }
        for (index, file) in self.files.iter().enumerate() {
            let slot = match file.slot {
                Some(slot) => slot,
                None => {
                    let mut slot =
                        (hash_string(&file.name, HashType::TableOffset) as usize) & (count - 1);
                    while !is_free(&hash_table, slot) {
                        slot = (slot + 1) % count;
                    }
                    slot
                }
            };
            let record = &mut hash_table[slot * 16..slot * 16 + 16];
            record[0..4].copy_from_slice(&hash_string(&file.name, HashType::NameA).to_le_bytes());
            record[4..8].copy_from_slice(&hash_string(&file.name, HashType::NameB).to_le_bytes());
            record[8..12].copy_from_slice(&0u32.to_le_bytes());
            record[12..16].copy_from_slice(&(index as u32).to_le_bytes());
        }

        encrypt_bytes(&mut hash_table, hash_string(HASH_TABLE_KEY, HashType::FileKey));
        encrypt_bytes(&mut block_table, hash_string(BLOCK_TABLE_KEY, HashType::FileKey));

        let hash_pos = data.len() as u32;
        data.extend_from_slice(&hash_table);
        let block_pos = data.len() as u32;
        data.extend_from_slice(&block_table);

        let mut header = Vec::with_capacity(32);
        header.extend_from_slice(b"MPQ\x1A");
        header.extend_from_slice(&32u32.to_le_bytes());
        header.extend_from_slice(&(data.len() as u32).to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&self.sector_shift.to_le_bytes());
        header.extend_from_slice(&hash_pos.to_le_bytes());
        header.extend_from_slice(&block_pos.to_le_bytes());
        header.extend_from_slice(&self.hash_count.to_le_bytes());
        header.extend_from_slice(&(self.files.len() as u32).to_le_bytes());
        data[..32].copy_from_slice(&header);
        data
    }
}

/// Overwrite one field of block record `index` in a built archive
///
/// Fields are 0 offset, 1 stored size, 2 file size and 3 flags.
pub fn patch_block_record(archive: &mut [u8], index: usize, field: usize, value: u32) {
    let block_pos = u32::from_le_bytes(archive[16..20].try_into().unwrap()) as usize;
    let count = u32::from_le_bytes(archive[28..32].try_into().unwrap()) as usize;
    let key = hash_string(BLOCK_TABLE_KEY, HashType::FileKey);

    let table = &mut archive[block_pos..block_pos + count * 16];
    decrypt_bytes(table, key);
    let at = index * 16 + field * 4;
    table[at..at + 4].copy_from_slice(&value.to_le_bytes());
    encrypt_bytes(table, key);
}

/// Name whose home slot in a table of `count` slots is `slot`
pub fn name_with_home_slot(count: u32, slot: u32) -> String {
    (0..)
        .map(|i| format!("data\\file{i}.bin"))
        .find(|name| hash_string(name, HashType::TableOffset) & (count - 1) == slot)
        .unwrap()
}
