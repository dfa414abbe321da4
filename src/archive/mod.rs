//! MPQ archive reader
//!
//! An [`Archive`] holds the parsed header and the decrypted hash and block
//! tables of a version 0 archive, together with the open source it was read
//! from. Files are located by hashing their path, and read through a
//! [`SectorStream`] that borrows the archive.
//!
//! The source is shared by every stream opened from one archive. Each
//! physical read locks it, seeks and reads in one step, so streams can be
//! used from several threads at once.
//!
//! # Example
//!
//! ```no_run
//! use mpqkit::Archive;
//! use std::io::Read;
//!
//! let archive = Archive::open("d2data.mpq")?;
//! let mut stream = archive.open_file("data\\global\\excel\\armor.txt")?;
//! let mut text = String::new();
//! stream.read_to_string(&mut text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compression;
mod header;
pub mod set;
mod stream;
mod tables;

pub use header::ArchiveHeader;
pub use set::{ArchiveSet, ArchiveSetConfig};
pub use stream::{FileEntry, SectorStream};
pub use tables::{BlockFlags, BlockRecord, HashRecord};

use crate::crypto::{detect_file_seed, file_key, hash_string, HashType};
use crate::{MpqError, Result, LISTFILE_NAME, TABLE_ENTRY_SIZE};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Byte source an archive can be read from
pub trait ArchiveSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ArchiveSource for T {}

/// An open MPQ archive
pub struct Archive {
    path: Option<PathBuf>,
    header: ArchiveHeader,
    hash_table: Vec<HashRecord>,
    block_table: Vec<BlockRecord>,
    source_len: u64,
    source: Mutex<Box<dyn ArchiveSource>>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("hash_entries", &self.hash_table.len())
            .field("block_entries", &self.block_table.len())
            .finish()
    }
}

impl Archive {
    /// Open an archive file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut archive = Self::from_reader(BufReader::new(file))?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    /// Read an archive from any seekable source
    pub fn from_reader<R: ArchiveSource + 'static>(mut reader: R) -> Result<Self> {
        let source_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header = ArchiveHeader::read(&mut reader)?;
        header.validate_tables(source_len)?;

        let raw_blocks = read_table(
            &mut reader,
            header.block_table_pos,
            header.block_table_entries,
        )?;
        let block_table = tables::parse_block_table(raw_blocks, header.block_table_entries)?;

        let raw_hashes = read_table(
            &mut reader,
            header.hash_table_pos,
            header.hash_table_entries,
        )?;
        let hash_table = tables::parse_hash_table(raw_hashes, header.hash_table_entries)?;

        log::debug!(
            "Opened archive: {} bytes, sector size {}, {} hash entries, {} block entries",
            source_len,
            header.sector_size(),
            hash_table.len(),
            block_table.len()
        );

        Ok(Self {
            path: None,
            header,
            hash_table,
            block_table,
            source_len,
            source: Mutex::new(Box::new(reader)),
        })
    }

    /// Path the archive was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Archive header
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Decrypted hash table
    pub fn hash_records(&self) -> &[HashRecord] {
        &self.hash_table
    }

    /// Decrypted block table
    pub fn block_records(&self) -> &[BlockRecord] {
        &self.block_table
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.header.sector_size()
    }

    /// Find the block record of a file
    ///
    /// The scan starts at the file's home slot and wraps around the table
    /// once. Empty and deleted slots are skipped; the first slot whose name
    /// hashes match wins, whatever its locale.
    pub fn lookup(&self, name: &str) -> Result<&BlockRecord> {
        let index = self.find_hash_slot(name)?;
        let block_index = self.hash_table[index].block_index;
        self.block_table
            .get(block_index as usize)
            .ok_or_else(|| {
                MpqError::CorruptTable(format!(
                    "{} points at block {} of {}",
                    name,
                    block_index,
                    self.block_table.len()
                ))
            })
    }

    fn find_hash_slot(&self, name: &str) -> Result<usize> {
        let count = self.hash_table.len();
        if count == 0 {
            return Err(MpqError::NotFound(name.to_string()));
        }

        let start = (hash_string(name, HashType::TableOffset) as usize) & (count - 1);
        let name_a = hash_string(name, HashType::NameA);
        let name_b = hash_string(name, HashType::NameB);

        (start..count)
            .chain(0..start)
            .find(|&i| {
                let record = &self.hash_table[i];
                record.is_valid() && record.name_a == name_a && record.name_b == name_b
            })
            .ok_or_else(|| MpqError::NotFound(name.to_string()))
    }

    /// Whether a file with this name exists
    pub fn has_file(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Locate a file and derive its key
    pub fn file_entry(&self, name: &str) -> Result<FileEntry> {
        let block = *self.lookup(name)?;
        let seed = file_key(
            name,
            block.offset,
            block.file_size,
            block.flags.is_key_adjusted(),
        );
        Ok(FileEntry {
            name: name.to_string(),
            block,
            seed,
        })
    }

    /// Open a file for reading
    pub fn open_file(&self, name: &str) -> Result<SectorStream<'_>> {
        let entry = self.file_entry(name)?;
        SectorStream::new(self, entry)
    }

    /// Read a whole file
    ///
    /// The buffer grows as units decode, so a corrupt size field fails on
    /// the first bad unit instead of reserving its full length.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let mut stream = self.open_file(name)?;
        let mut data = Vec::with_capacity(stream.len().min(self.source_len) as usize);
        let mut chunk = [0u8; 0x4000];
        loop {
            let read = stream.read_bytes(&mut chunk)?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
        }
        Ok(data)
    }

    /// Open a file by block index, without knowing its name
    ///
    /// Unencrypted files open directly. For encrypted sectored files the key
    /// is recovered from the sector offset table, whose first entry is known.
    pub fn open_block(&self, block_index: usize) -> Result<SectorStream<'_>> {
        let block = *self.block_table.get(block_index).ok_or_else(|| {
            MpqError::NotFound(format!("block {}", block_index))
        })?;
        let name = format!("block {}", block_index);

        let seed = if !block.flags.is_encrypted() {
            0
        } else if block.flags.is_single_unit()
            || !(block.flags.is_compressed() || block.flags.is_imploded())
        {
            return Err(MpqError::DecryptionFailed(format!(
                "{} is encrypted and has no offset table to recover the key from",
                name
            )));
        } else {
            let table_bytes =
                (stream::offset_table_len(block.file_size, self.sector_size()) * 4) as u32;
            let mut raw = [0u8; 8];
            self.read_at(u64::from(block.offset), &mut raw)?;
            let value0 = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            let value1 = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
            let table_key = detect_file_seed(value0, value1, table_bytes).ok_or_else(|| {
                MpqError::DecryptionFailed(format!("no key recovered for {}", name))
            })?;
            log::debug!("Recovered key 0x{:08X} for {}", table_key.wrapping_add(1), name);
            table_key.wrapping_add(1)
        };

        SectorStream::new(self, FileEntry { name, block, seed })
    }

    /// Names listed in the archive's `(listfile)`
    ///
    /// An archive without a listfile yields an empty list.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let data = match self.read_file(LISTFILE_NAME) {
            Ok(data) => data,
            Err(MpqError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(String::from_utf8_lossy(&data)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Fail unless `len` bytes at `offset` lie inside the source
    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset.saturating_add(len as u64) > self.source_len {
            return Err(MpqError::short_read(
                len,
                self.source_len.saturating_sub(offset) as usize,
            ));
        }
        Ok(())
    }

    /// Read `len` bytes at `offset`, checking the range before allocating
    pub(crate) fn read_vec_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read exactly `buf.len()` bytes at `offset` of the source
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;

        let mut source = self.source.lock();
        source.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let read = source.read(&mut buf[filled..])?;
            if read == 0 {
                return Err(MpqError::short_read(buf.len(), filled));
            }
            filled += read;
        }
        Ok(())
    }
}

fn read_table<R: Read + Seek>(reader: &mut R, offset: u32, entries: u32) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; entries as usize * TABLE_ENTRY_SIZE];
    reader.seek(SeekFrom::Start(u64::from(offset)))?;
    reader.read_exact(&mut raw)?;
    Ok(raw)
}
