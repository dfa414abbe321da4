//! Sector stream: positioned reads over one stored file
//!
//! A file is stored either as one unit or as a run of fixed-size sectors.
//! Compressed or imploded sectored files are preceded by a table of sector
//! offsets (one more entry than there are sectors, relative to the start of
//! the file data). The stream decodes one unit at a time and keeps the last
//! decoded unit cached, so sequential reads decode every sector once.

use super::compression::decompress_sector;
use super::{Archive, BlockRecord};
use crate::crypto::decrypt_bytes;
use crate::{explode, MpqError, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// A located file: its block record, the name it was found under and the
/// key derived for it
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Name the file was opened with
    pub name: String,
    /// Block record of the file
    pub block: BlockRecord,
    /// Base encryption key (only meaningful for encrypted files)
    pub seed: u32,
}

/// Readable, seekable view of one file inside an [`Archive`]
#[derive(Debug)]
pub struct SectorStream<'a> {
    archive: &'a Archive,
    entry: FileEntry,
    sector_size: u32,
    position: u64,
    sector_offsets: Option<Vec<u32>>,
    cache: Option<(u32, Vec<u8>)>,
}

impl<'a> SectorStream<'a> {
    pub(crate) fn new(archive: &'a Archive, entry: FileEntry) -> Result<Self> {
        let flags = entry.block.flags;
        if flags.is_patch_file() {
            return Err(MpqError::UnsupportedFeature(format!(
                "{} is a patch file",
                entry.name
            )));
        }

        let sector_size = archive.sector_size();
        let sector_offsets = if Self::has_offset_table(&entry.block) {
            Some(read_sector_offsets(archive, &entry, sector_size)?)
        } else {
            None
        };

        log::debug!(
            "Opened {} ({} bytes, {}, encrypted: {})",
            entry.name,
            entry.block.file_size,
            if flags.is_single_unit() {
                "single unit"
            } else if sector_offsets.is_some() {
                "compressed sectors"
            } else {
                "plain sectors"
            },
            flags.is_encrypted()
        );

        Ok(Self {
            archive,
            entry,
            sector_size,
            position: 0,
            sector_offsets,
            cache: None,
        })
    }

    fn has_offset_table(block: &BlockRecord) -> bool {
        let flags = block.flags;
        !flags.is_single_unit()
            && (flags.is_compressed() || flags.is_imploded())
            && block.file_size > 0
    }

    /// The file this stream reads
    pub fn entry(&self) -> &FileEntry {
        &self.entry
    }

    /// Uncompressed length of the file
    pub fn len(&self) -> u64 {
        u64::from(self.entry.block.file_size)
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size of one decoded unit: the whole file when stored as one unit
    fn unit_size(&self) -> u64 {
        if self.entry.block.flags.is_single_unit() {
            self.len().max(1)
        } else {
            u64::from(self.sector_size)
        }
    }

    /// Read from the current position, returning the number of bytes copied
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let length = self.len();
        let unit_size = self.unit_size();
        let mut copied = 0;

        while copied < buf.len() && self.position < length {
            let index = (self.position / unit_size) as u32;
            self.ensure_unit(index)?;
            let unit = match &self.cache {
                Some((_, data)) => data.as_slice(),
                None => break,
            };
            let offset = (self.position % unit_size) as usize;
            let available = (unit.len() - offset).min((length - self.position) as usize);
            let count = available.min(buf.len() - copied);
            if count == 0 {
                break;
            }
            buf[copied..copied + count].copy_from_slice(&unit[offset..offset + count]);
            copied += count;
            self.position += count as u64;
        }

        Ok(copied)
    }

    /// Move the read position
    ///
    /// Targets before the start or at/after the end of the file fail.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let length = self.len();
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(delta) => (self.position as i64).saturating_add(delta),
            SeekFrom::End(delta) => (length as i64).saturating_add(delta),
        };

        if target < 0 || target as u64 >= length {
            return Err(MpqError::SeekOutOfRange { target, length });
        }
        self.position = target as u64;
        Ok(self.position)
    }

    /// Decode unit `index` into the cache unless it is already there
    fn ensure_unit(&mut self, index: u32) -> Result<()> {
        if !matches!(&self.cache, Some((cached, _)) if *cached == index) {
            let data = self.load_unit(index)?;
            self.cache = Some((index, data));
        }
        Ok(())
    }

    fn load_unit(&self, index: u32) -> Result<Vec<u8>> {
        let block = &self.entry.block;
        let flags = block.flags;

        let (offset, stored_len, expected_len) = if flags.is_single_unit() {
            (
                u64::from(block.offset),
                block.compressed_size as usize,
                block.file_size as usize,
            )
        } else {
            let sector_start = u64::from(index) * u64::from(self.sector_size);
            let expected = (self.len() - sector_start).min(u64::from(self.sector_size)) as usize;
            match &self.sector_offsets {
                Some(offsets) => {
                    let (start, end) = sector_bounds(offsets, index)?;
                    (
                        u64::from(block.offset) + u64::from(start),
                        (end - start) as usize,
                        expected,
                    )
                }
                None => (u64::from(block.offset) + sector_start, expected, expected),
            }
        };

        let mut data = self.archive.read_vec_at(offset, stored_len)?;

        if flags.is_encrypted() && block.file_size > 3 {
            if self.entry.seed == 0 {
                return Err(MpqError::DecryptionFailed(format!(
                    "no key for {}",
                    self.entry.name
                )));
            }
            decrypt_bytes(&mut data, self.entry.seed.wrapping_add(index));
        }

        if stored_len != expected_len {
            log::trace!(
                "Decoding unit {} of {} ({} -> {} bytes)",
                index,
                self.entry.name,
                stored_len,
                expected_len
            );
            if flags.is_compressed() {
                data = decompress_sector(&data, expected_len)?;
            } else if flags.is_imploded() {
                data = explode::explode(&data, expected_len)?;
            }
        }

        if data.len() < expected_len {
            return Err(MpqError::CorruptStream(format!(
                "unit {} of {} decoded to {} bytes, expected {}",
                index,
                self.entry.name,
                data.len(),
                expected_len
            )));
        }
        data.truncate(expected_len);
        Ok(data)
    }
}

fn sector_bounds(offsets: &[u32], index: u32) -> Result<(u32, u32)> {
    let i = index as usize;
    match (offsets.get(i), offsets.get(i + 1)) {
        (Some(&start), Some(&end)) if end >= start => Ok((start, end)),
        _ => Err(MpqError::CorruptTable(format!(
            "sector {} has no valid bounds in the offset table",
            index
        ))),
    }
}

/// Number of entries in the sector offset table of a file
pub(crate) fn offset_table_len(file_size: u32, sector_size: u32) -> usize {
    file_size.div_ceil(sector_size) as usize + 1
}

/// Read the sector offset table, decrypting it with `seed - 1`
fn read_sector_offsets(archive: &Archive, entry: &FileEntry, sector_size: u32) -> Result<Vec<u32>> {
    let count = offset_table_len(entry.block.file_size, sector_size);
    let table_bytes = (count * 4) as u32;

    let mut raw = archive.read_vec_at(u64::from(entry.block.offset), count * 4)?;

    if entry.block.flags.is_encrypted() {
        decrypt_bytes(&mut raw, entry.seed.wrapping_sub(1));
    }

    let offsets: Vec<u32> = raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    if entry.block.flags.is_encrypted()
        && (offsets[0] != table_bytes || offsets[1] > sector_size + table_bytes)
    {
        return Err(MpqError::DecryptionFailed(format!(
            "sector offset table of {} does not decrypt",
            entry.name
        )));
    }

    Ok(offsets)
}

fn into_io_error(error: MpqError, kind: io::ErrorKind) -> io::Error {
    match error {
        MpqError::Io(e) => e,
        other => io::Error::new(kind, other),
    }
}

impl Read for SectorStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf)
            .map_err(|e| into_io_error(e, io::ErrorKind::InvalidData))
    }
}

impl Seek for SectorStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos)
            .map_err(|e| into_io_error(e, io::ErrorKind::InvalidInput))
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}
