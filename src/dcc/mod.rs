//! DCC sprite decoder
//!
//! A DCC file stores an animation for up to 32 facings. Each facing is a
//! [`Direction`] whose frames share one bounding box, cut into 4x4 cells
//! that later frames may reuse. Decoding yields palette indices only; the
//! palette itself lives elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use mpqkit::dcc::DccFile;
//!
//! let data = std::fs::read("cr.dcc")?;
//! let dcc = DccFile::parse(&data)?;
//! let direction = dcc.direction(0)?;
//! if let Some(image) = direction.frame_image(0) {
//!     println!("{}x{}", image.width, image.height);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cell;
mod direction;
mod frame;

pub use cell::{Cell, DirectionCell, PixelBufferEntry, CELL_SIZE};
pub use direction::{Direction, FrameImage, StreamSizes};
pub use frame::{Frame, FrameFieldBits, FrameHeader, MAX_FRAME_EXTENT};

use crate::tables::{DCC_DIR16, DCC_DIR32, DCC_DIR4, DCC_DIR8};
use crate::{MpqError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// First byte of every DCC file
pub const DCC_SIGNATURE: u8 = 0x74;

/// Axis-aligned box in sprite coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// One past the right edge
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// One past the bottom edge
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Rect {
            left,
            top,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }
}

/// A parsed DCC file
///
/// Only the file header is parsed up front; directions are decoded on
/// request.
#[derive(Debug, Clone)]
pub struct DccFile {
    data: Vec<u8>,
    version: u8,
    frames_per_direction: u32,
    total_size_coded: u32,
    direction_offsets: Vec<u32>,
}

impl DccFile {
    /// Parse the file header
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let short = |_: std::io::Error| MpqError::short_read(15, data.len());

        let signature = cursor.read_u8().map_err(short)?;
        if signature != DCC_SIGNATURE {
            return Err(MpqError::MalformedHeader(format!(
                "DCC signature 0x{:02X}, expected 0x{:02X}",
                signature, DCC_SIGNATURE
            )));
        }

        let version = cursor.read_u8().map_err(short)?;
        let direction_count = cursor.read_u8().map_err(short)?;
        let frames_per_direction = cursor.read_u32::<LittleEndian>().map_err(short)?;
        let tag = cursor.read_u32::<LittleEndian>().map_err(short)?;
        if tag != 1 {
            return Err(MpqError::MalformedHeader(format!(
                "DCC header field is {}, expected 1",
                tag
            )));
        }
        let total_size_coded = cursor.read_u32::<LittleEndian>().map_err(short)?;

        let mut direction_offsets = Vec::with_capacity(direction_count as usize);
        for _ in 0..direction_count {
            let offset = cursor.read_u32::<LittleEndian>().map_err(|_| {
                MpqError::short_read(15 + 4 * direction_count as usize, data.len())
            })?;
            direction_offsets.push(offset);
        }

        Ok(Self {
            data: data.to_vec(),
            version,
            frames_per_direction,
            total_size_coded,
            direction_offsets,
        })
    }

    /// Format version byte
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Number of stored directions
    pub fn direction_count(&self) -> usize {
        self.direction_offsets.len()
    }

    /// Frames in every direction
    pub fn frames_per_direction(&self) -> u32 {
        self.frames_per_direction
    }

    /// Coded size announced by the header
    pub fn total_size_coded(&self) -> u32 {
        self.total_size_coded
    }

    /// Byte offsets of the stored directions
    pub fn direction_offsets(&self) -> &[u32] {
        &self.direction_offsets
    }

    /// Decode the direction stored at `index`
    pub fn direction(&self, index: usize) -> Result<Direction> {
        let offset = *self.direction_offsets.get(index).ok_or_else(|| {
            MpqError::NotFound(format!(
                "direction {} of {}",
                index,
                self.direction_offsets.len()
            ))
        })?;
        Direction::decode(
            &self.data,
            offset as usize * 8,
            self.frames_per_direction as usize,
        )
    }

    /// Decode the direction facing `compass`
    pub fn compass_direction(&self, compass: u8) -> Result<Direction> {
        let index = direction_index(self.direction_count(), compass).ok_or_else(|| {
            MpqError::NotFound(format!(
                "compass direction {} in a {}-direction file",
                compass,
                self.direction_count()
            ))
        })?;
        self.direction(index)
    }

    /// Decode every direction in storage order
    pub fn directions(&self) -> Result<Vec<Direction>> {
        (0..self.direction_count())
            .map(|index| self.direction(index))
            .collect()
    }
}

/// Storage index of compass direction `compass`
///
/// Files with 4, 8, 16 or 32 directions store them in an interleaved
/// order. Returns `None` for other counts or directions out of range.
pub fn direction_index(direction_count: usize, compass: u8) -> Option<usize> {
    let table: &[u8] = match direction_count {
        1 => return (compass == 0).then_some(0),
        4 => &DCC_DIR4,
        8 => &DCC_DIR8,
        16 => &DCC_DIR16,
        32 => &DCC_DIR32,
        _ => return None,
    };
    table.iter().position(|&dir| dir == compass)
}
