//! Frame headers and decoded frames

use super::Rect;
use crate::bits::BitMuncher;
use crate::{MpqError, Result};

/// Largest frame width, height or offset magnitude accepted
pub const MAX_FRAME_EXTENT: u32 = 0x4000;

/// Field widths shared by every frame header of a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFieldBits {
    /// Width of the unused leading field
    pub variable0: u32,
    /// Width of the frame width field
    pub width: u32,
    /// Width of the frame height field
    pub height: u32,
    /// Width of the signed x offset field
    pub x_offset: u32,
    /// Width of the signed y offset field
    pub y_offset: u32,
    /// Width of the optional data length field
    pub optional_data: u32,
    /// Width of the coded byte count field
    pub coded_bytes: u32,
}

/// Per-frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Horizontal offset of the left edge
    pub x_offset: i32,
    /// Vertical offset of the bottom edge
    pub y_offset: i32,
    /// Number of optional data bytes
    pub optional_bytes: u32,
    /// Number of coded bytes
    pub coded_bytes: u32,
    /// Whether rows are stored bottom to top
    pub bottom_up: bool,
}

impl FrameHeader {
    /// Read one frame header
    pub fn read(bits: &mut BitMuncher<'_>, fields: &FrameFieldBits) -> Result<Self> {
        bits.get_bits(fields.variable0)?;

        let header = Self {
            width: bits.get_bits(fields.width)?,
            height: bits.get_bits(fields.height)?,
            x_offset: bits.get_signed_bits(fields.x_offset)?,
            y_offset: bits.get_signed_bits(fields.y_offset)?,
            optional_bytes: bits.get_bits(fields.optional_data)?,
            coded_bytes: bits.get_bits(fields.coded_bytes)?,
            bottom_up: bits.get_bit()? == 1,
        };

        if header.optional_bytes != 0 {
            return Err(MpqError::UnsupportedFeature(format!(
                "DCC frame with {} optional data bytes",
                header.optional_bytes
            )));
        }
        if header.width > MAX_FRAME_EXTENT
            || header.height > MAX_FRAME_EXTENT
            || header.x_offset.unsigned_abs() > MAX_FRAME_EXTENT
            || header.y_offset.unsigned_abs() > MAX_FRAME_EXTENT
        {
            return Err(MpqError::CorruptStream(format!(
                "DCC frame {}x{} at ({}, {}) is out of range",
                header.width, header.height, header.x_offset, header.y_offset
            )));
        }
        Ok(header)
    }

    /// Bounding box of the frame
    ///
    /// `y_offset` is the bottom row, so the box extends upwards from it.
    /// Bottom-up frames use the same box.
    pub fn bounds(&self) -> Rect {
        Rect {
            left: self.x_offset,
            top: self.y_offset - self.height as i32 + 1,
            width: self.width as i32,
            height: self.height as i32,
        }
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header the frame was decoded from
    pub header: FrameHeader,
    /// Bounding box of the frame
    pub bounds: Rect,
    pub(crate) h_cells: usize,
    pub(crate) v_cells: usize,
    pub(crate) pixels: Vec<u8>,
}

impl Frame {
    /// Palette indices over the direction box, row by row
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of cell columns covering the frame
    pub fn horizontal_cells(&self) -> usize {
        self.h_cells
    }

    /// Number of cell rows covering the frame
    pub fn vertical_cells(&self) -> usize {
        self.v_cells
    }
}
