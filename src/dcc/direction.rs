//! Direction decoding
//!
//! A direction packs every frame of one facing into several interleaved
//! bitstreams:
//!
//! - equal cells: one bit per revisited cell, set when the cell is unchanged
//! - pixel mask: four bits per changed cell, selecting palette stack slots
//! - encoding type: one bit per cell, raw 8-bit codes or nibble deltas
//! - raw pixel codes: 8-bit palette codes
//! - pixel codes and displacements: nibble deltas, then per-pixel indices
//!
//! The first four are carved out at bit granularity from the announced
//! sizes; the last one starts right after them. Decoding walks every frame
//! twice: once to build the palette stack of each cell, once to paint the
//! pixels. Each of the four sized streams must be consumed exactly.

use super::cell::{direction_cell_counts, direction_cells, frame_cells, Cell, PixelBufferEntry};
use super::frame::{Frame, FrameFieldBits, FrameHeader};
use super::Rect;
use crate::bits::BitMuncher;
use crate::tables::{CRAZY_BIT_TABLE, PIXEL_MASK_LOOKUP};
use crate::{MpqError, Result};

/// Largest direction box, in pixels
const MAX_BOX_PIXELS: i64 = 1 << 24;

/// Sizes in bits of the four auxiliary streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSizes {
    /// Equal-cells stream
    pub equal_cells: usize,
    /// Pixel-mask stream
    pub pixel_mask: usize,
    /// Encoding-type stream
    pub encoding_type: usize,
    /// Raw pixel codes stream
    pub raw_pixel_codes: usize,
}

/// Frame image with the dimensions of the direction box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameImage<'a> {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Palette indices, row by row
    pub pixels: &'a [u8],
}

/// A decoded direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Direction {
    /// Coded size announced by the direction header
    pub out_size_coded: u32,
    /// Bit 0: encoding-type and raw streams present, bit 1: equal-cells
    /// stream present
    pub compression_flags: u32,
    /// Frame header field widths
    pub field_bits: FrameFieldBits,
    /// Auxiliary stream sizes
    pub stream_sizes: StreamSizes,
    /// Palette indices actually used, in ascending order
    pub palette_entries: [u8; 256],
    /// Union of all frame boxes
    pub bounds: Rect,
    /// Decoded frames
    pub frames: Vec<Frame>,
}

/// The five cursors used while decoding pixels
struct Streams<'a> {
    equal_cells: BitMuncher<'a>,
    pixel_mask: BitMuncher<'a>,
    encoding_type: BitMuncher<'a>,
    raw_pixel_codes: BitMuncher<'a>,
    pixel_codes: BitMuncher<'a>,
}

fn crazy_bits(bits: &mut BitMuncher<'_>) -> Result<u32> {
    Ok(u32::from(CRAZY_BIT_TABLE[bits.get_bits(4)? as usize]))
}

impl Direction {
    /// Decode the direction starting at `bit_offset` of `data`
    pub fn decode(data: &[u8], bit_offset: usize, frame_count: usize) -> Result<Self> {
        let mut bits = BitMuncher::new(data, bit_offset);

        let out_size_coded = bits.get_u32()?;
        let compression_flags = bits.get_bits(2)?;
        let field_bits = FrameFieldBits {
            variable0: crazy_bits(&mut bits)?,
            width: crazy_bits(&mut bits)?,
            height: crazy_bits(&mut bits)?,
            x_offset: crazy_bits(&mut bits)?,
            y_offset: crazy_bits(&mut bits)?,
            optional_data: crazy_bits(&mut bits)?,
            coded_bytes: crazy_bits(&mut bits)?,
        };

        if frame_count == 0 {
            return Err(MpqError::CorruptStream(
                "direction has no frames".to_string(),
            ));
        }

        // Every header holds at least one bit, so truncated data ends this loop
        let mut headers = Vec::new();
        for _ in 0..frame_count {
            headers.push(FrameHeader::read(&mut bits, &field_bits)?);
        }

        let bounds = headers
            .iter()
            .map(FrameHeader::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        if bounds.width <= 0
            || bounds.height <= 0
            || i64::from(bounds.width) * i64::from(bounds.height) > MAX_BOX_PIXELS
        {
            return Err(MpqError::CorruptStream(format!(
                "direction box is {}x{}",
                bounds.width, bounds.height
            )));
        }

        let mut stream_sizes = StreamSizes::default();
        if compression_flags & 0x2 != 0 {
            stream_sizes.equal_cells = bits.get_bits(20)? as usize;
        }
        stream_sizes.pixel_mask = bits.get_bits(20)? as usize;
        if compression_flags & 0x1 != 0 {
            stream_sizes.encoding_type = bits.get_bits(20)? as usize;
            stream_sizes.raw_pixel_codes = bits.get_bits(20)? as usize;
        }

        let mut palette_entries = [0u8; 256];
        let mut used = 0;
        for index in 0..=255u8 {
            if bits.get_bit()? != 0 {
                palette_entries[used] = index;
                used += 1;
            }
        }

        // Streams start at arbitrary bit positions, not byte boundaries
        let equal_cells = bits.fork();
        bits.skip_bits(stream_sizes.equal_cells);
        let pixel_mask = bits.fork();
        bits.skip_bits(stream_sizes.pixel_mask);
        let encoding_type = bits.fork();
        bits.skip_bits(stream_sizes.encoding_type);
        let raw_pixel_codes = bits.fork();
        bits.skip_bits(stream_sizes.raw_pixel_codes);
        let pixel_codes = bits.fork();

        let mut streams = Streams {
            equal_cells,
            pixel_mask,
            encoding_type,
            raw_pixel_codes,
            pixel_codes,
        };

        let mut frames = Vec::with_capacity(headers.len());
        let mut frame_cell_grids = Vec::with_capacity(headers.len());
        for header in headers {
            let frame_bounds = header.bounds();
            let (h_cells, v_cells, cells) = frame_cells(&frame_bounds, &bounds);
            frames.push(Frame {
                header,
                bounds: frame_bounds,
                h_cells,
                v_cells,
                pixels: Vec::new(),
            });
            frame_cell_grids.push(cells);
        }

        let mut direction = Self {
            out_size_coded,
            compression_flags,
            field_bits,
            stream_sizes,
            palette_entries,
            bounds,
            frames,
        };

        let pixel_buffer = direction.fill_pixel_buffer(&mut streams)?;
        direction.generate_frames(&mut streams.pixel_codes, &frame_cell_grids, &pixel_buffer)?;
        direction.verify(&streams)?;

        log::trace!(
            "Decoded direction: {} frames, box {:?}, {} cell entries",
            direction.frames.len(),
            direction.bounds,
            pixel_buffer.len()
        );
        Ok(direction)
    }

    /// Build the palette stack of every changed cell of every frame
    fn fill_pixel_buffer(&self, streams: &mut Streams<'_>) -> Result<Vec<PixelBufferEntry>> {
        let (dir_h_cells, dir_v_cells) = direction_cell_counts(&self.bounds);
        let mut cell_buffer: Vec<Option<[u8; 4]>> = vec![None; dir_h_cells * dir_v_cells];
        let mut entries = Vec::new();

        for (frame_index, frame) in self.frames.iter().enumerate() {
            let origin_x = ((frame.bounds.left - self.bounds.left) / 4) as usize;
            let origin_y = ((frame.bounds.top - self.bounds.top) / 4) as usize;

            for cell_y in 0..frame.v_cells {
                for cell_x in 0..frame.h_cells {
                    let current = origin_x + cell_x + (origin_y + cell_y) * dir_h_cells;
                    let previous = *cell_buffer.get(current).ok_or_else(|| {
                        MpqError::CorruptStream(format!(
                            "frame {} cell ({}, {}) is outside the direction grid",
                            frame_index, cell_x, cell_y
                        ))
                    })?;

                    let pixel_mask = match previous {
                        Some(_) => {
                            let unchanged = self.stream_sizes.equal_cells > 0
                                && streams.equal_cells.get_bit()? == 1;
                            if unchanged {
                                continue;
                            }
                            streams.pixel_mask.get_bits(4)?
                        }
                        None => 0x0F,
                    };

                    let pixel_count = PIXEL_MASK_LOOKUP[pixel_mask as usize];
                    let raw_codes = pixel_count != 0
                        && self.stream_sizes.encoding_type > 0
                        && streams.encoding_type.get_bit()? == 1;

                    let mut stack = [0u32; 4];
                    let mut decoded = 0;
                    let mut last_pixel = 0u32;
                    for slot in stack.iter_mut().take(pixel_count) {
                        let pixel = if raw_codes {
                            streams.raw_pixel_codes.get_bits(8)?
                        } else {
                            let mut pixel = last_pixel;
                            loop {
                                let displacement = streams.pixel_codes.get_bits(4)?;
                                pixel = pixel.wrapping_add(displacement);
                                if displacement != 15 {
                                    break;
                                }
                            }
                            pixel
                        };

                        if pixel == last_pixel {
                            break;
                        }
                        *slot = pixel;
                        last_pixel = pixel;
                        decoded += 1;
                    }

                    let old = previous.unwrap_or_default();
                    let mut value = [0u8; 4];
                    let mut next = decoded;
                    for (i, slot) in value.iter_mut().enumerate() {
                        if pixel_mask & (1 << i) != 0 {
                            if next > 0 {
                                next -= 1;
                                *slot = stack[next] as u8;
                            }
                        } else {
                            *slot = old[i];
                        }
                    }

                    cell_buffer[current] = Some(value);
                    entries.push(PixelBufferEntry {
                        value,
                        frame: frame_index,
                        frame_cell_index: cell_x + cell_y * frame.h_cells,
                    });
                }
            }
        }

        for entry in &mut entries {
            for slot in entry.value.iter_mut() {
                *slot = self.palette_entries[*slot as usize];
            }
        }
        Ok(entries)
    }

    /// Paint every frame from the pixel buffer and the pixel code stream
    fn generate_frames(
        &mut self,
        pixel_codes: &mut BitMuncher<'_>,
        frame_cell_grids: &[Vec<Cell>],
        pixel_buffer: &[PixelBufferEntry],
    ) -> Result<()> {
        let box_width = self.bounds.width as usize;
        let box_len = box_width * self.bounds.height as usize;
        let (dir_h_cells, _) = direction_cell_counts(&self.bounds);

        let mut grid = direction_cells(&self.bounds);
        let mut canvas = vec![0u8; box_len];
        let mut buffer_index = 0;

        for (frame_index, (frame, cells)) in
            self.frames.iter_mut().zip(frame_cell_grids).enumerate()
        {
            let mut pixels = vec![0u8; box_len];

            for (cell_index, cell) in cells.iter().enumerate() {
                let x0 = cell.x_offset as usize;
                let y0 = cell.y_offset as usize;
                let width = cell.width as usize;
                let height = cell.height as usize;
                let grid_index = x0 / 4 + (y0 / 4) * dir_h_cells;

                let grid_cell = grid.get_mut(grid_index).ok_or_else(|| {
                    MpqError::CorruptStream(format!(
                        "frame {} cell {} is outside the direction grid",
                        frame_index, cell_index
                    ))
                })?;

                let entry = pixel_buffer
                    .get(buffer_index)
                    .filter(|e| e.frame == frame_index && e.frame_cell_index == cell_index);

                match entry {
                    None => {
                        let same_size = grid_cell
                            .last
                            .is_some_and(|last| last.width == cell.width && last.height == cell.height);
                        if !same_size {
                            for y in y0..y0 + height {
                                canvas[y * box_width + x0..y * box_width + x0 + width].fill(0);
                            }
                        } else if let Some(last) = grid_cell.last {
                            let (lx, ly) = (last.x_offset as usize, last.y_offset as usize);
                            for fy in 0..height {
                                for fx in 0..width {
                                    canvas[(y0 + fy) * box_width + x0 + fx] =
                                        canvas[(ly + fy) * box_width + lx + fx];
                                }
                            }
                            copy_cell(&canvas, &mut pixels, box_width, x0, y0, width, height);
                        }
                    }
                    Some(entry) => {
                        if entry.value[0] == entry.value[1] {
                            for y in y0..y0 + height {
                                canvas[y * box_width + x0..y * box_width + x0 + width]
                                    .fill(entry.value[0]);
                            }
                        } else {
                            let bits = if entry.value[1] == entry.value[2] { 1 } else { 2 };
                            for y in y0..y0 + height {
                                for x in x0..x0 + width {
                                    let index = pixel_codes.get_bits(bits)? as usize;
                                    canvas[y * box_width + x] = entry.value[index];
                                }
                            }
                        }
                        copy_cell(&canvas, &mut pixels, box_width, x0, y0, width, height);
                        buffer_index += 1;
                    }
                }

                grid_cell.last = Some(*cell);
            }

            frame.pixels = pixels;
        }

        Ok(())
    }

    /// Check that each sized stream was consumed exactly
    fn verify(&self, streams: &Streams<'_>) -> Result<()> {
        let checks = [
            ("equal cells", &streams.equal_cells, self.stream_sizes.equal_cells),
            ("pixel mask", &streams.pixel_mask, self.stream_sizes.pixel_mask),
            (
                "encoding type",
                &streams.encoding_type,
                self.stream_sizes.encoding_type,
            ),
            (
                "raw pixel codes",
                &streams.raw_pixel_codes,
                self.stream_sizes.raw_pixel_codes,
            ),
        ];

        for (name, stream, expected) in checks {
            if stream.bits_read() != expected {
                return Err(MpqError::CorruptStream(format!(
                    "{} stream: read {} bits, expected {}",
                    name,
                    stream.bits_read(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Image of frame `index`, sized to the direction box
    pub fn frame_image(&self, index: usize) -> Option<FrameImage<'_>> {
        self.frames.get(index).map(|frame| FrameImage {
            width: self.bounds.width as usize,
            height: self.bounds.height as usize,
            pixels: &frame.pixels,
        })
    }
}

fn copy_cell(
    canvas: &[u8],
    pixels: &mut [u8],
    stride: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
) {
    for y in y0..y0 + height {
        let row = y * stride + x0;
        pixels[row..row + width].copy_from_slice(&canvas[row..row + width]);
    }
}
