//! DCC decoding tests
//!
//! Directions are assembled bit by bit: header fields, frame headers, the
//! four sized streams and the pixel code stream, in the order the decoder
//! consumes them.

mod common;

use common::BitWriter;
use mpqkit::dcc::{direction_index, DccFile, Direction, Rect};
use mpqkit::MpqError;

#[derive(Debug, Clone, Copy)]
struct FrameLayout {
    width: u32,
    height: u32,
    x: i32,
    y: i32,
}

#[derive(Debug, Default)]
struct DirectionLayout {
    flags: u32,
    frames: Vec<FrameLayout>,
    palette: Vec<u8>,
    optional_bits: u32,
    equal_cells: BitWriter,
    pixel_mask: BitWriter,
    encoding_type: BitWriter,
    raw_pixels: BitWriter,
    pixel_codes: BitWriter,
}

impl DirectionLayout {
    fn new(flags: u32, frames: &[FrameLayout], palette: &[u8]) -> Self {
        Self {
            flags,
            frames: frames.to_vec(),
            palette: palette.to_vec(),
            ..Self::default()
        }
    }

    /// Width, height, x and y use selector 3 (four bits); the rest are empty
    fn encode(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.write_bits(0, 32).write_bits(self.flags, 2);
        let optional_code = if self.optional_bits > 0 { 1 } else { 0 };
        for code in [0, 3, 3, 3, 3, optional_code, 0] {
            bits.write_bits(code, 4);
        }

        for frame in &self.frames {
            bits.write_bits(frame.width, 4)
                .write_bits(frame.height, 4)
                .write_bits(frame.x as u32 & 0xF, 4)
                .write_bits(frame.y as u32 & 0xF, 4);
            if optional_code == 1 {
                bits.write_bits(self.optional_bits, 1);
            }
            bits.write_bits(0, 1);
        }

        if self.flags & 0x2 != 0 {
            bits.write_bits(self.equal_cells.bit_count() as u32, 20);
        }
        bits.write_bits(self.pixel_mask.bit_count() as u32, 20);
        if self.flags & 0x1 != 0 {
            bits.write_bits(self.encoding_type.bit_count() as u32, 20);
            bits.write_bits(self.raw_pixels.bit_count() as u32, 20);
        }

        for index in 0..=255u8 {
            bits.write_bits(u32::from(self.palette.contains(&index)), 1);
        }

        bits.append(&self.equal_cells)
            .append(&self.pixel_mask)
            .append(&self.encoding_type)
            .append(&self.raw_pixels)
            .append(&self.pixel_codes);
        bits.finish()
    }
}

fn dcc_file(frames_per_direction: u32, directions: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0x74, 6, directions.len() as u8];
    data.extend_from_slice(&frames_per_direction.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    let mut offset = data.len() + 4 * directions.len();
    for direction in directions {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += direction.len();
    }
    for direction in directions {
        data.extend_from_slice(direction);
    }
    data
}

fn identity_palette() -> Vec<u8> {
    (0..=255).collect()
}

/// One 4x4 frame whose cell holds palette slots 30, 20, 10, 10
fn single_frame_direction() -> DirectionLayout {
    let frame = FrameLayout {
        width: 4,
        height: 4,
        x: 0,
        y: 3,
    };
    let mut layout = DirectionLayout::new(0, &[frame], &[10, 20, 30]);

    // Stack values 1 and 2, then a repeat of 2 ends the stack
    layout.pixel_codes
        .write_bits(1, 4)
        .write_bits(1, 4)
        .write_bits(0, 4);
    for y in 0..4 {
        for x in 0..4 {
            layout.pixel_codes.write_bits((x + y) % 3, 2);
        }
    }
    layout
}

#[test]
fn test_single_frame() {
    let layout = single_frame_direction();
    let direction = Direction::decode(&layout.encode(), 0, 1).unwrap();

    assert_eq!(
        direction.bounds,
        Rect {
            left: 0,
            top: 0,
            width: 4,
            height: 4
        }
    );
    assert_eq!(direction.frame_count(), 1);
    assert_eq!(&direction.palette_entries[..3], &[10, 20, 30]);

    let image = direction.frame_image(0).unwrap();
    assert_eq!((image.width, image.height), (4, 4));
    assert_eq!(image.pixels.len(), 16);

    let values = [30u8, 20, 10];
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(image.pixels[y * 4 + x], values[(x + y) % 3], "pixel ({x}, {y})");
        }
    }
    assert!(direction.frame_image(1).is_none());
}

#[test]
fn test_dcc_file_directions() {
    let data = dcc_file(1, &[single_frame_direction().encode()]);
    let dcc = DccFile::parse(&data).unwrap();

    assert_eq!(dcc.direction_count(), 1);
    assert_eq!(dcc.frames_per_direction(), 1);
    assert_eq!(dcc.direction_offsets(), &[19]);

    let direction = dcc.direction(0).unwrap();
    assert_eq!(direction, dcc.compass_direction(0).unwrap());
    assert_eq!(dcc.directions().unwrap(), vec![direction]);
    assert!(matches!(
        dcc.compass_direction(1),
        Err(MpqError::NotFound(_))
    ));
}

#[test]
fn test_decoding_is_deterministic() {
    let data = dcc_file(1, &[single_frame_direction().encode()]);
    let dcc = DccFile::parse(&data).unwrap();
    assert_eq!(dcc.direction(0).unwrap(), dcc.direction(0).unwrap());

    let data = dcc_file(2, &[moving_cell_direction(2).encode()]);
    let dcc = DccFile::parse(&data).unwrap();
    let first = dcc.direction(0).unwrap();
    let second = dcc.direction(0).unwrap();
    assert_eq!(first.frame_count(), 2);
    assert_eq!(first, second);
    for index in 0..2 {
        assert_eq!(first.frame_image(index), second.frame_image(index));
    }
}

#[test]
fn test_multi_cell_frame() {
    // 7x6 frame: columns of 4 and 3 pixels, rows of 4 and 2
    let frame = FrameLayout {
        width: 7,
        height: 6,
        x: -2,
        y: 2,
    };
    let mut layout = DirectionLayout::new(0, &[frame], &identity_palette());
    for cell in 0..4 {
        layout.pixel_codes.write_bits(cell + 1, 4).write_bits(0, 4);
    }
    for cell_pixels in [16, 12, 8, 6] {
        layout.pixel_codes.write_bits(0, cell_pixels);
    }

    let direction = Direction::decode(&layout.encode(), 0, 1).unwrap();
    assert_eq!(
        direction.bounds,
        Rect {
            left: -2,
            top: -3,
            width: 7,
            height: 6
        }
    );

    let frame = &direction.frames[0];
    assert_eq!(
        (frame.horizontal_cells(), frame.vertical_cells()),
        (2, 2)
    );

    let image = direction.frame_image(0).unwrap();
    assert_eq!(image.pixels.len(), 42);
    for y in 0..6 {
        for x in 0..7 {
            let cell = (x / 4) + (y / 4) * 2;
            assert_eq!(image.pixels[y * 7 + x], cell as u8 + 1, "pixel ({x}, {y})");
        }
    }
}

fn two_frames() -> [FrameLayout; 2] {
    let frame = FrameLayout {
        width: 4,
        height: 4,
        x: 0,
        y: 3,
    };
    [frame, frame]
}

#[test]
fn test_equal_cell_reuses_previous_frame() {
    let mut layout = DirectionLayout::new(0x2, &two_frames(), &identity_palette());
    layout.equal_cells.write_bits(1, 1);

    // Frame 0: stack [5], so one bit per pixel picks 5 or 0
    layout.pixel_codes.write_bits(5, 4).write_bits(0, 4);
    for y in 0..4 {
        for x in 0..4 {
            layout.pixel_codes.write_bits((x + y) % 2, 1);
        }
    }

    let direction = Direction::decode(&layout.encode(), 0, 2).unwrap();
    assert_eq!(direction.stream_sizes.equal_cells, 1);

    let first = direction.frame_image(0).unwrap();
    let second = direction.frame_image(1).unwrap();
    assert_eq!(first.pixels, second.pixels);
    assert_eq!(&first.pixels[..4], &[5, 0, 5, 0]);
    assert_eq!(&first.pixels[4..8], &[0, 5, 0, 5]);
}

/// One-row frames inside a single 4x1 grid cell
///
/// Frame 0 paints palette index 7 at x = 0. Every later frame is marked
/// unchanged, so its pixels come from what earlier frames left on the grid:
///
/// - frame 1 (1 wide at x = 2): same size as frame 0, content moves over
/// - frame 2 (2 wide at x = 0): size differs, the area is cleared
/// - frame 3 (2 wide at x = 2): same size as frame 2, the cleared area moves
fn moving_cell_direction(frame_count: usize) -> DirectionLayout {
    let frames = [(1, 0), (1, 2), (2, 0), (2, 2)].map(|(width, x)| FrameLayout {
        width,
        height: 1,
        x,
        y: 0,
    });
    let mut layout = DirectionLayout::new(0x2, &frames[..frame_count], &identity_palette());

    // Stack [7], then one bit picking slot 0
    layout.pixel_codes.write_bits(7, 4).write_bits(0, 4).write_bits(0, 1);
    for _ in 1..frame_count {
        layout.equal_cells.write_bits(1, 1);
    }
    layout
}

#[test]
fn test_unchanged_cell_follows_the_frame() {
    let direction = Direction::decode(&moving_cell_direction(2).encode(), 0, 2).unwrap();
    assert_eq!(
        direction.bounds,
        Rect {
            left: 0,
            top: 0,
            width: 3,
            height: 1
        }
    );
    assert_eq!(direction.frame_image(0).unwrap().pixels, &[7, 0, 0]);
    assert_eq!(direction.frame_image(1).unwrap().pixels, &[0, 0, 7]);
}

#[test]
fn test_resized_unchanged_cell_is_cleared() {
    let direction = Direction::decode(&moving_cell_direction(4).encode(), 0, 4).unwrap();
    assert_eq!(direction.bounds.width, 4);
    assert_eq!(direction.stream_sizes.equal_cells, 3);

    let images: Vec<&[u8]> = (0..4)
        .map(|index| direction.frame_image(index).unwrap().pixels)
        .collect();
    assert_eq!(images[0], &[7, 0, 0, 0]);
    assert_eq!(images[1], &[0, 0, 7, 0]);
    // Frame 2's cell changed size, so nothing is carried into it
    assert_eq!(images[2], &[0, 0, 0, 0]);
    // Frame 3 copies the cleared area over the 7 that frame 1 left at x = 2
    assert_eq!(images[3], &[0, 0, 0, 0]);
}

#[test]
fn test_pixel_mask_and_raw_codes() {
    let mut layout = DirectionLayout::new(0x3, &two_frames(), &identity_palette());

    // Frame 1 replaces stack slot 1 with a raw code
    layout.equal_cells.write_bits(0, 1);
    layout.pixel_mask.write_bits(0b0010, 4);
    layout.encoding_type.write_bits(0, 1).write_bits(1, 1);
    layout.raw_pixels.write_bits(9, 8);

    layout.pixel_codes.write_bits(5, 4).write_bits(0, 4);
    layout.pixel_codes.write_bits(0xFFFF, 16);
    for i in 0..16 {
        layout.pixel_codes.write_bits(i % 4, 2);
    }

    let direction = Direction::decode(&layout.encode(), 0, 2).unwrap();

    let first = direction.frame_image(0).unwrap();
    assert!(first.pixels.iter().all(|&p| p == 0));

    let second = direction.frame_image(1).unwrap();
    let stack = [5u8, 9, 0, 0];
    for (i, &pixel) in second.pixels.iter().enumerate() {
        assert_eq!(pixel, stack[i % 4], "pixel {i}");
    }
}

#[test]
fn test_unconsumed_stream_is_corrupt() {
    let mut layout = single_frame_direction();
    layout.pixel_mask.write_bits(0b101, 3);
    assert!(matches!(
        Direction::decode(&layout.encode(), 0, 1),
        Err(MpqError::CorruptStream(_))
    ));
}

#[test]
fn test_optional_data_is_unsupported() {
    let mut layout = single_frame_direction();
    layout.optional_bits = 1;
    assert!(matches!(
        Direction::decode(&layout.encode(), 0, 1),
        Err(MpqError::UnsupportedFeature(_))
    ));
}

#[test]
fn test_empty_direction_box() {
    let frame = FrameLayout {
        width: 0,
        height: 4,
        x: 0,
        y: 3,
    };
    let layout = DirectionLayout::new(0, &[frame], &[1]);
    assert!(matches!(
        Direction::decode(&layout.encode(), 0, 1),
        Err(MpqError::CorruptStream(_))
    ));

    let data = dcc_file(0, &[single_frame_direction().encode()]);
    assert!(matches!(
        DccFile::parse(&data).unwrap().direction(0),
        Err(MpqError::CorruptStream(_))
    ));
}

#[test]
fn test_truncated_direction() {
    let data = single_frame_direction().encode();
    assert!(matches!(
        Direction::decode(&data[..data.len() - 2], 0, 1),
        Err(MpqError::InsufficientData { .. })
    ));
}

#[test]
fn test_direction_order_tables() {
    for count in [4, 8, 16, 32] {
        let mut seen: Vec<usize> = (0..count as u8)
            .map(|dir| direction_index(count, dir).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..count).collect::<Vec<_>>());
    }
}
