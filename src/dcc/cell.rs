//! Cell grids
//!
//! A direction's bounding box is cut into 4x4 pixel cells, with the last
//! column and row taking whatever width is left. Each frame is cut along
//! the same grid lines, so its first column and row may be narrower than
//! four pixels when the frame does not start on a grid line.

use super::Rect;

/// Grid spacing in pixels
pub const CELL_SIZE: i32 = 4;

/// One cell, positioned relative to the direction box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Left edge relative to the direction box
    pub x_offset: i32,
    /// Top edge relative to the direction box
    pub y_offset: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

/// A cell of the direction grid, remembering where its content was last
/// written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionCell {
    /// Position and size on the grid
    pub cell: Cell,
    /// Geometry of the frame cell last drawn over this grid cell
    pub last: Option<Cell>,
}

/// Palette stack decoded for one frame cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBufferEntry {
    /// Up to four palette indices used by the cell
    pub value: [u8; 4],
    /// Frame the entry was decoded for
    pub frame: usize,
    /// Index of the cell within that frame's grid
    pub frame_cell_index: usize,
}

/// Horizontal and vertical cell counts of the direction grid
pub fn direction_cell_counts(bounds: &Rect) -> (usize, usize) {
    (
        (1 + (bounds.width - 1) / CELL_SIZE) as usize,
        (1 + (bounds.height - 1) / CELL_SIZE) as usize,
    )
}

/// Split `extent` pixels into grid cell sizes, full cells first
fn direction_sizes(extent: i32, count: usize) -> Vec<i32> {
    let mut sizes = vec![CELL_SIZE; count];
    if let Some(last) = sizes.last_mut() {
        *last = extent - CELL_SIZE * (count as i32 - 1);
    }
    sizes
}

/// Cells covering the whole direction box, row by row
pub fn direction_cells(bounds: &Rect) -> Vec<DirectionCell> {
    let (h_count, v_count) = direction_cell_counts(bounds);
    let widths = direction_sizes(bounds.width, h_count);
    let heights = direction_sizes(bounds.height, v_count);

    let mut cells = Vec::with_capacity(h_count * v_count);
    for (y, &height) in heights.iter().enumerate() {
        for (x, &width) in widths.iter().enumerate() {
            cells.push(DirectionCell {
                cell: Cell {
                    x_offset: x as i32 * CELL_SIZE,
                    y_offset: y as i32 * CELL_SIZE,
                    width,
                    height,
                },
                last: None,
            });
        }
    }
    cells
}

/// Cell sizes along one axis of a frame
///
/// `first` is the distance from the frame edge to the next grid line.
fn frame_sizes(extent: i32, first: i32) -> Vec<i32> {
    if extent - first <= 1 {
        return vec![extent];
    }

    let rest = extent - first - 1;
    let mut count = 2 + rest / CELL_SIZE;
    if rest % CELL_SIZE == 0 {
        count -= 1;
    }

    let mut sizes = vec![CELL_SIZE; count as usize];
    sizes[0] = first;
    let last = sizes.len() - 1;
    sizes[last] = extent - first - CELL_SIZE * (count - 2);
    sizes
}

/// Cell counts and cells of a frame lying inside `direction`
pub fn frame_cells(frame: &Rect, direction: &Rect) -> (usize, usize, Vec<Cell>) {
    let origin_x = frame.left - direction.left;
    let origin_y = frame.top - direction.top;

    let widths = frame_sizes(frame.width, CELL_SIZE - origin_x % CELL_SIZE);
    let heights = frame_sizes(frame.height, CELL_SIZE - origin_y % CELL_SIZE);

    let mut cells = Vec::with_capacity(widths.len() * heights.len());
    let mut y_offset = origin_y;
    for &height in &heights {
        let mut x_offset = origin_x;
        for &width in &widths {
            cells.push(Cell {
                x_offset,
                y_offset,
                width,
                height,
            });
            x_offset += width;
        }
        y_offset += height;
    }

    (widths.len(), heights.len(), cells)
}
