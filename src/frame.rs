//! Pixel grids and the per-pixel compositing primitive
//!
//! Everything is a flat, row-major `Vec` addressed by `y * width + x`.
//! Colors are packed 32-bit BGRA: in memory the bytes are B, G, R, A, so
//! read as a little-endian `u32` the alpha channel is the top byte.

use crate::error::{CompositeError, Result};
use crate::geometry::{round_coord, Point};

/// Body mask value for "no body here" and for "already visited this pass"
pub const BACKGROUND: u8 = 0xFF;

/// Highest body id the sensor reports (ids are 0..=5)
pub const MAX_BODY_ID: u8 = 5;

const ALPHA_SHIFT: u32 = 24;
const COLOR_MASK: u32 = 0x00FF_FFFF;

/// Width and height of a resolution domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of cells
    #[inline]
    pub const fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Flat index of an in-bounds cell
    #[inline]
    pub const fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Flat index of a signed coordinate, `None` outside the grid
    #[inline]
    pub fn checked_index(&self, x: i64, y: i64) -> Option<usize> {
        if self.contains(x, y) {
            Some(self.index(x as usize, y as usize))
        } else {
            None
        }
    }

    /// Inverse of `index`
    #[inline]
    pub const fn coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }

    /// Cell containing a continuous point (round half up, bounds checked)
    #[inline]
    pub fn cell_at(&self, p: Point) -> Option<(usize, usize)> {
        let x = round_coord(p.x, self.width)?;
        let y = round_coord(p.y, self.height)?;
        Some((x, y))
    }

    /// Flat index of the cell containing a continuous point
    #[inline]
    pub fn index_at(&self, p: Point) -> Option<usize> {
        self.cell_at(p).map(|(x, y)| self.index(x, y))
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major grid of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    cells: Vec<T>,
    dims: Dimensions,
}

/// Per-cell body id, `BACKGROUND` where nobody is
pub type BodyMask = Grid<u8>;
/// Packed BGRA sensor image
pub type ColorImage = Grid<u32>;
/// Packed BGRA compositing target, the only buffer handed to presentation
pub type OutputBuffer = Grid<u32>;

impl<T: Copy> Grid<T> {
    /// Grid with every cell set to `fill`
    pub fn new(dims: Dimensions, fill: T) -> Self {
        Self {
            cells: vec![fill; dims.len()],
            dims,
        }
    }

    /// Wrap existing cells; the length must match the dimensions
    pub fn from_vec(dims: Dimensions, cells: Vec<T>) -> Result<Self> {
        if cells.len() != dims.len() {
            return Err(CompositeError::DimensionMismatch {
                what: "grid",
                expected: dims.len(),
                actual: cells.len(),
            });
        }
        Ok(Self { cells, dims })
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dims.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dims.height
    }

    /// Bounds checked read
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<T> {
        self.dims.checked_index(x, y).map(|i| self.cells[i])
    }

    /// Bounds checked write, returns false when out of bounds
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, value: T) -> bool {
        match self.dims.checked_index(x, y) {
            Some(i) => {
                self.cells[i] = value;
                true
            },
            None => false,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.cells
    }

    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }
}

impl BodyMask {
    /// Mask with no body anywhere
    pub fn background(dims: Dimensions) -> Self {
        Self::new(dims, BACKGROUND)
    }

    /// Fill an axis-aligned rectangle with a body id (clipped to the grid)
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, body: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.set(xx, yy, body);
            }
        }
    }

    /// Number of cells carrying a body id
    pub fn body_cells(&self) -> usize {
        self.cells.iter().filter(|&&v| is_body(v)).count()
    }
}

/// True for cells that carry a tracked body id
#[inline]
pub const fn is_body(value: u8) -> bool {
    value <= MAX_BODY_ID
}

/// Pack an opaque color from channels
#[inline]
pub const fn bgra(r: u8, g: u8, b: u8, a: u8) -> u32 {
    ((a as u32) << ALPHA_SHIFT) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Alpha channel of a packed pixel
#[inline]
pub const fn alpha_of(pixel: u32) -> u8 {
    (pixel >> ALPHA_SHIFT) as u8
}

/// Color of `src` with its alpha byte replaced by `alpha`
#[inline]
pub const fn with_alpha(src: u32, alpha: u8) -> u32 {
    (src & COLOR_MASK) | ((alpha as u32) << ALPHA_SHIFT)
}

/// Write the source color into the destination cell, then overwrite the
/// alpha byte with the transparency value.
#[inline]
pub fn composite_pixel(dst: &mut u32, src: u32, alpha: u8) {
    *dst = with_alpha(src, alpha);
}

/// Mark a mask cell as visited for the rest of the pass
#[inline]
pub fn mark_visited(cell: &mut u8) {
    *cell = BACKGROUND;
}

/// Alpha for the translated hand duplicate
#[inline]
pub fn scaled_alpha(alpha: u8, factor: f32) -> u8 {
    (f32::from(alpha) * factor.clamp(0.0, 1.0)) as u8
}
