//! Depth/color coordinate correspondences and the per-frame native view
//!
//! The sensor supplies, every frame, a table mapping each pixel of one
//! resolution domain to a floating point coordinate in the other. The
//! compositor works in one "native" domain per frame and reaches the other
//! through this table. Unmapped entries carry a non-finite coordinate and
//! must be rejected before any index is formed.

use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, Result};
use crate::frame::{BodyMask, ColorImage, Dimensions, BACKGROUND};
use crate::geometry::Point;

/// Which domain the compositor runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Native domain is depth space; output is depth sized
    #[default]
    LowRes,
    /// Native domain is color space; output is color sized
    Hd,
}

impl Resolution {
    pub fn name(self) -> &'static str {
        match self {
            Resolution::LowRes => "low-res",
            Resolution::Hd => "hd",
        }
    }

    /// Direction of the correspondence table this domain consumes
    pub fn required_direction(self) -> Direction {
        match self {
            Resolution::LowRes => Direction::DepthToColor,
            Resolution::Hd => Direction::ColorToDepth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    DepthToColor,
    ColorToDepth,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::DepthToColor => "depth to color",
            Direction::ColorToDepth => "color to depth",
        }
    }
}

/// Outcome of resolving one correspondence entry to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Cell(usize),
    Unmapped,
    OutOfBounds,
}

/// Per-frame correspondence table, one entry per source-domain pixel
#[derive(Debug, Clone)]
pub struct Correspondence {
    direction: Direction,
    source: Dimensions,
    target: Dimensions,
    points: Vec<Point>,
}

impl Correspondence {
    pub fn new(
        direction: Direction,
        source: Dimensions,
        target: Dimensions,
        points: Vec<Point>,
    ) -> Result<Self> {
        if points.len() != source.len() {
            return Err(CompositeError::DimensionMismatch {
                what: "correspondence",
                expected: source.len(),
                actual: points.len(),
            });
        }
        Ok(Self {
            direction,
            source,
            target,
            points,
        })
    }

    /// Marker value for "no correspondence"
    pub const fn unmapped() -> Point {
        Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn source(&self) -> Dimensions {
        self.source
    }

    pub fn target(&self) -> Dimensions {
        self.target
    }

    /// Refresh the table in place for a new frame
    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    /// Coordinate in the other domain, `None` if unmapped or `idx` is not
    /// a source pixel
    #[inline]
    pub fn map_to_other_domain(&self, idx: usize) -> Option<Point> {
        self.points.get(idx).copied().filter(|p| p.is_finite())
    }

    /// Cell index in the other domain for a source pixel
    #[inline]
    pub fn lookup(&self, idx: usize) -> Lookup {
        match self.map_to_other_domain(idx) {
            None => Lookup::Unmapped,
            Some(p) => match self.target.index_at(p) {
                Some(cell) => Lookup::Cell(cell),
                None => Lookup::OutOfBounds,
            },
        }
    }
}

/// One frame of sensor input
#[derive(Debug, Clone, Copy)]
pub struct SensorFrame<'a> {
    /// Depth-space body index image
    pub body_mask: &'a BodyMask,
    /// Color-space BGRA image
    pub color: &'a ColorImage,
    /// Depth to color for `LowRes`, color to depth for `Hd`
    pub correspondence: &'a Correspondence,
}

impl<'a> SensorFrame<'a> {
    pub fn new(
        body_mask: &'a BodyMask,
        color: &'a ColorImage,
        correspondence: &'a Correspondence,
    ) -> Self {
        Self {
            body_mask,
            color,
            correspondence,
        }
    }

    /// Native domain size for the given resolution
    pub fn native_dims(&self, resolution: Resolution) -> Dimensions {
        match resolution {
            Resolution::LowRes => self.body_mask.dims(),
            Resolution::Hd => self.color.dims(),
        }
    }

    /// Check that the correspondence table fits the frame and resolution
    pub fn validate(&self, resolution: Resolution) -> Result<()> {
        let expected = resolution.required_direction();
        let map = self.correspondence;
        if map.direction() != expected {
            return Err(CompositeError::CorrespondenceDomain {
                resolution: resolution.name(),
                expected: expected.name(),
                actual: map.direction().name(),
            });
        }
        let (source, target) = match expected {
            Direction::DepthToColor => (self.body_mask.dims(), self.color.dims()),
            Direction::ColorToDepth => (self.color.dims(), self.body_mask.dims()),
        };
        if map.source() != source {
            return Err(CompositeError::DimensionMismatch {
                what: "correspondence source",
                expected: source.len(),
                actual: map.source().len(),
            });
        }
        if map.target() != target {
            return Err(CompositeError::DimensionMismatch {
                what: "correspondence target",
                expected: target.len(),
                actual: map.target().len(),
            });
        }
        Ok(())
    }

    /// Resolve body presence for every color pixel (HD mode). Unmapped and
    /// out-of-range pixels become background.
    pub fn resolve_color_presence(&self, presence: &mut Vec<u8>) {
        let mask = self.body_mask.as_slice();
        let map = self.correspondence;
        presence.clear();
        presence.extend((0..self.color.dims().len()).map(|i| match map.lookup(i) {
            Lookup::Cell(d) => mask[d],
            Lookup::Unmapped | Lookup::OutOfBounds => BACKGROUND,
        }));
    }
}

/// Source color for a native cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Color(u32),
    Unmapped,
    OutOfBounds,
}

/// The frame as seen from the native domain: body presence per native cell
/// and the route to that cell's color.
#[derive(Debug, Clone, Copy)]
pub struct NativeView<'a> {
    dims: Dimensions,
    presence: &'a [u8],
    color: &'a [u32],
    route: ColorRoute<'a>,
}

#[derive(Debug, Clone, Copy)]
enum ColorRoute<'a> {
    /// Native is depth space, color sits behind the correspondence table
    Mapped(&'a Correspondence),
    /// Native is color space
    Direct,
}

impl<'a> NativeView<'a> {
    /// Depth-space view; presence is the sensor mask itself
    pub fn low_res(frame: &SensorFrame<'a>) -> Self {
        Self {
            dims: frame.body_mask.dims(),
            presence: frame.body_mask.as_slice(),
            color: frame.color.as_slice(),
            route: ColorRoute::Mapped(frame.correspondence),
        }
    }

    /// Color-space view over presence resolved by `resolve_color_presence`
    pub fn hd(frame: &SensorFrame<'a>, presence: &'a [u8]) -> Self {
        debug_assert_eq!(presence.len(), frame.color.dims().len());
        Self {
            dims: frame.color.dims(),
            presence,
            color: frame.color.as_slice(),
            route: ColorRoute::Direct,
        }
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Unvisited body presence for the whole domain
    #[inline]
    pub fn presence(&self) -> &'a [u8] {
        self.presence
    }

    /// Body id at a native cell, `BACKGROUND` outside the grid
    #[inline]
    pub fn body_at(&self, idx: usize) -> u8 {
        self.presence.get(idx).copied().unwrap_or(BACKGROUND)
    }

    /// Color of a native cell
    #[inline]
    pub fn sample(&self, idx: usize) -> Sample {
        match self.route {
            ColorRoute::Direct => match self.color.get(idx) {
                Some(&c) => Sample::Color(c),
                None => Sample::OutOfBounds,
            },
            ColorRoute::Mapped(map) => match map.lookup(idx) {
                Lookup::Cell(c) => Sample::Color(self.color[c]),
                Lookup::Unmapped => Sample::Unmapped,
                Lookup::OutOfBounds => Sample::OutOfBounds,
            },
        }
    }

    /// Color at a continuous native point
    #[inline]
    pub fn sample_at(&self, p: Point) -> Sample {
        match self.dims.index_at(p) {
            Some(idx) => self.sample(idx),
            None => Sample::OutOfBounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Grid;

    fn identity_map(dims: Dimensions) -> Vec<Point> {
        (0..dims.len())
            .map(|i| {
                let (x, y) = dims.coords(i);
                Point::new(x as f32, y as f32)
            })
            .collect()
    }

    #[test]
    fn test_lookup_guards_unmapped_and_bounds() {
        let dims = Dimensions::new(3, 1);
        let points = vec![
            Point::new(0.2, 0.0),
            Correspondence::unmapped(),
            Point::new(7.0, 0.0),
        ];
        let map = Correspondence::new(Direction::DepthToColor, dims, dims, points).unwrap();
        assert_eq!(map.lookup(0), Lookup::Cell(0));
        assert_eq!(map.lookup(1), Lookup::Unmapped);
        assert_eq!(map.lookup(2), Lookup::OutOfBounds);
        assert_eq!(map.lookup(3), Lookup::Unmapped);
    }

    #[test]
    fn test_nan_is_unmapped() {
        let dims = Dimensions::new(1, 1);
        let map = Correspondence::new(
            Direction::DepthToColor,
            dims,
            dims,
            vec![Point::new(f32::NAN, 0.0)],
        )
        .unwrap();
        assert_eq!(map.map_to_other_domain(0), None);
    }

    #[test]
    fn test_validate_rejects_wrong_direction() {
        let dims = Dimensions::new(2, 2);
        let mask = BodyMask::background(dims);
        let color = Grid::new(dims, 0u32);
        let map = Correspondence::new(Direction::ColorToDepth, dims, dims, identity_map(dims))
            .unwrap();
        let frame = SensorFrame::new(&mask, &color, &map);
        assert!(frame.validate(Resolution::Hd).is_ok());
        assert!(matches!(
            frame.validate(Resolution::LowRes),
            Err(CompositeError::CorrespondenceDomain { .. })
        ));
    }

    #[test]
    fn test_resolve_color_presence() {
        let depth = Dimensions::new(2, 1);
        let color_dims = Dimensions::new(4, 1);
        let mut mask = BodyMask::background(depth);
        mask.set(1, 0, 2);
        let color = Grid::new(color_dims, 0u32);
        // color x maps to depth x / 2, last pixel unmapped
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(0.4, 0.0),
            Point::new(1.0, 0.0),
            Correspondence::unmapped(),
        ];
        let map = Correspondence::new(Direction::ColorToDepth, color_dims, depth, points).unwrap();
        let frame = SensorFrame::new(&mask, &color, &map);
        let mut presence = Vec::new();
        frame.resolve_color_presence(&mut presence);
        assert_eq!(presence, vec![BACKGROUND, BACKGROUND, 2, BACKGROUND]);
    }

    #[test]
    fn test_native_view_samples_through_map() {
        let dims = Dimensions::new(2, 1);
        let mask = BodyMask::background(dims);
        let color = Grid::from_vec(dims, vec![0xFF00_0001, 0xFF00_0002]).unwrap();
        let points = vec![Point::new(1.0, 0.0), Correspondence::unmapped()];
        let map = Correspondence::new(Direction::DepthToColor, dims, dims, points).unwrap();
        let frame = SensorFrame::new(&mask, &color, &map);
        let view = NativeView::low_res(&frame);
        assert_eq!(view.sample(0), Sample::Color(0xFF00_0002));
        assert_eq!(view.sample(1), Sample::Unmapped);
        assert_eq!(view.sample_at(Point::new(-3.0, 0.0)), Sample::OutOfBounds);
    }
}
