//! Body pass: copies the color of every body cell into the output
//!
//! The pass runs in the native domain, so the destination of a claimed cell
//! is the cell itself. With an arm boundary present, cells on the lower arm
//! side are treated like background and left to the arm and hand passes.

use crate::classify::ArmBoundary;
use crate::error::{CompositeError, Result};
use crate::geometry::Point;
use crate::mapping::{NativeView, Sample};
use crate::segment::{flood, FillRequest, FillVisitor, TraversalStats, VisitMask, Worklists};
use crate::target::RegionWriter;

/// Counters from one body pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub traversal: TraversalStats,
    /// Output cells written
    pub written: usize,
    /// Claimed cells without a correspondence
    pub unmapped: usize,
    /// Claimed cells whose correspondence left the color image
    pub out_of_bounds: usize,
}

/// Walks the body mask with the configured traversal and copies pixels
#[derive(Debug, Default)]
pub struct SegmentationEngine {
    lists: Worklists,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one body pass. `visits` is this pass's working copy of the
    /// native presence grid; it is consumed (claimed cells become background).
    pub fn run(
        &mut self,
        request: &FillRequest,
        view: &NativeView<'_>,
        visits: &mut [u8],
        boundary: Option<&ArmBoundary>,
        writer: RegionWriter<'_>,
        alpha: u8,
    ) -> Result<SegmentStats> {
        let dims = view.dims();
        // Destinations are native indices; matching sizes make them valid
        // output indices for the unchecked writes below.
        if writer.dims() != dims {
            return Err(CompositeError::DimensionMismatch {
                what: "output buffer",
                expected: dims.len(),
                actual: writer.dims().len(),
            });
        }
        if visits.len() != dims.len() {
            return Err(CompositeError::DimensionMismatch {
                what: "visit mask",
                expected: dims.len(),
                actual: visits.len(),
            });
        }

        self.lists.prepare(request.strategy, dims.len());
        let mut mask = VisitMask::new(visits, dims);
        let mut visitor = BodyVisitor {
            view,
            boundary: boundary.copied(),
            writer,
            alpha,
            written: 0,
            unmapped: 0,
            out_of_bounds: 0,
        };
        let traversal = flood(request, &mut mask, &mut self.lists, &mut visitor)?;
        Ok(SegmentStats {
            traversal,
            written: visitor.written,
            unmapped: visitor.unmapped,
            out_of_bounds: visitor.out_of_bounds,
        })
    }
}

struct BodyVisitor<'v, 'a, 't> {
    view: &'v NativeView<'a>,
    boundary: Option<ArmBoundary>,
    writer: RegionWriter<'t>,
    alpha: u8,
    written: usize,
    unmapped: usize,
    out_of_bounds: usize,
}

impl FillVisitor for BodyVisitor<'_, '_, '_> {
    #[inline]
    fn accepts(&self, x: usize, y: usize) -> bool {
        match &self.boundary {
            Some(b) => b.is_rest_of_body(Point::new(x as f32, y as f32)),
            None => true,
        }
    }

    #[inline]
    fn visit(&mut self, _x: usize, _y: usize, idx: usize) {
        self.writer.note_mark(idx);
        match self.view.sample(idx) {
            Sample::Color(src) => {
                // Safety: idx comes from the traversal over the native grid,
                // and `run` checked the output has the native dimensions.
                unsafe { self.writer.composite_unchecked(idx, src, self.alpha) };
                self.written += 1;
            },
            Sample::Unmapped => self.unmapped += 1,
            Sample::OutOfBounds => self.out_of_bounds += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ArmRegion;
    use crate::frame::{BodyMask, Dimensions, Grid, BACKGROUND};
    use crate::mapping::{Correspondence, Direction, SensorFrame};
    use crate::segment::{Connectivity, TraversalStrategy};
    use crate::target::SharedTarget;

    /// Depth 6x6, color 12x12, color = 2 * depth
    fn frame_parts() -> (BodyMask, Grid<u32>, Correspondence) {
        let depth = Dimensions::new(6, 6);
        let color_dims = Dimensions::new(12, 12);
        let mut mask = BodyMask::background(depth);
        mask.fill_rect(1, 1, 4, 4, 0);
        let color = Grid::from_vec(
            color_dims,
            (0..color_dims.len() as u32).map(|i| 0xFF00_0000 | i).collect(),
        )
        .unwrap();
        let mut points: Vec<Point> = (0..depth.len())
            .map(|i| {
                let (x, y) = depth.coords(i);
                Point::new(2.0 * x as f32, 2.0 * y as f32)
            })
            .collect();
        points[depth.index(2, 2)] = Correspondence::unmapped();
        let map = Correspondence::new(Direction::DepthToColor, depth, color_dims, points).unwrap();
        (mask, color, map)
    }

    fn run_pass(strategy: TraversalStrategy, boundary: Option<&ArmBoundary>) -> (Vec<u32>, SegmentStats) {
        let (mask, color, map) = frame_parts();
        let frame = SensorFrame::new(&mask, &color, &map);
        let view = NativeView::low_res(&frame);
        let mut output = Grid::new(mask.dims(), 0u32);
        let mut visits = mask.as_slice().to_vec();
        let request = FillRequest::new(strategy, Connectivity::Four).with_seed(Some((1, 1)));
        let stats = {
            let target = SharedTarget::new(&mut output, None);
            SegmentationEngine::new()
                .run(&request, &view, &mut visits, boundary, target.writer(ArmRegion::Body), 0x80)
                .unwrap()
        };
        assert!(visits.iter().all(|&v| v == BACKGROUND) || boundary.is_some());
        (output.into_vec(), stats)
    }

    #[test]
    fn test_copies_mapped_color_with_alpha() {
        let (out, stats) = run_pass(TraversalStrategy::Scanline, None);
        let depth = Dimensions::new(6, 6);
        // (3, 1) maps to color (6, 2) = index 30
        assert_eq!(out[depth.index(3, 1)], 0x8000_0000 | 30);
        assert_eq!(out[depth.index(2, 2)], 0, "unmapped cell stays unwritten");
        assert_eq!(out[depth.index(0, 0)], 0);
        assert_eq!(stats.written, 15);
        assert_eq!(stats.unmapped, 1);
        assert_eq!(stats.traversal.claimed, 16);
    }

    #[test]
    fn test_all_strategies_same_output() {
        let (baseline, _) = run_pass(TraversalStrategy::Sequential, None);
        for strategy in TraversalStrategy::ALL {
            assert_eq!(run_pass(strategy, None).0, baseline, "{:?}", strategy);
        }
    }

    #[test]
    fn test_lower_arm_side_is_left_alone() {
        // boundary line x + y = 3
        let boundary = ArmBoundary::new(
            Point::new(3.0, -10.0),
            Point::new(3.0, 0.0),
            Point::new(3.0 + 10.0, 0.0),
        );
        for strategy in TraversalStrategy::ALL {
            let (out, _) = run_pass(strategy, Some(&boundary));
            let depth = Dimensions::new(6, 6);
            for y in 1..5 {
                for x in 1..5 {
                    let written = out[depth.index(x, y)] != 0;
                    let body = boundary.is_rest_of_body(Point::new(x as f32, y as f32));
                    if (x, y) != (2, 2) {
                        assert_eq!(written, body, "{:?} at ({}, {})", strategy, x, y);
                    }
                }
            }
        }
    }

    #[test]
    fn test_mismatched_output_is_rejected() {
        let (mask, color, map) = frame_parts();
        let frame = SensorFrame::new(&mask, &color, &map);
        let view = NativeView::low_res(&frame);
        let mut output = Grid::new(Dimensions::new(3, 3), 0u32);
        let mut visits = mask.as_slice().to_vec();
        let target = SharedTarget::new(&mut output, None);
        let request = FillRequest::new(TraversalStrategy::Sequential, Connectivity::Four);
        let err = SegmentationEngine::new().run(
            &request,
            &view,
            &mut visits,
            None,
            target.writer(ArmRegion::Body),
            0xFF,
        );
        assert!(matches!(err, Err(CompositeError::DimensionMismatch { .. })));
    }
}
