//! Hand pass: flood fill from the hand joint across the hand region,
//! translating every claimed pixel by a fixed offset.
//!
//! The hand region is the part of the lower-arm half-plane that lies
//! beyond the wrist along the elbow-to-wrist direction. Claimed cells are
//! marked in this pass's own working mask, never in the body pass's.

use crate::classify::{ArmBoundary, ArmRegion};
use crate::error::Result;
use crate::frame::Dimensions;
use crate::geometry::Point;
use crate::mapping::{NativeView, Sample};
use crate::segment::{flood, FillRequest, FillVisitor, TraversalStats, VisitMask, Worklists};
use crate::target::RegionWriter;

/// Counters from one hand pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandStats {
    pub traversal: TraversalStats,
    /// Offset applied to every hand pixel
    pub translation: Point,
    pub written: usize,
    pub unmapped: usize,
    /// Source lookups or translated destinations that left their grid
    pub out_of_bounds: usize,
}

/// Moves the hand region onto the touch point
#[derive(Debug, Default)]
pub struct HandRegionCompositor {
    lists: Worklists,
}

impl HandRegionCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one hand pass. The request's seed should be the hand joint's
    /// cell; `visits` is this pass's working copy of native presence.
    ///
    /// Only the seed's component is filled. Without a seed nothing is
    /// written.
    pub fn run(
        &mut self,
        request: &FillRequest,
        view: &NativeView<'_>,
        visits: &mut [u8],
        boundary: &ArmBoundary,
        translation: Point,
        writer: RegionWriter<'_>,
        alpha: u8,
    ) -> Result<HandStats> {
        let request = request.seed_component_only();
        if request.seed.is_none() {
            return Ok(HandStats {
                translation,
                ..HandStats::default()
            });
        }
        let dims = view.dims();
        self.lists.prepare(request.strategy, dims.len());
        let mut mask = VisitMask::new(visits, dims);
        let mut visitor = HandVisitor {
            view,
            boundary,
            translation,
            out_dims: writer.dims(),
            writer,
            alpha,
            written: 0,
            unmapped: 0,
            out_of_bounds: 0,
        };
        let traversal = flood(&request, &mut mask, &mut self.lists, &mut visitor)?;
        Ok(HandStats {
            traversal,
            translation,
            written: visitor.written,
            unmapped: visitor.unmapped,
            out_of_bounds: visitor.out_of_bounds,
        })
    }
}

struct HandVisitor<'v, 'a, 't> {
    view: &'v NativeView<'a>,
    boundary: &'v ArmBoundary,
    translation: Point,
    out_dims: Dimensions,
    writer: RegionWriter<'t>,
    alpha: u8,
    written: usize,
    unmapped: usize,
    out_of_bounds: usize,
}

impl FillVisitor for HandVisitor<'_, '_, '_> {
    #[inline]
    fn accepts(&self, x: usize, y: usize) -> bool {
        self.boundary.classify_cell(x, y) == ArmRegion::Hand
    }

    fn visit(&mut self, x: usize, y: usize, idx: usize) {
        self.writer.note_mark(idx);
        let src = match self.view.sample(idx) {
            Sample::Color(src) => src,
            Sample::Unmapped => {
                self.unmapped += 1;
                return;
            },
            Sample::OutOfBounds => {
                self.out_of_bounds += 1;
                return;
            },
        };
        let moved = Point::new(x as f32, y as f32) + self.translation;
        match self.out_dims.index_at(moved) {
            Some(dst) => {
                self.writer.composite(dst, src, self.alpha);
                self.written += 1;
            },
            None => self.out_of_bounds += 1,
        }
    }
}
