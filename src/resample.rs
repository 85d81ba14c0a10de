//! Forearm resampling along a new arm direction
//!
//! The original forearm runs from the elbow along `v_ew`. A new arm vector
//! `v_new` is derived from the touch point, and both vectors are walked in
//! lockstep with `N` samples: the color found at the i-th original sample
//! is written at the i-th new sample. From every centerline sample the pass
//! also sweeps outwards along the left and right normals of both vectors,
//! which turns the line into a band as wide as the forearm.
//!
//! The pass only reads source cells; it never marks anything visited.

use serde::{Deserialize, Serialize};

use crate::classify::ArmBoundary;
use crate::frame::{bgra, is_body};
use crate::geometry::Point;
use crate::mapping::{NativeView, Sample};
use crate::skeleton::ArmJoints;
use crate::target::RegionWriter;

/// Samples per pixel of arm length; above 2 so a rasterised line has no gaps
pub const OVERSAMPLING: f32 = 2.2;

const CENTERLINE_MARKER: u32 = bgra(255, 0, 0, 255);
const LEFT_MARKER: u32 = bgra(0, 255, 0, 255);
const RIGHT_MARKER: u32 = bgra(0, 0, 255, 255);

/// How the new arm vector relates to the touch point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmTransform {
    /// Point the forearm at the touch point and stretch it to reach
    #[default]
    Extend,
    /// Point the forearm at the touch point, keep its length
    Rotate,
    /// Keep the forearm's direction, stretch it to the touch distance
    Scale,
}

/// Sample count for a pair of arm lengths
#[inline]
pub fn sample_count(l_old: f32, l_new: f32) -> usize {
    (OVERSAMPLING * l_old.max(l_new)).ceil().max(1.0) as usize
}

/// Per-frame geometry of the arm remap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmRemap {
    pub elbow: Point,
    pub wrist: Point,
    /// Unit elbow-to-wrist direction
    pub u_old: Point,
    /// Unit direction of the new arm
    pub u_new: Point,
    pub l_old: f32,
    pub l_new: f32,
    pub samples: usize,
}

impl ArmRemap {
    pub fn new(arm: &ArmJoints, touch: Point, transform: ArmTransform) -> Self {
        let v_ew = arm.wrist - arm.elbow;
        let offset = arm.hand_tip - arm.wrist;
        let v_target = (touch - offset) - arm.elbow;
        let l_old = v_ew.length();
        let (u_new, l_new) = match transform {
            ArmTransform::Extend => (v_target.normalize(), v_target.length()),
            ArmTransform::Rotate => (v_target.normalize(), l_old),
            ArmTransform::Scale => (v_ew.normalize(), v_target.length()),
        };
        Self {
            elbow: arm.elbow,
            wrist: arm.wrist,
            u_old: v_ew.normalize(),
            u_new,
            l_old,
            l_new,
            samples: sample_count(l_old, l_new),
        }
    }

    /// Override the sample count
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples.max(1);
        self
    }

    pub fn v_new(&self) -> Point {
        self.u_new * self.l_new
    }

    /// Where the wrist ends up
    pub fn new_wrist(&self) -> Point {
        self.elbow + self.v_new()
    }

    /// Offset that carries the hand along with the moved wrist; equals
    /// `Touch - HandTip` for `ArmTransform::Extend`
    pub fn hand_translation(&self) -> Point {
        self.new_wrist() - self.wrist
    }

    /// i-th pair of (original, new) centerline samples
    #[inline]
    pub fn sample(&self, i: usize) -> (Point, Point) {
        let t = i as f32 / self.samples as f32;
        (
            self.elbow + self.u_old * (t * self.l_old),
            self.elbow + self.u_new * (t * self.l_new),
        )
    }

    /// All centerline sample pairs, elbow first
    pub fn centerline(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        (0..self.samples).map(move |i| self.sample(i))
    }
}

/// Counters from one resampling pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmStats {
    pub samples: usize,
    pub l_old: f32,
    pub l_new: f32,
    pub centerline_written: usize,
    pub sweep_written: usize,
    pub unmapped: usize,
    pub out_of_bounds: usize,
}

/// Writes the forearm band along the remapped arm
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmExtensionResampler {
    /// Paint solid markers instead of resampled color
    pub debug_markers: bool,
}

#[derive(Clone, Copy)]
enum Stroke {
    Centerline,
    Sweep,
}

impl ArmExtensionResampler {
    pub fn new(debug_markers: bool) -> Self {
        Self { debug_markers }
    }

    pub fn run(
        &self,
        remap: &ArmRemap,
        boundary: &ArmBoundary,
        view: &NativeView<'_>,
        writer: RegionWriter<'_>,
        alpha: u8,
    ) -> ArmStats {
        let mut pass = Pass {
            view,
            writer,
            alpha,
            debug_markers: self.debug_markers,
            stats: ArmStats {
                samples: remap.samples,
                l_old: remap.l_old,
                l_new: remap.l_new,
                ..ArmStats::default()
            },
        };

        let sides = [
            (remap.u_old.left_normal(), remap.u_new.left_normal(), LEFT_MARKER),
            (remap.u_old.right_normal(), remap.u_new.right_normal(), RIGHT_MARKER),
        ];
        // A sweep walks at least one cell per step, so it leaves the grid
        // after this many steps at the latest
        let max_steps = view.dims().width + view.dims().height;
        let can_sweep = remap.u_old != Point::ZERO;

        for (p_old, p_new) in remap.centerline() {
            pass.copy(p_old, p_new, CENTERLINE_MARKER, Stroke::Centerline);
            if !can_sweep {
                continue;
            }
            for &(n_old, n_new, marker) in &sides {
                for k in 1..=max_steps {
                    let step = k as f32;
                    let q_old = p_old + n_old * step;
                    let Some(src) = view.dims().index_at(q_old) else {
                        break;
                    };
                    if boundary.is_rest_of_body(q_old) || !is_body(view.body_at(src)) {
                        break;
                    }
                    pass.copy(q_old, p_new + n_new * step, marker, Stroke::Sweep);
                }
            }
        }
        pass.stats
    }
}

struct Pass<'v, 'a, 't> {
    view: &'v NativeView<'a>,
    writer: RegionWriter<'t>,
    alpha: u8,
    debug_markers: bool,
    stats: ArmStats,
}

impl Pass<'_, '_, '_> {
    #[inline]
    fn copy(&mut self, from: Point, to: Point, marker: u32, stroke: Stroke) {
        let color = if self.debug_markers {
            marker
        } else {
            match self.view.sample_at(from) {
                Sample::Color(c) => c,
                Sample::Unmapped => {
                    self.stats.unmapped += 1;
                    return;
                },
                Sample::OutOfBounds => {
                    self.stats.out_of_bounds += 1;
                    return;
                },
            }
        };
        let Some(dst) = self.writer.dims().index_at(to) else {
            self.stats.out_of_bounds += 1;
            return;
        };
        self.writer.composite(dst, color, self.alpha);
        match stroke {
            Stroke::Centerline => self.stats.centerline_written += 1,
            Stroke::Sweep => self.stats.sweep_written += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ArmRegion;
    use crate::frame::{BodyMask, Dimensions, Grid};
    use crate::mapping::{Correspondence, Direction, SensorFrame};
    use crate::target::SharedTarget;

    fn arm() -> ArmJoints {
        ArmJoints {
            shoulder: Point::new(60.0, 60.0),
            elbow: Point::new(100.0, 100.0),
            wrist: Point::new(150.0, 100.0),
            hand: Point::new(155.0, 100.0),
            hand_tip: Point::new(160.0, 100.0),
        }
    }

    #[test]
    fn test_extend_targets_touch_minus_offset() {
        let remap = ArmRemap::new(&arm(), Point::new(200.0, 150.0), ArmTransform::Extend);
        // v_new = (200 - 10, 150 - 0) - (100, 100) = (90, 50)
        let v_new = remap.v_new();
        assert!((v_new.x - 90.0).abs() < 1e-3 && (v_new.y - 50.0).abs() < 1e-3);
        assert_eq!(remap.l_old, 50.0);
        let l_new = (90.0f32 * 90.0 + 50.0 * 50.0).sqrt();
        assert_eq!(remap.samples, (2.2 * l_new).ceil() as usize);
        // hand follows the tip onto the touch point
        let t = remap.hand_translation();
        assert!((t.x - 40.0).abs() < 1e-3 && (t.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_rotate_keeps_length_scale_keeps_direction() {
        let touch = Point::new(200.0, 150.0);
        let rotate = ArmRemap::new(&arm(), touch, ArmTransform::Rotate);
        assert!((rotate.l_new - 50.0).abs() < 1e-4);
        assert!((rotate.u_new.length() - 1.0).abs() < 1e-5);

        let scale = ArmRemap::new(&arm(), touch, ArmTransform::Scale);
        assert_eq!(scale.u_new, Point::new(1.0, 0.0));
        assert!(scale.l_new > scale.l_old);
    }

    #[test]
    fn test_centerline_has_no_gaps() {
        for touch in [
            Point::new(200.0, 150.0),
            Point::new(20.0, 300.0),
            Point::new(400.0, 90.0),
            Point::new(110.0, 100.0),
        ] {
            let remap = ArmRemap::new(&arm(), touch, ArmTransform::Extend);
            let cells: Vec<(i64, i64)> = remap
                .centerline()
                .map(|(_, p)| ((p.x + 0.5).floor() as i64, (p.y + 0.5).floor() as i64))
                .collect();
            for w in cells.windows(2) {
                let gap = (w[1].0 - w[0].0).abs().max((w[1].1 - w[0].1).abs());
                assert!(gap <= 1, "gap {} for touch {:?}", gap, touch);
            }
        }
    }

    #[test]
    fn test_more_samples_shrink_step() {
        let remap = ArmRemap::new(&arm(), Point::new(200.0, 150.0), ArmTransform::Extend);
        let step = |n: usize| {
            let r = remap.with_samples(n);
            r.sample(1).1.distance_to(r.sample(0).1)
        };
        let mut last = f32::INFINITY;
        for n in [10, 20, 40, 80, remap.samples] {
            let s = step(n);
            assert!(s < last);
            last = s;
        }
        assert!(step(remap.samples) <= 1.0 / OVERSAMPLING + 1e-4);
    }

    /// Horizontal forearm 5 cells thick on a 64x32 grid, identity mapping
    fn band_frame() -> (BodyMask, Grid<u32>, Correspondence) {
        let dims = Dimensions::new(64, 32);
        let mut mask = BodyMask::background(dims);
        mask.fill_rect(10, 8, 20, 5, 0);
        let color = Grid::new(dims, 0xFF12_3456u32);
        let points = (0..dims.len())
            .map(|i| {
                let (x, y) = dims.coords(i);
                Point::new(x as f32, y as f32)
            })
            .collect();
        let map = Correspondence::new(Direction::DepthToColor, dims, dims, points).unwrap();
        (mask, color, map)
    }

    #[test]
    fn test_band_follows_new_direction() {
        let (mask, color, map) = band_frame();
        let frame = SensorFrame::new(&mask, &color, &map);
        let view = NativeView::low_res(&frame);
        let joints = ArmJoints {
            shoulder: Point::new(0.0, 0.0),
            elbow: Point::new(10.0, 10.0),
            wrist: Point::new(30.0, 10.0),
            hand: Point::new(31.0, 10.0),
            hand_tip: Point::new(32.0, 10.0),
        };
        let boundary = ArmBoundary::from_joints(&joints);
        // straight down: touch - offset = (10, 30)
        let remap = ArmRemap::new(&joints, Point::new(12.0, 30.0), ArmTransform::Extend);
        let mut output = Grid::new(mask.dims(), 0u32);
        let stats = {
            let target = SharedTarget::new(&mut output, None);
            ArmExtensionResampler::new(false).run(
                &remap,
                &boundary,
                &view,
                target.writer(ArmRegion::Forearm),
                0xFF,
            )
        };
        assert!(stats.centerline_written > 0);
        assert!(stats.sweep_written > 0);
        let dims = mask.dims();
        // new arm runs down column 10; the band widens it sideways
        assert_eq!(output.as_slice()[dims.index(10, 25)], 0xFF12_3456);
        assert_eq!(output.as_slice()[dims.index(11, 25)], 0xFF12_3456);
        // nothing written along the old arm beyond the elbow
        assert_eq!(output.as_slice()[dims.index(25, 10)], 0);
    }

    #[test]
    fn test_debug_markers_replace_color() {
        let (mask, color, map) = band_frame();
        let frame = SensorFrame::new(&mask, &color, &map);
        let view = NativeView::low_res(&frame);
        let joints = ArmJoints {
            shoulder: Point::new(0.0, 0.0),
            elbow: Point::new(10.0, 10.0),
            wrist: Point::new(30.0, 10.0),
            hand: Point::new(31.0, 10.0),
            hand_tip: Point::new(32.0, 10.0),
        };
        let boundary = ArmBoundary::from_joints(&joints);
        let remap = ArmRemap::new(&joints, Point::new(32.0, 10.0), ArmTransform::Extend);
        let mut output = Grid::new(mask.dims(), 0u32);
        {
            let target = SharedTarget::new(&mut output, None);
            ArmExtensionResampler::new(true).run(
                &remap,
                &boundary,
                &view,
                target.writer(ArmRegion::Forearm),
                0xFF,
            );
        }
        let dims = mask.dims();
        assert_eq!(output.as_slice()[dims.index(20, 10)], CENTERLINE_MARKER);
    }
}
