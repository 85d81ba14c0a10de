//! Deterministic stand-in for the depth camera
//!
//! Produces a stick figure in a small depth image whose right forearm is
//! posed by an angle, a gradient color image at twice the depth resolution,
//! the correspondence table for either native domain, and the tracked
//! skeleton in native coordinates. Depth columns inside the border band
//! have no color correspondence, like the edges of a real sensor.

use std::f32::consts::FRAC_PI_4;

use crate::classify::ArmBoundary;
use crate::error::Result;
use crate::frame::{bgra, BodyMask, ColorImage, Dimensions, Grid, BACKGROUND};
use crate::geometry::Point;
use crate::mapping::{Correspondence, Direction, Resolution, SensorFrame};
use crate::skeleton::{JointType, Skeleton};
use crate::util::Rng;

/// Forearm angle above horizontal used by the demo and most fixtures
pub const DEFAULT_ARM_ANGLE: f32 = FRAC_PI_4;

/// Forearm angles outside this range fold the arm over the head or make
/// it collinear with the upper arm
pub const ARM_ANGLE_RANGE: (f32, f32) = (0.2, std::f32::consts::FRAC_PI_2);

/// Body id of the figure
pub const FIGURE_ID: u8 = 1;

const LIMB_RADIUS: f32 = 3.0;
const HAND_RADIUS: f32 = 4.0;
const FOREARM_LENGTH: f32 = 24.0;

/// Everything one synthetic frame consists of
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub body_mask: BodyMask,
    pub color: ColorImage,
    pub correspondence: Correspondence,
    /// Joints in native coordinates
    pub skeleton: Skeleton,
}

impl SyntheticFrame {
    pub fn sensor_frame(&self) -> SensorFrame<'_> {
        SensorFrame::new(&self.body_mask, &self.color, &self.correspondence)
    }
}

/// Sensor geometry and scene options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRig {
    pub depth: Dimensions,
    pub color: Dimensions,
    pub resolution: Resolution,
    /// Depth columns on each side without a color correspondence
    pub border: usize,
    /// Isolated single-cell body specks left of the figure
    pub speckle: usize,
    pub seed: u64,
}

impl SyntheticRig {
    pub const fn low_res() -> Self {
        Self {
            depth: Dimensions::new(160, 120),
            color: Dimensions::new(320, 240),
            resolution: Resolution::LowRes,
            border: 4,
            speckle: 0,
            seed: 1,
        }
    }

    pub const fn hd() -> Self {
        let mut rig = Self::low_res();
        rig.resolution = Resolution::Hd;
        rig
    }

    pub fn with_speckle(mut self, count: usize, seed: u64) -> Self {
        self.speckle = count;
        self.seed = seed;
        self
    }

    /// Color pixels per depth pixel
    pub fn scale(&self) -> f32 {
        self.color.width as f32 / self.depth.width as f32
    }

    pub fn native_dims(&self) -> Dimensions {
        match self.resolution {
            Resolution::LowRes => self.depth,
            Resolution::Hd => self.color,
        }
    }

    /// Depth-space point to native coordinates
    pub fn to_native(&self, p: Point) -> Point {
        match self.resolution {
            Resolution::LowRes => p,
            Resolution::Hd => p * self.scale(),
        }
    }

    /// A touch point to the right of the figure, in native coordinates
    pub fn default_touch(&self) -> Point {
        self.to_native(Point::new(140.0, 60.0))
    }

    /// Joint positions in depth space
    pub fn joints(&self, arm_angle: f32) -> Vec<(JointType, Point)> {
        let angle = arm_angle.clamp(ARM_ANGLE_RANGE.0, ARM_ANGLE_RANGE.1);
        let elbow = Point::new(94.0, 36.0);
        let dir = Point::new(angle.cos(), -angle.sin());
        let wrist = elbow + dir * FOREARM_LENGTH;
        let p = Point::new;
        vec![
            (JointType::SpineBase, p(60.0, 72.0)),
            (JointType::SpineMid, p(60.0, 52.0)),
            (JointType::Neck, p(60.0, 30.0)),
            (JointType::Head, p(60.0, 22.0)),
            (JointType::ShoulderLeft, p(50.0, 36.0)),
            (JointType::ElbowLeft, p(45.0, 52.0)),
            (JointType::WristLeft, p(45.0, 66.0)),
            (JointType::HandLeft, p(45.0, 70.0)),
            (JointType::ShoulderRight, p(70.0, 36.0)),
            (JointType::ElbowRight, elbow),
            (JointType::WristRight, wrist),
            (JointType::HandRight, wrist + dir * 6.0),
            (JointType::HipLeft, p(55.0, 76.0)),
            (JointType::KneeLeft, p(55.0, 95.0)),
            (JointType::AnkleLeft, p(55.0, 112.0)),
            (JointType::HipRight, p(65.0, 76.0)),
            (JointType::KneeRight, p(65.0, 95.0)),
            (JointType::AnkleRight, p(65.0, 112.0)),
            (JointType::SpineShoulder, p(60.0, 34.0)),
            (JointType::HandTipRight, wrist + dir * 12.0),
        ]
    }

    /// Body index image in depth space
    pub fn body_mask(&self, arm_angle: f32) -> BodyMask {
        let joints = self.joints(arm_angle);
        let at = |joint: JointType| {
            joints
                .iter()
                .find(|(j, _)| *j == joint)
                .map_or(Point::ZERO, |&(_, p)| p)
        };

        let mut mask = BodyMask::background(self.depth);
        fill_disc(&mut mask, at(JointType::Head), 8.0);
        mask.fill_rect(57, 28, 6, 6, FIGURE_ID);
        mask.fill_rect(50, 32, 20, 44, FIGURE_ID);
        for leg in [
            [JointType::HipLeft, JointType::AnkleLeft],
            [JointType::HipRight, JointType::AnkleRight],
        ] {
            fill_capsule(&mut mask, at(leg[0]), at(leg[1]) + Point::new(0.0, 2.0), LIMB_RADIUS);
        }
        let limbs = [
            (JointType::ShoulderLeft, JointType::ElbowLeft, LIMB_RADIUS),
            (JointType::ElbowLeft, JointType::HandLeft, LIMB_RADIUS),
            (JointType::ShoulderRight, JointType::ElbowRight, LIMB_RADIUS),
            (JointType::ElbowRight, JointType::WristRight, LIMB_RADIUS),
            (JointType::WristRight, JointType::HandTipRight, HAND_RADIUS),
        ];
        for (a, b, radius) in limbs {
            fill_capsule(&mut mask, at(a), at(b), radius);
        }

        if self.speckle > 0 {
            let mut rng = Rng::new(self.seed);
            for _ in 0..self.speckle {
                let x = rng.range_usize(self.border, 40);
                let y = rng.range_usize(0, self.depth.height);
                mask.set(x as i64, y as i64, FIGURE_ID);
            }
        }
        mask
    }

    /// Camera image: horizontal red ramp, vertical green ramp
    pub fn color_image(&self) -> Result<ColorImage> {
        let dims = self.color;
        let ramp = |v: usize, n: usize| (v * 255 / n.saturating_sub(1).max(1)) as u8;
        let cells = (0..dims.len())
            .map(|i| {
                let (x, y) = dims.coords(i);
                bgra(ramp(x, dims.width), ramp(y, dims.height), 0x40, 0xFF)
            })
            .collect();
        Grid::from_vec(dims, cells)
    }

    /// Depth to color for `LowRes`, color to depth for `Hd`
    pub fn correspondence(&self) -> Result<Correspondence> {
        let scale = self.scale();
        let depth = self.depth;
        let mapped_column =
            |x: f32| x >= self.border as f32 && x < (depth.width - self.border) as f32;
        let (direction, source, target) = match self.resolution {
            Resolution::LowRes => (Direction::DepthToColor, depth, self.color),
            Resolution::Hd => (Direction::ColorToDepth, self.color, depth),
        };
        let points = (0..source.len())
            .map(|i| {
                let (x, y) = source.coords(i);
                let p = Point::new(x as f32, y as f32);
                match self.resolution {
                    Resolution::LowRes if mapped_column(p.x) => p * scale,
                    Resolution::Hd if mapped_column(p.x / scale) => p * (1.0 / scale),
                    _ => Correspondence::unmapped(),
                }
            })
            .collect();
        Correspondence::new(direction, source, target, points)
    }

    pub fn skeleton(&self, arm_angle: f32) -> Skeleton {
        let mut skeleton = Skeleton::new();
        for (joint, p) in self.joints(arm_angle) {
            skeleton.set(joint, self.to_native(p));
        }
        skeleton
    }

    pub fn frame(&self, arm_angle: f32) -> Result<SyntheticFrame> {
        Ok(SyntheticFrame {
            body_mask: self.body_mask(arm_angle),
            color: self.color_image()?,
            correspondence: self.correspondence()?,
            skeleton: self.skeleton(arm_angle),
        })
    }
}

fn fill_disc(mask: &mut BodyMask, center: Point, radius: f32) {
    fill_capsule(mask, center, center, radius);
}

/// Every cell within `radius` of the segment `a`-`b`
fn fill_capsule(mask: &mut BodyMask, a: Point, b: Point, radius: f32) {
    let ab = b - a;
    let len2 = ab.dot(ab);
    let x0 = (a.x.min(b.x) - radius).floor() as i64;
    let x1 = (a.x.max(b.x) + radius).ceil() as i64;
    let y0 = (a.y.min(b.y) - radius).floor() as i64;
    let y1 = (a.y.max(b.y) + radius).ceil() as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Point::new(x as f32, y as f32);
            let t = if len2 > 0.0 {
                ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            if p.distance_to(a + ab * t) <= radius {
                mask.set(x, y, FIGURE_ID);
            }
        }
    }
}

/// True when every figure cell outside the right arm lies on the
/// rest-of-body side of the frame's arm boundary
pub fn torso_on_body_side(rig: &SyntheticRig, arm_angle: f32) -> bool {
    let skeleton = rig.skeleton(arm_angle);
    let Ok(arm) = skeleton.arm_joints() else {
        return false;
    };
    let boundary = ArmBoundary::from_joints(&arm);
    let mask = rig.body_mask(arm_angle);
    let dims = mask.dims();
    // the right arm starts at the shoulder, x = 70 in depth space
    (0..dims.len()).all(|i| {
        let (x, y) = dims.coords(i);
        mask.as_slice()[i] == BACKGROUND
            || x >= 70
            || boundary.is_rest_of_body(rig.to_native(Point::new(x as f32, y as f32)))
    })
}
