//! Half-plane split of the body into "rest of body" and "lower arm/hand"
//!
//! The boundary is a line through the elbow along
//! `v_half = (Shoulder - Elbow) + (Wrist - Elbow)`. Its normal is `v_half`
//! rotated by 90 degrees, `(-v_half.y, v_half.x)`. A point whose signed
//! value against that normal is `<= 0` belongs to the rest of the body in
//! every resolution domain; points on the line itself included.
//!
//! The lower arm side is split once more by the wrist: points whose
//! projection onto `Wrist - Elbow`, measured from the wrist, is
//! non-negative form the hand region, the others the forearm.
//!
//! Every writer thread uses this one classifier, so the source cells each
//! of them claims are disjoint by construction.

use crate::geometry::Point;
use crate::skeleton::ArmJoints;

/// Region a source cell belongs to for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmRegion {
    /// Copied verbatim by segmentation
    Body,
    /// Resampled along the new arm direction
    Forearm,
    /// Translated to the touch point
    Hand,
}

/// Boundary vectors derived once per frame, read-only afterwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmBoundary {
    pub elbow: Point,
    pub wrist: Point,
    /// Elbow to wrist
    pub v_ew: Point,
    /// Unit normal of `v_ew` (right side)
    pub ew_normal: Point,
    /// Elbow to shoulder plus elbow to wrist
    pub v_half: Point,
    /// `v_half` rotated 90 degrees; positive side is the lower arm
    pub boundary_normal: Point,
}

impl ArmBoundary {
    pub fn new(shoulder: Point, elbow: Point, wrist: Point) -> Self {
        let v_ew = wrist - elbow;
        let v_es = shoulder - elbow;
        let v_half = v_es + v_ew;
        Self {
            elbow,
            wrist,
            v_ew,
            ew_normal: v_ew.normalize().right_normal(),
            v_half,
            boundary_normal: Point::new(-v_half.y, v_half.x),
        }
    }

    pub fn from_joints(arm: &ArmJoints) -> Self {
        Self::new(arm.shoulder, arm.elbow, arm.wrist)
    }

    /// Signed value of `p` against the boundary normal
    #[inline]
    pub fn signed_value(&self, p: Point) -> f32 {
        self.boundary_normal.dot(p - self.elbow)
    }

    #[inline]
    pub fn is_rest_of_body(&self, p: Point) -> bool {
        self.signed_value(p) <= 0.0
    }

    /// Projection of `p - Wrist` onto the elbow-to-wrist direction (unscaled)
    #[inline]
    pub fn beyond_wrist(&self, p: Point) -> f32 {
        self.v_ew.dot(p - self.wrist)
    }

    #[inline]
    pub fn classify(&self, p: Point) -> ArmRegion {
        if self.is_rest_of_body(p) {
            ArmRegion::Body
        } else if self.beyond_wrist(p) >= 0.0 {
            ArmRegion::Hand
        } else {
            ArmRegion::Forearm
        }
    }

    /// Classify a grid cell by its integer coordinates
    #[inline]
    pub fn classify_cell(&self, x: usize, y: usize) -> ArmRegion {
        self.classify(Point::new(x as f32, y as f32))
    }

    /// The wrist lies strictly on the lower arm side. When it does not (arm
    /// folded back across the boundary, or zero-length arm vectors), the
    /// lower arm region is empty or meaningless and the arm pipeline is
    /// skipped for the frame.
    pub fn is_well_formed(&self) -> bool {
        self.v_ew.length() > 0.5 && self.signed_value(self.wrist) > 0.0
    }
}
