//! Tracked body joints for one frame
//!
//! Joint positions arrive already projected into the compositor's native
//! domain. The arm pipeline consumes the five right-arm joints and only
//! when all of them are tracked at once.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Body joints reported by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

impl JointType {
    pub const COUNT: usize = 25;

    /// Every joint, in the tracker's order
    pub const ALL: [JointType; Self::COUNT] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];

    /// Joints the arm pipeline needs, all tracked at once
    pub const RIGHT_ARM: [JointType; 5] = [
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HandTipRight,
    ];

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Joint positions with a tracked flag per joint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    joints: [Option<Point>; JointType::COUNT],
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a joint tracked at a position
    pub fn set(&mut self, joint: JointType, position: Point) {
        self.joints[joint.slot()] = Some(position);
    }

    pub fn with(mut self, joint: JointType, position: Point) -> Self {
        self.set(joint, position);
        self
    }

    pub fn untrack(&mut self, joint: JointType) {
        self.joints[joint.slot()] = None;
    }

    /// Position of a tracked joint
    pub fn get(&self, joint: JointType) -> Option<Point> {
        self.joints[joint.slot()]
    }

    pub fn is_tracked(&self, joint: JointType) -> bool {
        self.get(joint).is_some()
    }

    /// Iterate over tracked joints in tracker order
    pub fn tracked(&self) -> impl Iterator<Item = (JointType, Point)> + '_ {
        JointType::ALL
            .iter()
            .filter_map(move |&j| self.get(j).map(|p| (j, p)))
    }

    /// The five right-arm joints, or the ones that are missing
    pub fn arm_joints(&self) -> Result<ArmJoints, Vec<JointType>> {
        match (
            self.get(JointType::ShoulderRight),
            self.get(JointType::ElbowRight),
            self.get(JointType::WristRight),
            self.get(JointType::HandRight),
            self.get(JointType::HandTipRight),
        ) {
            (Some(shoulder), Some(elbow), Some(wrist), Some(hand), Some(hand_tip)) => {
                Ok(ArmJoints {
                    shoulder,
                    elbow,
                    wrist,
                    hand,
                    hand_tip,
                })
            },
            _ => Err(JointType::RIGHT_ARM
                .iter()
                .copied()
                .filter(|&j| !self.is_tracked(j))
                .collect()),
        }
    }
}

/// Right-arm joint positions in the native domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmJoints {
    pub shoulder: Point,
    pub elbow: Point,
    pub wrist: Point,
    pub hand: Point,
    pub hand_tip: Point,
}
