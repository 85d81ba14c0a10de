//! Body-segmentation compositor for depth-camera frames
//!
//! Copies the tracked person out of a color frame into an output buffer,
//! optionally stretching the right forearm toward a touch point and moving
//! the hand along with it. Each frame is split into three source regions
//! by a half-plane test around the elbow; one worker thread per region
//! writes into the shared output.

pub mod classify;
pub mod compositor;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod hand;
pub mod mapping;
pub mod resample;
pub mod segment;
pub mod segmentation;
pub mod skeleton;
pub mod synthetic;
pub mod target;
pub mod util;

pub use classify::{ArmBoundary, ArmRegion};
pub use compositor::{Compositor, Degradation, FrameReport};
pub use config::{CompositeMode, CompositorConfig};
pub use error::{CompositeError, Result};
pub use frame::{BodyMask, ColorImage, Dimensions, Grid, OutputBuffer, BACKGROUND};
pub use geometry::Point;
pub use mapping::{Correspondence, Direction, Resolution, SensorFrame};
pub use resample::ArmTransform;
pub use segment::{Connectivity, TraversalStrategy};
pub use skeleton::{JointType, Skeleton};
