//! Compositor configuration, stored as JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CompositeError, Result};
use crate::mapping::Resolution;
use crate::resample::ArmTransform;
use crate::segment::{Connectivity, TraversalStrategy};

/// Alpha factor of the translated hand duplicate
pub const HAND_DUPLICATE_ALPHA_FACTOR: f32 = 0.75;

/// What gets composited on top of the plain body copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CompositeMode {
    /// Full body copy only
    Standard,
    /// Forearm remapped toward the touch point, hand moved with it
    ArmExtension {
        #[serde(default)]
        transform: ArmTransform,
    },
    /// Full body plus a fainter copy of the hand at the touch point
    HandDuplicate,
    /// Full body plus a marker at the touch point
    Pointer,
}

impl Default for CompositeMode {
    fn default() -> Self {
        CompositeMode::ArmExtension {
            transform: ArmTransform::Extend,
        }
    }
}

impl CompositeMode {
    pub fn name(self) -> &'static str {
        match self {
            CompositeMode::Standard => "standard",
            CompositeMode::ArmExtension { transform } => match transform {
                ArmTransform::Extend => "extend",
                ArmTransform::Rotate => "rotate",
                ArmTransform::Scale => "scale",
            },
            CompositeMode::HandDuplicate => "duplicate",
            CompositeMode::Pointer => "pointer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let arm = |transform| Some(CompositeMode::ArmExtension { transform });
        match name {
            "standard" | "body" => Some(CompositeMode::Standard),
            "extend" | "arm" => arm(ArmTransform::Extend),
            "rotate" => arm(ArmTransform::Rotate),
            "scale" => arm(ArmTransform::Scale),
            "duplicate" | "hand" => Some(CompositeMode::HandDuplicate),
            "pointer" | "symbol" => Some(CompositeMode::Pointer),
            _ => None,
        }
    }

    /// Needs all five right-arm joints
    pub fn needs_arm(self) -> bool {
        matches!(
            self,
            CompositeMode::ArmExtension { .. } | CompositeMode::HandDuplicate
        )
    }
}

/// Everything the compositor needs to know besides the frame itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub resolution: Resolution,
    pub traversal: TraversalStrategy,
    pub connectivity: Connectivity,
    /// Alpha written into every composited pixel
    pub transparency: u8,
    pub mode: CompositeMode,
    /// After the seeded fill, also copy body parts the seed did not reach
    pub sweep_unreached: bool,
    /// Paint solid markers instead of resampled arm color
    pub debug_markers: bool,
    /// Keep a per-cell write audit and report overlaps
    pub audit_writes: bool,
    /// Alpha multiplier for the hand duplicate
    pub duplicate_alpha_factor: f32,
    /// Recursion depth limit for the recursive fill; `None` means one level
    /// per native cell
    pub recursion_budget: Option<usize>,
    /// Radius of the pointer marker in native pixels
    pub pointer_radius: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::LowRes,
            traversal: TraversalStrategy::Scanline,
            connectivity: Connectivity::Four,
            transparency: 0xFF,
            mode: CompositeMode::default(),
            sweep_unreached: true,
            debug_markers: false,
            audit_writes: false,
            duplicate_alpha_factor: HAND_DUPLICATE_ALPHA_FACTOR,
            recursion_budget: None,
            pointer_radius: 6.0,
        }
    }
}

impl CompositorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.duplicate_alpha_factor) {
            return Err(CompositeError::Config(format!(
                "duplicate_alpha_factor must be within 0..=1, got {}",
                self.duplicate_alpha_factor
            )));
        }
        if self.recursion_budget == Some(0) {
            return Err(CompositeError::Config(
                "recursion_budget must be positive".to_string(),
            ));
        }
        if !(self.pointer_radius >= 0.0) {
            return Err(CompositeError::Config(format!(
                "pointer_radius must be non-negative, got {}",
                self.pointer_radius
            )));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
