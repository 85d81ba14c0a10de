//! Per-frame orchestration of the region passes
//!
//! A frame runs as one worker thread per spatial region, all launched at
//! frame start and joined before `compose` returns:
//!
//! - body: segmentation of the rest of the body
//! - arm: forearm resampling along the new arm vector
//! - hand: hand region translated onto the touch point
//!
//! The half-plane classifier keeps the source cells of the three passes
//! apart. Their destinations can still meet (the moved arm may cross the
//! torso); those cells get whichever write lands last.
//!
//! The hand duplicate overlay runs after the body pass has been joined so
//! that it always ends up on top.

use std::thread::{self, Scope, ScopedJoinHandle};

use crate::classify::{ArmBoundary, ArmRegion};
use crate::config::{CompositeMode, CompositorConfig};
use crate::error::{CompositeError, Result};
use crate::frame::{bgra, composite_pixel, is_body, scaled_alpha, OutputBuffer};
use crate::geometry::Point;
use crate::hand::{HandRegionCompositor, HandStats};
use crate::mapping::{NativeView, Resolution, SensorFrame};
use crate::resample::{ArmExtensionResampler, ArmRemap, ArmStats};
use crate::segment::{recursion_stack_size, FillRequest};
use crate::segmentation::{SegmentStats, SegmentationEngine};
use crate::skeleton::{ArmJoints, JointType, Skeleton};
use crate::target::{LedgerSummary, SharedTarget, WriteLedger};

/// Color of the pointer marker
pub const POINTER_COLOR: u32 = bgra(255, 255, 255, 255);

/// Why a frame ran with less than the configured mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// Not all right-arm joints were tracked
    PartialTracking(Vec<JointType>),
    /// The mode needs a touch point and none was given
    NoTouch,
    /// Arm joints tracked but the wrist is not on the lower-arm side
    DegenerateArm,
}

/// What happened during one `compose` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Mode actually composited after any degradation
    pub mode: CompositeMode,
    pub degraded: Option<Degradation>,
    /// Joint and native cell the body fill started from
    pub seed: Option<(JointType, (usize, usize))>,
    pub body: SegmentStats,
    pub arm: Option<ArmStats>,
    pub hand: Option<HandStats>,
    /// Cells painted by the pointer marker
    pub pointer_written: usize,
    /// Write audit, when enabled
    pub audit: Option<LedgerSummary>,
}

impl FrameReport {
    /// Claimed or sampled cells without a correspondence, all passes
    pub fn unmapped(&self) -> usize {
        self.body.unmapped
            + self.arm.map_or(0, |a| a.unmapped)
            + self.hand.map_or(0, |h| h.unmapped)
    }

    /// Lookups and destinations that fell off a grid, all passes
    pub fn out_of_bounds(&self) -> usize {
        self.body.out_of_bounds
            + self.arm.map_or(0, |a| a.out_of_bounds)
            + self.hand.map_or(0, |h| h.out_of_bounds)
    }
}

/// Arm state resolved for a frame
struct ArmPlan {
    joints: ArmJoints,
    boundary: ArmBoundary,
    touch: Point,
}

struct FramePlan {
    mode: CompositeMode,
    degraded: Option<Degradation>,
    arm: Option<ArmPlan>,
}

/// Frame-scoped working buffers, reused across frames
#[derive(Debug, Default)]
struct Scratch {
    presence: Vec<u8>,
    body_visits: Vec<u8>,
    hand_visits: Vec<u8>,
}

/// Composites sensor frames into an output buffer
#[derive(Debug)]
pub struct Compositor {
    config: CompositorConfig,
    scratch: Scratch,
    body: SegmentationEngine,
    hand: HandRegionCompositor,
    ledger: WriteLedger,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scratch: Scratch::default(),
            body: SegmentationEngine::new(),
            hand: HandRegionCompositor::new(),
            ledger: WriteLedger::new(),
        })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CompositorConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: CompositeMode) {
        self.config.mode = mode;
    }

    pub fn set_transparency(&mut self, alpha: u8) {
        self.config.transparency = alpha;
    }

    /// Audit of the last composed frame (empty unless auditing is on)
    pub fn ledger(&self) -> &WriteLedger {
        &self.ledger
    }

    /// Composite one frame into `output`, which must have the native
    /// domain's size. Cells no pass writes keep their previous value.
    pub fn compose(
        &mut self,
        frame: &SensorFrame<'_>,
        skeleton: &Skeleton,
        touch: Option<Point>,
        output: &mut OutputBuffer,
    ) -> Result<FrameReport> {
        let config = self.config.clone();
        frame.validate(config.resolution)?;
        let native = frame.native_dims(config.resolution);
        if output.dims() != native {
            return Err(CompositeError::DimensionMismatch {
                what: "output buffer",
                expected: native.len(),
                actual: output.dims().len(),
            });
        }

        let Self {
            scratch,
            body,
            hand,
            ledger,
            ..
        } = self;
        let Scratch {
            presence,
            body_visits,
            hand_visits,
        } = scratch;

        let view = match config.resolution {
            Resolution::LowRes => NativeView::low_res(frame),
            Resolution::Hd => {
                frame.resolve_color_presence(presence);
                NativeView::hd(frame, presence)
            },
        };

        let plan = plan_frame(&config, skeleton, touch);
        let boundary = plan.arm.as_ref().map(|a| a.boundary);
        let seed = pick_seed(skeleton, &view, boundary.as_ref());

        let budget = config.recursion_budget.unwrap_or(native.len());
        let stack_size = config
            .traversal
            .needs_deep_stack()
            .then(|| recursion_stack_size(budget));
        let body_request = FillRequest::new(config.traversal, config.connectivity)
            .with_seed(seed.map(|(_, cell)| cell))
            .with_sweep(config.sweep_unreached)
            .with_recursion_budget(budget);

        let audit = config.audit_writes || cfg!(debug_assertions);
        if audit {
            ledger.reset(native);
        }

        body_visits.clear();
        body_visits.extend_from_slice(view.presence());

        let mut report = FrameReport {
            mode: plan.mode,
            degraded: plan.degraded,
            seed,
            ..FrameReport::default()
        };
        let alpha = config.transparency;

        {
            let target = SharedTarget::new(output, audit.then_some(&*ledger));
            match (plan.mode, plan.arm) {
                (CompositeMode::ArmExtension { transform }, Some(arm)) => {
                    hand_visits.clear();
                    hand_visits.extend_from_slice(view.presence());
                    let remap = ArmRemap::new(&arm.joints, arm.touch, transform);
                    let hand_request = body_request
                        .with_seed(view.dims().cell_at(arm.joints.hand))
                        .seed_component_only();
                    let resampler = ArmExtensionResampler::new(config.debug_markers);

                    let body_writer = target.writer(ArmRegion::Body);
                    let arm_writer = target.writer(ArmRegion::Forearm);
                    let hand_writer = target.writer(ArmRegion::Hand);
                    let view = &view;
                    let boundary = &arm.boundary;
                    let (b, a, h) = thread::scope(|s| -> Result<_> {
                        let body_job = spawn_worker(s, "body", stack_size, move || {
                            body.run(&body_request, view, body_visits, Some(boundary), body_writer, alpha)
                        })?;
                        let arm_job = spawn_worker(s, "arm", None, move || {
                            Ok(resampler.run(&remap, boundary, view, arm_writer, alpha))
                        })?;
                        let hand_job = spawn_worker(s, "hand", stack_size, move || {
                            hand.run(
                                &hand_request,
                                view,
                                hand_visits,
                                boundary,
                                remap.hand_translation(),
                                hand_writer,
                                alpha,
                            )
                        })?;
                        Ok((
                            join_worker(body_job, "body"),
                            join_worker(arm_job, "arm"),
                            join_worker(hand_job, "hand"),
                        ))
                    })?;
                    report.body = b?;
                    report.arm = Some(a?);
                    report.hand = Some(h?);
                },
                (CompositeMode::HandDuplicate, Some(arm)) => {
                    let body_writer = target.writer(ArmRegion::Body);
                    let view_ref = &view;
                    report.body = thread::scope(|s| -> Result<_> {
                        let job = spawn_worker(s, "body", stack_size, move || {
                            body.run(&body_request, view_ref, body_visits, None, body_writer, alpha)
                        })?;
                        join_worker(job, "body")
                    })?;

                    // overlay pass, after the body so the duplicate stays on top
                    hand_visits.clear();
                    hand_visits.extend_from_slice(view.presence());
                    let hand_request = body_request
                        .with_seed(view.dims().cell_at(arm.joints.hand))
                        .seed_component_only();
                    let translation = arm.touch - arm.joints.hand_tip;
                    let hand_writer = target.writer(ArmRegion::Hand);
                    let dup_alpha = scaled_alpha(alpha, config.duplicate_alpha_factor);
                    let boundary = &arm.boundary;
                    report.hand = Some(thread::scope(|s| -> Result<_> {
                        let job = spawn_worker(s, "hand", stack_size, move || {
                            hand.run(
                                &hand_request,
                                view_ref,
                                hand_visits,
                                boundary,
                                translation,
                                hand_writer,
                                dup_alpha,
                            )
                        })?;
                        join_worker(job, "hand")
                    })?);
                },
                _ => {
                    let body_writer = target.writer(ArmRegion::Body);
                    let view_ref = &view;
                    report.body = thread::scope(|s| -> Result<_> {
                        let job = spawn_worker(s, "body", stack_size, move || {
                            body.run(&body_request, view_ref, body_visits, None, body_writer, alpha)
                        })?;
                        join_worker(job, "body")
                    })?;
                },
            }
        }

        if report.mode == CompositeMode::Pointer {
            if let Some(touch) = touch {
                report.pointer_written =
                    draw_pointer(output, touch, config.pointer_radius, alpha);
            }
        }

        if audit {
            let summary = ledger.summary();
            if matches!(report.mode, CompositeMode::ArmExtension { .. }) {
                debug_assert_eq!(
                    summary.cross_region_marks, 0,
                    "region passes claimed the same source cell"
                );
                if summary.cross_region_marks > 0 {
                    log::warn!(
                        "{} source cells claimed by more than one region",
                        summary.cross_region_marks
                    );
                }
            }
            if summary.overlaps > 0 {
                log::debug!("{} output cells written by more than one region", summary.overlaps);
            }
            report.audit = Some(summary);
        }

        log::trace!(
            "frame {}: body {} cells ({} pending max), arm {:?}, hand {:?}",
            report.mode.name(),
            report.body.written,
            report.body.traversal.max_pending,
            report.arm.map(|a| a.centerline_written + a.sweep_written),
            report.hand.map(|h| h.written),
        );
        Ok(report)
    }
}

/// Decide which mode the frame can actually run
fn plan_frame(config: &CompositorConfig, skeleton: &Skeleton, touch: Option<Point>) -> FramePlan {
    let requested = config.mode;
    let degrade = |why: Degradation| {
        log::debug!("{} mode skipped this frame: {:?}", requested.name(), why);
        FramePlan {
            mode: CompositeMode::Standard,
            degraded: Some(why),
            arm: None,
        }
    };

    if !requested.needs_arm() {
        if requested == CompositeMode::Pointer && touch.is_none() {
            return degrade(Degradation::NoTouch);
        }
        return FramePlan {
            mode: requested,
            degraded: None,
            arm: None,
        };
    }

    let joints = match skeleton.arm_joints() {
        Ok(joints) => joints,
        Err(missing) => return degrade(Degradation::PartialTracking(missing)),
    };
    let Some(touch) = touch else {
        return degrade(Degradation::NoTouch);
    };
    let boundary = ArmBoundary::from_joints(&joints);
    if !boundary.is_well_formed() {
        return degrade(Degradation::DegenerateArm);
    }
    FramePlan {
        mode: requested,
        degraded: None,
        arm: Some(ArmPlan {
            joints,
            boundary,
            touch,
        }),
    }
}

/// First tracked joint that lands on a body cell the body pass may claim,
/// else the first tracked joint inside the grid
fn pick_seed(
    skeleton: &Skeleton,
    view: &NativeView<'_>,
    boundary: Option<&ArmBoundary>,
) -> Option<(JointType, (usize, usize))> {
    let dims = view.dims();
    let cells: Vec<(JointType, (usize, usize))> = skeleton
        .tracked()
        .filter_map(|(joint, p)| dims.cell_at(p).map(|cell| (joint, cell)))
        .collect();
    let claimable = |&&(_, (x, y)): &&(JointType, (usize, usize))| {
        is_body(view.body_at(dims.index(x, y)))
            && boundary.map_or(true, |b| b.is_rest_of_body(Point::new(x as f32, y as f32)))
    };
    cells
        .iter()
        .find(claimable)
        .or_else(|| cells.first())
        .copied()
}

fn spawn_worker<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: &str,
    stack_size: Option<usize>,
    job: F,
) -> Result<ScopedJoinHandle<'scope, Result<T>>>
where
    T: Send + 'scope,
    F: FnOnce() -> Result<T> + Send + 'scope,
{
    let mut builder = thread::Builder::new().name(format!("bodyblend-{}", name));
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }
    Ok(builder.spawn_scoped(scope, job)?)
}

fn join_worker<T>(handle: ScopedJoinHandle<'_, Result<T>>, name: &'static str) -> Result<T> {
    handle
        .join()
        .map_err(|_| CompositeError::WorkerPanicked(name))?
}

/// Filled disc at the touch point
fn draw_pointer(output: &mut OutputBuffer, center: Point, radius: f32, alpha: u8) -> usize {
    let dims = output.dims();
    let r = radius.ceil() as i64;
    let cx = (center.x + 0.5).floor() as i64;
    let cy = (center.y + 0.5).floor() as i64;
    let r2 = radius * radius;
    let mut written = 0;
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f32 > r2 {
                continue;
            }
            if let Some(idx) = dims.checked_index(cx + dx, cy + dy) {
                composite_pixel(&mut output.as_mut_slice()[idx], POINTER_COLOR, alpha);
                written += 1;
            }
        }
    }
    written
}
