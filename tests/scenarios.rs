use bodyblend::classify::{ArmBoundary, ArmRegion};
use bodyblend::compositor::Degradation;
use bodyblend::frame::{with_alpha, BodyMask, ColorImage, Dimensions, Grid, OutputBuffer};
use bodyblend::resample::sample_count;
use bodyblend::synthetic::{SyntheticFrame, SyntheticRig, DEFAULT_ARM_ANGLE};
use bodyblend::{
    ArmTransform, CompositeMode, Compositor, CompositorConfig, Connectivity, Correspondence,
    Direction, FrameReport, JointType, Point, SensorFrame, Skeleton, TraversalStrategy,
};

const UNTOUCHED: u32 = 0x1234_5678;

fn config(mode: CompositeMode, strategy: TraversalStrategy) -> CompositorConfig {
    CompositorConfig {
        mode,
        traversal: strategy,
        transparency: 0xC0,
        audit_writes: true,
        ..CompositorConfig::default()
    }
}

fn compose(
    config: CompositorConfig,
    frame: &SensorFrame<'_>,
    skeleton: &Skeleton,
    touch: Option<Point>,
) -> (Vec<u32>, FrameReport, Compositor) {
    let dims = frame.native_dims(config.resolution);
    let mut output = OutputBuffer::new(dims, UNTOUCHED);
    let mut compositor = Compositor::new(config).unwrap();
    let report = compositor.compose(frame, skeleton, touch, &mut output).unwrap();
    (output.into_vec(), report, compositor)
}

/// Depth 8x8 into color 16x16, depth (x, y) maps to color (2x + 1, 2y + 1)
fn small_frame(mask: BodyMask, paint: u32) -> (BodyMask, ColorImage, Correspondence) {
    let depth = mask.dims();
    let color_dims = Dimensions::new(16, 16);
    let mut color = Grid::new(color_dims, 0u32);
    let points: Vec<Point> = (0..depth.len())
        .map(|i| {
            let (x, y) = depth.coords(i);
            Point::new((2 * x + 1) as f32, (2 * y + 1) as f32)
        })
        .collect();
    for i in 0..depth.len() {
        if bodyblend::frame::is_body(mask.as_slice()[i]) {
            color.set(points[i].x as i64, points[i].y as i64, paint);
        }
    }
    let map = Correspondence::new(Direction::DepthToColor, depth, color_dims, points).unwrap();
    (mask, color, map)
}

#[test]
fn test_scenario_a_single_block() {
    let depth = Dimensions::new(8, 8);
    let mut mask = BodyMask::background(depth);
    mask.fill_rect(0, 0, 3, 3, 0);
    let (mask, color, map) = small_frame(mask, 0xFFAA_BBCC);
    let frame = SensorFrame::new(&mask, &color, &map);

    let seeded = Skeleton::new().with(JointType::SpineBase, Point::new(1.0, 1.0));
    for skeleton in [Skeleton::new(), seeded] {
        for strategy in TraversalStrategy::ALL {
            for connectivity in [Connectivity::Four, Connectivity::Eight] {
                let mut cfg = config(CompositeMode::Standard, strategy);
                cfg.connectivity = connectivity;
                let (out, report, _) = compose(cfg, &frame, &skeleton, None);
                for i in 0..depth.len() {
                    let (x, y) = depth.coords(i);
                    if x < 3 && y < 3 {
                        assert_eq!(out[i], 0xC0AA_BBCC, "{:?} at ({}, {})", strategy, x, y);
                    } else {
                        assert_eq!(out[i], UNTOUCHED, "{:?} at ({}, {})", strategy, x, y);
                    }
                }
                assert_eq!(report.body.written, 9);
                assert_eq!(report.body.traversal.claimed, 9);
            }
        }
    }
}

#[test]
fn test_scenario_b_unmapped_cell_is_skipped() {
    let depth = Dimensions::new(8, 8);
    let mut mask = BodyMask::background(depth);
    mask.fill_rect(1, 1, 5, 5, 2);
    let (mask, color, mut map) = small_frame(mask, 0xFF10_2030);
    map.points_mut()[depth.index(3, 3)] = Correspondence::unmapped();
    let frame = SensorFrame::new(&mask, &color, &map);
    let skeleton = Skeleton::new().with(JointType::SpineMid, Point::new(2.0, 2.0));

    for strategy in TraversalStrategy::ALL {
        let (out, report, _) = compose(config(CompositeMode::Standard, strategy), &frame, &skeleton, None);
        assert_eq!(out[depth.index(3, 3)], UNTOUCHED, "{:?}", strategy);
        for (x, y) in [(2, 3), (4, 3), (3, 2), (3, 4)] {
            assert_eq!(out[depth.index(x, y)], 0xC010_2030, "{:?}", strategy);
        }
        assert_eq!(report.body.unmapped, 1);
        assert_eq!(report.body.written, 24);
    }
}

/// 240x200 scene with identity mapping, torso on the left, forearm along
/// y = 100 from the elbow to the wrist, hand block past the wrist
fn arm_scene() -> (BodyMask, ColorImage, Correspondence) {
    let dims = Dimensions::new(240, 200);
    let mut mask = BodyMask::background(dims);
    mask.fill_rect(40, 60, 40, 120, 0);
    mask.fill_rect(100, 97, 50, 7, 0);
    mask.fill_rect(150, 95, 16, 11, 0);
    let color = Grid::from_vec(dims, (0..dims.len() as u32).map(|i| 0xFF00_0000 | i).collect()).unwrap();
    let points = (0..dims.len())
        .map(|i| {
            let (x, y) = dims.coords(i);
            Point::new(x as f32, y as f32)
        })
        .collect();
    let map = Correspondence::new(Direction::DepthToColor, dims, dims, points).unwrap();
    (mask, color, map)
}

fn arm_skeleton() -> Skeleton {
    Skeleton::new()
        .with(JointType::SpineMid, Point::new(60.0, 120.0))
        .with(JointType::ShoulderRight, Point::new(60.0, 60.0))
        .with(JointType::ElbowRight, Point::new(100.0, 100.0))
        .with(JointType::WristRight, Point::new(150.0, 100.0))
        .with(JointType::HandRight, Point::new(155.0, 100.0))
        .with(JointType::HandTipRight, Point::new(160.0, 100.0))
}

#[test]
fn test_scenario_c_arm_extension() {
    let (mask, color, map) = arm_scene();
    let frame = SensorFrame::new(&mask, &color, &map);
    let touch = Point::new(200.0, 150.0);
    let dims = mask.dims();

    for strategy in TraversalStrategy::ALL {
        let (out, report, compositor) =
            compose(config(CompositeMode::default(), strategy), &frame, &arm_skeleton(), Some(touch));
        assert_eq!(
            report.mode,
            CompositeMode::ArmExtension {
                transform: ArmTransform::Extend
            }
        );
        assert_eq!(report.degraded, None);
        assert_eq!(report.seed, Some((JointType::SpineMid, (60, 120))));

        let arm = report.arm.unwrap();
        let l_new = (90.0f32 * 90.0 + 50.0 * 50.0).sqrt();
        assert_eq!(arm.l_old, 50.0);
        assert!((arm.l_new - l_new).abs() < 1e-3);
        assert_eq!(arm.samples, sample_count(50.0, l_new));
        assert_eq!(arm.samples, (2.2 * l_new).ceil() as usize);
        assert!(arm.centerline_written > 0 && arm.sweep_written > 0);

        // new arm band halfway between elbow and new wrist
        assert_ne!(out[dims.index(145, 125)], UNTOUCHED);

        // hand moved by Touch - HandTip
        let hand = report.hand.unwrap();
        assert!((hand.translation.x - 40.0).abs() < 1e-3);
        assert!((hand.translation.y - 50.0).abs() < 1e-3);
        assert_eq!(hand.written, 16 * 11);
        assert_eq!(out[dims.index(195, 150)], with_alpha(dims.index(155, 100) as u32, 0xC0));

        // torso copied in place
        assert_eq!(out[dims.index(50, 150)], with_alpha(dims.index(50, 150) as u32, 0xC0));

        let audit = report.audit.unwrap();
        assert_eq!(audit.cross_region_marks, 0);
        assert!(audit.max_marks <= 1);
        let ledger = compositor.ledger();
        let arm_joints = arm_skeleton().arm_joints().unwrap();
        let boundary = ArmBoundary::from_joints(&arm_joints);
        for idx in ledger.marked_cells(ArmRegion::Body) {
            let (x, y) = dims.coords(idx);
            assert!(boundary.is_rest_of_body(Point::new(x as f32, y as f32)));
        }
        for idx in ledger.marked_cells(ArmRegion::Hand) {
            let (x, y) = dims.coords(idx);
            assert_eq!(boundary.classify_cell(x, y), ArmRegion::Hand);
        }
    }
}

/// Arm scene plus a second figure in the hand half-plane, not touching
/// the hand
fn arm_scene_with_bystander() -> (BodyMask, ColorImage, Correspondence) {
    let (mut mask, color, map) = arm_scene();
    mask.fill_rect(200, 10, 20, 30, 1);
    (mask, color, map)
}

#[test]
fn test_hand_pass_stays_on_hand_component() {
    let (mask, color, map) = arm_scene_with_bystander();
    let frame = SensorFrame::new(&mask, &color, &map);
    let dims = mask.dims();
    let boundary = ArmBoundary::from_joints(&arm_skeleton().arm_joints().unwrap());
    assert_eq!(boundary.classify_cell(200, 10), ArmRegion::Hand);
    let bystander = |idx: usize| {
        let (x, y) = dims.coords(idx);
        (200..220).contains(&x) && (10..40).contains(&y)
    };

    for strategy in TraversalStrategy::ALL {
        let (_, report, compositor) = compose(
            config(CompositeMode::default(), strategy),
            &frame,
            &arm_skeleton(),
            Some(Point::new(200.0, 150.0)),
        );
        let hand = report.hand.unwrap();
        assert_eq!(hand.traversal.claimed, 16 * 11, "{:?}", strategy);
        assert_eq!(hand.written, 16 * 11, "{:?}", strategy);
        assert!(
            !compositor.ledger().marked_cells(ArmRegion::Hand).any(bystander),
            "{:?}",
            strategy
        );

        // duplicate lands at +(10, 20); a moved bystander would cover (215, 35)
        let (out, report, _) = compose(
            config(CompositeMode::HandDuplicate, strategy),
            &frame,
            &arm_skeleton(),
            Some(Point::new(170.0, 120.0)),
        );
        assert_eq!(report.hand.unwrap().traversal.claimed, 16 * 11, "{:?}", strategy);
        let idx = dims.index(215, 35);
        assert_eq!(out[idx], with_alpha(idx as u32, 0xC0), "{:?}", strategy);
    }
}

#[test]
fn test_scenario_d_partial_tracking_is_passthrough() {
    let (mask, color, map) = arm_scene();
    let frame = SensorFrame::new(&mask, &color, &map);
    let skeleton = Skeleton::new()
        .with(JointType::ElbowRight, Point::new(100.0, 100.0))
        .with(JointType::WristRight, Point::new(150.0, 100.0));
    let touch = Some(Point::new(200.0, 150.0));

    let (passthrough, _, _) = compose(
        config(CompositeMode::Standard, TraversalStrategy::Scanline),
        &frame,
        &skeleton,
        None,
    );
    let (out, report, _) = compose(
        config(CompositeMode::default(), TraversalStrategy::Scanline),
        &frame,
        &skeleton,
        touch,
    );
    assert_eq!(out, passthrough);
    assert_eq!(report.mode, CompositeMode::Standard);
    assert_eq!(
        report.degraded,
        Some(Degradation::PartialTracking(vec![
            JointType::ShoulderRight,
            JointType::HandRight,
            JointType::HandTipRight,
        ]))
    );
    assert!(report.arm.is_none() && report.hand.is_none());
    // every body cell, arm included, copied in place
    assert_eq!(report.body.written, mask.body_cells());
}

fn synthetic(rig: SyntheticRig) -> SyntheticFrame {
    rig.frame(DEFAULT_ARM_ANGLE).unwrap()
}

#[test]
fn test_traversal_equivalence_on_synthetic_frames() {
    for rig in [
        SyntheticRig::low_res().with_speckle(40, 3),
        SyntheticRig::hd().with_speckle(40, 3),
    ] {
        let data = synthetic(rig);
        let frame = data.sensor_frame();
        for mode in [CompositeMode::Standard, CompositeMode::HandDuplicate] {
            for connectivity in [Connectivity::Four, Connectivity::Eight] {
                let run = |strategy| {
                    let mut cfg = config(mode, strategy);
                    cfg.resolution = rig.resolution;
                    cfg.connectivity = connectivity;
                    compose(cfg, &frame, &data.skeleton, Some(rig.default_touch())).0
                };
                let baseline = run(TraversalStrategy::Sequential);
                for strategy in TraversalStrategy::ALL {
                    assert!(
                        run(strategy) == baseline,
                        "{:?} differs in {:?} {:?} {:?}",
                        strategy,
                        rig.resolution,
                        mode,
                        connectivity
                    );
                }
            }
        }
    }
}

#[test]
fn test_arm_extension_equivalent_across_strategies() {
    let (mask, color, map) = arm_scene();
    let frame = SensorFrame::new(&mask, &color, &map);
    let touch = Some(Point::new(200.0, 150.0));
    for transform in [ArmTransform::Extend, ArmTransform::Rotate, ArmTransform::Scale] {
        let mode = CompositeMode::ArmExtension { transform };
        let (baseline, report, compositor) =
            compose(config(mode, TraversalStrategy::Sequential), &frame, &arm_skeleton(), touch);
        assert_eq!(report.mode, mode);
        // the moved arm and hand stay clear of the torso
        let ledger = compositor.ledger();
        let regions = [ArmRegion::Body, ArmRegion::Forearm, ArmRegion::Hand];
        let contested = |idx: usize| regions.iter().filter(|&&r| ledger.written_by(r, idx)).count() > 1;
        for idx in 0..baseline.len() {
            let (x, y) = mask.dims().coords(idx);
            if x < 90 && ledger.written_by(ArmRegion::Body, idx) {
                assert!(!contested(idx), "{:?} at {:?}", transform, (x, y));
            }
        }

        for strategy in TraversalStrategy::ALL {
            let (out, _, _) = compose(config(mode, strategy), &frame, &arm_skeleton(), touch);
            // arm and hand threads may race where they meet; everything else is fixed
            let differs = (0..out.len()).find(|&i| !contested(i) && out[i] != baseline[i]);
            assert_eq!(differs, None, "{:?} {:?}", strategy, transform);
        }
    }
}

#[test]
fn test_each_source_cell_marked_once() {
    let data = synthetic(SyntheticRig::low_res());
    let frame = data.sensor_frame();
    for strategy in TraversalStrategy::ALL {
        let (_, report, _) = compose(
            config(CompositeMode::default(), strategy),
            &frame,
            &data.skeleton,
            Some(SyntheticRig::low_res().default_touch()),
        );
        assert!(report.arm.is_some(), "{:?}", report.degraded);
        let audit = report.audit.unwrap();
        assert_eq!(audit.max_marks, 1, "{:?}", strategy);
        assert_eq!(audit.cross_region_marks, 0, "{:?}", strategy);
    }
}

#[test]
fn test_any_missing_arm_joint_degrades() {
    let rig = SyntheticRig::low_res();
    let data = synthetic(rig);
    let frame = data.sensor_frame();
    for joint in JointType::RIGHT_ARM {
        let mut skeleton = data.skeleton.clone();
        skeleton.untrack(joint);
        let (passthrough, _, _) = compose(
            config(CompositeMode::Standard, TraversalStrategy::IterativeDfs),
            &frame,
            &skeleton,
            None,
        );
        for mode in [CompositeMode::default(), CompositeMode::HandDuplicate] {
            let (out, report, _) = compose(
                config(mode, TraversalStrategy::IterativeDfs),
                &frame,
                &skeleton,
                Some(rig.default_touch()),
            );
            assert_eq!(report.degraded, Some(Degradation::PartialTracking(vec![joint])));
            assert!(out == passthrough, "{:?} with {:?} untracked", mode, joint);
        }
    }
}

#[test]
fn test_missing_touch_degrades() {
    let data = synthetic(SyntheticRig::low_res());
    let (_, report, _) = compose(
        config(CompositeMode::default(), TraversalStrategy::Scanline),
        &data.sensor_frame(),
        &data.skeleton,
        None,
    );
    assert_eq!(report.mode, CompositeMode::Standard);
    assert_eq!(report.degraded, Some(Degradation::NoTouch));
}

#[test]
fn test_hd_copies_color_directly() {
    let rig = SyntheticRig::hd();
    let data = synthetic(rig);
    let (out, report, _) = compose(
        CompositorConfig {
            resolution: rig.resolution,
            ..config(CompositeMode::Standard, TraversalStrategy::Scanline)
        },
        &data.sensor_frame(),
        &data.skeleton,
        None,
    );
    assert!(report.body.written > 4 * 1000);
    let color = data.color.as_slice();
    let mut written = 0;
    for (i, &px) in out.iter().enumerate() {
        if px != UNTOUCHED {
            assert_eq!(px, with_alpha(color[i], 0xC0));
            written += 1;
        }
    }
    assert_eq!(written, report.body.written);
}

#[test]
fn test_hand_duplicate_overlays_fainter_hand() {
    let rig = SyntheticRig::low_res();
    let data = synthetic(rig);
    let touch = rig.default_touch();
    let (out, report, _) = compose(
        config(CompositeMode::HandDuplicate, TraversalStrategy::Scanline),
        &data.sensor_frame(),
        &data.skeleton,
        Some(touch),
    );
    assert_eq!(report.mode, CompositeMode::HandDuplicate);
    let hand = report.hand.unwrap();
    assert!(hand.written > 0);
    let tip = data.skeleton.get(JointType::HandTipRight).unwrap();
    assert_eq!(hand.translation, touch - tip);
    // 0xC0 * 0.75
    let dst = rig.depth.index_at(touch).unwrap();
    assert_eq!(out[dst] >> 24, 0x90);
    // the whole body, arm included, is still there
    assert_eq!(report.body.written + report.body.unmapped, data.body_mask.body_cells());
}

#[test]
fn test_pointer_marks_touch() {
    let rig = SyntheticRig::low_res();
    let data = synthetic(rig);
    let touch = Point::new(20.0, 20.0);
    let (out, report, _) = compose(
        config(CompositeMode::Pointer, TraversalStrategy::Scanline),
        &data.sensor_frame(),
        &data.skeleton,
        Some(touch),
    );
    assert_eq!(report.mode, CompositeMode::Pointer);
    assert!(report.pointer_written > 0);
    assert_eq!(
        out[rig.depth.index(20, 20)],
        with_alpha(bodyblend::compositor::POINTER_COLOR, 0xC0)
    );
}

#[test]
fn test_recursion_budget_is_reported() {
    let data = synthetic(SyntheticRig::low_res());
    let mut cfg = config(CompositeMode::Standard, TraversalStrategy::RecursiveDfs);
    cfg.recursion_budget = Some(8);
    let mut output = OutputBuffer::new(SyntheticRig::low_res().native_dims(), 0);
    let mut compositor = Compositor::new(cfg).unwrap();
    let err = compositor.compose(&data.sensor_frame(), &data.skeleton, None, &mut output);
    assert!(matches!(err, Err(bodyblend::CompositeError::RecursionBudget { budget: 8 })));
}
