//! Integration tests for the input-to-splat pipeline: pointer events in,
//! scheduled splats out, the way the frame loop drives it.

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sim::{PointerId, PointerSet, RecolorTimer, SimConfig, SplatScheduler};

const SURFACE: Vec2 = Vec2::new(1280.0, 720.0);

#[test]
fn drag_produces_one_splat_per_frame() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let config = SimConfig::default();
    let mut pointers = PointerSet::new();
    let mut scheduler = SplatScheduler::new();

    pointers.press(PointerId::Mouse, Vec2::new(640.0, 360.0), SURFACE, &mut rng);

    // Several motion events land between two frames; only one splat comes
    // out, carrying the last position.
    pointers.motion(PointerId::Mouse, Vec2::new(650.0, 360.0), SURFACE, &mut rng);
    pointers.motion(PointerId::Mouse, Vec2::new(660.0, 360.0), SURFACE, &mut rng);
    pointers.motion(PointerId::Mouse, Vec2::new(700.0, 360.0), SURFACE, &mut rng);

    let mut splats = Vec::new();
    scheduler.collect(
        1.0 / 60.0,
        config.auto_splat_interval,
        config.splat_force,
        &mut pointers,
        &mut rng,
        &mut splats,
    );
    assert_eq!(splats.len(), 1);
    assert!((splats[0].point.x - 700.0 / 1280.0).abs() < 1e-6);
    assert!(splats[0].force.x > 0.0);

    // Next frame without motion: nothing.
    splats.clear();
    scheduler.collect(
        1.0 / 60.0,
        config.auto_splat_interval,
        config.splat_force,
        &mut pointers,
        &mut rng,
        &mut splats,
    );
    assert!(splats.is_empty());
}

#[test]
fn idle_field_stays_alive_through_ambient_splats() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let config = SimConfig::default();
    let mut pointers = PointerSet::new();
    let mut scheduler = SplatScheduler::new();
    let mut splats = Vec::new();

    // Two simulated seconds of idle frames at 60 Hz.
    let mut total = 0;
    for _ in 0..120 {
        splats.clear();
        scheduler.collect(
            1.0 / 60.0,
            config.auto_splat_interval,
            config.splat_force,
            &mut pointers,
            &mut rng,
            &mut splats,
        );
        total += splats.len();
    }
    // 2.0 s of accumulated dt across a 1.5 s interval: exactly one firing.
    assert_eq!(total, 1);
}

#[test]
fn startup_seed_burst_flows_through() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let config = SimConfig::default();
    let mut pointers = PointerSet::new();
    let mut scheduler = SplatScheduler::new();

    scheduler.seed(&mut rng);
    let mut splats = Vec::new();
    scheduler.collect(
        1.0 / 60.0,
        config.auto_splat_interval,
        config.splat_force,
        &mut pointers,
        &mut rng,
        &mut splats,
    );
    assert!(splats.len() >= 8);
    for splat in &splats {
        assert!(splat.color.iter().all(|c| (0.0..=0.5).contains(c)));
    }
}

#[test]
fn recolor_changes_active_pointer_colors() {
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let config = SimConfig::default();
    let mut pointers = PointerSet::new();
    let mut timer = RecolorTimer::new();

    pointers.press(PointerId::Touch(1), Vec2::new(100.0, 100.0), SURFACE, &mut rng);
    let before = pointers.iter().next().unwrap().color;

    // 10x speed: fires within a tenth of a second of frames.
    let mut fired = false;
    for _ in 0..10 {
        if timer.tick(1.0 / 60.0, config.color_update_speed) {
            pointers.recolor(&mut rng);
            fired = true;
        }
    }
    assert!(fired);
    assert_ne!(pointers.iter().next().unwrap().color, before);
}
