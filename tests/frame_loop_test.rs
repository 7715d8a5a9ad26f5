mod common;

use common::test_utils::{Harness, display_refresh, ms};
use folio_scene::{
    Archetype, EngineConfig, EngineState, Environment, FrameOutcome, QualityTier,
    config::DeviceProfile,
    scroll::ViewportMetrics,
};
use instant::Duration;

#[test]
fn low_tier_caps_the_frame_rate() {
    let mut harness = Harness::running(Archetype::AbstractShapes, QualityTier::Low);
    let outcomes = harness.run_frames(Duration::ZERO, display_refresh(), 60);

    let rendered = outcomes.iter().filter(|o| **o == FrameOutcome::Rendered).count();
    let paced = outcomes.iter().filter(|o| **o == FrameOutcome::Paced).count();
    assert_eq!(outcomes.len(), 60);
    assert!(rendered <= 30, "{rendered} frames rendered in one second");
    assert!(rendered >= 25);
    assert_eq!(rendered + paced, 60);
    assert_eq!(harness.submitted(), rendered);
    assert_eq!(harness.pending(), 1);
}

#[test]
fn higher_tiers_render_every_callback() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::High);
    let outcomes = harness.run_frames(Duration::ZERO, display_refresh(), 30);
    assert!(outcomes.iter().all(|o| *o == FrameOutcome::Rendered));
    assert_eq!(harness.engine.stats().renders_submitted, 30);
}

#[test]
fn suspended_frames_reschedule_without_submitting() {
    let mut harness = Harness::running(Archetype::Workspace, QualityTier::Medium);
    harness.fire(ms(0));
    harness.engine.set_visible(false);

    let outcomes = harness.run_frames(ms(16), display_refresh(), 10);
    assert!(outcomes.iter().all(|o| *o == FrameOutcome::Suspended));
    assert_eq!(harness.submitted(), 1);
    assert_eq!(harness.pending(), 1);

    harness.engine.set_visible(true);
    assert_eq!(harness.engine.state(), EngineState::Running);
    assert_eq!(harness.fire(ms(400)), Some(FrameOutcome::Rendered));
    assert_eq!(harness.submitted(), 2);
}

#[test]
fn particle_buffer_keeps_its_length() {
    let mut harness = Harness::running(Archetype::AbstractShapes, QualityTier::Medium);
    harness.run_frames(Duration::ZERO, display_refresh(), 20);

    let ledger = harness.ledger.borrow();
    assert_eq!(ledger.points_uploaded, 1);
    assert!(ledger.point_updates > 0);
    assert!(ledger.frames.iter().all(|f| f.particles == 1000));
    assert_eq!(harness.engine.context().unwrap().particle_count(), 1000);
}

#[test]
fn code_scene_particles_stay_on_the_gpu() {
    let mut harness = Harness::running(Archetype::CodeScene, QualityTier::Medium);
    harness.run_frames(Duration::ZERO, display_refresh(), 10);
    let ledger = harness.ledger.borrow();
    assert_eq!(ledger.points_uploaded, 1);
    assert_eq!(ledger.point_updates, 0);
}

#[test]
fn reduced_motion_disables_idle_rotation() {
    let env = Environment {
        reduced_motion: true,
        ..Environment::default()
    };
    let config = EngineConfig::default().with_archetype(Archetype::Laptop);
    let mut harness = Harness::new(config, env);
    harness.engine.start().unwrap();
    harness.run_frames(Duration::ZERO, display_refresh(), 30);
    assert_eq!(harness.engine.render_state().idle_yaw, 0.0);
}

#[test]
fn idle_rotation_advances_with_time() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::High);
    harness.run_frames(Duration::ZERO, display_refresh(), 31);
    let yaw = harness.engine.render_state().idle_yaw;
    assert!(yaw > 0.1 && yaw < 0.2, "idle yaw {yaw}");
}

#[test]
fn pixel_ratio_is_clamped_to_the_tier() {
    let env = Environment {
        device: DeviceProfile {
            pixel_ratio: 3.0,
            ..DeviceProfile::default()
        },
        ..Environment::default()
    };
    let config = EngineConfig::default().with_quality(QualityTier::Medium);
    let harness = Harness::new(config, env);
    assert_eq!(harness.engine.render_state().uniforms.pixel_ratio, 1.5);
}

#[test]
fn settled_scroll_drives_progress() {
    let config = EngineConfig::default()
        .with_archetype(Archetype::Workspace)
        .with_scroll_bound(true);
    let mut harness = Harness::new(config, Environment::default());
    harness.engine.start().unwrap();
    harness.engine.on_scroll(ViewportMetrics::new(800.0, 700.0, 400.0), ms(0));
    harness.engine.on_scroll(ViewportMetrics::new(800.0, 200.0, 400.0), ms(10));

    harness.fire(ms(30));
    assert_eq!(harness.engine.render_state().scroll_progress, 0.0);
    harness.run_frames(ms(70), display_refresh(), 3);
    let progress = harness.engine.render_state().scroll_progress;
    assert!((progress - 0.5).abs() < 1e-6);
    assert_eq!(harness.engine.render_state().uniforms.scroll, progress);
}

#[test]
fn scroll_is_ignored_unless_bound() {
    let mut harness = Harness::running(Archetype::Workspace, QualityTier::High);
    harness.engine.on_scroll(ViewportMetrics::new(800.0, 200.0, 400.0), ms(0));
    harness.run_frames(ms(100), display_refresh(), 3);
    assert_eq!(harness.engine.render_state().scroll_progress, 0.0);
}

#[test]
fn resize_reaches_the_backend() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::High);
    harness.engine.resize(1280, 720);
    harness.engine.resize(0, 720);
    assert_eq!(harness.ledger.borrow().resizes.last(), Some(&(1280, 720)));
    assert_eq!(harness.engine.render_state().uniforms.viewport, [1280.0, 720.0]);
}

#[test]
fn lost_surface_is_reconfigured_and_the_loop_continues() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::High);
    harness.fire(ms(0));
    harness.ledger.borrow_mut().lose_surface(1);
    let resizes = harness.ledger.borrow().resizes.len();

    assert_eq!(harness.fire(ms(16)), Some(FrameOutcome::Rendered));
    assert_eq!(harness.engine.stats().surface_losses, 1);
    assert_eq!(harness.ledger.borrow().surface_losses, 1);
    assert_eq!(harness.ledger.borrow().resizes.len(), resizes + 1);
    assert_eq!(harness.pending(), 1);
    assert_eq!(harness.submitted(), 1);

    assert_eq!(harness.fire(ms(33)), Some(FrameOutcome::Rendered));
    assert_eq!(harness.submitted(), 2);
    assert_eq!(harness.engine.stats().renders_submitted, 2);
}

#[test]
fn callback_against_a_torn_down_surface_halts() {
    let mut harness = Harness::running(Archetype::AbstractShapes, QualityTier::Medium);
    harness.fire(ms(0));
    assert_eq!(harness.pending(), 1);
    // surface released behind the engine's back
    harness.ledger.borrow_mut().detached = true;

    assert_eq!(harness.fire(ms(16)), Some(FrameOutcome::Halted));
    assert_eq!(harness.pending(), 0);
    assert_eq!(harness.engine.pending_frame(), None);
    assert_eq!(harness.submitted(), 1);

    harness.engine.dispose();
    assert_eq!(harness.ledger.borrow().live_resources(), 0);
}
