mod common;

use common::test_utils::{Harness, display_refresh, ms};
use folio_scene::{
    Archetype, EngineConfig, EngineError, EngineState, Environment, FrameOutcome, QualityTier,
    SceneEngine,
    backend::headless::HeadlessBackend,
    schedule::{FrameScheduler, ManualScheduler},
};

#[test]
fn abstract_scene_on_low_tier() {
    let mut harness = Harness::running(Archetype::AbstractShapes, QualityTier::Low);
    let ctx = harness.engine.context().unwrap();
    assert_eq!(ctx.build.object_count(), 10);
    assert_eq!(ctx.particle_count(), 500);

    assert_eq!(harness.fire(ms(0)), Some(FrameOutcome::Rendered));
    let ledger = harness.ledger.borrow();
    let frame = ledger.frames[0];
    assert_eq!(frame.points, 1);
    assert_eq!(frame.particles, 500);
    assert_eq!(frame.opaque + frame.transparent, 10);
}

#[test]
fn dispose_twice_is_a_no_op() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::Medium);
    harness.run_frames(ms(0), display_refresh(), 5);
    harness.engine.dispose();
    let released = harness.ledger.borrow().released;
    harness.engine.dispose();

    let ledger = harness.ledger.borrow();
    assert_eq!(harness.engine.state(), EngineState::Disposed);
    assert_eq!(harness.pending(), 0);
    assert_eq!(ledger.live_resources(), 0);
    assert_eq!(ledger.released, released);
    assert_eq!(ledger.double_releases, 0);
    assert!(ledger.detached);
}

#[test]
fn unmount_before_the_first_frame() {
    let mut harness = Harness::running(Archetype::CodeScene, QualityTier::High);
    assert_eq!(harness.pending(), 1);
    harness.engine.dispose();

    assert_eq!(harness.pending(), 0);
    assert_eq!(harness.submitted(), 0);
    let stats = harness.engine.stats();
    assert_eq!(stats.renders_submitted, 0);
    assert!(stats.resources.is_balanced());
    assert!(stats.resources.allocated() > 0);
    assert_eq!(harness.ledger.borrow().live_resources(), 0);
}

#[test]
fn every_allocation_is_released() {
    for archetype in Archetype::ALL {
        let mut harness = Harness::running(archetype, QualityTier::Ultra);
        harness.run_frames(ms(0), display_refresh(), 10);
        let uploads = harness.ledger.borrow().uploads();
        drop(harness.engine);

        let ledger = harness.ledger.borrow();
        assert_eq!(ledger.live_resources(), 0, "{archetype} leaked resources");
        assert_eq!(ledger.released, uploads);
    }
}

#[test]
fn failed_factory_leaves_nothing_behind() {
    let scheduler = ManualScheduler::new();
    let mut engine: SceneEngine<HeadlessBackend, ManualScheduler> =
        SceneEngine::new(EngineConfig::default(), Environment::default(), scheduler.clone());
    let result = engine.mount(|_| Err(EngineError::AdapterUnavailable("no adapter".into())));

    let err = result.unwrap_err();
    assert!(err.is_construction_failure());
    assert_eq!(engine.state(), EngineState::Disposed);
    assert!(engine.start().is_err());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn allocation_failure_midway_releases_the_partial_scene() {
    let scheduler = ManualScheduler::new();
    let backend = HeadlessBackend::failing_after(800, 600, 4);
    let ledger = backend.ledger();
    let config = EngineConfig::default()
        .with_archetype(Archetype::Workspace)
        .with_quality(QualityTier::High);
    let mut engine = SceneEngine::new(config, Environment::default(), scheduler.clone());

    assert!(engine.mount(move |_| Ok(backend)).is_err());
    assert_eq!(engine.state(), EngineState::Disposed);
    assert_eq!(ledger.borrow().live_resources(), 0);
    assert_eq!(ledger.borrow().double_releases, 0);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn frames_after_dispose_are_stale() {
    let mut harness = Harness::running(Archetype::Laptop, QualityTier::Low);
    let handle = harness.scheduler.take_next().unwrap();
    harness.engine.dispose();
    assert_eq!(harness.engine.on_frame(handle, ms(0)), FrameOutcome::Stale);
    assert_eq!(harness.submitted(), 0);
}
