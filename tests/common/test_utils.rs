use std::{cell::RefCell, rc::Rc};

use folio_scene::{
    Archetype, EngineConfig, Environment, FrameOutcome, QualityTier, SceneEngine,
    backend::headless::{HeadlessBackend, Ledger},
    schedule::{FrameScheduler, ManualScheduler},
};
use instant::Duration;

pub type TestEngine = SceneEngine<HeadlessBackend, ManualScheduler>;

/// One engine on a headless backend with the handles a test needs to look
/// inside it after the backend has moved.
pub struct Harness {
    pub engine: TestEngine,
    pub scheduler: ManualScheduler,
    pub ledger: Rc<RefCell<Ledger>>,
}

impl Harness {
    pub fn new(config: EngineConfig, env: Environment) -> Self {
        let scheduler = ManualScheduler::new();
        let backend = HeadlessBackend::new(800, 600);
        let ledger = backend.ledger();
        let mut engine = SceneEngine::new(config, env, scheduler.clone());
        engine.mount(move |_| Ok(backend)).unwrap();
        Self {
            engine,
            scheduler,
            ledger,
        }
    }

    pub fn running(archetype: Archetype, quality: QualityTier) -> Self {
        let config = EngineConfig::default()
            .with_archetype(archetype)
            .with_quality(quality);
        let mut harness = Self::new(config, Environment::default());
        harness.engine.start().unwrap();
        harness
    }

    /// Fires the next queued callback at `now`.
    pub fn fire(&mut self, now: Duration) -> Option<FrameOutcome> {
        let handle = self.scheduler.take_next()?;
        Some(self.engine.on_frame(handle, now))
    }

    /// Fires `count` callbacks, `step` apart, starting at `start`.
    pub fn run_frames(&mut self, start: Duration, step: Duration, count: u32) -> Vec<FrameOutcome> {
        (0..count)
            .filter_map(|i| self.fire(start + step * i))
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn submitted(&self) -> usize {
        self.ledger.borrow().frames.len()
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Callback spacing of a 60 Hz display.
pub fn display_refresh() -> Duration {
    Duration::from_micros(16_667)
}
