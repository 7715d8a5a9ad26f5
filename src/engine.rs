//! The per-placement engine: lifecycle state machine and frame callback.
//!
//! ```text
//! Uninitialized --mount--> Mounted --start--> Running <--set_visible--> Suspended
//!        \                    |                  |                         |
//!         `-------------------+------dispose-----+-------------------------'--> Disposed
//! ```
//!
//! The engine is driven from outside: the host owns the [`FrameScheduler`]
//! and calls [`SceneEngine::on_frame`] when a requested callback fires, and
//! forwards pointer, scroll and resize events as they arrive. All of it runs
//! on one thread; event handlers only write [`RenderState`], the frame
//! callback reads it.

use instant::Duration;
use log::{debug, error, info, warn};

use crate::{
    backend::RenderBackend,
    config::{EngineConfig, Environment, TierProfile},
    context::{ResourceCounters, SceneContext},
    error::EngineError,
    interaction::{InteractionController, PointerEvent},
    schedule::{FrameHandle, FramePacer, FrameScheduler},
    scroll::{ScrollBinder, ViewportMetrics},
    state::RenderState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Mounted,
    Running,
    Suspended,
    Disposed,
}

impl EngineState {
    pub fn name(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Mounted => "Mounted",
            EngineState::Running => "Running",
            EngineState::Suspended => "Suspended",
            EngineState::Disposed => "Disposed",
        }
    }
}

/// What a frame callback did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and the next callback requested.
    Rendered,
    /// Skipped by the frame cap, next callback requested.
    Paced,
    /// Out of view: nothing submitted, next callback requested.
    Suspended,
    /// The callback chain ended here.
    Halted,
    /// The handle was not the pending callback and was ignored.
    Stale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub renders_submitted: u64,
    pub frames_paced: u64,
    pub frames_suspended: u64,
    pub surface_losses: u64,
    pub resources: ResourceCounters,
}

pub struct SceneEngine<B: RenderBackend, S: FrameScheduler> {
    config: EngineConfig,
    env: Environment,
    tier: TierProfile,
    scheduler: S,
    state: EngineState,
    ctx: Option<SceneContext<B>>,
    render_state: RenderState,
    interaction: InteractionController,
    scroll: ScrollBinder,
    pacer: FramePacer,
    pending: Option<FrameHandle>,
    started_at: Option<Duration>,
    last_frame: Option<Duration>,
    stats: EngineStats,
    /// Counters of contexts torn down by a rebuild.
    retired: ResourceCounters,
}

impl<B: RenderBackend, S: FrameScheduler> SceneEngine<B, S> {
    pub fn new(config: EngineConfig, env: Environment, scheduler: S) -> Self {
        let tier = config.descriptor.quality.profile(&env.device);
        let mut render_state = RenderState::new();
        render_state.uniforms.pixel_ratio = env.device.pixel_ratio.clamp(1.0, tier.max_pixel_ratio);
        Self {
            config,
            env,
            tier,
            scheduler,
            state: EngineState::Uninitialized,
            ctx: None,
            render_state,
            interaction: InteractionController::new(),
            scroll: ScrollBinder::new(),
            pacer: FramePacer::new(tier.frame_interval),
            pending: None,
            started_at: None,
            last_frame: None,
            stats: EngineStats::default(),
            retired: ResourceCounters::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tier(&self) -> &TierProfile {
        &self.tier
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    pub fn context(&self) -> Option<&SceneContext<B>> {
        self.ctx.as_ref()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = self.stats;
        stats.resources = self.retired;
        if let Some(ctx) = &self.ctx {
            stats.resources += ctx.counters();
        }
        stats
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Attaches to the surface `factory` creates and builds the scene.
    ///
    /// A failure leaves the engine `Disposed` with nothing allocated; the host
    /// decides whether to show its fallback.
    pub fn mount<F>(&mut self, factory: F) -> Result<(), EngineError>
    where
        F: FnOnce(&TierProfile) -> Result<B, EngineError>,
    {
        if self.state != EngineState::Uninitialized {
            return Err(self.invalid("mount"));
        }
        match factory(&self.tier).and_then(|backend| SceneContext::new(backend, &self.config, &self.env)) {
            Ok(mut ctx) => {
                let (width, height) = ctx.surface_size().unwrap_or((1, 1));
                ctx.resize(width, height);
                self.render_state.uniforms.viewport = [width as f32, height as f32];
                self.ctx = Some(ctx);
                self.state = EngineState::Mounted;
                Ok(())
            }
            Err(err) => {
                error!("Could not mount the scene: {}", err);
                self.state = EngineState::Disposed;
                Err(err)
            }
        }
    }

    /// Requests the first frame.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Mounted {
            return Err(self.invalid("start"));
        }
        self.state = EngineState::Running;
        self.schedule();
        Ok(())
    }

    fn schedule(&mut self) {
        if let Some(previous) = self.pending.take() {
            self.scheduler.cancel_frame(previous);
        }
        self.pending = Some(self.scheduler.request_frame());
    }

    /// Frame callback for `handle`, fired at timestamp `now`.
    pub fn on_frame(&mut self, handle: FrameHandle, now: Duration) -> FrameOutcome {
        if self.pending != Some(handle) {
            return FrameOutcome::Stale;
        }
        self.pending = None;

        if !self.ctx.as_ref().is_some_and(SceneContext::is_live) {
            warn!("Frame callback without live resources in state {}, stopping.", self.state.name());
            return FrameOutcome::Halted;
        }
        match self.state {
            EngineState::Running => {}
            EngineState::Suspended => {
                self.stats.frames_suspended += 1;
                self.schedule();
                return FrameOutcome::Suspended;
            }
            other => {
                warn!("Frame callback in state {}, stopping.", other.name());
                return FrameOutcome::Halted;
            }
        }
        if !self.pacer.should_render(now) {
            self.stats.frames_paced += 1;
            self.schedule();
            return FrameOutcome::Paced;
        }

        self.update(now);
        let Some(ctx) = self.ctx.as_mut() else {
            return FrameOutcome::Halted;
        };
        match ctx.submit() {
            Ok(()) => {
                self.stats.renders_submitted += 1;
                self.schedule();
                FrameOutcome::Rendered
            }
            Err(EngineError::SurfaceLost) => {
                debug!("Surface lost, reconfiguring on the next frame.");
                self.stats.surface_losses += 1;
                if let Some((width, height)) = ctx.surface_size() {
                    ctx.resize(width, height);
                }
                self.schedule();
                FrameOutcome::Rendered
            }
            Err(err) => {
                error!("Frame submission failed, stopping the render loop: {}", err);
                FrameOutcome::Halted
            }
        }
    }

    fn update(&mut self, now: Duration) {
        let started_at = *self.started_at.get_or_insert(now);
        let dt = self.last_frame.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_frame = Some(now);

        if self.config.scroll_bound {
            self.scroll.poll(&mut self.render_state, now);
        }
        let idle = self.config.auto_rotate && !self.env.reduced_motion;
        self.render_state.advance_idle(dt, idle);
        let elapsed = now.saturating_sub(started_at);
        self.render_state.uniforms.time = elapsed.as_secs_f32();
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.update(&self.render_state, now, elapsed);
        }
    }

    /// Visibility from the host's intersection signal.
    pub fn set_visible(&mut self, visible: bool) {
        match (self.state, visible) {
            (EngineState::Running, false) => {
                debug!("Out of view, suspending frame submission.");
                self.state = EngineState::Suspended;
            }
            (EngineState::Suspended, true) => {
                debug!("Back in view, resuming.");
                self.state = EngineState::Running;
            }
            _ => {}
        }
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent, now: Duration) {
        if matches!(self.state, EngineState::Uninitialized | EngineState::Disposed) {
            return;
        }
        self.interaction.handle(&mut self.render_state, event, now);
        let [width, height] = self.render_state.uniforms.viewport;
        let [x, y] = event.position;
        self.render_state.uniforms.pointer = [
            (x / width.max(1.0)) * 2.0 - 1.0,
            1.0 - (y / height.max(1.0)) * 2.0,
        ];
    }

    pub fn is_dragging(&self) -> bool {
        self.interaction.is_dragging()
    }

    /// Scroll or layout change of the bound container. Ignored unless the
    /// engine was configured as scroll bound.
    pub fn on_scroll(&mut self, metrics: ViewportMetrics, now: Duration) {
        if self.config.scroll_bound {
            self.scroll.on_scroll(metrics, now);
        }
    }

    /// New surface size in physical pixels (already debounced by the host).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.resize(width, height);
        }
        self.render_state.uniforms.viewport = [width as f32, height as f32];
    }

    /// Applies a new configuration. A changed descriptor tears the scene down
    /// and rebuilds it on a surface from `factory`; anything else is applied
    /// in place.
    pub fn reconfigure<F>(&mut self, config: EngineConfig, factory: F) -> Result<(), EngineError>
    where
        F: FnOnce(&TierProfile) -> Result<B, EngineError>,
    {
        if self.state == EngineState::Disposed {
            return Err(self.invalid("reconfigure"));
        }
        let rebuild = config.descriptor != self.config.descriptor;
        self.config = config;
        if !rebuild {
            return Ok(());
        }
        let was = self.state;
        info!("Configuration changed, rebuilding the scene.");
        self.teardown();
        self.tier = config.descriptor.quality.profile(&self.env.device);
        self.pacer = FramePacer::new(self.tier.frame_interval);
        self.render_state.uniforms.pixel_ratio = self.env.device.pixel_ratio.clamp(1.0, self.tier.max_pixel_ratio);
        self.started_at = None;
        self.last_frame = None;
        self.state = EngineState::Uninitialized;
        if was == EngineState::Uninitialized {
            return Ok(());
        }
        self.mount(factory)?;
        match was {
            EngineState::Running => self.start(),
            EngineState::Suspended => {
                self.start()?;
                self.set_visible(false);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(mut ctx) = self.ctx.take() {
            ctx.dispose();
            self.retired += ctx.counters();
        }
        self.pacer.reset();
    }

    /// Cancels the pending frame and releases every resource. Safe to call
    /// any number of times.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed && self.ctx.is_none() && self.pending.is_none() {
            return;
        }
        if self.state == EngineState::Uninitialized && self.ctx.is_none() {
            debug!("Disposing an engine that was never mounted.");
            self.state = EngineState::Disposed;
            return;
        }
        self.teardown();
        self.interaction = InteractionController::new();
        self.render_state.dragging = false;
        self.state = EngineState::Disposed;
        info!("Scene disposed after {} rendered frames.", self.stats.renders_submitted);
    }
}

impl<B: RenderBackend, S: FrameScheduler> Drop for SceneEngine<B, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::headless::HeadlessBackend,
        config::{Archetype, QualityTier},
        schedule::ManualScheduler,
    };

    fn engine(archetype: Archetype) -> (SceneEngine<HeadlessBackend, ManualScheduler>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let config = EngineConfig::default()
            .with_archetype(archetype)
            .with_quality(QualityTier::Low);
        (SceneEngine::new(config, Environment::default(), scheduler.clone()), scheduler)
    }

    #[test]
    fn lifecycle_follows_the_state_machine() {
        let (mut engine, scheduler) = engine(Archetype::Laptop);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.start().is_err());
        engine.mount(|_| Ok(HeadlessBackend::new(640, 480))).unwrap();
        assert_eq!(engine.state(), EngineState::Mounted);
        assert!(engine.mount(|_| Ok(HeadlessBackend::new(640, 480))).is_err());
        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(scheduler.pending(), 1);
        engine.set_visible(false);
        assert_eq!(engine.state(), EngineState::Suspended);
        engine.set_visible(true);
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn never_mounted_engine_disposes_quietly() {
        let (mut engine, scheduler) = engine(Archetype::Workspace);
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert_eq!(scheduler.requested(), 0);
        assert_eq!(scheduler.cancelled(), 0);
        assert_eq!(engine.stats(), EngineStats::default());
        assert!(engine.mount(|_| Ok(HeadlessBackend::new(640, 480))).is_err());
    }

    #[test]
    fn stale_handles_are_ignored() {
        let (mut engine, scheduler) = engine(Archetype::Laptop);
        engine.mount(|_| Ok(HeadlessBackend::new(640, 480))).unwrap();
        engine.start().unwrap();
        let handle = scheduler.take_next().unwrap();
        assert_eq!(engine.on_frame(FrameHandle(handle.0 + 100), Duration::ZERO), FrameOutcome::Stale);
        assert_eq!(engine.on_frame(handle, Duration::ZERO), FrameOutcome::Rendered);
        assert_eq!(engine.on_frame(handle, Duration::from_millis(16)), FrameOutcome::Stale);
    }

    #[test]
    fn in_place_reconfigure_keeps_the_scene() {
        let (mut engine, _scheduler) = engine(Archetype::CodeScene);
        engine.mount(|_| Ok(HeadlessBackend::new(640, 480))).unwrap();
        let config = engine.config().with_auto_rotate(false);
        engine
            .reconfigure(config, |_| Err(EngineError::SurfaceUnavailable("unused".into())))
            .unwrap();
        assert_eq!(engine.state(), EngineState::Mounted);
        assert_eq!(engine.stats().resources.disposed(), 0);
    }

    #[test]
    fn descriptor_change_rebuilds() {
        let (mut engine, scheduler) = engine(Archetype::Laptop);
        let first = HeadlessBackend::new(640, 480);
        let first_ledger = first.ledger();
        engine.mount(|_| Ok(first)).unwrap();
        engine.start().unwrap();
        let config = engine.config().with_archetype(Archetype::AbstractShapes);
        engine.reconfigure(config, |_| Ok(HeadlessBackend::new(640, 480))).unwrap();

        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(first_ledger.borrow().live_resources(), 0);
        assert!(first_ledger.borrow().detached);
        assert_eq!(scheduler.pending(), 1);
        let ctx = engine.context().unwrap();
        assert_eq!(ctx.build.object_count(), 10);
    }
}
