//! Host application and event loop.
//!
//! The host plays the page around a placement: it owns the window (a canvas
//! on wasm32), decides when the engine is mounted through a
//! [`VisibilityGate`], forwards pointer, wheel and touch input, debounces
//! resizes and swaps in a static fallback when the engine cannot be built.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and feeds the initial visibility to the gate
//! 2. once the gate mounts, a [`GpuBackend`] is created (blocking on native,
//!    spawned and delivered through a user event on wasm32) and the engine starts
//! 3. every `RedrawRequested` fires the engine's pending frame callback
//! 4. wheel input moves a virtual page; far enough out of view the engine is
//!    disposed and the gate re-arms

use std::sync::Arc;

use instant::{Duration, Instant};
use log::{debug, error, info};
#[cfg(target_arch = "wasm32")]
use log::warn;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::Window,
};

use crate::{
    backend::gpu::GpuBackend,
    config::{DeviceProfile, EngineConfig, Environment},
    engine::{EngineState, FrameOutcome, SceneEngine},
    error::EngineError,
    interaction::{Bounds, CursorOverlay, PointerAction, PointerDevice, PointerEvent},
    schedule::{FrameHandle, FrameScheduler},
    scroll::{Debouncer, GateAction, RESIZE_DEBOUNCE, ViewportMetrics, VisibilityGate},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Pixels of virtual page travel per wheel line.
const WHEEL_LINE: f32 = 40.0;
/// Wake-up interval while a mount delay or a resize debounce is running.
const HOST_TICK: Duration = Duration::from_millis(25);

/// Options of one placement.
#[derive(Clone, Debug)]
pub struct HostOptions {
    pub config: EngineConfig,
    pub reduced_motion: bool,
    /// Id of the canvas element to render into (wasm32 only).
    pub canvas_id: String,
    pub title: String,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            reduced_motion: false,
            canvas_id: "canvas".to_string(),
            title: "folio-scene".to_string(),
        }
    }
}

/// Frame scheduler on top of winit redraw requests.
#[derive(Debug)]
pub struct WindowScheduler {
    window: Arc<Window>,
    next: u64,
    queued: Option<FrameHandle>,
}

impl WindowScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            next: 0,
            queued: None,
        }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.queued = Some(handle);
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.queued == Some(handle) {
            self.queued = None;
        }
    }

    fn pending(&self) -> usize {
        usize::from(self.queued.is_some())
    }
}

/// The window stands in for a placement on a page three viewports tall.
#[derive(Clone, Copy, Debug, Default)]
struct VirtualPage {
    offset: f32,
}

impl VirtualPage {
    fn scroll_by(&mut self, delta: f32, viewport_height: f32) {
        self.offset = (self.offset + delta).clamp(-3.0 * viewport_height, 3.0 * viewport_height);
    }

    fn metrics(&self, viewport_height: f32) -> ViewportMetrics {
        ViewportMetrics::new(viewport_height, -self.offset, viewport_height)
    }
}

/// Cursor entering or leaving the window. The window is the whole surface,
/// so both are surface-scoped.
fn cursor_crossing(entered: bool, [x, y]: [f32; 2]) -> PointerEvent {
    if entered {
        PointerEvent::enter(x, y)
    } else {
        PointerEvent::leave(x, y)
    }
}

/// Whether a backend requested by mount `delivered` may attach to the
/// current engine.
fn awaits_backend(current: u64, delivered: u64, state: EngineState) -> bool {
    current == delivered && state == EngineState::Uninitialized
}

type HostEngine = SceneEngine<GpuBackend, WindowScheduler>;

pub(crate) enum HostEvent {
    #[allow(dead_code)]
    BackendReady {
        /// Mount the backend was requested for.
        generation: u64,
        backend: Result<GpuBackend, EngineError>,
    },
}

impl std::fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendReady { generation, backend } => f
                .debug_struct("BackendReady")
                .field("generation", generation)
                .field("backend", &backend.as_ref().map(|_| "GpuBackend"))
                .finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<HostEvent>,
    options: HostOptions,
    window: Option<Arc<Window>>,
    env: Environment,
    engine: Option<HostEngine>,
    gate: VisibilityGate,
    page: VirtualPage,
    resize: Debouncer<PhysicalSize<u32>>,
    cursor: CursorOverlay,
    last_cursor: [f32; 2],
    clock: Instant,
    last_redraw: Option<Duration>,
    failed: bool,
    /// Bumped on every mount and unmount; backends delivered for an older
    /// generation are dropped.
    generation: u64,
}

impl App {
    fn new(event_loop: &EventLoop<HostEvent>, options: HostOptions) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            env: Environment {
                theme: options.config.descriptor.theme,
                reduced_motion: options.reduced_motion,
                ..Environment::default()
            },
            options,
            window: None,
            engine: None,
            gate: VisibilityGate::default(),
            page: VirtualPage::default(),
            resize: Debouncer::new(RESIZE_DEBOUNCE),
            cursor: CursorOverlay::default(),
            last_cursor: [0.0, 0.0],
            clock: Instant::now(),
            last_redraw: None,
            failed: false,
            generation: 0,
        })
    }

    fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    fn viewport_height(&self) -> f32 {
        self.window
            .as_ref()
            .map_or(1.0, |window| window.inner_size().height.max(1) as f32)
    }

    fn device_profile(window: &Window) -> DeviceProfile {
        let pixel_ratio = window.scale_factor() as f32;
        #[cfg(not(target_arch = "wasm32"))]
        {
            DeviceProfile {
                is_mobile: false,
                pixel_ratio,
                hardware_threads: std::thread::available_parallelism().map_or(4, |n| n.get()),
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            let (is_mobile, hardware_threads) = match web_sys::window() {
                Some(w) => {
                    let width = w.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(1024.0);
                    (width < 768.0, w.navigator().hardware_concurrency() as usize)
                }
                None => (false, 4),
            };
            DeviceProfile {
                is_mobile,
                pixel_ratio,
                hardware_threads,
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn prefers_reduced_motion() -> bool {
        web_sys::window()
            .and_then(|w| w.match_media("(prefers-reduced-motion: reduce)").ok().flatten())
            .is_some_and(|query| query.matches())
    }

    /// Feeds the current virtual scroll position to the gate and the engine.
    fn sync_visibility(&mut self, event_loop: &ActiveEventLoop) {
        if self.failed {
            return;
        }
        let now = self.now();
        let metrics = self.page.metrics(self.viewport_height());
        match self.gate.update(&metrics, now) {
            GateAction::Mount => self.mount_engine(event_loop),
            GateAction::Unmount => {
                self.generation += 1;
                if let Some(mut engine) = self.engine.take() {
                    info!("Placement scrolled far out of view, unmounting.");
                    engine.dispose();
                }
            }
            GateAction::None => {}
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.on_scroll(metrics, now);
            engine.set_visible(metrics.is_visible());
        }
    }

    fn mount_engine(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        self.generation += 1;
        let scheduler = WindowScheduler::new(window.clone());
        let mut engine: HostEngine = SceneEngine::new(self.options.config, self.env, scheduler);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let runtime = &self.async_runtime;
            let mounted = engine.mount(|tier| runtime.block_on(GpuBackend::new(window.clone(), tier)));
            match mounted.and_then(|_| engine.start()) {
                Ok(()) => {
                    let size = window.inner_size();
                    engine.resize(size.width, size.height);
                    self.engine = Some(engine);
                }
                Err(err) => self.fallback(&err, event_loop),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = event_loop;
            let tier = *engine.tier();
            let proxy = self.proxy.clone();
            let generation = self.generation;
            self.engine = Some(engine);
            wasm_bindgen_futures::spawn_local(async move {
                let backend = GpuBackend::new(window, &tier).await;
                if proxy.send_event(HostEvent::BackendReady { generation, backend }).is_err() {
                    warn!("Event loop closed before the backend was ready.");
                }
            });
        }
    }

    /// Error listener: the placement shows its static fallback instead.
    fn fallback(&mut self, err: &EngineError, event_loop: &ActiveEventLoop) {
        error!("Scene unavailable, showing the static fallback: {}", err);
        self.failed = true;
        self.resize.cancel();
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        #[cfg(target_arch = "wasm32")]
        {
            let _ = event_loop;
            let canvas = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.get_element_by_id(&self.options.canvas_id));
            if let Some(canvas) = canvas {
                if canvas.set_attribute("data-fallback", "true").is_err() {
                    warn!("Could not mark the canvas as fallback.");
                }
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        event_loop.exit();
    }

    fn pointer(&mut self, event: PointerEvent) {
        let targets = self.targets();
        self.cursor.on_pointer(&event, &targets);
        let now = self.now();
        if let Some(engine) = self.engine.as_mut() {
            engine.handle_pointer(&event, now);
        }
    }

    /// The whole surface is the one interactive target.
    fn targets(&self) -> Vec<Bounds> {
        match &self.window {
            Some(window) => {
                let size = window.inner_size();
                vec![Bounds::new(0.0, 0.0, size.width as f32, size.height as f32)]
            }
            None => Vec::new(),
        }
    }

    fn touch(&mut self, touch: Touch) {
        let [x, y] = [touch.location.x as f32, touch.location.y as f32];
        let action = match touch.phase {
            TouchPhase::Started => PointerAction::Down,
            TouchPhase::Moved => PointerAction::Move,
            TouchPhase::Ended => PointerAction::Up,
            TouchPhase::Cancelled => PointerAction::Cancel,
        };
        self.pointer(PointerEvent::new(action, x, y).with_device(PointerDevice::Touch));
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = self.now();
        let dt = self.last_redraw.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_redraw = Some(now);
        self.cursor.update(dt);

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let Some(handle) = engine.pending_frame() else {
            return;
        };
        if engine.on_frame(handle, now) == FrameOutcome::Halted && engine.state() == EngineState::Running {
            let err = EngineError::Backend("render loop halted".to_string());
            self.fallback(&err, event_loop);
        }
    }
}

impl ApplicationHandler<HostEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(self.options.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.get_element_by_id(&self.options.canvas_id))
                .and_then(|e| e.dyn_into::<web_sys::HtmlCanvasElement>().ok());
            match canvas {
                Some(canvas) => window_attributes = window_attributes.with_canvas(Some(canvas)),
                None => {
                    let err = EngineError::SurfaceUnavailable(format!("no canvas with id '{}'", self.options.canvas_id));
                    self.fallback(&err, event_loop);
                    return;
                }
            }
            if Self::prefers_reduced_motion() {
                self.env.reduced_motion = true;
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                let err = EngineError::SurfaceUnavailable(e.to_string());
                self.fallback(&err, event_loop);
                return;
            }
        };
        self.env.device = Self::device_profile(&window);
        debug!("Device profile {:?}", self.env.device);
        self.window = Some(window);
        self.sync_visibility(event_loop);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        match event {
            HostEvent::BackendReady { generation, backend } => {
                let Some(engine) = self.engine.as_mut() else {
                    debug!("Backend arrived after the placement was unmounted.");
                    return;
                };
                if !awaits_backend(self.generation, generation, engine.state()) {
                    debug!(
                        "Dropping backend of mount {} (current mount {}, {}).",
                        generation,
                        self.generation,
                        engine.state().name()
                    );
                    return;
                }
                let result = engine.mount(move |_| backend).and_then(|_| engine.start());
                match result {
                    Ok(()) => {
                        if let Some(window) = &self.window {
                            let size = window.inner_size();
                            engine.resize(size.width, size.height);
                        }
                    }
                    Err(err) => self.fallback(&err, event_loop),
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.failed {
            return;
        }
        let now = self.now();
        if self.gate.poll(now) == GateAction::Mount {
            self.mount_engine(event_loop);
        }
        if let Some(size) = self.resize.poll(now) {
            debug!("Resize settled at {}x{}", size.width, size.height);
            if let Some(engine) = self.engine.as_mut() {
                engine.resize(size.width, size.height);
            }
        }
        let waiting_on_gate = self.engine.is_none() && self.window.is_some() && !self.gate.is_mounted();
        event_loop.set_control_flow(if waiting_on_gate || self.resize.is_pending() {
            ControlFlow::wait_duration(HOST_TICK)
        } else {
            ControlFlow::Wait
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut engine) = self.engine.take() {
                    engine.dispose();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let now = self.now();
                self.resize.push(size, now);
                self.sync_visibility(event_loop);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::CursorMoved { position, .. } => {
                let [x, y] = [position.x as f32, position.y as f32];
                self.last_cursor = [x, y];
                let mut event = PointerEvent::moved(x, y);
                let outside = self.targets().first().is_some_and(|b| !b.contains([x, y]));
                if outside {
                    event = event.in_window();
                }
                self.pointer(event);
            }
            WindowEvent::CursorEntered { .. } => self.pointer(cursor_crossing(true, self.last_cursor)),
            WindowEvent::CursorLeft { .. } => self.pointer(cursor_crossing(false, self.last_cursor)),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let [x, y] = self.last_cursor;
                match state {
                    ElementState::Pressed => self.pointer(PointerEvent::down(x, y)),
                    ElementState::Released => self.pointer(PointerEvent::up(x, y)),
                }
            }
            WindowEvent::Touch(touch) => self.touch(touch),
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE,
                    MouseScrollDelta::PixelDelta(p) => -p.y as f32,
                };
                let vh = self.viewport_height();
                self.page.scroll_by(dy, vh);
                self.sync_visibility(event_loop);
            }
            _ => {}
        }
    }
}

/// Opens one placement and runs until it is closed.
pub fn run(options: HostOptions) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&JsValue::from_str(&format!("Could not initialize logger: {}", e)));
        }
    }

    let event_loop: EventLoop<HostEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, options)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_page_spans_visible_and_far_away() {
        let mut page = VirtualPage::default();
        assert!(page.metrics(600.0).is_visible());
        page.scroll_by(2000.0, 600.0);
        let metrics = page.metrics(600.0);
        assert!(!metrics.is_visible());
        assert!(metrics.distance_outside() > 1.5);
        page.scroll_by(1e6, 600.0);
        assert_eq!(page.offset, 1800.0);
    }

    #[test]
    fn only_the_latest_mount_takes_a_backend() {
        assert!(awaits_backend(2, 2, EngineState::Uninitialized));
        // a backend from before an unmount and remount
        assert!(!awaits_backend(3, 2, EngineState::Uninitialized));
        // a second delivery after the engine already mounted
        assert!(!awaits_backend(3, 3, EngineState::Running));
        assert!(!awaits_backend(3, 3, EngineState::Disposed));
    }

    #[test]
    fn cursor_leaving_the_window_ends_hover() {
        use crate::{backend::headless::HeadlessBackend, schedule::ManualScheduler};

        let scheduler = ManualScheduler::new();
        let mut engine: SceneEngine<HeadlessBackend, ManualScheduler> =
            SceneEngine::new(EngineConfig::default(), Environment::default(), scheduler.clone());
        engine.mount(|_| Ok(HeadlessBackend::new(800, 600))).unwrap();
        engine.start().unwrap();

        engine.handle_pointer(&cursor_crossing(true, [50.0, 50.0]), Duration::ZERO);
        assert!(engine.render_state().hovered);
        engine.handle_pointer(&cursor_crossing(false, [50.0, 0.0]), Duration::from_millis(5));
        assert!(!engine.render_state().hovered);
        assert_eq!(engine.render_state().hover_scale.target(), 1.0);

        for i in 0..60u32 {
            let handle = scheduler.take_next().unwrap();
            engine.on_frame(handle, Duration::from_millis(10) + Duration::from_micros(16_667) * i);
        }
        assert!(engine.render_state().idle_yaw > 0.0);

        let mut cursor = CursorOverlay::default();
        cursor.on_pointer(&cursor_crossing(true, [50.0, 50.0]), &[]);
        cursor.on_pointer(&cursor_crossing(false, [50.0, 0.0]), &[]);
        assert!(!cursor.visible);
    }
}
