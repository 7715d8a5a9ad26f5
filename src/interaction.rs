//! Pointer input to rotation, hover and drag state, plus the magnetic cursor.
//!
//! Pitch is clamped on the tween target, so no sequence of drag deltas can
//! push it past [`MAX_PITCH`]. There is no inertia: releasing a drag leaves
//! the rotation where the last move put it.

use std::f32::consts::FRAC_PI_3;

use instant::Duration;

use crate::{resources::animation::Easing, state::RenderState};

/// Radians of rotation per pixel of pointer travel.
pub const DRAG_SENSITIVITY: f32 = 0.01;
pub const MAX_PITCH: f32 = FRAC_PI_3;
pub const DRAG_TWEEN: Duration = Duration::from_millis(100);
pub const HOVER_TWEEN: Duration = Duration::from_millis(300);
pub const HOVER_SCALE: f32 = 1.1;
pub const HOVER_LIFT: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Enter,
    Leave,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerDevice {
    #[default]
    Mouse,
    Touch,
    Pen,
}

/// Where the event was observed. Window events continue a drag that started
/// on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerScope {
    #[default]
    Surface,
    Window,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub position: [f32; 2],
    pub device: PointerDevice,
    pub scope: PointerScope,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f32, y: f32) -> Self {
        Self {
            action,
            position: [x, y],
            device: PointerDevice::Mouse,
            scope: PointerScope::Surface,
        }
    }

    pub fn down(x: f32, y: f32) -> Self {
        Self::new(PointerAction::Down, x, y)
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self::new(PointerAction::Move, x, y)
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self::new(PointerAction::Up, x, y)
    }

    pub fn enter(x: f32, y: f32) -> Self {
        Self::new(PointerAction::Enter, x, y)
    }

    pub fn leave(x: f32, y: f32) -> Self {
        Self::new(PointerAction::Leave, x, y)
    }

    pub fn with_device(mut self, device: PointerDevice) -> Self {
        self.device = device;
        self
    }

    pub fn in_window(mut self) -> Self {
        self.scope = PointerScope::Window;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Drag {
    origin: [f32; 2],
    last: [f32; 2],
    /// Pitch and yaw targets when the drag started.
    baseline: (f32, f32),
}

#[derive(Clone, Debug)]
pub struct InteractionController {
    drag: Option<Drag>,
    pub sensitivity: f32,
    pub max_pitch: f32,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            drag: None,
            sensitivity: DRAG_SENSITIVITY,
            max_pitch: MAX_PITCH,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pitch and yaw when the current drag started.
    pub fn drag_baseline(&self) -> Option<(f32, f32)> {
        self.drag.map(|d| d.baseline)
    }

    /// Total pointer travel of the current drag.
    pub fn drag_extent(&self) -> Option<[f32; 2]> {
        self.drag
            .map(|d| [d.last[0] - d.origin[0], d.last[1] - d.origin[1]])
    }

    pub fn handle(&mut self, state: &mut RenderState, event: &PointerEvent, now: Duration) {
        state.pointer = event.position;
        match (event.action, event.scope) {
            (PointerAction::Enter, PointerScope::Surface) => self.set_hover(state, true, now),
            (PointerAction::Leave, _) | (PointerAction::Cancel, _) => {
                self.end_drag(state);
                if event.scope == PointerScope::Surface || event.action == PointerAction::Cancel {
                    self.set_hover(state, false, now);
                }
            }
            (PointerAction::Down, PointerScope::Surface) => {
                self.drag = Some(Drag {
                    origin: event.position,
                    last: event.position,
                    baseline: state.target_rotation(),
                });
                state.dragging = true;
            }
            (PointerAction::Move, _) => self.drag_to(state, event.position, now),
            (PointerAction::Up, _) => {
                self.drag_to(state, event.position, now);
                self.end_drag(state);
            }
            _ => {}
        }
    }

    fn drag_to(&mut self, state: &mut RenderState, position: [f32; 2], now: Duration) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let dx = position[0] - drag.last[0];
        let dy = position[1] - drag.last[1];
        drag.last = position;
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let (pitch, yaw) = state.target_rotation();
        let pitch = (pitch + dy * self.sensitivity).clamp(-self.max_pitch, self.max_pitch);
        let yaw = yaw + dx * self.sensitivity;
        state.rotation_x.set_target(pitch, now, DRAG_TWEEN, Easing::CubicOut);
        state.rotation_y.set_target(yaw, now, DRAG_TWEEN, Easing::CubicOut);
    }

    fn end_drag(&mut self, state: &mut RenderState) {
        self.drag = None;
        state.dragging = false;
    }

    fn set_hover(&mut self, state: &mut RenderState, hovered: bool, now: Duration) {
        if state.hovered == hovered {
            return;
        }
        state.hovered = hovered;
        let (scale, lift) = if hovered { (HOVER_SCALE, HOVER_LIFT) } else { (1.0, 0.0) };
        state.hover_scale.set_target(scale, now, HOVER_TWEEN, Easing::CubicOut);
        state.hover_lift.set_target(lift, now, HOVER_TWEEN, Easing::CubicOut);
    }
}

/// Screen-space rectangle of an interactive element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> [f32; 2] {
        [self.x + self.width * 0.5, self.y + self.height * 0.5]
    }

    pub fn contains(&self, p: [f32; 2]) -> bool {
        p[0] >= self.x && p[0] <= self.x + self.width && p[1] >= self.y && p[1] <= self.y + self.height
    }
}

/// Biases `pointer` toward the centre of `bounds` when within `threshold`
/// pixels of it. The pull grows linearly from nothing at the threshold to
/// `strength` (a fraction of the offset) at the centre.
pub fn magnetic_pull(pointer: [f32; 2], bounds: &Bounds, threshold: f32, strength: f32) -> [f32; 2] {
    let center = bounds.center();
    let dx = pointer[0] - center[0];
    let dy = pointer[1] - center[1];
    let distance = (dx * dx + dy * dy).sqrt();
    if threshold <= 0.0 || distance >= threshold {
        return pointer;
    }
    let pull = strength.clamp(0.0, 1.0) * (1.0 - distance / threshold);
    [pointer[0] - dx * pull, pointer[1] - dy * pull]
}

/// Decorative cursor that trails the pointer.
#[derive(Clone, Debug)]
pub struct CursorOverlay {
    pub position: [f32; 2],
    target: [f32; 2],
    pub visible: bool,
    pub enlarged: bool,
    /// Follow rate per second; higher is snappier.
    pub follow_rate: f32,
    pub threshold: f32,
    pub strength: f32,
}

impl Default for CursorOverlay {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            target: [0.0, 0.0],
            visible: false,
            enlarged: false,
            follow_rate: 18.0,
            threshold: 80.0,
            strength: 0.3,
        }
    }
}

impl CursorOverlay {
    pub fn on_pointer(&mut self, event: &PointerEvent, targets: &[Bounds]) {
        if event.device == PointerDevice::Touch {
            self.visible = false;
            self.enlarged = false;
            return;
        }
        if event.action == PointerAction::Leave {
            self.visible = false;
            return;
        }
        if !self.visible {
            self.position = event.position;
        }
        self.visible = true;
        self.enlarged = targets.iter().any(|b| b.contains(event.position));
        let nearest = targets.iter().min_by(|a, b| {
            dist2(a.center(), event.position).total_cmp(&dist2(b.center(), event.position))
        });
        self.target = match nearest {
            Some(bounds) => magnetic_pull(event.position, bounds, self.threshold, self.strength),
            None => event.position,
        };
    }

    pub fn target(&self) -> [f32; 2] {
        self.target
    }

    pub fn update(&mut self, dt: Duration) {
        let k = 1.0 - (-self.follow_rate * dt.as_secs_f32()).exp();
        self.position[0] += (self.target[0] - self.position[0]) * k;
        self.position[1] += (self.target[1] - self.position[1]) * k;
    }
}

fn dist2(a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn settled(state: &RenderState) -> (f32, f32) {
        let later = Duration::from_secs(10);
        (state.rotation_x.value(later), state.rotation_y.value(later))
    }

    #[test]
    fn vertical_drag_only_changes_pitch() {
        let mut controller = InteractionController::new();
        let mut state = RenderState::new();
        let t = Duration::from_millis(10);
        controller.handle(&mut state, &PointerEvent::down(100.0, 100.0), t);
        assert_eq!(controller.drag_baseline(), Some((0.0, 0.0)));
        controller.handle(&mut state, &PointerEvent::moved(100.0, 160.0), t);
        controller.handle(&mut state, &PointerEvent::up(100.0, 160.0), t);
        let (pitch, yaw) = settled(&state);
        assert!((pitch - 60.0 * DRAG_SENSITIVITY).abs() < 1e-6);
        assert_eq!(yaw, 0.0);
        assert!(!state.dragging);
    }

    #[test]
    fn pitch_never_leaves_its_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = InteractionController::new();
        let mut state = RenderState::new();
        let mut now = Duration::ZERO;
        let mut p = [400.0f32, 300.0];
        controller.handle(&mut state, &PointerEvent::down(p[0], p[1]), now);
        for _ in 0..2000 {
            p[0] += rng.gen_range(-80.0f32..80.0);
            p[1] += rng.gen_range(-120.0f32..140.0);
            now += Duration::from_millis(rng.gen_range(1..20));
            controller.handle(&mut state, &PointerEvent::moved(p[0], p[1]), now);
            assert!(state.rotation_x.target().abs() <= MAX_PITCH);
            assert!(state.rotation_x.value(now).abs() <= MAX_PITCH + 1e-5);
        }
    }

    #[test]
    fn leaving_mid_drag_clears_the_drag() {
        let mut controller = InteractionController::new();
        let mut state = RenderState::new();
        let t = Duration::ZERO;
        controller.handle(&mut state, &PointerEvent::enter(5.0, 5.0), t);
        controller.handle(&mut state, &PointerEvent::down(5.0, 5.0), t);
        assert!(state.dragging && state.hovered);
        controller.handle(&mut state, &PointerEvent::leave(-3.0, 5.0), t);
        assert!(!state.dragging && !state.hovered);
        assert!(!controller.is_dragging());
        // later moves do nothing
        controller.handle(&mut state, &PointerEvent::moved(50.0, 80.0).in_window(), t);
        assert_eq!(state.rotation_x.target(), 0.0);
    }

    #[test]
    fn window_moves_continue_a_surface_drag() {
        let mut controller = InteractionController::new();
        let mut state = RenderState::new();
        let t = Duration::ZERO;
        controller.handle(&mut state, &PointerEvent::down(0.0, 0.0), t);
        controller.handle(&mut state, &PointerEvent::moved(30.0, 0.0).in_window(), t);
        assert!((state.rotation_y.target() - 30.0 * DRAG_SENSITIVITY).abs() < 1e-6);
        assert_eq!(controller.drag_extent(), Some([30.0, 0.0]));
    }

    #[test]
    fn hover_pulses_scale_and_lift() {
        let mut controller = InteractionController::new();
        let mut state = RenderState::new();
        controller.handle(&mut state, &PointerEvent::enter(1.0, 1.0), Duration::ZERO);
        assert_eq!(state.hover_scale.target(), HOVER_SCALE);
        assert_eq!(state.hover_lift.value(HOVER_TWEEN), HOVER_LIFT);
        controller.handle(&mut state, &PointerEvent::leave(1.0, 1.0), HOVER_TWEEN);
        assert_eq!(state.hover_scale.value(HOVER_TWEEN * 2), 1.0);
    }

    #[test]
    fn magnetic_pull_is_proportional_to_proximity() {
        let target = Bounds::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(magnetic_pull([300.0, 50.0], &target, 100.0, 0.5), [300.0, 50.0]);
        assert_eq!(magnetic_pull([50.0, 50.0], &target, 100.0, 0.5), [50.0, 50.0]);
        let near = magnetic_pull([100.0, 50.0], &target, 100.0, 0.5);
        // halfway to the threshold, a quarter of the offset is removed
        assert!((near[0] - 87.5).abs() < 1e-4);
        assert_eq!(near[1], 50.0);
    }

    #[test]
    fn cursor_hides_on_touch_and_trails_the_pointer() {
        let mut cursor = CursorOverlay::default();
        cursor.on_pointer(&PointerEvent::moved(10.0, 10.0).with_device(PointerDevice::Touch), &[]);
        assert!(!cursor.visible);
        cursor.on_pointer(&PointerEvent::moved(10.0, 10.0), &[]);
        assert!(cursor.visible);
        cursor.on_pointer(&PointerEvent::moved(110.0, 10.0), &[]);
        cursor.update(Duration::from_millis(16));
        assert!(cursor.position[0] > 10.0 && cursor.position[0] < 110.0);
        for _ in 0..200 {
            cursor.update(Duration::from_millis(16));
        }
        assert!((cursor.position[0] - 110.0).abs() < 1e-2);
    }

    #[test]
    fn cursor_hides_when_the_pointer_leaves() {
        let mut cursor = CursorOverlay::default();
        let target = Bounds::new(0.0, 0.0, 100.0, 100.0);
        cursor.on_pointer(&PointerEvent::enter(50.0, 50.0), &[target]);
        assert!(cursor.visible && cursor.enlarged);
        cursor.on_pointer(&PointerEvent::leave(50.0, 0.0), &[target]);
        assert!(!cursor.visible);
    }
}
