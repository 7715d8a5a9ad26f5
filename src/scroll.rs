//! Scroll position and viewport intersection.
//!
//! Scroll and resize events are debounced; when a burst settles the binder
//! maps the container's travel through the viewport to a progress value in
//! `[0, 1]` and retargets the scroll-driven tweens in [`RenderState`].
//! [`VisibilityGate`] decides separately whether the placement should have an
//! engine mounted at all.

use std::f32::consts::PI;

use instant::Duration;

use crate::{resources::animation::Easing, state::RenderState};

pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(50);
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);
pub const SCROLL_TWEEN: Duration = Duration::from_millis(500);
pub const MOUNT_DELAY: Duration = Duration::from_millis(200);
/// Out-of-view distance, in viewport heights, after which a mounted engine is dropped.
pub const UNMOUNT_DISTANCE: f32 = 1.5;
/// Yaw swept over the full scroll range.
pub const ROTATION_SWEEP: f32 = PI;

/// Container geometry relative to the viewport, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMetrics {
    pub viewport_height: f32,
    /// Distance from the viewport top to the container top; negative once scrolled past.
    pub element_top: f32,
    pub element_height: f32,
}

impl ViewportMetrics {
    pub fn new(viewport_height: f32, element_top: f32, element_height: f32) -> Self {
        Self {
            viewport_height,
            element_top,
            element_height,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.element_top < self.viewport_height && self.element_top + self.element_height > 0.0
    }

    /// How far outside the viewport the container is, in viewport heights.
    pub fn distance_outside(&self) -> f32 {
        let vh = self.viewport_height.max(1.0);
        let bottom = self.element_top + self.element_height;
        if bottom < 0.0 {
            -bottom / vh
        } else if self.element_top > self.viewport_height {
            (self.element_top - self.viewport_height) / vh
        } else {
            0.0
        }
    }
}

/// 0 while the container is fully below the viewport, 1 once fully above it.
pub fn scroll_progress(metrics: &ViewportMetrics) -> f32 {
    let range = metrics.viewport_height + metrics.element_height;
    if range <= 0.0 {
        return 0.0;
    }
    ((metrics.viewport_height - metrics.element_top) / range).clamp(0.0, 1.0)
}

/// Values derived from scroll progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollMapping {
    pub rotation: f32,
    pub scale: f32,
    pub offset: f32,
    pub light_intensity: f32,
}

impl ScrollMapping {
    pub fn derive(progress: f32) -> Self {
        let p = progress.clamp(0.0, 1.0);
        let eased = Easing::SineInOut.apply(p);
        Self {
            rotation: eased * ROTATION_SWEEP,
            scale: 0.9 + 0.2 * eased,
            offset: (0.5 - p) * 0.8,
            // brightest while centred in the viewport
            light_intensity: 0.6 + 0.8 * (p * PI).sin(),
        }
    }
}

/// Keeps only the last value of a burst, released once `delay` has passed
/// without a newer one.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Duration)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replaces any pending value and restarts the timer.
    pub fn push(&mut self, value: T, now: Duration) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Maps settled scroll positions onto the scroll tweens.
#[derive(Clone, Debug)]
pub struct ScrollBinder {
    debouncer: Debouncer<ViewportMetrics>,
    last: Option<ScrollMapping>,
}

impl Default for ScrollBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollBinder {
    pub fn new() -> Self {
        Self {
            debouncer: Debouncer::new(SCROLL_DEBOUNCE),
            last: None,
        }
    }

    pub fn on_scroll(&mut self, metrics: ViewportMetrics, now: Duration) {
        self.debouncer.push(metrics, now);
    }

    pub fn last_mapping(&self) -> Option<ScrollMapping> {
        self.last
    }

    /// Applies a settled scroll position, if any. Returns whether one was applied.
    pub fn poll(&mut self, state: &mut RenderState, now: Duration) -> bool {
        let Some(metrics) = self.debouncer.poll(now) else {
            return false;
        };
        let progress = scroll_progress(&metrics);
        let mapping = ScrollMapping::derive(progress);
        state.scroll_progress = progress;
        state.uniforms.scroll = progress;
        state.scroll_rotation.set_target(mapping.rotation, now, SCROLL_TWEEN, Easing::CubicOut);
        state.scroll_scale.set_target(mapping.scale, now, SCROLL_TWEEN, Easing::CubicOut);
        state.scroll_offset.set_target(mapping.offset, now, SCROLL_TWEEN, Easing::CubicOut);
        state.light_intensity.set_target(mapping.light_intensity, now, SCROLL_TWEEN, Easing::CubicOut);
        self.last = Some(mapping);
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateAction {
    None,
    Mount,
    Unmount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    Idle,
    Pending { since: Duration },
    Mounted,
}

/// Lazy activation: mount once visible for [`MOUNT_DELAY`], unmount once
/// scrolled further than [`UNMOUNT_DISTANCE`] viewport heights away.
#[derive(Clone, Debug)]
pub struct VisibilityGate {
    pub delay: Duration,
    pub unmount_distance: f32,
    state: GateState,
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self {
            delay: MOUNT_DELAY,
            unmount_distance: UNMOUNT_DISTANCE,
            state: GateState::Idle,
        }
    }
}

impl VisibilityGate {
    pub fn is_mounted(&self) -> bool {
        self.state == GateState::Mounted
    }

    pub fn update(&mut self, metrics: &ViewportMetrics, now: Duration) -> GateAction {
        let visible = metrics.is_visible();
        match self.state {
            GateState::Idle if visible => {
                self.state = GateState::Pending { since: now };
                self.poll(now)
            }
            GateState::Pending { .. } if !visible => {
                self.state = GateState::Idle;
                GateAction::None
            }
            GateState::Pending { .. } => self.poll(now),
            GateState::Mounted if metrics.distance_outside() > self.unmount_distance => {
                self.state = GateState::Idle;
                GateAction::Unmount
            }
            _ => GateAction::None,
        }
    }

    /// Mounts a pending placement once the delay has elapsed.
    pub fn poll(&mut self, now: Duration) -> GateAction {
        match self.state {
            GateState::Pending { since } if now.saturating_sub(since) >= self.delay => {
                self.state = GateState::Mounted;
                GateAction::Mount
            }
            _ => GateAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn progress_spans_below_to_above() {
        assert_eq!(scroll_progress(&ViewportMetrics::new(800.0, 800.0, 400.0)), 0.0);
        assert_eq!(scroll_progress(&ViewportMetrics::new(800.0, -400.0, 400.0)), 1.0);
        assert!((scroll_progress(&ViewportMetrics::new(800.0, 200.0, 400.0)) - 0.5).abs() < 1e-6);
        assert_eq!(scroll_progress(&ViewportMetrics::new(0.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn derived_rotation_is_monotonic() {
        let mut previous = ScrollMapping::derive(0.0);
        for i in 1..=1000 {
            let mapping = ScrollMapping::derive(i as f32 / 1000.0);
            assert!(mapping.rotation >= previous.rotation);
            assert!(mapping.scale >= previous.scale);
            previous = mapping;
        }
        assert!((previous.rotation - ROTATION_SWEEP).abs() < 1e-5);
    }

    #[test]
    fn only_the_last_event_of_a_burst_fires() {
        let mut debouncer = Debouncer::new(ms(50));
        debouncer.push(1, ms(0));
        debouncer.push(2, ms(30));
        assert_eq!(debouncer.poll(ms(60)), None);
        debouncer.push(3, ms(60));
        assert_eq!(debouncer.poll(ms(100)), None);
        assert_eq!(debouncer.poll(ms(110)), Some(3));
        assert_eq!(debouncer.poll(ms(200)), None);
    }

    #[test]
    fn cancelled_burst_never_fires() {
        let mut debouncer = Debouncer::new(ms(150));
        debouncer.push((640, 480), ms(0));
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(ms(500)), None);
    }

    #[test]
    fn binder_tweens_instead_of_snapping() {
        let mut binder = ScrollBinder::new();
        let mut state = RenderState::new();
        binder.on_scroll(ViewportMetrics::new(800.0, 200.0, 400.0), ms(0));
        assert!(!binder.poll(&mut state, ms(10)));
        assert!(binder.poll(&mut state, ms(50)));
        assert!((state.scroll_progress - 0.5).abs() < 1e-6);
        assert_eq!(state.scroll_rotation.value(ms(50)), 0.0);
        let done = state.scroll_rotation.value(ms(50) + SCROLL_TWEEN);
        assert!((done - ROTATION_SWEEP * 0.5).abs() < 1e-5);
    }

    #[test]
    fn gate_defers_mount_and_skips_fast_scroll_through() {
        let mut gate = VisibilityGate::default();
        let visible = ViewportMetrics::new(800.0, 300.0, 400.0);
        let below = ViewportMetrics::new(800.0, 900.0, 400.0);
        assert_eq!(gate.update(&visible, ms(0)), GateAction::None);
        assert_eq!(gate.update(&below, ms(100)), GateAction::None);
        assert_eq!(gate.update(&visible, ms(150)), GateAction::None);
        assert_eq!(gate.update(&visible, ms(300)), GateAction::None);
        assert_eq!(gate.update(&visible, ms(350)), GateAction::Mount);
        assert!(gate.is_mounted());
    }

    #[test]
    fn gate_unmounts_far_out_of_view() {
        let mut gate = VisibilityGate {
            delay: Duration::ZERO,
            ..VisibilityGate::default()
        };
        assert_eq!(gate.update(&ViewportMetrics::new(800.0, 0.0, 400.0), ms(0)), GateAction::Mount);
        // just above the viewport
        assert_eq!(gate.update(&ViewportMetrics::new(800.0, -600.0, 400.0), ms(10)), GateAction::None);
        // two viewport heights above
        assert_eq!(gate.update(&ViewportMetrics::new(800.0, -2000.0, 400.0), ms(20)), GateAction::Unmount);
        assert!(!gate.is_mounted());
    }
}
