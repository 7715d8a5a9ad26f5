//! Mutable per-engine render state.
//!
//! Event handlers (pointer, scroll, resize) write here synchronously; the frame
//! callback only reads. Continuous values are [`Eased`] so a write retargets a
//! short tween instead of snapping.

use instant::Duration;

use crate::{
    data_structures::instance::{Instance, euler},
    resources::animation::Eased,
};

/// Idle yaw speed in radians per second.
pub const IDLE_SPIN: f32 = 0.3;

/// Values mirrored into shader uniforms each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderUniforms {
    pub time: f32,
    pub scroll: f32,
    /// Pointer in normalised device coordinates.
    pub pointer: [f32; 2],
    pub viewport: [f32; 2],
    pub pixel_ratio: f32,
}

impl Default for ShaderUniforms {
    fn default() -> Self {
        Self {
            time: 0.0,
            scroll: 0.0,
            pointer: [0.0, 0.0],
            viewport: [1.0, 1.0],
            pixel_ratio: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderState {
    pub rotation_x: Eased,
    pub rotation_y: Eased,
    pub rotation_z: Eased,
    pub hover_scale: Eased,
    pub hover_lift: Eased,
    pub scroll_rotation: Eased,
    pub scroll_scale: Eased,
    pub scroll_offset: Eased,
    pub light_intensity: Eased,
    pub idle_yaw: f32,
    pub hovered: bool,
    pub dragging: bool,
    /// Last pointer position in surface pixels.
    pub pointer: [f32; 2],
    pub scroll_progress: f32,
    pub uniforms: ShaderUniforms,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            rotation_x: Eased::new(0.0),
            rotation_y: Eased::new(0.0),
            rotation_z: Eased::new(0.0),
            hover_scale: Eased::new(1.0),
            hover_lift: Eased::new(0.0),
            scroll_rotation: Eased::new(0.0),
            scroll_scale: Eased::new(1.0),
            scroll_offset: Eased::new(0.0),
            light_intensity: Eased::new(1.0),
            idle_yaw: 0.0,
            hovered: false,
            dragging: false,
            pointer: [0.0, 0.0],
            scroll_progress: 0.0,
            uniforms: ShaderUniforms::default(),
        }
    }

    pub fn is_interacting(&self) -> bool {
        self.hovered || self.dragging
    }

    /// Accumulates idle yaw for `dt` unless the user is interacting.
    pub fn advance_idle(&mut self, dt: Duration, enabled: bool) {
        if enabled && !self.is_interacting() {
            self.idle_yaw = (self.idle_yaw + IDLE_SPIN * dt.as_secs_f32()) % std::f32::consts::TAU;
        }
    }

    /// Pitch and yaw targets the interaction layer is heading toward.
    pub fn target_rotation(&self) -> (f32, f32) {
        (self.rotation_x.target(), self.rotation_y.target())
    }

    /// Transform applied to the model pivot at time `now`.
    pub fn pivot_transform(&self, now: Duration) -> Instance {
        let scale = self.hover_scale.value(now) * self.scroll_scale.value(now);
        let mut pivot = Instance::at(
            0.0,
            self.hover_lift.value(now) + self.scroll_offset.value(now),
            0.0,
        )
        .with_uniform_scale(scale);
        pivot.rotation = euler(
            self.rotation_x.value(now),
            self.rotation_y.value(now) + self.idle_yaw + self.scroll_rotation.value(now),
            self.rotation_z.value(now),
        );
        pivot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_rotation_pauses_while_interacting() {
        let mut state = RenderState::new();
        state.advance_idle(Duration::from_secs(1), true);
        assert!((state.idle_yaw - IDLE_SPIN).abs() < 1e-6);
        state.hovered = true;
        state.advance_idle(Duration::from_secs(1), true);
        assert!((state.idle_yaw - IDLE_SPIN).abs() < 1e-6);
        state.hovered = false;
        state.advance_idle(Duration::from_secs(1), false);
        assert!((state.idle_yaw - IDLE_SPIN).abs() < 1e-6);
    }

    #[test]
    fn resting_state_is_the_identity_pivot() {
        let state = RenderState::new();
        assert_eq!(state.pivot_transform(Duration::ZERO), Instance::new());
    }
}
