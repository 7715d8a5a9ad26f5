use instant::Duration;
use wgpu::util::DeviceExt;

use crate::{config::ThemeColors, state::RenderState};

/// Ambient term, a directional key light and a point light that follows the
/// pointer while the model is hovered.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// rgb colour, a = intensity
    pub ambient: [f32; 4],
    /// xyz direction the light travels, w unused
    pub key_direction: [f32; 4],
    pub key_color: [f32; 4],
    pub point_position: [f32; 4],
    pub point_color: [f32; 4],
}

/// CPU side of the light set.
#[derive(Clone, Debug, PartialEq)]
pub struct LightRig {
    pub ambient: [f32; 3],
    pub ambient_intensity: f32,
    pub key_direction: [f32; 3],
    pub key_color: [f32; 3],
    pub key_intensity: f32,
    pub point_color: [f32; 3],
    /// Point light position while nothing is hovered.
    pub point_rest: [f32; 3],
    pub point_position: [f32; 3],
    pub point_intensity: f32,
}

impl LightRig {
    pub fn new(theme: &ThemeColors) -> Self {
        Self {
            ambient: [1.0, 1.0, 1.0],
            ambient_intensity: 0.35,
            key_direction: [-0.4, -1.0, -0.6],
            key_color: [1.0, 0.97, 0.92],
            key_intensity: 0.9,
            point_color: theme.primary,
            point_rest: [3.0, 3.0, 4.0],
            point_position: [3.0, 3.0, 4.0],
            point_intensity: 0.6,
        }
    }

    /// Moves the point light toward the pointer when hovered and scales the
    /// auxiliary intensities by the scroll-driven light tween.
    pub fn update(&mut self, state: &RenderState, now: Duration) {
        self.point_position = if state.hovered {
            let [x, y] = state.uniforms.pointer;
            [x * 4.0, y * 3.0, 3.0]
        } else {
            self.point_rest
        };
        self.point_intensity = 0.6 * state.light_intensity.value(now);
    }

    pub fn uniform(&self) -> LightUniform {
        let [ar, ag, ab] = self.ambient;
        let [kx, ky, kz] = self.key_direction;
        let [kr, kg, kb] = self.key_color;
        let [px, py, pz] = self.point_position;
        let [pr, pg, pb] = self.point_color;
        LightUniform {
            ambient: [ar, ag, ab, self.ambient_intensity],
            key_direction: [kx, ky, kz, 0.0],
            key_color: [kr, kg, kb, self.key_intensity],
            point_position: [px, py, pz, 1.0],
            point_color: [pr, pg, pb, self.point_intensity],
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Uniform Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_follows_the_pointer_only_when_hovered() {
        let mut rig = LightRig::new(&ThemeColors::dark());
        let mut state = RenderState::new();
        state.uniforms.pointer = [0.5, -0.5];
        rig.update(&state, Duration::ZERO);
        assert_eq!(rig.point_position, rig.point_rest);
        state.hovered = true;
        rig.update(&state, Duration::ZERO);
        assert_eq!(rig.point_position, [2.0, -1.5, 3.0]);
        assert_eq!(std::mem::size_of::<LightUniform>(), 80);
    }
}
