//! Shader-driven point clouds.
//!
//! [`create_particle_system`] lays out a fixed number of particles in one of
//! two styles and pairs the buffer with the WGSL program that draws it. The
//! vertex stage displaces every particle with a time-driven wave and
//! attenuates its size by camera distance; the fragment stage draws a soft
//! disc that is blended additively.
//!
//! The buffer never changes length after construction. Per-frame CPU motion
//! (the vertical wave used by the abstract archetype) rewrites positions in
//! place and marks the buffer dirty so the backend re-uploads it.

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{config::ThemeColors, data_structures::mesh::Vertex};

/// WGSL for the additive billboard pipeline.
pub const PARTICLE_SHADER: &str = include_str!("pipelines/points.wgsl");

const PARTICLE_SEED: u64 = 0x5eed_9a27;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleStyle {
    /// Volumetric cloud weighted toward a spherical shell.
    GlowSphere,
    /// Grid-snapped with jitter, two accent hues like binary digits.
    Code,
}

/// One particle as the points pipeline consumes it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 3],
    pub phase: f32,
}

impl Vertex for ParticleInstance {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![1 => Float32x3, 2 => Float32, 3 => Float32x3, 4 => Float32];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Uniforms read by `points.wgsl`. Field order matches the WGSL struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleUniform {
    pub model: [[f32; 4]; 4],
    pub time: f32,
    pub size: f32,
    pub pixel_ratio: f32,
    pub wave_amplitude: f32,
    pub wave_frequency: f32,
    pub scroll: f32,
    pub viewport: [f32; 2],
    pub pointer: [f32; 2],
    pub _padding: [f32; 2],
}

impl ParticleUniform {
    pub fn new(size: f32) -> Self {
        use cgmath::SquareMatrix;
        Self {
            model: cgmath::Matrix4::identity().into(),
            time: 0.0,
            size,
            pixel_ratio: 1.0,
            wave_amplitude: 0.15,
            wave_frequency: 0.8,
            scroll: 0.0,
            viewport: [1.0, 1.0],
            pointer: [0.0, 0.0],
            _padding: [0.0; 2],
        }
    }
}

/// Fixed-length particle attributes.
#[derive(Clone, Debug)]
pub struct ParticleBuffer {
    base: Box<[[f32; 3]]>,
    positions: Box<[[f32; 3]]>,
    colors: Box<[[f32; 3]]>,
    sizes: Box<[f32]>,
    phases: Box<[f32]>,
    dirty: bool,
}

impl ParticleBuffer {
    fn from_parts(positions: Vec<[f32; 3]>, colors: Vec<[f32; 3]>, sizes: Vec<f32>, phases: Vec<f32>) -> Self {
        let positions = positions.into_boxed_slice();
        Self {
            base: positions.clone(),
            positions,
            colors: colors.into_boxed_slice(),
            sizes: sizes.into_boxed_slice(),
            phases: phases.into_boxed_slice(),
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn base_positions(&self) -> &[[f32; 3]] {
        &self.base
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Offsets every particle vertically from its base position.
    pub fn apply_vertical_wave(&mut self, time: f32, amplitude: f32, frequency: f32) {
        for ((pos, base), phase) in self.positions.iter_mut().zip(self.base.iter()).zip(self.phases.iter()) {
            pos[1] = base[1] + amplitude * (time * frequency + base[0] * 0.5 + phase).sin();
        }
        self.dirty = true;
    }

    pub fn instances(&self) -> Vec<ParticleInstance> {
        (0..self.len())
            .map(|i| ParticleInstance {
                position: self.positions[i],
                size: self.sizes[i],
                color: self.colors[i],
                phase: self.phases[i],
            })
            .collect()
    }
}

/// A point cloud plus the program and uniforms that draw it.
#[derive(Clone, Debug)]
pub struct ParticleSystem {
    pub style: ParticleStyle,
    pub buffer: ParticleBuffer,
    pub uniforms: ParticleUniform,
    pub shader: &'static str,
    /// Rewrite positions on the CPU every frame in addition to the shader wave.
    pub cpu_wave: bool,
}

impl ParticleSystem {
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Advances the time uniform and, when enabled, the CPU wave.
    pub fn update(&mut self, time: f32) {
        self.uniforms.time = time;
        if self.cpu_wave && !self.buffer.is_empty() {
            self.buffer.apply_vertical_wave(time, 0.2, 1.2);
        }
    }
}

pub fn create_particle_system(
    count: usize,
    size: f32,
    spread: f32,
    style: ParticleStyle,
    theme: &ThemeColors,
) -> ParticleSystem {
    let mut rng = StdRng::seed_from_u64(PARTICLE_SEED ^ count as u64);
    let spread = spread.max(0.0);
    let mut positions = Vec::with_capacity(count);
    let mut colors = Vec::with_capacity(count);
    let mut sizes = Vec::with_capacity(count);
    let mut phases = Vec::with_capacity(count);

    match style {
        ParticleStyle::GlowSphere => {
            for _ in 0..count {
                let z: f32 = rng.gen_range(-1.0..=1.0);
                let theta: f32 = rng.gen_range(0.0..TAU);
                let ring = (1.0 - z * z).max(0.0).sqrt();
                // a quarter-power radius pushes most particles toward the shell
                let r = spread * (0.35 + 0.65 * rng.r#gen::<f32>().powf(0.25));
                positions.push([r * ring * theta.cos(), r * z, r * ring * theta.sin()]);
                let mix: f32 = rng.r#gen();
                colors.push(lerp3(theme.primary, theme.accent, mix));
                sizes.push(size * rng.gen_range(0.5f32..1.5));
                phases.push(rng.gen_range(0.0..TAU));
            }
        }
        ParticleStyle::Code => {
            let cells = ((count as f32).cbrt().ceil() as u32).max(1);
            let cell = spread / cells as f32;
            let half = spread * 0.5;
            for _ in 0..count {
                let mut p = [0.0f32; 3];
                for axis in p.iter_mut() {
                    let slot = rng.gen_range(0..cells) as f32 + 0.5;
                    let jitter = rng.gen_range(-0.15f32..=0.15) * cell;
                    *axis = slot * cell - half + jitter;
                }
                positions.push(p);
                colors.push(if rng.gen_bool(0.5) { theme.primary } else { theme.secondary });
                sizes.push(size);
                phases.push(rng.gen_range(0.0..TAU));
            }
        }
    }

    ParticleSystem {
        style,
        buffer: ParticleBuffer::from_parts(positions, colors, sizes, phases),
        uniforms: ParticleUniform::new(size),
        shader: PARTICLE_SHADER,
        cpu_wave: false,
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t, a[2] + (b[2] - a[2]) * t]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme() -> ThemeColors {
        ThemeColors::dark()
    }

    #[test]
    fn glow_sphere_stays_inside_spread() {
        let system = create_particle_system(800, 0.05, 4.0, ParticleStyle::GlowSphere, &theme());
        assert_eq!(system.len(), 800);
        for p in system.buffer.positions() {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!(r <= 4.0 + 1e-4);
            assert!(r >= 4.0 * 0.35 - 1e-4);
        }
    }

    #[test]
    fn code_particles_use_two_hues_near_grid_cells() {
        let t = theme();
        let system = create_particle_system(500, 0.04, 8.0, ParticleStyle::Code, &t);
        for (p, c) in system.buffer.positions().iter().zip(system.buffer.colors()) {
            assert!(*c == t.primary || *c == t.secondary);
            // 8 cells of width 1.0, centres at -3.5..3.5
            for axis in p {
                let offset = (axis + 4.0) - ((axis + 4.0).floor() + 0.5);
                assert!(offset.abs() <= 0.15 + 1e-4);
            }
        }
    }

    #[test]
    fn zero_particles_and_zero_spread_are_tolerated() {
        for style in [ParticleStyle::GlowSphere, ParticleStyle::Code] {
            let mut system = create_particle_system(0, 0.05, 0.0, style, &theme());
            assert!(system.is_empty());
            system.update(1.0);
            assert!(system.buffer.instances().is_empty());
        }
        let system = create_particle_system(10, 0.05, 0.0, ParticleStyle::Code, &theme());
        assert!(system.buffer.positions().iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn buffer_length_is_constant_across_updates() {
        let mut system = create_particle_system(500, 0.05, 6.0, ParticleStyle::GlowSphere, &theme());
        system.cpu_wave = true;
        let len = system.buffer.len();
        for frame in 0..240 {
            system.update(frame as f32 / 60.0);
            assert!(system.buffer.take_dirty());
        }
        assert_eq!(system.buffer.len(), len);
        assert_eq!(system.buffer.instances().len(), len);
    }

    #[test]
    fn cpu_wave_only_moves_vertically() {
        let mut system = create_particle_system(64, 0.05, 3.0, ParticleStyle::GlowSphere, &theme());
        system.cpu_wave = true;
        system.update(2.5);
        for (p, b) in system.buffer.positions().iter().zip(system.buffer.base_positions()) {
            assert_eq!(p[0], b[0]);
            assert_eq!(p[2], b[2]);
            assert!((p[1] - b[1]).abs() <= 0.2 + 1e-5);
        }
    }

    #[test]
    fn uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<ParticleUniform>(), 112);
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
    }
}
