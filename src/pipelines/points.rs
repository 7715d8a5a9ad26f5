use wgpu::util::DeviceExt;

use crate::{
    data_structures::mesh::Vertex,
    particles::{PARTICLE_SHADER, ParticleInstance},
    pipelines::basic::{DepthMode, mk_render_pipeline},
};

/// Billboard corner, expanded in the vertex stage.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadCorner {
    pub corner: [f32; 2],
}

impl Vertex for QuadCorner {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadCorner>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Two triangles covering [-1, 1]².
pub const QUAD: [QuadCorner; 6] = [
    QuadCorner { corner: [-1.0, -1.0] },
    QuadCorner { corner: [1.0, -1.0] },
    QuadCorner { corner: [1.0, 1.0] },
    QuadCorner { corner: [-1.0, -1.0] },
    QuadCorner { corner: [1.0, 1.0] },
    QuadCorner { corner: [-1.0, 1.0] },
];

/// Overlapping particles add up instead of occluding each other.
pub const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub fn mk_quad_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Particle Quad Buffer"),
        contents: bytemuck::cast_slice(&QUAD),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

pub fn mk_particle_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("particle_bind_group_layout"),
    })
}

pub fn mk_points_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    particle_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Points Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout, particle_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Points Shader"),
        source: wgpu::ShaderSource::Wgsl(PARTICLE_SHADER.into()),
    };
    mk_render_pipeline(
        device,
        &render_pipeline_layout,
        config.format,
        Some(ADDITIVE),
        DepthMode::ReadOnly,
        None,
        sample_count,
        &[QuadCorner::desc(), ParticleInstance::desc()],
        shader,
    )
}
