//! CPU-side mesh data.
//!
//! Geometry builders produce [`MeshData`] (vertices plus triangle indices). The
//! data stays on the node after upload so vertex counts and bounds can be
//! inspected without touching the GPU.

use cgmath::{InnerSpace, Vector3};

use crate::data_structures::instance::Instance;

/// GPU vertex layout description.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> u32 {
        self.vertices.push(MeshVertex::new(position, normal, uv));
        (self.vertices.len() - 1) as u32
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Appends `other` with `transform` baked into its positions and normals.
    pub fn merge(&mut self, other: &MeshData, transform: &Instance) {
        let base = self.vertices.len() as u32;
        let matrix = transform.to_matrix();
        self.vertices.extend(other.vertices.iter().map(|v| {
            let p = matrix * cgmath::Vector4::new(v.position[0], v.position[1], v.position[2], 1.0);
            let n = transform.rotation * Vector3::from(v.normal);
            MeshVertex::new([p.x, p.y, p.z], normalize_or_up(n).into(), v.uv)
        }));
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Radius of the origin-centred sphere containing every vertex.
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| Vector3::from(v.position).magnitude())
            .fold(0.0, f32::max)
    }
}

pub(crate) fn normalize_or_up(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > f32::EPSILON {
        v.normalize()
    } else {
        Vector3::unit_y()
    }
}
