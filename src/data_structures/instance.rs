//! Node transforms.
//!
//! Every scene node carries a local [`Instance`] (translation, rotation,
//! scale). World transforms are composed parent-first with `parent * local`
//! and uploaded to the GPU as an [`InstanceRaw`].

use std::ops::Mul;

use cgmath::{Euler, One, Rad, SquareMatrix};

use crate::data_structures::mesh::Vertex;

/// Translation, rotation (as quaternion) and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transform.
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: cgmath::Vector3::new(x, y, z),
            ..Self::new()
        }
    }

    /// Rotation given as XYZ euler angles in radians.
    pub fn with_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = euler(x, y, z);
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = cgmath::Vector3::new(x, y, z);
        self
    }

    pub fn with_uniform_scale(self, s: f32) -> Self {
        self.with_scale(s, s, s)
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let model = self.to_matrix();
        InstanceRaw {
            model: model.into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            handedness: model.determinant().signum(),
        }
    }

    fn compose(&self, rhs: &Instance) -> Instance {
        let scaled = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Instance {
            position: self.position + self.rotation * scaled,
            rotation: self.rotation * rhs.rotation,
            scale: cgmath::Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

pub fn euler(x: f32, y: f32, z: f32) -> cgmath::Quaternion<f32> {
    cgmath::Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)))
}

impl Mul<Instance> for Instance {
    type Output = Instance;

    fn mul(self, rhs: Instance) -> Self::Output {
        self.compose(&rhs)
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    fn mul(self, rhs: &'b Instance) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the per-draw data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub handedness: f32,
}

/**
 * The model matrix takes four vertex slots (one vec4 per column), the normal
 * matrix three more, followed by the handedness scalar.
 */
impl Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x3,
            10 => Float32x3,
            11 => Float32x3,
            12 => Float32,
        ];
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // advance once per drawn instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation, Vector3};

    #[test]
    fn identity_is_neutral() {
        let t = Instance::at(1.0, 2.0, 3.0).with_euler(0.3, 0.2, 0.1);
        let composed = Instance::new() * t;
        assert!((composed.position - t.position).magnitude() < 1e-6);
    }

    #[test]
    fn child_inherits_parent_scale_and_rotation() {
        let parent = Instance::at(0.0, 1.0, 0.0)
            .with_euler(0.0, std::f32::consts::FRAC_PI_2, 0.0)
            .with_uniform_scale(2.0);
        let child = Instance::at(1.0, 0.0, 0.0);
        let world = &parent * &child;
        let expected = Vector3::new(0.0, 1.0, 0.0) + parent.rotation.rotate_vector(Vector3::new(2.0, 0.0, 0.0));
        assert!((world.position - expected).magnitude() < 1e-5);
        assert!((world.scale.x - 2.0).abs() < 1e-6);
    }
}
