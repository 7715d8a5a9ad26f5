//! The seam between the engine and whatever owns the GPU.
//!
//! [`RenderBackend`] exposes handle-based allocation and a single per-frame
//! [`FramePacket`] submission. The engine keeps every handle it receives in
//! its resource registry and releases each one exactly once on teardown.
//!
//! - [`gpu::GpuBackend`] renders with wgpu into a window surface (a canvas on wasm).
//! - [`headless::HeadlessBackend`] records calls in a ledger for tests and smoke checks.

pub mod gpu;
pub mod headless;

use image::RgbaImage;

use crate::{
    camera::CameraUniform,
    data_structures::{instance::InstanceRaw, material::Material, mesh::MeshData},
    error::EngineError,
    particles::{ParticleInstance, ParticleUniform},
    pipelines::light::LightUniform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointsHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Geometry(GeometryHandle),
    Material(MaterialHandle),
    Texture(TextureHandle),
    Points(PointsHandle),
}

/// One mesh draw: geometry, material and world transform.
#[derive(Clone, Copy, Debug)]
pub struct DrawItem {
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    pub transform: InstanceRaw,
}

impl DrawItem {
    pub fn translation(&self) -> [f32; 3] {
        let [x, y, z, _] = self.transform.model[3];
        [x, y, z]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointsDraw {
    pub points: PointsHandle,
    pub count: u32,
    pub uniform: ParticleUniform,
}

/// Everything needed to draw one frame, already sorted by pipeline.
#[derive(Clone, Debug)]
pub struct FramePacket {
    pub clear: [f32; 4],
    pub camera: CameraUniform,
    pub lights: LightUniform,
    pub opaque: Vec<DrawItem>,
    /// Back to front.
    pub transparent: Vec<DrawItem>,
    pub points: Vec<PointsDraw>,
    /// Passed through untouched; no extra passes are recorded for it.
    pub post_processing: bool,
}

impl FramePacket {
    pub fn draw_count(&self) -> usize {
        self.opaque.len() + self.transparent.len() + self.points.len()
    }
}

pub trait RenderBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GeometryHandle, EngineError>;

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, EngineError>;

    /// `map` replaces the material's own image, which is never read here.
    fn upload_material(
        &mut self,
        material: &Material,
        map: Option<TextureHandle>,
    ) -> Result<MaterialHandle, EngineError>;

    fn upload_points(&mut self, particles: &[ParticleInstance]) -> Result<PointsHandle, EngineError>;

    /// Rewrites a point buffer in place. The length must match the upload.
    fn update_points(&mut self, handle: PointsHandle, particles: &[ParticleInstance]);

    fn release(&mut self, handle: ResourceHandle);

    fn resize(&mut self, width: u32, height: u32);

    fn surface_size(&self) -> (u32, u32);

    fn submit(&mut self, frame: &FramePacket) -> Result<(), EngineError>;

    /// False once the surface is gone; no frame may be submitted after that.
    fn is_live(&self) -> bool;

    /// Gives up the surface. No call other than `release` follows.
    fn detach(&mut self);
}
