use std::{cell::RefCell, collections::HashSet, rc::Rc};

use image::RgbaImage;
use log::{debug, warn};

use crate::{
    backend::{
        FramePacket, GeometryHandle, MaterialHandle, PointsHandle, RenderBackend, ResourceHandle,
        TextureHandle,
    },
    data_structures::{material::Material, mesh::MeshData},
    error::EngineError,
    particles::ParticleInstance,
};

/// What one submitted frame contained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSummary {
    pub opaque: usize,
    pub transparent: usize,
    pub points: usize,
    pub particles: u32,
}

/// Everything a [`HeadlessBackend`] was asked to do.
#[derive(Debug, Default)]
pub struct Ledger {
    next_id: u32,
    live: HashSet<ResourceHandle>,
    pub geometries_uploaded: usize,
    pub materials_uploaded: usize,
    pub textures_uploaded: usize,
    pub points_uploaded: usize,
    pub point_updates: usize,
    pub released: usize,
    /// Releases of handles that were not live.
    pub double_releases: usize,
    pub frames: Vec<FrameSummary>,
    pub resizes: Vec<(u32, u32)>,
    pub detached: bool,
    /// Number of successful uploads after which every upload fails.
    pub fail_after: Option<usize>,
    /// Upcoming submissions that report a lost surface.
    pub lost_frames: usize,
    pub surface_losses: usize,
    /// Lengths of the point buffers, by handle.
    point_lengths: Vec<(PointsHandle, usize)>,
}

impl Ledger {
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    pub fn uploads(&self) -> usize {
        self.geometries_uploaded + self.materials_uploaded + self.textures_uploaded + self.points_uploaded
    }

    pub fn point_length(&self, handle: PointsHandle) -> Option<usize> {
        self.point_lengths
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, len)| *len)
    }

    /// The next `frames` submissions fail with [`EngineError::SurfaceLost`].
    pub fn lose_surface(&mut self, frames: usize) {
        self.lost_frames = frames;
    }

    fn allocate(&mut self) -> Result<u32, EngineError> {
        if self.detached {
            return Err(EngineError::Backend("upload after the surface was detached".to_string()));
        }
        if let Some(limit) = self.fail_after {
            if self.uploads() >= limit {
                return Err(EngineError::Backend(format!("allocation limit of {} reached", limit)));
            }
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

/// Backend without a GPU. Uploads hand out fresh handles, frames are
/// summarised into the shared [`Ledger`].
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    ledger: Rc<RefCell<Ledger>>,
    size: (u32, u32),
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            ledger: Rc::new(RefCell::new(Ledger::default())),
            size: (width.max(1), height.max(1)),
        }
    }

    /// A backend whose uploads start failing after `uploads` successful ones.
    pub fn failing_after(width: u32, height: u32, uploads: usize) -> Self {
        let backend = Self::new(width, height);
        backend.ledger.borrow_mut().fail_after = Some(uploads);
        backend
    }

    /// Shared view of the ledger that stays readable after the backend is
    /// moved into an engine.
    pub fn ledger(&self) -> Rc<RefCell<Ledger>> {
        Rc::clone(&self.ledger)
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GeometryHandle, EngineError> {
        let mut ledger = self.ledger.borrow_mut();
        let handle = GeometryHandle(ledger.allocate()?);
        ledger.geometries_uploaded += 1;
        ledger.live.insert(ResourceHandle::Geometry(handle));
        debug!("headless geometry {:?} with {} vertices", handle, mesh.vertex_count());
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, EngineError> {
        let mut ledger = self.ledger.borrow_mut();
        let handle = TextureHandle(ledger.allocate()?);
        ledger.textures_uploaded += 1;
        ledger.live.insert(ResourceHandle::Texture(handle));
        debug!("headless texture {:?} ({}x{})", handle, image.width(), image.height());
        Ok(handle)
    }

    fn upload_material(
        &mut self,
        material: &Material,
        map: Option<TextureHandle>,
    ) -> Result<MaterialHandle, EngineError> {
        let mut ledger = self.ledger.borrow_mut();
        if let Some(map) = map {
            if !ledger.live.contains(&ResourceHandle::Texture(map)) {
                warn!("Material '{}' references texture {:?}, which is not live.", material.name, map);
            }
        }
        let handle = MaterialHandle(ledger.allocate()?);
        ledger.materials_uploaded += 1;
        ledger.live.insert(ResourceHandle::Material(handle));
        Ok(handle)
    }

    fn upload_points(&mut self, particles: &[ParticleInstance]) -> Result<PointsHandle, EngineError> {
        let mut ledger = self.ledger.borrow_mut();
        let handle = PointsHandle(ledger.allocate()?);
        ledger.points_uploaded += 1;
        ledger.live.insert(ResourceHandle::Points(handle));
        ledger.point_lengths.push((handle, particles.len()));
        Ok(handle)
    }

    fn update_points(&mut self, handle: PointsHandle, particles: &[ParticleInstance]) {
        let mut ledger = self.ledger.borrow_mut();
        match ledger.point_length(handle) {
            Some(len) if len == particles.len() => ledger.point_updates += 1,
            Some(len) => warn!(
                "Point buffer {:?} holds {} particles, refusing an update with {}.",
                handle,
                len,
                particles.len()
            ),
            None => warn!("Point buffer {:?} was never uploaded.", handle),
        }
    }

    fn release(&mut self, handle: ResourceHandle) {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.live.remove(&handle) {
            ledger.released += 1;
        } else {
            ledger.double_releases += 1;
            warn!("Released {:?} which is not live.", handle);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.ledger.borrow_mut().resizes.push(self.size);
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn submit(&mut self, frame: &FramePacket) -> Result<(), EngineError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.detached {
            return Err(EngineError::SurfaceLost);
        }
        if ledger.lost_frames > 0 {
            ledger.lost_frames -= 1;
            ledger.surface_losses += 1;
            return Err(EngineError::SurfaceLost);
        }
        ledger.frames.push(FrameSummary {
            opaque: frame.opaque.len(),
            transparent: frame.transparent.len(),
            points: frame.points.len(),
            particles: frame.points.iter().map(|p| p.count).sum(),
        });
        Ok(())
    }

    fn is_live(&self) -> bool {
        !self.ledger.borrow().detached
    }

    fn detach(&mut self) {
        self.ledger.borrow_mut().detached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;

    #[test]
    fn releases_are_tracked_per_handle() {
        let mut backend = HeadlessBackend::new(800, 600);
        let ledger = backend.ledger();
        let mesh = backend.upload_mesh(&primitives::cuboid(1.0, 1.0, 1.0)).unwrap();
        let material = backend.upload_material(&Material::flat("m", [1.0; 3]), None).unwrap();
        assert_eq!(ledger.borrow().live_resources(), 2);

        backend.release(ResourceHandle::Geometry(mesh));
        backend.release(ResourceHandle::Geometry(mesh));
        backend.release(ResourceHandle::Material(material));
        let ledger = ledger.borrow();
        assert_eq!(ledger.live_resources(), 0);
        assert_eq!(ledger.released, 2);
        assert_eq!(ledger.double_releases, 1);
    }

    #[test]
    fn failing_backend_stops_after_the_limit() {
        let mut backend = HeadlessBackend::failing_after(10, 10, 1);
        assert!(backend.upload_mesh(&MeshData::new()).is_ok());
        assert!(matches!(backend.upload_mesh(&MeshData::new()), Err(EngineError::Backend(_))));
    }
}
