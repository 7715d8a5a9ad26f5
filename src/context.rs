//! Everything one mounted engine owns.
//!
//! A [`SceneContext`] is created on mount and holds the backend, the camera,
//! the light rig and the built model together with the registry of every
//! handle uploaded for it. Releasing goes through [`SceneContext::dispose`],
//! which is also run when construction fails halfway and when the context is
//! dropped, so no exit path leaks a GPU resource.

use std::{collections::HashSet, ops::AddAssign};

use cgmath::{Deg, Point3};
use instant::Duration;
use log::{debug, info, warn};

use crate::{
    backend::{
        DrawItem, FramePacket, GeometryHandle, MaterialHandle, PointsDraw, PointsHandle,
        RenderBackend, ResourceHandle, TextureHandle,
    },
    camera::{Camera, CameraUniform, Projection},
    config::{Archetype, EngineConfig, Environment, ThemeColors, TierProfile},
    data_structures::{material::BlendMode, scene_graph::NodeId},
    error::EngineError,
    geometry::{self, ModelBuild},
    particles::{ParticleSystem, create_particle_system},
    pipelines::light::LightRig,
    render::Render,
    state::RenderState,
};

/// Allocation bookkeeping. Points buffers count as geometries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    pub geometries_allocated: usize,
    pub geometries_disposed: usize,
    pub materials_allocated: usize,
    pub materials_disposed: usize,
    pub textures_allocated: usize,
    pub textures_disposed: usize,
}

impl ResourceCounters {
    pub fn allocated(&self) -> usize {
        self.geometries_allocated + self.materials_allocated + self.textures_allocated
    }

    pub fn disposed(&self) -> usize {
        self.geometries_disposed + self.materials_disposed + self.textures_disposed
    }

    pub fn live(&self) -> usize {
        self.allocated() - self.disposed()
    }

    /// Every allocation has been disposed.
    pub fn is_balanced(&self) -> bool {
        self.geometries_allocated == self.geometries_disposed
            && self.materials_allocated == self.materials_disposed
            && self.textures_allocated == self.textures_disposed
    }
}

impl AddAssign for ResourceCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.geometries_allocated += rhs.geometries_allocated;
        self.geometries_disposed += rhs.geometries_disposed;
        self.materials_allocated += rhs.materials_allocated;
        self.materials_disposed += rhs.materials_disposed;
        self.textures_allocated += rhs.textures_allocated;
        self.textures_disposed += rhs.textures_disposed;
    }
}

#[derive(Clone, Copy, Debug)]
struct MeshBinding {
    node: NodeId,
    geometry: GeometryHandle,
    material: MaterialHandle,
    blend: BlendMode,
}

#[derive(Debug)]
struct ParticleBinding {
    system: ParticleSystem,
    handle: PointsHandle,
    anchor: NodeId,
}

/// Camera placement per archetype: eye and look-at target.
fn camera_for(archetype: Archetype) -> Camera {
    let (eye, target) = match archetype {
        Archetype::Laptop => ((0.0, 1.4, 5.5), (0.0, 0.0, 0.0)),
        Archetype::Workspace => ((0.0, 2.2, 6.5), (0.0, 0.3, 0.0)),
        Archetype::AbstractShapes => ((0.0, 0.0, 9.0), (0.0, 0.0, 0.0)),
        Archetype::CodeScene => ((0.0, 2.0, 8.5), (0.0, 0.2, 0.0)),
    };
    Camera::looking_at(Point3::from(eye), Point3::from(target))
}

#[derive(Debug)]
pub struct SceneContext<B: RenderBackend> {
    backend: Option<B>,
    pub build: ModelBuild,
    pub tier: TierProfile,
    pub camera: Camera,
    pub projection: Projection,
    pub lights: LightRig,
    camera_uniform: CameraUniform,
    meshes: Vec<MeshBinding>,
    textures: Vec<TextureHandle>,
    particles: Option<ParticleBinding>,
    counters: ResourceCounters,
    clear: [f32; 4],
    post_processing: bool,
}

impl<B: RenderBackend> SceneContext<B> {
    /// Builds the model for `config` and uploads it through `backend`.
    ///
    /// On failure everything uploaded so far is released and the backend is
    /// detached before the error is returned.
    pub fn new(backend: B, config: &EngineConfig, env: &Environment) -> Result<Self, EngineError> {
        let descriptor = &config.descriptor;
        let tier = descriptor.quality.profile(&env.device);
        let build = geometry::build(descriptor, env);
        let (width, height) = backend.surface_size();
        let camera = camera_for(descriptor.archetype);
        let projection = Projection::new(width, height, Deg(45.0), 0.1, 100.0);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);
        let [r, g, b] = descriptor.theme.background;

        let mut ctx = Self {
            backend: Some(backend),
            build,
            tier,
            camera,
            projection,
            lights: LightRig::new(&descriptor.theme),
            camera_uniform,
            meshes: Vec::new(),
            textures: Vec::new(),
            particles: None,
            counters: ResourceCounters::default(),
            clear: [r, g, b, 1.0],
            post_processing: config.post_processing,
        };
        if let Err(err) = ctx.upload(&descriptor.theme) {
            ctx.dispose();
            return Err(err);
        }
        info!(
            "Mounted '{}' ({}): {} objects, {} vertices, {} particles.",
            descriptor.archetype,
            tier.tier,
            ctx.build.object_count(),
            ctx.build.graph.vertex_count(),
            ctx.particle_count()
        );
        if config.post_processing {
            debug!("Post-processing requested; the flag is passed through to the backend.");
        }
        Ok(ctx)
    }

    fn upload(&mut self, theme: &ThemeColors) -> Result<(), EngineError> {
        let Self {
            backend,
            build,
            meshes,
            textures,
            particles,
            counters,
            ..
        } = self;
        let backend = backend.as_mut().ok_or(EngineError::InvalidState {
            operation: "upload",
            state: "Disposed",
        })?;

        for (node, scene_node) in build.graph.traverse() {
            let Some(mesh) = scene_node.mesh() else {
                continue;
            };
            let geometry = backend.upload_mesh(&mesh.mesh)?;
            counters.geometries_allocated += 1;
            let map = match &mesh.material.map {
                Some(image) => match backend.upload_texture(image) {
                    Ok(handle) => {
                        counters.textures_allocated += 1;
                        textures.push(handle);
                        Some(handle)
                    }
                    Err(err) => {
                        warn!("Texture for '{}' could not be uploaded ({}), using its flat colour.", scene_node.name, err);
                        None
                    }
                },
                None => None,
            };
            let material = match backend.upload_material(&mesh.material, map) {
                Ok(material) => material,
                Err(err) => {
                    backend.release(ResourceHandle::Geometry(geometry));
                    counters.geometries_disposed += 1;
                    return Err(err);
                }
            };
            counters.materials_allocated += 1;
            meshes.push(MeshBinding {
                node,
                geometry,
                material,
                blend: mesh.material.blend,
            });
        }

        if let Some(request) = build.particles {
            let mut system = create_particle_system(
                request.count,
                request.size,
                request.spread,
                request.style,
                theme,
            );
            system.cpu_wave = request.cpu_wave;
            if !system.is_empty() {
                let handle = backend.upload_points(&system.buffer.instances())?;
                system.buffer.take_dirty();
                counters.geometries_allocated += 1;
                *particles = Some(ParticleBinding {
                    system,
                    handle,
                    anchor: request.anchor,
                });
            }
        }
        Ok(())
    }

    /// Whether the backend is still held and its surface still attached.
    pub fn is_live(&self) -> bool {
        self.backend.as_ref().is_some_and(RenderBackend::is_live)
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn counters(&self) -> ResourceCounters {
        self.counters
    }

    pub fn particle_count(&self) -> usize {
        self.particles.as_ref().map_or(0, |p| p.system.len())
    }

    pub fn particles(&self) -> Option<&ParticleSystem> {
        self.particles.as_ref().map(|p| &p.system)
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.backend.as_ref().map(RenderBackend::surface_size)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(width, height);
        }
        self.projection.resize(width, height);
    }

    /// Advances animations, the pivot, particles, lights and camera to `now`.
    /// `elapsed` is the time since the first frame.
    pub fn update(&mut self, state: &RenderState, now: Duration, elapsed: Duration) {
        let t = elapsed.as_secs_f32();
        let build = &mut self.build;
        build.animations.apply(&mut build.graph, t);
        if let Some(timeline) = build.timeline.as_mut() {
            timeline.apply(&mut build.graph, now);
        }
        build.graph.set_local_transform(build.pivot, state.pivot_transform(now));
        build.graph.update_world_transforms();

        if let Some(binding) = self.particles.as_mut() {
            binding.system.update(t);
            let uniforms = &mut binding.system.uniforms;
            if let Some(anchor) = build.graph.get(binding.anchor) {
                uniforms.model = anchor.world().to_matrix().into();
            }
            uniforms.scroll = state.uniforms.scroll;
            uniforms.pointer = state.uniforms.pointer;
            uniforms.viewport = state.uniforms.viewport;
            uniforms.pixel_ratio = state.uniforms.pixel_ratio;
            if binding.system.buffer.take_dirty() {
                if let Some(backend) = self.backend.as_mut() {
                    backend.update_points(binding.handle, &binding.system.buffer.instances());
                }
            }
        }

        self.lights.update(state, now);
        self.camera_uniform.update_view_proj(&self.camera, &self.projection);
    }

    /// Describes the current scene as a render tree.
    pub fn compose(&self) -> Render {
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        let visible: HashSet<NodeId> = self.build.graph.visible_meshes().into_iter().map(|(id, _, _)| id).collect();
        for binding in &self.meshes {
            if !visible.contains(&binding.node) {
                continue;
            }
            let Some(node) = self.build.graph.get(binding.node) else {
                continue;
            };
            let item = DrawItem {
                geometry: binding.geometry,
                material: binding.material,
                transform: node.world().to_raw(),
            };
            match binding.blend {
                BlendMode::Opaque => opaque.push(item),
                BlendMode::Transparent => transparent.push(item),
            }
        }
        let points = match &self.particles {
            Some(binding) => Render::Points(PointsDraw {
                points: binding.handle,
                count: binding.system.len() as u32,
                uniform: binding.system.uniforms,
            }),
            None => Render::None,
        };
        Render::Composed(vec![Render::Opaques(opaque), Render::Transparents(transparent), points])
    }

    pub fn frame(&self) -> FramePacket {
        let mut frame = self.compose().batch(self.clear, self.camera_uniform, self.lights.uniform());
        frame.post_processing = self.post_processing;
        frame
    }

    /// Builds and submits the current frame.
    pub fn submit(&mut self) -> Result<(), EngineError> {
        let frame = self.frame();
        match self.backend.as_mut() {
            Some(backend) => backend.submit(&frame),
            None => Err(EngineError::InvalidState {
                operation: "submit",
                state: "Disposed",
            }),
        }
    }

    /// Releases every registered handle once and detaches the backend.
    /// Calling it again does nothing.
    pub fn dispose(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };
        for binding in self.meshes.drain(..) {
            backend.release(ResourceHandle::Geometry(binding.geometry));
            backend.release(ResourceHandle::Material(binding.material));
            self.counters.geometries_disposed += 1;
            self.counters.materials_disposed += 1;
        }
        for texture in self.textures.drain(..) {
            backend.release(ResourceHandle::Texture(texture));
            self.counters.textures_disposed += 1;
        }
        if let Some(binding) = self.particles.take() {
            backend.release(ResourceHandle::Points(binding.handle));
            self.counters.geometries_disposed += 1;
        }
        backend.detach();
        debug!("Scene context released: {:?}", self.counters);
    }
}

impl<B: RenderBackend> Drop for SceneContext<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
