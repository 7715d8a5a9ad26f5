//! wgpu implementation of [`RenderBackend`].
//!
//! Owns the surface, device and queue of one engine instance plus every
//! buffer, texture and bind group uploaded through it. Each geometry gets its
//! own single-slot instance buffer that is rewritten with the node's world
//! transform right before it is drawn.

use std::{collections::HashMap, sync::Arc};

use image::RgbaImage;
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    backend::{
        DrawItem, FramePacket, GeometryHandle, MaterialHandle, PointsHandle, RenderBackend,
        ResourceHandle, TextureHandle,
    },
    camera::CameraUniform,
    config::TierProfile,
    data_structures::{
        instance::InstanceRaw,
        material::Material,
        mesh::MeshData,
        texture::{Texture, create_default_sampler},
    },
    error::EngineError,
    particles::{ParticleInstance, ParticleUniform},
    pipelines::{
        basic::{MaterialUniform, mk_basic_pipeline, mk_material_bind_group_layout},
        light::{self, LightUniform},
        points::{QUAD, mk_particle_bind_group_layout, mk_points_pipeline, mk_quad_buffer},
        transparent::mk_transparent_pipeline,
    },
};

const MSAA_SAMPLES: u32 = 4;

#[derive(Debug)]
struct GpuGeometry {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    instance: wgpu::Buffer,
}

#[derive(Debug)]
struct GpuMaterial {
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct GpuPoints {
    instances: wgpu::Buffer,
    count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Pipelines {
    basic: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    points: wgpu::RenderPipeline,
}

pub struct GpuBackend {
    window: Arc<Window>,
    surface: Option<wgpu::Surface<'static>>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    /// Size the host asked for, before the pixel ratio cap.
    requested: (u32, u32),
    /// Surface pixels per host pixel.
    pixel_scale: f32,
    sample_count: u32,
    depth_texture: Texture,
    msaa_target: Option<Texture>,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    particle_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback: Texture,
    quad: wgpu::Buffer,
    pipelines: Pipelines,
    next_id: u32,
    geometries: HashMap<GeometryHandle, GpuGeometry>,
    textures: HashMap<TextureHandle, Texture>,
    materials: HashMap<MaterialHandle, GpuMaterial>,
    points: HashMap<PointsHandle, GpuPoints>,
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackend")
            .field("size", &(self.config.width, self.config.height))
            .field("sample_count", &self.sample_count)
            .field("geometries", &self.geometries.len())
            .field("materials", &self.materials.len())
            .field("textures", &self.textures.len())
            .field("points", &self.points.len())
            .field("attached", &self.surface.is_some())
            .finish()
    }
}

/// Buffer with at least four bytes; wgpu rejects binding empty vertex buffers.
fn mk_buffer(device: &wgpu::Device, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
    let padding = [0u8; 4];
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: if contents.is_empty() { &padding } else { contents },
        usage,
    })
}

fn mk_uniform_bind_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, buffer: &wgpu::Buffer, label: &str) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some(label),
    })
}

impl GpuBackend {
    pub async fn new(window: Arc<Window>, tier: &TierProfile) -> Result<Self, EngineError> {
        let size = window.inner_size();
        let scale_factor = window.scale_factor() as f32;
        let pixel_scale = if scale_factor > 0.0 {
            scale_factor.min(tier.max_pixel_ratio) / scale_factor
        } else {
            1.0
        };

        debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::SurfaceUnavailable(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EngineError::AdapterUnavailable(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // shaders write linear colour and rely on an sRGB surface
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| EngineError::SurfaceUnavailable("surface reports no formats".to_string()))?;
        let present_mode = surface_caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let requested = (size.width.max(1), size.height.max(1));
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: scaled(requested.0, pixel_scale),
            height: scaled(requested.1, pixel_scale),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = if tier.antialias
            && adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("camera_bind_group_layout"),
        });
        let camera_bind_group = mk_uniform_bind_group(&device, &camera_layout, &camera_buffer, "camera_bind_group");

        let light_buffer = light::mk_buffer(&device, LightUniform::default());
        let light_layout = light::mk_bind_group_layout(&device);
        let light_bind_group = light::mk_bind_group(&device, &light_layout, &light_buffer);

        let material_layout = mk_material_bind_group_layout(&device);
        let particle_layout = mk_particle_bind_group_layout(&device);

        let pipelines = Pipelines {
            basic: mk_basic_pipeline(&device, &config, sample_count, &material_layout, &camera_layout, &light_layout),
            transparent: mk_transparent_pipeline(&device, &config, sample_count, &material_layout, &camera_layout, &light_layout),
            points: mk_points_pipeline(&device, &config, sample_count, &camera_layout, &particle_layout),
        };

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], sample_count, "depth_texture");
        let msaa_target = (sample_count > 1).then(|| Texture::create_msaa_target(&device, &config, sample_count));
        let fallback = Texture::create_solid([255, 255, 255, 255], &device, &queue, "fallback map");
        let sampler = create_default_sampler(&device);
        let quad = mk_quad_buffer(&device);

        debug!(
            "Surface {}x{} ({:?}), {} samples",
            config.width, config.height, surface_format, sample_count
        );

        Ok(Self {
            window,
            surface: Some(surface),
            device,
            queue,
            config,
            requested,
            pixel_scale,
            sample_count,
            depth_texture,
            msaa_target,
            camera_buffer,
            camera_bind_group,
            light_buffer,
            light_bind_group,
            material_layout,
            particle_layout,
            sampler,
            fallback,
            quad,
            pipelines,
            next_id: 0,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
            points: HashMap::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn reconfigure(&mut self) {
        let Some(surface) = &self.surface else {
            return;
        };
        surface.configure(&self.device, &self.config);
        self.depth_texture.destroy();
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            self.sample_count,
            "depth_texture",
        );
        if let Some(msaa) = self.msaa_target.take() {
            msaa.destroy();
            self.msaa_target = Some(Texture::create_msaa_target(&self.device, &self.config, self.sample_count));
        }
    }

    fn draw_meshes<'a>(
        pass: &mut wgpu::RenderPass<'a>,
        items: &[DrawItem],
        geometries: &'a HashMap<GeometryHandle, GpuGeometry>,
        materials: &'a HashMap<MaterialHandle, GpuMaterial>,
    ) {
        for item in items {
            let (Some(geometry), Some(material)) = (geometries.get(&item.geometry), materials.get(&item.material)) else {
                warn!("Skipping a draw with released handles {:?}/{:?}.", item.geometry, item.material);
                continue;
            };
            if geometry.index_count == 0 {
                continue;
            }
            pass.set_bind_group(0, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.vertex.slice(..));
            pass.set_vertex_buffer(1, geometry.instance.slice(..));
            pass.set_index_buffer(geometry.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }
    }
}

fn scaled(value: u32, scale: f32) -> u32 {
    ((value as f32 * scale).round() as u32).max(1)
}

impl RenderBackend for GpuBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GeometryHandle, EngineError> {
        let vertex = mk_buffer(
            &self.device,
            "Mesh Vertex Buffer",
            bytemuck::cast_slice(&mesh.vertices),
            wgpu::BufferUsages::VERTEX,
        );
        let index = mk_buffer(
            &self.device,
            "Mesh Index Buffer",
            bytemuck::cast_slice(&mesh.indices),
            wgpu::BufferUsages::INDEX,
        );
        let instance = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Instance Buffer"),
            size: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = GeometryHandle(self.next());
        self.geometries.insert(
            handle,
            GpuGeometry {
                vertex,
                index,
                index_count: mesh.indices.len() as u32,
                instance,
            },
        );
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, EngineError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if image.width() == 0 || image.height() == 0 || image.width() > limit || image.height() > limit {
            return Err(EngineError::TextureGeneration(format!(
                "{}x{} exceeds the device limit of {}",
                image.width(),
                image.height(),
                limit
            )));
        }
        let texture = Texture::from_image(&self.device, &self.queue, image, "procedural map");
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn upload_material(
        &mut self,
        material: &Material,
        map: Option<TextureHandle>,
    ) -> Result<MaterialHandle, EngineError> {
        let texture = map.and_then(|handle| self.textures.get(&handle));
        let uniform_data = MaterialUniform::new(material, texture.is_some());
        let uniform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[uniform_data]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let view = &texture.unwrap_or(&self.fallback).view;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
            label: Some(&material.name),
        });
        let handle = MaterialHandle(self.next());
        self.materials.insert(handle, GpuMaterial { uniform, bind_group });
        Ok(handle)
    }

    fn upload_points(&mut self, particles: &[ParticleInstance]) -> Result<PointsHandle, EngineError> {
        let instances = mk_buffer(
            &self.device,
            "Particle Instance Buffer",
            bytemuck::cast_slice(particles),
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        );
        let uniform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ParticleUniform::new(1.0)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = mk_uniform_bind_group(&self.device, &self.particle_layout, &uniform, "particle_bind_group");
        let handle = PointsHandle(self.next());
        self.points.insert(
            handle,
            GpuPoints {
                instances,
                count: particles.len() as u32,
                uniform,
                bind_group,
            },
        );
        Ok(handle)
    }

    fn update_points(&mut self, handle: PointsHandle, particles: &[ParticleInstance]) {
        match self.points.get(&handle) {
            Some(points) if points.count as usize == particles.len() => {
                self.queue.write_buffer(&points.instances, 0, bytemuck::cast_slice(particles));
            }
            Some(points) => warn!(
                "Point buffer {:?} holds {} particles, refusing an update with {}.",
                handle,
                points.count,
                particles.len()
            ),
            None => warn!("Point buffer {:?} is not live.", handle),
        }
    }

    fn release(&mut self, handle: ResourceHandle) {
        match handle {
            ResourceHandle::Geometry(h) => {
                if let Some(geometry) = self.geometries.remove(&h) {
                    geometry.vertex.destroy();
                    geometry.index.destroy();
                    geometry.instance.destroy();
                }
            }
            ResourceHandle::Material(h) => {
                if let Some(material) = self.materials.remove(&h) {
                    material.uniform.destroy();
                }
            }
            ResourceHandle::Texture(h) => {
                if let Some(texture) = self.textures.remove(&h) {
                    texture.destroy();
                }
            }
            ResourceHandle::Points(h) => {
                if let Some(points) = self.points.remove(&h) {
                    points.instances.destroy();
                    points.uniform.destroy();
                }
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.requested = (width, height);
        self.config.width = scaled(width, self.pixel_scale);
        self.config.height = scaled(height, self.pixel_scale);
        self.reconfigure();
    }

    fn surface_size(&self) -> (u32, u32) {
        self.requested
    }

    fn submit(&mut self, frame: &FramePacket) -> Result<(), EngineError> {
        let Some(surface) = &self.surface else {
            return Err(EngineError::Backend("surface detached".to_string()));
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return Err(EngineError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timed out, skipping the frame.");
                return Ok(());
            }
            Err(e) => return Err(EngineError::Backend(e.to_string())),
        };

        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[frame.camera]));
        self.queue.write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&[frame.lights]));
        for item in frame.opaque.iter().chain(frame.transparent.iter()) {
            if let Some(geometry) = self.geometries.get(&item.geometry) {
                self.queue.write_buffer(&geometry.instance, 0, bytemuck::cast_slice(&[item.transform]));
            }
        }
        for draw in &frame.points {
            if let Some(points) = self.points.get(&draw.points) {
                self.queue.write_buffer(&points.uniform, 0, bytemuck::cast_slice(&[draw.uniform]));
            }
        }

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (target, resolve_target) = match &self.msaa_target {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };
        let [r, g, b, a] = frame.clear;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(1, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(2, &self.light_bind_group, &[]);
            render_pass.set_pipeline(&self.pipelines.basic);
            Self::draw_meshes(&mut render_pass, &frame.opaque, &self.geometries, &self.materials);
            render_pass.set_pipeline(&self.pipelines.transparent);
            Self::draw_meshes(&mut render_pass, &frame.transparent, &self.geometries, &self.materials);

            render_pass.set_pipeline(&self.pipelines.points);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.quad.slice(..));
            for draw in &frame.points {
                let Some(points) = self.points.get(&draw.points) else {
                    continue;
                };
                if points.count == 0 {
                    continue;
                }
                render_pass.set_bind_group(1, &points.bind_group, &[]);
                render_pass.set_vertex_buffer(1, points.instances.slice(..));
                render_pass.draw(0..QUAD.len() as u32, 0..points.count);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.surface.is_some()
    }

    fn detach(&mut self) {
        for (_, geometry) in self.geometries.drain() {
            geometry.vertex.destroy();
            geometry.index.destroy();
            geometry.instance.destroy();
        }
        for (_, texture) in self.textures.drain() {
            texture.destroy();
        }
        self.materials.clear();
        self.points.clear();
        self.depth_texture.destroy();
        if let Some(msaa) = self.msaa_target.take() {
            msaa.destroy();
        }
        self.surface = None;
    }
}
