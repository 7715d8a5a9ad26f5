//! Procedural scene builders.
//!
//! Each archetype is a pure function from a [`TierProfile`] and theme colours
//! to a [`ModelBuild`]: the scene graph, the per-node animation side table,
//! an optional keyframe timeline and an optional particle request. Nothing is
//! registered anywhere else; dropping the build drops everything it made.
//!
//! Every node the interaction layer moves sits below [`ModelBuild::pivot`].
//! Ground-level decoration (the contact shadow) hangs off the root instead so
//! it stays put while the model turns.

pub mod abstract_shapes;
pub mod code_scene;
pub mod laptop;
pub mod primitives;
pub mod workspace;

use cgmath::Vector3;

use crate::{
    config::{Archetype, Environment, ModelDescriptor, ThemeColors, TierProfile},
    data_structures::{
        instance::{Instance, euler},
        material::Material,
        scene_graph::{NodeId, SceneGraph},
    },
    particles::ParticleStyle,
    resources::animation::Timeline,
};

/// Per-node idle motion applied every frame on top of a base transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeAnimation {
    pub base: Instance,
    /// Radians per second around x, y and z.
    pub spin: Vector3<f32>,
    pub float_amplitude: f32,
    pub float_speed: f32,
    pub phase: f32,
}

impl ShapeAnimation {
    pub fn spinning(base: Instance, spin: Vector3<f32>) -> Self {
        Self {
            base,
            spin,
            float_amplitude: 0.0,
            float_speed: 0.0,
            phase: 0.0,
        }
    }

    pub fn pose(&self, t: f32) -> Instance {
        let mut pose = self.base;
        pose.position.y += self.float_amplitude * (t * self.float_speed + self.phase).sin();
        pose.rotation = self.base.rotation * euler(self.spin.x * t, self.spin.y * t, self.spin.z * t);
        pose
    }
}

/// Side table of animation parameters keyed by scene node.
#[derive(Clone, Debug, Default)]
pub struct AnimationTable {
    entries: Vec<(NodeId, ShapeAnimation)>,
}

impl AnimationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, animation: ShapeAnimation) {
        match self.entries.iter_mut().find(|(id, _)| *id == node) {
            Some(entry) => entry.1 = animation,
            None => self.entries.push((node, animation)),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<&ShapeAnimation> {
        self.entries.iter().find(|(id, _)| *id == node).map(|(_, a)| a)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NodeId, ShapeAnimation)> {
        self.entries.iter()
    }

    /// Writes every pose for time `t` (seconds) into the graph.
    pub fn apply(&self, graph: &mut SceneGraph, t: f32) {
        for (node, animation) in &self.entries {
            graph.set_local_transform(*node, animation.pose(t));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Particle cloud an archetype asks the engine to create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleRequest {
    /// Node whose world transform positions the cloud.
    pub anchor: NodeId,
    pub count: usize,
    pub size: f32,
    pub spread: f32,
    pub style: ParticleStyle,
    pub cpu_wave: bool,
}

#[derive(Clone, Debug)]
pub struct ModelBuild {
    pub archetype: Archetype,
    pub graph: SceneGraph,
    /// Group rotated, scaled and lifted by interaction and scroll.
    pub pivot: NodeId,
    pub animations: AnimationTable,
    pub timeline: Option<Timeline>,
    pub particles: Option<ParticleRequest>,
}

impl ModelBuild {
    fn new(archetype: Archetype) -> Self {
        let mut graph = SceneGraph::new(&archetype.to_string());
        let pivot = graph.add_group(graph.root(), "pivot", Instance::new());
        Self {
            archetype,
            graph,
            pivot,
            animations: AnimationTable::new(),
            timeline: None,
            particles: None,
        }
    }

    /// Mesh nodes in the build, the "object count" of the scene.
    pub fn object_count(&self) -> usize {
        self.graph.mesh_count()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.map_or(0, |p| p.count)
    }
}

/// Builds the scene described by `descriptor` for the given environment.
pub fn build(descriptor: &ModelDescriptor, env: &Environment) -> ModelBuild {
    let tier = descriptor.quality.profile(&env.device);
    let theme = &descriptor.theme;
    let mut build = match descriptor.archetype {
        Archetype::Laptop => laptop::build(&tier, theme),
        Archetype::Workspace => workspace::build(&tier, theme),
        Archetype::AbstractShapes => abstract_shapes::build(&tier, theme),
        Archetype::CodeScene => code_scene::build(&tier, theme),
    };
    if env.reduced_motion {
        if let Some(timeline) = build.timeline.as_mut() {
            timeline.skip_entrances();
        }
    }
    build.graph.update_world_transforms();
    build
}

/// Soft translucent disc under the model, on tiers that ask for shadows.
pub(crate) fn add_contact_shadow(build: &mut ModelBuild, tier: &TierProfile, y: f32, radius: f32) {
    if !tier.contact_shadow {
        return;
    }
    let root = build.graph.root();
    build.graph.add_mesh(
        root,
        "contact shadow",
        primitives::disc(radius, tier.radial_segments * 2),
        Material::flat("contact shadow", [0.0, 0.0, 0.0]).translucent(0.35),
        Instance::at(0.0, y, 0.0),
    );
}

pub(crate) fn screen_material(name: &str, theme: &ThemeColors, map: Option<image::RgbaImage>) -> Material {
    let fallback = [
        theme.surface[0] * 0.5,
        theme.surface[1] * 0.5,
        theme.surface[2] * 0.5,
    ];
    Material::glowing(name, fallback, 0.35).with_map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceProfile, QualityTier};

    fn build_at(archetype: Archetype, quality: QualityTier) -> ModelBuild {
        let descriptor = ModelDescriptor {
            archetype,
            quality,
            theme: ThemeColors::dark(),
        };
        build(&descriptor, &Environment::default())
    }

    #[test]
    fn lower_tiers_never_produce_more_vertices_or_particles() {
        for archetype in Archetype::ALL {
            let builds: Vec<_> = QualityTier::CONCRETE
                .iter()
                .map(|tier| build_at(archetype, *tier))
                .collect();
            for pair in builds.windows(2) {
                assert!(
                    pair[0].graph.vertex_count() <= pair[1].graph.vertex_count(),
                    "{archetype} vertices"
                );
                assert!(
                    pair[0].particle_count() <= pair[1].particle_count(),
                    "{archetype} particles"
                );
            }
        }
    }

    #[test]
    fn builds_are_deterministic() {
        for archetype in Archetype::ALL {
            let a = build_at(archetype, QualityTier::Medium);
            let b = build_at(archetype, QualityTier::Medium);
            assert_eq!(a.graph.vertex_count(), b.graph.vertex_count());
            let wa: Vec<_> = a.graph.traverse().map(|(_, n)| *n.world()).collect();
            let wb: Vec<_> = b.graph.traverse().map(|(_, n)| *n.world()).collect();
            assert_eq!(wa, wb);
        }
    }

    #[test]
    fn auto_resolves_through_the_device_profile() {
        let descriptor = ModelDescriptor {
            archetype: Archetype::AbstractShapes,
            quality: QualityTier::Auto,
            theme: ThemeColors::dark(),
        };
        let env = Environment {
            device: DeviceProfile {
                is_mobile: true,
                ..DeviceProfile::default()
            },
            ..Environment::default()
        };
        let build = build(&descriptor, &env);
        assert_eq!(build.object_count(), 10);
        assert_eq!(build.particle_count(), 500);
    }

    #[test]
    fn shape_pose_floats_around_its_base() {
        let animation = ShapeAnimation {
            base: Instance::at(1.0, 2.0, 3.0),
            spin: Vector3::new(0.0, 1.0, 0.0),
            float_amplitude: 0.5,
            float_speed: 1.0,
            phase: 0.0,
        };
        let pose = animation.pose(std::f32::consts::FRAC_PI_2);
        assert!((pose.position.y - 2.5).abs() < 1e-5);
        assert_eq!(pose.position.x, 1.0);
        assert_eq!(animation.pose(0.0), Instance::at(1.0, 2.0, 3.0));
    }
}
