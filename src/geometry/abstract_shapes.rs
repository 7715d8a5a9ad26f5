//! Abstract shapes: a cloud of primitive solids on a sphere, each with its own
//! spin, float amplitude and phase, inside a glowing particle shell.

use std::f32::consts::{PI, TAU};

use cgmath::Vector3;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::{Archetype, ThemeColors, TierProfile},
    data_structures::{instance::Instance, material::Material, mesh::MeshData},
    geometry::{ModelBuild, ParticleRequest, ShapeAnimation, primitives},
    particles::ParticleStyle,
};

const SHAPE_SEED: u64 = 0xab57_2ac7;
const INNER_RADIUS: f32 = 2.2;
const OUTER_RADIUS: f32 = 3.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Torus,
    Icosahedron,
    Octahedron,
    TorusKnot,
}

impl ShapeKind {
    pub fn for_index(i: usize) -> Self {
        match i % 4 {
            0 => ShapeKind::Torus,
            1 => ShapeKind::Icosahedron,
            2 => ShapeKind::Octahedron,
            _ => ShapeKind::TorusKnot,
        }
    }

    fn mesh(self, size: f32, tier: &TierProfile) -> MeshData {
        let segments = tier.radial_segments;
        match self {
            ShapeKind::Torus => primitives::torus(size, size * 0.35, (segments / 2).max(3), segments, TAU),
            ShapeKind::Icosahedron => primitives::icosahedron(size, tier.polyhedron_detail),
            ShapeKind::Octahedron => primitives::octahedron(size, tier.polyhedron_detail),
            ShapeKind::TorusKnot => primitives::torus_knot(size * 0.8, size * 0.25, segments * 2, (segments / 3).max(3), 2, 3),
        }
    }
}

pub fn build(tier: &TierProfile, theme: &ThemeColors) -> ModelBuild {
    let mut build = ModelBuild::new(Archetype::AbstractShapes);
    let mut rng = StdRng::seed_from_u64(SHAPE_SEED);
    let palette = [theme.primary, theme.secondary, theme.accent];

    for i in 0..tier.shape_count {
        let kind = ShapeKind::for_index(i);
        let z: f32 = rng.gen_range(-1.0..=1.0);
        let theta: f32 = rng.gen_range(0.0..TAU);
        let ring = (1.0 - z * z).max(0.0).sqrt();
        let r = rng.gen_range(INNER_RADIUS..OUTER_RADIUS);
        let size = rng.gen_range(0.25f32..0.55);
        let base = Instance::at(r * ring * theta.cos(), r * z, r * ring * theta.sin()).with_euler(
            rng.gen_range(0.0..PI),
            rng.gen_range(0.0..PI),
            0.0,
        );

        let color = palette[i % palette.len()];
        let mut material = Material::glowing(&format!("{kind:?}"), color, 0.25);
        if i % 3 == 2 {
            material = material.translucent(0.75);
        }
        let node = build.graph.add_mesh(build.pivot, &format!("shape {i}"), kind.mesh(size, tier), material, base);

        build.animations.insert(
            node,
            ShapeAnimation {
                base,
                spin: Vector3::new(
                    rng.gen_range(-0.5..0.5),
                    rng.gen_range(-0.5..0.5),
                    rng.gen_range(-0.2..0.2),
                ),
                float_amplitude: rng.gen_range(0.1..0.3),
                float_speed: rng.gen_range(0.5..1.5),
                phase: rng.gen_range(0.0..TAU),
            },
        );
    }

    build.particles = Some(ParticleRequest {
        anchor: build.pivot,
        count: tier.particle_count,
        size: 0.05,
        spread: OUTER_RADIUS * 1.6,
        style: ParticleStyle::GlowSphere,
        cpu_wave: true,
    });
    build
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTier;

    #[test]
    fn every_shape_is_animated_and_on_the_shell() {
        let tier = TierProfile::for_tier(QualityTier::High);
        let build = build(&tier, &ThemeColors::dark());
        assert_eq!(build.object_count(), tier.shape_count);
        assert_eq!(build.animations.len(), tier.shape_count);
        for (node, animation) in build.animations.iter() {
            let r = cgmath::InnerSpace::magnitude(animation.base.position);
            assert!((INNER_RADIUS - 1e-4..OUTER_RADIUS + 1e-4).contains(&r));
            assert!(build.graph.get(*node).unwrap().mesh().is_some());
        }
    }

    #[test]
    fn kinds_cycle_through_all_four_solids() {
        let kinds: Vec<_> = (0..8).map(ShapeKind::for_index).collect();
        assert_eq!(kinds[0], ShapeKind::Torus);
        assert_eq!(kinds[3], ShapeKind::TorusKnot);
        assert_eq!(kinds[4], ShapeKind::Torus);
    }

    #[test]
    fn low_tier_counts() {
        let build = build(&TierProfile::for_tier(QualityTier::Low), &ThemeColors::dark());
        assert_eq!(build.object_count(), 10);
        assert_eq!(build.particle_count(), 500);
        assert!(build.particles.unwrap().cpu_wave);
    }
}
