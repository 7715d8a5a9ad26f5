//! Code scene: a circular platform ringed by floating code panels around a
//! holographic core with orbiting rings, played in by an entrance timeline.

use std::f32::consts::{FRAC_PI_2, TAU};

use cgmath::Vector3;

use crate::{
    config::{Archetype, ThemeColors, TierProfile},
    data_structures::{instance::Instance, material::Material, mesh::MeshData, scene_graph::NodeId},
    geometry::{ModelBuild, ParticleRequest, ShapeAnimation, add_contact_shadow, primitives},
    particles::ParticleStyle,
    resources::animation::{AnimationClip, Channel, ClipKind, Easing, Keyframes, Timeline},
};

const PLATFORM_RADIUS: f32 = 4.0;
const PANEL_RING_RADIUS: f32 = 3.2;
const PANEL_WIDTH: f32 = 1.2;
const PANEL_HEIGHT: f32 = 1.6;
const LINES_PER_PANEL: usize = 7;
const CORE_HEIGHT: f32 = 1.6;

pub fn build(tier: &TierProfile, theme: &ThemeColors) -> ModelBuild {
    let mut build = ModelBuild::new(Archetype::CodeScene);
    let segments = tier.radial_segments;
    let mut timeline = Timeline::new();
    let scene = build.graph.add_group(build.pivot, "code scene", Instance::at(0.0, -1.2, 0.0));

    let platform = build.graph.add_group(scene, "platform", Instance::new());
    build.graph.add_mesh(
        platform,
        "platform disc",
        primitives::cylinder(PLATFORM_RADIUS, PLATFORM_RADIUS * 1.05, 0.2, segments * 2),
        Material::flat("platform", theme.surface),
        Instance::new(),
    );
    build.graph.add_mesh(
        platform,
        "platform edge",
        primitives::annulus(PLATFORM_RADIUS * 0.92, PLATFORM_RADIUS, segments * 2),
        Material::glowing("edge glow", theme.primary, 0.8),
        Instance::at(0.0, 0.101, 0.0),
    );
    timeline.add(scale_in("platform in", platform, 0.0, 0.8, Easing::CubicOut));

    // panels face the centre, staggered in one after another
    let panel_lines = code_lines();
    for i in 0..tier.code_panels {
        let angle = i as f32 / tier.code_panels as f32 * TAU;
        let base = Instance::at(
            PANEL_RING_RADIUS * angle.sin(),
            1.4,
            PANEL_RING_RADIUS * angle.cos(),
        )
        .with_euler(0.0, angle + std::f32::consts::PI, 0.0);
        let panel = build.graph.add_group(scene, &format!("panel {i}"), base);
        build.graph.add_mesh(
            panel,
            "panel backing",
            primitives::plane(PANEL_WIDTH, PANEL_HEIGHT),
            Material::flat("panel", theme.surface).translucent(0.55),
            Instance::new(),
        );
        let accent = if i % 2 == 0 { theme.primary } else { theme.secondary };
        build.graph.add_mesh(
            panel,
            "code lines",
            panel_lines.clone(),
            Material::glowing("code line", accent, 0.9),
            Instance::at(0.0, 0.0, 0.01),
        );
        build.animations.insert(
            panel,
            ShapeAnimation {
                base,
                spin: Vector3::new(0.0, 0.0, 0.0),
                float_amplitude: 0.08,
                float_speed: 1.1,
                phase: angle,
            },
        );
        timeline.add(scale_in(&format!("panel {i} in"), panel, 0.3 + i as f32 * 0.08, 0.6, Easing::BackOut));
    }

    // holographic core
    let core = build.graph.add_group(scene, "core", Instance::at(0.0, CORE_HEIGHT, 0.0));
    let heart = build.graph.add_mesh(
        core,
        "core heart",
        primitives::icosahedron(0.7, tier.polyhedron_detail),
        Material::glowing("hologram", theme.accent, 1.2).translucent(0.8),
        Instance::new(),
    );
    build.animations.insert(
        heart,
        ShapeAnimation::spinning(Instance::new(), Vector3::new(0.2, 0.5, 0.0)),
    );
    timeline.add(scale_in("core in", core, 0.6, 0.9, Easing::BackOut));
    timeline.add(
        AnimationClip::new("core pulse", ClipKind::Loop, 1.5).with_channel(Channel::new(
            heart,
            vec![0.0, 1.0, 2.0],
            Keyframes::Scale(vec![
                Vector3::new(1.0, 1.0, 1.0),
                Vector3::new(1.08, 1.08, 1.08),
                Vector3::new(1.0, 1.0, 1.0),
            ]),
            Easing::SineInOut,
        )),
    );

    for r in 0..3 {
        let tilt = Instance::new().with_euler(FRAC_PI_2 + r as f32 * 0.5, r as f32 * 0.7, 0.0);
        let ring = build.graph.add_mesh(
            core,
            &format!("orbit ring {r}"),
            primitives::torus(1.2 + r as f32 * 0.3, 0.02, 6, segments * 2, TAU),
            Material::glowing("ring", theme.primary, 0.9).translucent(0.7),
            tilt,
        );
        let direction = if r % 2 == 0 { 1.0 } else { -1.0 };
        build.animations.insert(
            ring,
            ShapeAnimation::spinning(tilt, Vector3::new(0.0, 0.0, 0.4 * direction * (r + 1) as f32)),
        );
    }

    let mut beads = MeshData::new();
    let bead = primitives::octahedron(0.05, 0);
    for i in 0..tier.orbit_particles {
        let a = i as f32 / tier.orbit_particles as f32 * TAU;
        let radius = 1.9 + 0.15 * (a * 3.0).sin();
        beads.merge(&bead, &Instance::at(radius * a.cos(), 0.2 * (a * 2.0).sin(), radius * a.sin()));
    }
    let orbit = build.graph.add_mesh(
        core,
        "orbit particles",
        beads,
        Material::glowing("orbit", theme.secondary, 1.5),
        Instance::new(),
    );
    build.animations.insert(
        orbit,
        ShapeAnimation::spinning(Instance::new(), Vector3::new(0.0, 0.6, 0.0)),
    );

    add_contact_shadow(&mut build, tier, -1.31, PLATFORM_RADIUS * 1.2);

    build.particles = Some(ParticleRequest {
        anchor: scene,
        count: tier.particle_count / 2,
        size: 0.04,
        spread: PLATFORM_RADIUS * 2.5,
        style: ParticleStyle::Code,
        cpu_wave: false,
    });
    build.timeline = Some(timeline);
    build
}

fn scale_in(name: &str, node: NodeId, delay: f32, duration: f32, easing: Easing) -> AnimationClip {
    AnimationClip::new(name, ClipKind::Entrance, delay).with_channel(Channel::new(
        node,
        vec![0.0, duration],
        Keyframes::Scale(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0)]),
        easing,
    ))
}

/// Bars of varying width and indent standing in for lines of code.
fn code_lines() -> MeshData {
    let mut lines = MeshData::new();
    let line_height = 0.06;
    let pitch = PANEL_HEIGHT * 0.8 / LINES_PER_PANEL as f32;
    let indents = [0.0, 0.1, 0.2, 0.2, 0.1, 0.2, 0.0];
    let widths = [0.7, 0.55, 0.8, 0.4, 0.6, 0.5, 0.3];
    for i in 0..LINES_PER_PANEL {
        let width = widths[i % widths.len()] * (PANEL_WIDTH - 0.3);
        let left = -PANEL_WIDTH * 0.5 + 0.15 + indents[i % indents.len()];
        let y = PANEL_HEIGHT * 0.4 - pitch * (i as f32 + 0.5);
        lines.merge(
            &primitives::plane(width, line_height),
            &Instance::at(left + width * 0.5, y, 0.0),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTier;

    #[test]
    fn panels_ring_the_core() {
        let tier = TierProfile::for_tier(QualityTier::Medium);
        let build = build(&tier, &ThemeColors::dark());
        for i in 0..tier.code_panels {
            let panel = build.graph.find(&format!("panel {i}")).unwrap();
            let p = build.graph.get(panel).unwrap().local.position;
            let r = (p.x * p.x + p.z * p.z).sqrt();
            assert!((r - PANEL_RING_RADIUS).abs() < 1e-4);
        }
        assert!(build.graph.find(&format!("panel {}", tier.code_panels)).is_none());
        assert_eq!(build.particle_count(), tier.particle_count / 2);
    }

    #[test]
    fn timeline_has_entrance_and_loop_clips() {
        let tier = TierProfile::for_tier(QualityTier::Low);
        let build = build(&tier, &ThemeColors::dark());
        let timeline = build.timeline.unwrap();
        let entrances = timeline.clips().iter().filter(|c| c.kind == ClipKind::Entrance).count();
        let loops = timeline.clips().iter().filter(|c| c.kind == ClipKind::Loop).count();
        // platform, every panel, the core
        assert_eq!(entrances, tier.code_panels + 2);
        assert_eq!(loops, 1);
    }

    #[test]
    fn code_lines_are_one_quad_each() {
        assert_eq!(code_lines().vertex_count(), LINES_PER_PANEL * 4);
    }
}
