//! Workspace: desk, laptop, monitor with a UI mockup, and tier-gated props.

use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::Vector3;

use crate::{
    config::{Archetype, ThemeColors, TierProfile},
    data_structures::{instance::Instance, material::Material},
    geometry::{
        ModelBuild, ParticleRequest, ShapeAnimation, add_contact_shadow,
        laptop::{self, darken},
        primitives, screen_material,
    },
    particles::ParticleStyle,
    resources::procedural,
};

const DESK_WIDTH: f32 = 6.0;
const DESK_DEPTH: f32 = 3.0;
const DESK_THICKNESS: f32 = 0.15;
const LEG_HEIGHT: f32 = 1.6;

pub fn build(tier: &TierProfile, theme: &ThemeColors) -> ModelBuild {
    let mut build = ModelBuild::new(Archetype::Workspace);
    let segments = tier.radial_segments;
    let graph = &mut build.graph;
    let desk = graph.add_group(build.pivot, "desk", Instance::at(0.0, -0.3, 0.0).with_uniform_scale(0.8));

    let wood = [0.42, 0.3, 0.22];
    graph.add_mesh(
        desk,
        "desk top",
        primitives::cuboid(DESK_WIDTH, DESK_THICKNESS, DESK_DEPTH),
        Material::flat("wood", wood),
        Instance::new(),
    );
    for (i, (x, z)) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)].into_iter().enumerate() {
        graph.add_mesh(
            desk,
            &format!("leg {i}"),
            primitives::cylinder(0.07, 0.07, LEG_HEIGHT, segments),
            Material::flat("leg", darken(wood, 0.6)),
            Instance::at(
                x * (DESK_WIDTH * 0.5 - 0.2),
                -(LEG_HEIGHT + DESK_THICKNESS) * 0.5,
                z * (DESK_DEPTH * 0.5 - 0.2),
            ),
        );
    }
    let top = DESK_THICKNESS * 0.5;

    laptop::assemble(
        graph,
        desk,
        Instance::at(-1.3, top, 0.6).with_euler(0.0, 0.35, 0.0).with_uniform_scale(0.55),
        tier,
        theme,
    );

    // monitor
    let monitor = graph.add_group(desk, "monitor", Instance::at(0.9, top, -0.7));
    let frame = darken(theme.surface, 0.5);
    graph.add_mesh(
        monitor,
        "monitor foot",
        primitives::cylinder(0.45, 0.5, 0.05, segments),
        Material::flat("monitor frame", frame),
        Instance::at(0.0, 0.025, 0.0),
    );
    graph.add_mesh(
        monitor,
        "monitor neck",
        primitives::cuboid(0.12, 1.0, 0.08),
        Material::flat("monitor frame", frame),
        Instance::at(0.0, 0.55, -0.05),
    );
    graph.add_mesh(
        monitor,
        "monitor panel",
        primitives::cuboid(2.6, 1.5, 0.08),
        Material::flat("monitor frame", frame),
        Instance::at(0.0, 1.3, 0.0),
    );
    let ui = procedural::map_or_flat(
        procedural::render_ui_mockup(tier.texture_size, tier.texture_size * 9 / 16, theme),
        "monitor screen",
    );
    graph.add_mesh(
        monitor,
        "monitor screen",
        primitives::plane(2.45, 1.38),
        screen_material("ui screen", theme, ui),
        Instance::at(0.0, 1.3, 0.041),
    );

    if tier.mug {
        let mug = graph.add_group(desk, "mug", Instance::at(2.2, top, 0.7));
        graph.add_mesh(
            mug,
            "mug body",
            primitives::cylinder(0.18, 0.16, 0.35, segments),
            Material::flat("ceramic", theme.accent),
            Instance::at(0.0, 0.175, 0.0),
        );
        graph.add_mesh(
            mug,
            "mug handle",
            primitives::torus(0.1, 0.025, (segments / 2).max(3), segments, PI),
            Material::flat("ceramic", theme.accent),
            Instance::at(0.18, 0.175, 0.0).with_euler(0.0, 0.0, -FRAC_PI_2),
        );
    }

    if tier.plant {
        let plant = graph.add_group(desk, "plant", Instance::at(-2.5, top, -0.9));
        graph.add_mesh(
            plant,
            "pot",
            primitives::cylinder(0.25, 0.18, 0.4, segments),
            Material::flat("terracotta", [0.72, 0.36, 0.24]),
            Instance::at(0.0, 0.2, 0.0),
        );
        graph.add_mesh(
            plant,
            "soil",
            primitives::disc(0.23, segments),
            Material::flat("soil", [0.2, 0.13, 0.08]),
            Instance::at(0.0, 0.38, 0.0),
        );
        let leaves = graph.add_group(plant, "leaves", Instance::at(0.0, 0.38, 0.0));
        for i in 0..5 {
            let yaw = i as f32 / 5.0 * std::f32::consts::TAU;
            graph.add_mesh(
                leaves,
                &format!("leaf {i}"),
                primitives::cylinder(0.0, 0.07, 0.6, (segments / 2).max(3)),
                Material::flat("leaf", [0.22, 0.55, 0.3]),
                Instance::at(0.12 * yaw.cos(), 0.28, 0.12 * yaw.sin()).with_euler(
                    0.35 * yaw.sin(),
                    0.0,
                    -0.35 * yaw.cos(),
                ),
            );
        }
        build
            .animations
            .insert(leaves, ShapeAnimation::spinning(Instance::at(0.0, 0.38, 0.0), Vector3::new(0.0, 0.15, 0.0)));
    }

    add_contact_shadow(&mut build, tier, -0.3 - (LEG_HEIGHT + DESK_THICKNESS * 0.5) * 0.8, 3.2);

    let root = build.graph.root();
    build.particles = Some(ParticleRequest {
        anchor: root,
        count: tier.particle_count / 4,
        size: 0.03,
        spread: 5.0,
        style: ParticleStyle::GlowSphere,
        cpu_wave: false,
    });
    build
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTier;

    #[test]
    fn props_are_gated_by_tier() {
        let theme = ThemeColors::light();
        let low = build(&TierProfile::for_tier(QualityTier::Low), &theme);
        let medium = build(&TierProfile::for_tier(QualityTier::Medium), &theme);
        let ultra = build(&TierProfile::for_tier(QualityTier::Ultra), &theme);
        assert!(low.graph.find("mug").is_none() && low.graph.find("plant").is_none());
        assert!(medium.graph.find("mug").is_some() && medium.graph.find("plant").is_none());
        assert!(ultra.graph.find("mug").is_some() && ultra.graph.find("plant").is_some());
        assert!(ultra.graph.find("contact shadow").is_some());
    }

    #[test]
    fn monitor_shows_the_ui_mockup_and_dust_floats_around() {
        let tier = TierProfile::for_tier(QualityTier::Low);
        let build = build(&tier, &ThemeColors::dark());
        let screen = build.graph.find("monitor screen").unwrap();
        assert!(build.graph.get(screen).unwrap().mesh().unwrap().material.has_map());
        assert!(build.graph.find("laptop").is_some());
        assert_eq!(build.particle_count(), 125);
    }
}
