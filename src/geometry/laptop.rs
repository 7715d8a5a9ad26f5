//! Laptop: base, hinged screen showing a rendered code listing, and a key grid
//! on tiers that can afford it.

use std::f32::consts::FRAC_PI_2;

use crate::{
    config::{Archetype, ThemeColors, TierProfile},
    data_structures::{
        instance::{Instance, euler},
        material::Material,
        mesh::MeshData,
        scene_graph::{NodeId, SceneGraph},
    },
    geometry::{ModelBuild, add_contact_shadow, primitives, screen_material},
    resources::{
        animation::{AnimationClip, Channel, ClipKind, Easing, Keyframes, Timeline},
        procedural,
    },
};

const BASE_WIDTH: f32 = 3.2;
const BASE_DEPTH: f32 = 2.2;
const BASE_HEIGHT: f32 = 0.12;
const LID_HEIGHT: f32 = 2.1;
const LID_THICKNESS: f32 = 0.08;
/// Lid tilt when open, leaning back from vertical.
const OPEN_ANGLE: f32 = -0.25;
const KEY_ROWS: usize = 5;
const KEY_COLUMNS: usize = 14;

/// Handles to the laptop nodes other builders animate.
#[derive(Clone, Copy, Debug)]
pub struct LaptopParts {
    pub group: NodeId,
    pub hinge: NodeId,
    pub screen: NodeId,
}

pub fn build(tier: &TierProfile, theme: &ThemeColors) -> ModelBuild {
    let mut build = ModelBuild::new(Archetype::Laptop);
    let parts = assemble(&mut build.graph, build.pivot, Instance::at(0.0, -0.6, 0.3), tier, theme);

    // lid swings open from closed
    let mut timeline = Timeline::new();
    timeline.add(
        AnimationClip::new("lid open", ClipKind::Entrance, 0.2).with_channel(Channel::new(
            parts.hinge,
            vec![0.0, 1.2],
            Keyframes::Rotation(vec![euler(FRAC_PI_2, 0.0, 0.0), euler(OPEN_ANGLE, 0.0, 0.0)]),
            Easing::CubicOut,
        )),
    );
    build.timeline = Some(timeline);

    add_contact_shadow(&mut build, tier, -0.62, 2.4);
    build
}

/// Adds a laptop below `parent`. The group origin sits on the underside of the base.
pub fn assemble(
    graph: &mut SceneGraph,
    parent: NodeId,
    placement: Instance,
    tier: &TierProfile,
    theme: &ThemeColors,
) -> LaptopParts {
    let shell = shell_color(theme);
    let group = graph.add_group(parent, "laptop", placement);

    graph.add_mesh(
        group,
        "base",
        primitives::cuboid(BASE_WIDTH, BASE_HEIGHT, BASE_DEPTH),
        Material::flat("aluminium", shell),
        Instance::at(0.0, BASE_HEIGHT * 0.5, 0.0),
    );
    graph.add_mesh(
        group,
        "trackpad",
        primitives::plane(1.0, 0.6),
        Material::flat("trackpad", darken(shell, 0.85)),
        Instance::at(0.0, BASE_HEIGHT + 0.002, 0.65).with_euler(-FRAC_PI_2, 0.0, 0.0),
    );
    if tier.keyboard {
        graph.add_mesh(
            group,
            "keyboard",
            key_grid(),
            Material::flat("keys", darken(theme.surface, 0.6)),
            Instance::at(0.0, BASE_HEIGHT + 0.015, -0.3),
        );
    }

    let hinge = graph.add_group(
        group,
        "hinge",
        Instance::at(0.0, BASE_HEIGHT, -BASE_DEPTH * 0.5).with_euler(OPEN_ANGLE, 0.0, 0.0),
    );
    graph.add_mesh(
        hinge,
        "hinge barrel",
        primitives::cylinder(0.06, 0.06, BASE_WIDTH * 0.9, tier.radial_segments),
        Material::flat("hinge", darken(shell, 0.7)),
        Instance::new().with_euler(0.0, 0.0, FRAC_PI_2),
    );
    graph.add_mesh(
        hinge,
        "lid",
        primitives::cuboid(BASE_WIDTH, LID_HEIGHT, LID_THICKNESS),
        Material::flat("aluminium", shell),
        Instance::at(0.0, LID_HEIGHT * 0.5, -LID_THICKNESS * 0.5),
    );

    let width = tier.texture_size;
    let height = tier.texture_size * 5 / 8;
    let map = procedural::map_or_flat(
        procedural::render_code_texture(width, height, theme),
        "laptop screen",
    );
    let screen = graph.add_mesh(
        hinge,
        "screen",
        primitives::plane(BASE_WIDTH - 0.2, LID_HEIGHT - 0.2),
        screen_material("code screen", theme, map),
        Instance::at(0.0, LID_HEIGHT * 0.5, 0.002),
    );

    LaptopParts {
        group,
        hinge,
        screen,
    }
}

/// All keys merged into one mesh.
fn key_grid() -> MeshData {
    let key = primitives::cuboid(0.16, 0.03, 0.16);
    let pitch = 0.19;
    let mut grid = MeshData::new();
    for row in 0..KEY_ROWS {
        for col in 0..KEY_COLUMNS {
            let x = (col as f32 - (KEY_COLUMNS - 1) as f32 * 0.5) * pitch;
            let z = (row as f32 - (KEY_ROWS - 1) as f32 * 0.5) * pitch;
            grid.merge(&key, &Instance::at(x, 0.0, z));
        }
    }
    // space bar
    grid.merge(
        &primitives::cuboid(pitch * 5.0, 0.03, 0.16),
        &Instance::at(0.0, 0.0, KEY_ROWS as f32 * 0.5 * pitch + 0.1),
    );
    grid
}

fn shell_color(theme: &ThemeColors) -> [f32; 3] {
    [
        0.45 + theme.surface[0] * 0.3,
        0.46 + theme.surface[1] * 0.3,
        0.5 + theme.surface[2] * 0.3,
    ]
}

pub(crate) fn darken(c: [f32; 3], k: f32) -> [f32; 3] {
    [c[0] * k, c[1] * k, c[2] * k]
}
