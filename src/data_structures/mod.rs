//! Engine data structures: scene graph, transforms, meshes, materials, textures.
//!
//! - `scene_graph` is the arena of group and mesh nodes built per archetype
//! - `instance` holds node transforms and their GPU representation
//! - `mesh` contains CPU-side vertex/index data and vertex layouts
//! - `material` describes flat, emissive, translucent and mapped surfaces
//! - `texture` wraps GPU textures (depth, MSAA targets, colour maps)

pub mod instance;
pub mod material;
pub mod mesh;
pub mod scene_graph;
pub mod texture;
