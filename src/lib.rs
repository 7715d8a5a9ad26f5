//! folio-scene
//!
//! Procedurally generated 3D hero scenes for portfolio pages. One of four
//! archetypes (laptop, workspace, abstract shapes, code scene) is built from
//! primitives at mount time, optionally paired with a shader-driven particle
//! cloud, and animated by a frame loop that reacts to pointer drags, hover and
//! scroll. Everything runs natively in a window or on wasm32 in a canvas.
//!
//! High-level modules
//! - `config`: archetypes, quality tiers, theme colours and the injected environment
//! - `geometry`: per-archetype scene builders and shared primitives
//! - `particles`: particle layouts and the point shader
//! - `engine`: lifecycle state machine and the frame callback
//! - `context`: owns the built scene and every backend resource it allocated
//! - `backend`: the render backend seam with wgpu and headless implementations
//! - `interaction`, `scroll`: pointer, cursor and scroll/viewport bindings
//! - `render`: per-frame draw composition
//! - `flow`: the winit host (window or canvas, event loop, fallback)
//!

pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod engine;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod interaction;
pub mod particles;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod schedule;
pub mod scroll;
pub mod state;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{Archetype, EngineConfig, Environment, QualityTier, ThemeColors};
pub use engine::{EngineState, FrameOutcome, SceneEngine};
pub use error::EngineError;
pub use flow::{HostOptions, run};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Mounts a scene into the canvas with id `canvas_id`.
///
/// Unknown archetype or quality names fall back to the defaults with a warning.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn mount_scene(canvas_id: String, archetype: String, quality: String) -> Result<(), JsValue> {
    let mut config = EngineConfig::default();
    match archetype.parse::<Archetype>() {
        Ok(archetype) => config = config.with_archetype(archetype),
        Err(e) => log::warn!("{}", e),
    }
    match quality.parse::<QualityTier>() {
        Ok(quality) => config = config.with_quality(quality),
        Err(e) => log::warn!("{}", e),
    }
    let options = HostOptions {
        config,
        canvas_id,
        ..HostOptions::default()
    };
    run(options).map_err(|e| JsValue::from_str(&e.to_string()))
}
