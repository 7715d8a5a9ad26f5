//! Render pipelines.
//!
//! - `basic`: lit opaque meshes and the shared pipeline builder
//! - `transparent`: alpha blended meshes drawn back to front
//! - `points`: additive particle billboards
//! - `light`: light uniform shared by the mesh pipelines

pub mod basic;
pub mod light;
pub mod points;
pub mod transparent;
