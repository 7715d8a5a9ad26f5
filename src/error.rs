//! Error taxonomy of the scene engine.
//!
//! None of these are fatal to the host: construction failures are handed to the
//! host's error listener which swaps in a static fallback, frame failures stop
//! the callback chain, and texture failures degrade to flat materials.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No capable rendering surface (canvas/window) could be created.
    #[error("no rendering surface available: {0}")]
    SurfaceUnavailable(String),

    #[error("no compatible graphics adapter: {0}")]
    AdapterUnavailable(String),

    #[error("graphics device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The surface was lost or went out of date; it can be reconfigured.
    #[error("rendering surface lost")]
    SurfaceLost,

    #[error("procedural texture generation failed: {0}")]
    TextureGeneration(String),

    #[error("operation '{operation}' is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Construction errors route to the host's fallback; everything else is a runtime condition.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            EngineError::SurfaceUnavailable(_)
                | EngineError::AdapterUnavailable(_)
                | EngineError::DeviceRequest(_)
        )
    }
}
