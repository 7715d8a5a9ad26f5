//! Surface descriptions for mesh nodes.

use image::RgbaImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    /// Alpha blended, drawn after opaque geometry without depth writes.
    Transparent,
}

/// Flat colour, emissive term, opacity and an optional colour map.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub blend: BlendMode,
    pub map: Option<RgbaImage>,
}

impl Material {
    pub fn flat(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
            emissive: [0.0; 3],
            emissive_intensity: 0.0,
            opacity: 1.0,
            blend: BlendMode::Opaque,
            map: None,
        }
    }

    pub fn glowing(name: &str, color: [f32; 3], intensity: f32) -> Self {
        Self {
            emissive: color,
            emissive_intensity: intensity,
            ..Self::flat(name, color)
        }
    }

    pub fn translucent(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.blend = BlendMode::Transparent;
        self
    }

    /// Attaches a colour map; `None` leaves the flat colour in place.
    pub fn with_map(mut self, map: Option<RgbaImage>) -> Self {
        self.map = map;
        self
    }

    pub fn has_map(&self) -> bool {
        self.map.is_some()
    }
}
