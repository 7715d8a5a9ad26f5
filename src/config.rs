//! Engine configuration and injected ambient state.
//!
//! A [`ModelDescriptor`] names what gets built (archetype, quality tier and theme
//! colours) and is immutable once a scene has been constructed from it. The
//! surrounding [`EngineConfig`] adds the flags a placement can flip without a
//! rebuild. Everything the engine would otherwise read from globals (colour
//! scheme, mobile flag, reduced-motion preference) arrives through
//! [`Environment`] at construction time.

use std::{fmt, str::FromStr};

use instant::Duration;

use crate::error::EngineError;

/// Procedurally generated scene category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Archetype {
    Laptop,
    Workspace,
    AbstractShapes,
    CodeScene,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::Laptop,
        Archetype::Workspace,
        Archetype::AbstractShapes,
        Archetype::CodeScene,
    ];
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Archetype::Laptop => "laptop",
            Archetype::Workspace => "workspace",
            Archetype::AbstractShapes => "abstractShapes",
            Archetype::CodeScene => "codeScene",
        })
    }
}

impl FromStr for Archetype {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "laptop" => Ok(Archetype::Laptop),
            "workspace" => Ok(Archetype::Workspace),
            "abstractShapes" | "abstract" => Ok(Archetype::AbstractShapes),
            "codeScene" | "code" => Ok(Archetype::CodeScene),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown archetype '{other}'"
            ))),
        }
    }
}

/// Requested quality. `Auto` is resolved against the [`DeviceProfile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Ultra,
    Auto,
}

impl QualityTier {
    /// Concrete tiers ordered by capability.
    pub const CONCRETE: [QualityTier; 4] = [
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    pub fn resolve(self, device: &DeviceProfile) -> QualityTier {
        match self {
            QualityTier::Auto => {
                if device.is_mobile {
                    QualityTier::Low
                } else if device.hardware_threads <= 4 {
                    QualityTier::Medium
                } else {
                    QualityTier::High
                }
            }
            concrete => concrete,
        }
    }

    pub fn profile(self, device: &DeviceProfile) -> TierProfile {
        TierProfile::for_tier(self.resolve(device))
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
            QualityTier::Auto => "auto",
        })
    }
}

impl FromStr for QualityTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "ultra" => Ok(QualityTier::Ultra),
            "auto" => Ok(QualityTier::Auto),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown quality tier '{other}'"
            ))),
        }
    }
}

/// Every constant that scales with the quality tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierProfile {
    pub tier: QualityTier,
    pub shape_count: usize,
    pub particle_count: usize,
    pub radial_segments: u32,
    pub polyhedron_detail: u32,
    pub texture_size: u32,
    pub keyboard: bool,
    pub mug: bool,
    pub plant: bool,
    pub code_panels: usize,
    pub orbit_particles: usize,
    pub antialias: bool,
    pub contact_shadow: bool,
    /// Minimum time between two rendered frames, `None` renders every callback.
    pub frame_interval: Option<Duration>,
    pub max_pixel_ratio: f32,
}

impl TierProfile {
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                tier,
                shape_count: 10,
                particle_count: 500,
                radial_segments: 12,
                polyhedron_detail: 0,
                texture_size: 256,
                keyboard: false,
                mug: false,
                plant: false,
                code_panels: 6,
                orbit_particles: 12,
                antialias: false,
                contact_shadow: false,
                frame_interval: Some(Duration::from_micros(1_000_000 / 30)),
                max_pixel_ratio: 1.0,
            },
            QualityTier::Medium => Self {
                tier,
                shape_count: 15,
                particle_count: 1000,
                radial_segments: 24,
                polyhedron_detail: 1,
                texture_size: 512,
                keyboard: true,
                mug: true,
                plant: false,
                code_panels: 8,
                orbit_particles: 24,
                antialias: true,
                contact_shadow: false,
                frame_interval: None,
                max_pixel_ratio: 1.5,
            },
            QualityTier::High => Self {
                tier,
                shape_count: 20,
                particle_count: 2000,
                radial_segments: 32,
                polyhedron_detail: 2,
                texture_size: 1024,
                keyboard: true,
                mug: true,
                plant: true,
                code_panels: 10,
                orbit_particles: 36,
                antialias: true,
                contact_shadow: true,
                frame_interval: None,
                max_pixel_ratio: 2.0,
            },
            QualityTier::Ultra | QualityTier::Auto => Self {
                tier: QualityTier::Ultra,
                shape_count: 28,
                particle_count: 3000,
                radial_segments: 48,
                polyhedron_detail: 3,
                texture_size: 2048,
                keyboard: true,
                mug: true,
                plant: true,
                code_panels: 12,
                orbit_particles: 48,
                antialias: true,
                contact_shadow: true,
                frame_interval: None,
                max_pixel_ratio: 2.0,
            },
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.frame_interval.is_some()
    }
}

/// Linear RGB colours for the active colour scheme.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThemeColors {
    pub primary: [f32; 3],
    pub secondary: [f32; 3],
    pub accent: [f32; 3],
    pub background: [f32; 3],
    pub surface: [f32; 3],
    pub text: [f32; 3],
}

impl ThemeColors {
    pub fn dark() -> Self {
        Self {
            primary: [0.39, 0.40, 0.95],
            secondary: [0.55, 0.36, 0.96],
            accent: [0.02, 0.71, 0.83],
            background: [0.04, 0.04, 0.08],
            surface: [0.12, 0.12, 0.18],
            text: [0.90, 0.91, 0.94],
        }
    }

    pub fn light() -> Self {
        Self {
            primary: [0.31, 0.27, 0.90],
            secondary: [0.49, 0.23, 0.93],
            accent: [0.03, 0.57, 0.70],
            background: [0.97, 0.98, 0.99],
            surface: [0.89, 0.91, 0.94],
            text: [0.12, 0.16, 0.23],
        }
    }
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self::dark()
    }
}

/// Device capabilities the host observed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceProfile {
    pub is_mobile: bool,
    pub pixel_ratio: f32,
    pub hardware_threads: usize,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            is_mobile: false,
            pixel_ratio: 1.0,
            hardware_threads: 8,
        }
    }
}

/// Ambient state handed to each engine instance instead of module-level globals.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Environment {
    pub theme: ThemeColors,
    pub device: DeviceProfile,
    pub reduced_motion: bool,
}

/// Immutable description of a scene. Changing any field requires a full rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelDescriptor {
    pub archetype: Archetype,
    pub quality: QualityTier,
    pub theme: ThemeColors,
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self {
            archetype: Archetype::Laptop,
            quality: QualityTier::Auto,
            theme: ThemeColors::default(),
        }
    }
}

/// Options a placement passes when it mounts an engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub descriptor: ModelDescriptor,
    pub scroll_bound: bool,
    /// Accepted and carried through to the backend, no extra passes are recorded.
    pub post_processing: bool,
    pub auto_rotate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            descriptor: ModelDescriptor::default(),
            scroll_bound: false,
            post_processing: false,
            auto_rotate: true,
        }
    }
}

impl EngineConfig {
    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.descriptor.archetype = archetype;
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.descriptor.quality = quality;
        self
    }

    pub fn with_theme(mut self, theme: ThemeColors) -> Self {
        self.descriptor.theme = theme;
        self
    }

    pub fn with_scroll_bound(mut self, scroll_bound: bool) -> Self {
        self.scroll_bound = scroll_bound;
        self
    }

    pub fn with_post_processing(mut self, post_processing: bool) -> Self {
        self.post_processing = post_processing;
        self
    }

    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_tier_follows_device() {
        let mobile = DeviceProfile {
            is_mobile: true,
            ..Default::default()
        };
        let laptop = DeviceProfile {
            hardware_threads: 4,
            ..Default::default()
        };
        assert_eq!(QualityTier::Auto.resolve(&mobile), QualityTier::Low);
        assert_eq!(QualityTier::Auto.resolve(&laptop), QualityTier::Medium);
        assert_eq!(
            QualityTier::Auto.resolve(&DeviceProfile::default()),
            QualityTier::High
        );
        assert_eq!(QualityTier::Ultra.resolve(&mobile), QualityTier::Ultra);
    }

    #[test]
    fn only_low_tier_is_frame_capped() {
        for tier in QualityTier::CONCRETE {
            let profile = TierProfile::for_tier(tier);
            assert_eq!(profile.is_constrained(), tier == QualityTier::Low);
        }
    }

    #[test]
    fn tier_constants_never_shrink_with_capability() {
        let profiles: Vec<_> = QualityTier::CONCRETE
            .iter()
            .map(|t| TierProfile::for_tier(*t))
            .collect();
        for pair in profiles.windows(2) {
            assert!(pair[0].shape_count <= pair[1].shape_count);
            assert!(pair[0].particle_count <= pair[1].particle_count);
            assert!(pair[0].radial_segments <= pair[1].radial_segments);
            assert!(pair[0].polyhedron_detail <= pair[1].polyhedron_detail);
            assert!(pair[0].texture_size <= pair[1].texture_size);
            assert!(pair[0].code_panels <= pair[1].code_panels);
        }
    }

    #[test]
    fn parses_spec_spellings() {
        assert_eq!(
            "abstractShapes".parse::<Archetype>().unwrap(),
            Archetype::AbstractShapes
        );
        assert_eq!("codeScene".parse::<Archetype>().unwrap(), Archetype::CodeScene);
        assert_eq!("ultra".parse::<QualityTier>().unwrap(), QualityTier::Ultra);
        assert!("cube".parse::<Archetype>().is_err());
        for archetype in Archetype::ALL {
            assert_eq!(archetype.to_string().parse::<Archetype>().unwrap(), archetype);
        }
    }
}
