//! Opens a window showing one scene.
//!
//! Usage: `folio-scene [laptop|workspace|abstractShapes|codeScene] [low|medium|high|ultra|auto] [--static]`

use folio_scene::{Archetype, EngineConfig, HostOptions, QualityTier, flow::run};

fn main() -> anyhow::Result<()> {
    let mut config = EngineConfig::default();
    let mut reduced_motion = false;
    for arg in std::env::args().skip(1) {
        if arg == "--static" {
            reduced_motion = true;
        } else if let Ok(archetype) = arg.parse::<Archetype>() {
            config = config.with_archetype(archetype);
        } else {
            config = config.with_quality(arg.parse::<QualityTier>()?);
        }
    }
    run(HostOptions {
        config,
        reduced_motion,
        title: format!("folio-scene: {}", config.descriptor.archetype),
        ..HostOptions::default()
    })
}
