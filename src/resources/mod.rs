/**
 * Everything a scene is made of besides geometry: procedural colour maps
 * painted on the CPU and the tweens/timelines that move nodes over time.
 */
pub mod animation;
pub mod procedural;
