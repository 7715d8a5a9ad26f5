//! Tweens and keyframe timelines.
//!
//! [`Eased`] is a single scalar that moves toward a target over a fixed
//! duration; interaction and scroll handlers retarget it and the frame loop
//! samples it. [`Timeline`] plays keyframed clips against scene-graph nodes,
//! either once (entrance animations that hold their last key) or looping.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};
use instant::Duration;

use crate::data_structures::scene_graph::{NodeId, SceneGraph};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    QuadOut,
    CubicOut,
    CubicInOut,
    /// Overshoots slightly before settling.
    BackOut,
    SineInOut,
}

impl Easing {
    /// Maps `t` in `[0, 1]` to eased progress. Input outside the range is clamped.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::BackOut => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Easing::SineInOut => -((std::f32::consts::PI * t).cos() - 1.0) / 2.0,
        }
    }
}

/// A scalar tween. Retargeting starts a new segment from the current value so
/// fast successive updates never pop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eased {
    from: f32,
    to: f32,
    start: Duration,
    duration: Duration,
    easing: Easing,
}

impl Eased {
    pub fn new(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: Duration::ZERO,
            duration: Duration::ZERO,
            easing: Easing::Linear,
        }
    }

    pub fn value(&self, now: Duration) -> f32 {
        if self.duration.is_zero() || now >= self.start + self.duration {
            return self.to;
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f32();
        let t = self.easing.apply(elapsed / self.duration.as_secs_f32());
        self.from + (self.to - self.from) * t
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn set_target(&mut self, target: f32, now: Duration, duration: Duration, easing: Easing) {
        self.from = self.value(now);
        self.to = target;
        self.start = now;
        self.duration = duration;
        self.easing = easing;
    }

    pub fn snap(&mut self, value: f32) {
        *self = Self::new(value);
    }

    pub fn is_settled(&self, now: Duration) -> bool {
        now >= self.start + self.duration
    }
}

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
        }
    }
}

/// Keyframes for one node. `times` are seconds from the clip start and must be
/// ascending with one entry per key.
#[derive(Clone, Debug)]
pub struct Channel {
    pub node: NodeId,
    pub times: Vec<f32>,
    pub keyframes: Keyframes,
    pub easing: Easing,
}

impl Channel {
    pub fn new(node: NodeId, times: Vec<f32>, keyframes: Keyframes, easing: Easing) -> Self {
        debug_assert_eq!(times.len(), keyframes.len());
        Self {
            node,
            times,
            keyframes,
            easing,
        }
    }

    fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Segment index and eased progress within it for clip-local time `t`.
    fn locate(&self, t: f32) -> Option<(usize, f32)> {
        let n = self.times.len().min(self.keyframes.len());
        if n == 0 {
            return None;
        }
        if n == 1 || t <= self.times[0] {
            return Some((0, 0.0));
        }
        if t >= self.times[n - 1] {
            return Some((n - 2, 1.0));
        }
        let seg = self.times[..n].windows(2).position(|w| t < w[1]).unwrap_or(n - 2);
        let span = self.times[seg + 1] - self.times[seg];
        let local = if span > 0.0 {
            (t - self.times[seg]) / span
        } else {
            1.0
        };
        Some((seg, self.easing.apply(local)))
    }

    fn apply(&self, graph: &mut SceneGraph, t: f32) {
        let Some((seg, k)) = self.locate(t) else {
            return;
        };
        let Some(node) = graph.get_mut(self.node) else {
            return;
        };
        let next = |len: usize| (seg + 1).min(len - 1);
        match &self.keyframes {
            Keyframes::Translation(keys) => {
                node.local.position = keys[seg].lerp(keys[next(keys.len())], k);
            }
            Keyframes::Scale(keys) => {
                node.local.scale = keys[seg].lerp(keys[next(keys.len())], k);
            }
            Keyframes::Rotation(keys) => {
                node.local.rotation = keys[seg].nlerp(keys[next(keys.len())], k).normalize();
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipKind {
    /// Plays once after `delay`, then holds its last key.
    Entrance,
    /// Wraps around forever, starting after `delay`.
    Loop,
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub kind: ClipKind,
    pub delay: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: &str, kind: ClipKind, delay: f32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            delay,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn duration(&self) -> f32 {
        self.channels.iter().map(Channel::duration).fold(0.0, f32::max)
    }

    /// Clip-local time for a timeline time, `None` before the clip starts.
    fn local_time(&self, elapsed: f32, skip_entrance: bool) -> Option<f32> {
        match self.kind {
            ClipKind::Entrance if skip_entrance => Some(self.duration()),
            ClipKind::Entrance => Some((elapsed - self.delay).max(0.0)),
            ClipKind::Loop => {
                let t = elapsed - self.delay;
                if t < 0.0 {
                    return None;
                }
                let d = self.duration();
                Some(if d > 0.0 { t % d } else { 0.0 })
            }
        }
    }
}

/// Clips played against one scene graph.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    clips: Vec<AnimationClip>,
    started: Option<Duration>,
    skip_entrance: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, clip: AnimationClip) {
        self.clips.push(clip);
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// Entrance clips jump to their final pose.
    pub fn skip_entrances(&mut self) {
        self.skip_entrance = true;
    }

    pub fn start(&mut self, now: Duration) {
        self.started = Some(now);
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// True once every entrance clip has reached its last key.
    pub fn entrances_finished(&self, now: Duration) -> bool {
        let elapsed = self.elapsed(now);
        self.skip_entrance
            || self
                .clips
                .iter()
                .filter(|c| c.kind == ClipKind::Entrance)
                .all(|c| elapsed >= c.delay + c.duration())
    }

    fn elapsed(&self, now: Duration) -> f32 {
        self.started
            .map(|s| now.saturating_sub(s).as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Poses every channel for time `now`. Starts the timeline on first use.
    pub fn apply(&mut self, graph: &mut SceneGraph, now: Duration) {
        if self.started.is_none() {
            self.started = Some(now);
        }
        let elapsed = self.elapsed(now);
        for clip in &self.clips {
            if let Some(t) = clip.local_time(elapsed, self.skip_entrance) {
                for channel in &clip.channels {
                    channel.apply(graph, t);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::instance::Instance;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn easings_hit_their_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::QuadOut,
            Easing::CubicOut,
            Easing::CubicInOut,
            Easing::BackOut,
            Easing::SineInOut,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-5, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-5, "{easing:?}");
        }
        assert!(Easing::BackOut.apply(0.7) > 1.0);
    }

    #[test]
    fn retargeting_continues_from_current_value() {
        let mut v = Eased::new(0.0);
        v.set_target(1.0, ms(0), ms(100), Easing::Linear);
        assert!((v.value(ms(50)) - 0.5).abs() < 1e-5);
        v.set_target(0.0, ms(50), ms(100), Easing::Linear);
        assert!((v.value(ms(50)) - 0.5).abs() < 1e-5);
        assert_eq!(v.value(ms(150)), 0.0);
        assert!(v.is_settled(ms(150)));
    }

    #[test]
    fn entrance_holds_last_key_and_loop_wraps() {
        let mut graph = SceneGraph::new("root");
        let panel = graph.add_group(graph.root(), "panel", Instance::new());
        let core = graph.add_group(graph.root(), "core", Instance::new());
        let mut timeline = Timeline::new();
        timeline.add(
            AnimationClip::new("in", ClipKind::Entrance, 0.5).with_channel(Channel::new(
                panel,
                vec![0.0, 1.0],
                Keyframes::Scale(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0)]),
                Easing::Linear,
            )),
        );
        timeline.add(
            AnimationClip::new("bob", ClipKind::Loop, 0.0).with_channel(Channel::new(
                core,
                vec![0.0, 1.0, 2.0],
                Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(0.0, 1.0, 0.0),
                    Vector3::new(0.0, 0.0, 0.0),
                ]),
                Easing::Linear,
            )),
        );
        timeline.start(ms(0));

        timeline.apply(&mut graph, ms(250));
        assert_eq!(graph.get(panel).unwrap().local.scale.x, 0.0);
        assert!(!timeline.entrances_finished(ms(250)));

        timeline.apply(&mut graph, ms(1000));
        assert!((graph.get(panel).unwrap().local.scale.x - 0.5).abs() < 1e-5);

        timeline.apply(&mut graph, ms(5000));
        assert_eq!(graph.get(panel).unwrap().local.scale.x, 1.0);
        assert!(timeline.entrances_finished(ms(5000)));

        timeline.apply(&mut graph, ms(2500));
        assert!((graph.get(core).unwrap().local.position.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn skipped_entrances_start_at_their_final_pose() {
        let mut graph = SceneGraph::new("root");
        let panel = graph.add_group(graph.root(), "panel", Instance::new());
        let mut timeline = Timeline::new();
        timeline.add(
            AnimationClip::new("in", ClipKind::Entrance, 2.0).with_channel(Channel::new(
                panel,
                vec![0.0, 1.0],
                Keyframes::Scale(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 2.0, 2.0)]),
                Easing::BackOut,
            )),
        );
        timeline.skip_entrances();
        timeline.apply(&mut graph, ms(0));
        assert_eq!(graph.get(panel).unwrap().local.scale.y, 2.0);
    }
}
