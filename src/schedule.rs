//! Frame callback scheduling.
//!
//! The engine never loops on its own. It asks a [`FrameScheduler`] for one
//! callback at a time (the `requestAnimationFrame` model) and the host calls
//! [`crate::engine::SceneEngine::on_frame`] with the handle when it fires.
//! [`ManualScheduler`] lets tests fire callbacks with simulated timestamps.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use instant::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    /// Queues one frame callback.
    fn request_frame(&mut self) -> FrameHandle;
    /// Drops a queued callback. Unknown or already fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
    /// Callbacks queued and not yet fired or cancelled.
    fn pending(&self) -> usize;
}

#[derive(Debug, Default)]
struct ManualQueue {
    next: u64,
    queue: VecDeque<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

/// Scheduler driven by hand. Clones share one queue, so a test can keep a
/// clone while the engine owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest queued callback.
    pub fn take_next(&self) -> Option<FrameHandle> {
        self.inner.borrow_mut().queue.pop_front()
    }

    pub fn requested(&self) -> u64 {
        self.inner.borrow().requested
    }

    pub fn cancelled(&self) -> u64 {
        self.inner.borrow().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next += 1;
        inner.requested += 1;
        let handle = FrameHandle(inner.next);
        inner.queue.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut inner = self.inner.borrow_mut();
        let before = inner.queue.len();
        inner.queue.retain(|h| *h != handle);
        if inner.queue.len() != before {
            inner.cancelled += 1;
        }
    }

    fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

/// Caps the render rate. Callbacks arriving sooner than `interval` after the
/// last rendered frame are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FramePacer {
    interval: Option<Duration>,
    last: Option<Duration>,
}

impl FramePacer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether a frame at `now` should render. Records it if so.
    pub fn should_render(&mut self, now: Duration) -> bool {
        let due = match (self.interval, self.last) {
            (None, _) | (_, None) => true,
            (Some(interval), Some(last)) => now.saturating_sub(last) >= interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_callbacks_never_fire() {
        let mut scheduler = ManualScheduler::new();
        let observer = scheduler.clone();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        scheduler.cancel_frame(a);
        scheduler.cancel_frame(a);
        assert_eq!(observer.pending(), 1);
        assert_eq!(observer.cancelled(), 1);
        assert_eq!(observer.take_next(), Some(b));
        assert_eq!(observer.take_next(), None);
    }

    #[test]
    fn pacer_caps_rapid_callbacks() {
        let mut pacer = FramePacer::new(Some(Duration::from_micros(1_000_000 / 30)));
        let rendered = (0..1000u64)
            .filter(|ms| pacer.should_render(Duration::from_millis(*ms)))
            .count();
        assert!(rendered <= 30, "{rendered}");
        assert!(rendered >= 25);
    }

    #[test]
    fn uncapped_pacer_renders_everything() {
        let mut pacer = FramePacer::new(None);
        assert!((0..100u64).all(|ms| pacer.should_render(Duration::from_millis(ms))));
    }
}
