//! Lock-free frame counter.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::FrameListener;

/// Counts rendered frames between sample windows.
///
/// Registered with the engine as a post-render listener while the monitor
/// runs; the monitor drains it with [`FrameCounter::take`] once per window.
#[derive(Debug, Default)]
pub struct FrameCounter {
    frames: AtomicU64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames counted since the last `take`.
    pub fn count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Return the current count and reset it to zero.
    pub fn take(&self) -> u64 {
        self.frames.swap(0, Ordering::Relaxed)
    }
}

impl FrameListener for FrameCounter {
    fn on_frame_rendered(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}
