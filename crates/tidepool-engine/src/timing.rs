//! Fixed-tick frame pacing.
//!
//! The mixer counts every envelope in frames, so the audition loop must tick
//! at a steady rate. [`FrameClock`] sleeps away whatever is left of each
//! frame budget.

use std::thread;
use std::time::{Duration, Instant};

/// Frame pacing for a fixed tick rate.
#[derive(Debug)]
pub struct FrameClock {
    /// Target frames per second
    target_fps: u32,
    /// Time budget per frame
    frame_budget: Duration,
    /// Time of last frame start
    last_frame: Instant,
    /// Frames that overran their budget
    overruns: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameClock {
    /// Create a clock ticking `target_fps` times per second.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            last_frame: Instant::now(),
            overruns: 0,
        }
    }

    /// Target frames per second.
    #[must_use]
    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Time budget per frame.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Frames that took longer than their budget.
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Time left in the current frame.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.frame_budget.saturating_sub(self.last_frame.elapsed())
    }

    /// Sleep for the remainder of the frame budget and start the next frame.
    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if remaining.is_zero() {
            self.overruns += 1;
        } else {
            thread::sleep(remaining);
        }
        self.last_frame = Instant::now();
    }
}
