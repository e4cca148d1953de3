//! Frame-counted linear volume ramps.

/// A linear ramp that reaches its target after a fixed number of frames.
///
/// The ramp does not hold the current value; callers pass it in each frame,
/// so the value can also be scaled from outside (duck, sidechain re-trigger)
/// and the ramp re-aimed with [`retarget`](Self::retarget).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRamp {
    remaining: u32,
    step: f32,
}

impl LinearRamp {
    /// Ramp from `from` to `to` over `frames` frames (at least one).
    #[must_use]
    pub fn new(from: f32, to: f32, frames: u32) -> Self {
        let frames = frames.max(1);
        Self {
            remaining: frames,
            step: (to - from) / frames as f32,
        }
    }

    /// Frames left before the ramp lands.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Per-frame change.
    #[must_use]
    pub const fn step(&self) -> f32 {
        self.step
    }

    /// Recompute the step so the remaining frames go from `from` to `to`.
    pub fn retarget(&mut self, from: f32, to: f32) {
        self.step = (to - from) / self.remaining.max(1) as f32;
    }

    /// Scale the remaining frame count, keeping at least one frame.
    pub fn scale_remaining(&mut self, factor: f32) {
        let scaled = (self.remaining as f32 * factor.max(0.0)).round() as u32;
        self.remaining = scaled.max(1);
    }

    /// Advance one frame from `value` toward `to`.
    ///
    /// Returns the new value and whether the ramp finished. The value never
    /// passes `to`, and it is exactly `to` on the finishing frame.
    pub fn advance(&mut self, value: f32, to: f32) -> (f32, bool) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            return (to, true);
        }

        let next = value + self.step;
        let next = if self.step >= 0.0 {
            next.min(to)
        } else {
            next.max(to)
        };
        (next, false)
    }
}
