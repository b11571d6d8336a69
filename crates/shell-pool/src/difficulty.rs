//! Per-client mobile-aware difficulty retargeting.
//!
//! The pool aims for one share per 30 seconds from every client. Fast
//! arrivals push the chased difficulty up ×1.2, slow arrivals pull it
//! down ×0.8, and the applied difficulty follows with 0.7/0.3 exponential
//! smoothing, clamped to the configured bounds. A thermal throttle report
//! cuts the applied difficulty by ×0.8 immediately.

use shell_core::constants::{POOL_RETARGET_FAST_SECS, POOL_RETARGET_SLOW_SECS};

#[derive(Clone, Debug)]
pub struct DifficultyRetargeter {
    current: f64,
    chased: f64,
    min: f64,
    max: f64,
    last_share_at: Option<i64>,
}

impl DifficultyRetargeter {
    pub fn new(initial: f64, min: f64, max: f64) -> Self {
        let current = initial.clamp(min, max);
        Self {
            current,
            chased: current,
            min,
            max,
            last_share_at: None,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Record an accepted share at `now` (Unix seconds). Returns the new
    /// difficulty when it moved enough to be worth pushing to the client.
    pub fn on_share(&mut self, now: i64) -> Option<f64> {
        let previous = self.last_share_at.replace(now)?;
        let gap = (now - previous).max(0) as u64;

        if gap < POOL_RETARGET_FAST_SECS {
            self.chased *= 1.2;
        } else if gap > POOL_RETARGET_SLOW_SECS {
            self.chased *= 0.8;
        }
        self.chased = self.chased.clamp(self.min, self.max);

        let smoothed = (0.7 * self.current + 0.3 * self.chased).clamp(self.min, self.max);
        let moved = (smoothed - self.current).abs() / self.current > 0.01;
        self.current = smoothed;
        moved.then_some(self.current)
    }

    /// Immediate ×0.8 reduction when the client reports thermal throttling.
    pub fn on_throttle(&mut self) -> f64 {
        self.scale(0.8)
    }

    /// Rescale (device-class adjustment, throttling); resets the chase.
    pub fn scale(&mut self, factor: f64) -> f64 {
        self.current = (self.current * factor).clamp(self.min, self.max);
        self.chased = self.current;
        self.current
    }
}
