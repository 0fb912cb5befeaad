//! Audio-time sources for the scheduler.
//!
//! All scheduling happens against the audio clock, never against the wall
//! clock, so a trigger computed ahead of time lands on the right sample.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub trait AudioClock: Send + Sync {
    /// Current audio time in seconds, or `None` when the source is gone.
    fn now(&self) -> Option<f64>;
}

/// Clock advanced by hand. Used by tests and by offline rendering.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicU64,
    available: AtomicBool,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            micros: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// A clock whose source never came up.
    pub fn unavailable() -> Self {
        Self {
            micros: AtomicU64::new(0),
            available: AtomicBool::new(false),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.micros
            .store((seconds.max(0.0) * 1_000_000.0).round() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        let delta = (seconds.max(0.0) * 1_000_000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> Option<f64> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0)
    }
}

/// Clock published by the output stream: frames rendered divided by the rate.
#[derive(Debug, Clone)]
pub struct SampleClock {
    frames: Arc<AtomicU64>,
    alive: Arc<AtomicBool>,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            alive: Arc::new(AtomicBool::new(true)),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn position(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Called from the audio callback after each buffer.
    pub fn advance_frames(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn mark_lost(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    pub fn seconds_to_sample(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> Option<f64> {
        if !self.alive.load(Ordering::Relaxed) {
            return None;
        }
        Some(self.position() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Some(0.0));
        clock.advance(0.25);
        clock.advance(0.5);
        assert_eq!(clock.now(), Some(0.75));
        clock.set(2.0);
        assert_eq!(clock.now(), Some(2.0));
        clock.set_available(false);
        assert_eq!(clock.now(), None);
    }

    #[test]
    fn sample_clock_counts_frames() {
        let clock = SampleClock::new(48_000);
        clock.advance_frames(24_000);
        assert_eq!(clock.now(), Some(0.5));
        assert_eq!(clock.seconds_to_sample(0.25), 12_000);
        clock.mark_lost();
        assert_eq!(clock.now(), None);
    }
}
