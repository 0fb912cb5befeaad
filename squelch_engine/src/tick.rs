//! Periodic prompts for the look-ahead refill.
//!
//! A tick carries no pattern logic; receivers only use it as a cue to check
//! the audio clock again. Ticks may arrive late, early or in bursts.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

pub trait TickSource: Send {
    fn ticks(&self) -> Receiver<Instant>;
}

/// Ticks at a fixed interval from crossbeam's timer, independent of any UI thread.
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    interval: Duration,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for IntervalTicker {
    fn ticks(&self) -> Receiver<Instant> {
        crossbeam_channel::tick(self.interval)
    }
}

/// Tick source fired explicitly by the caller.
#[derive(Debug, Clone)]
pub struct ManualTicker {
    tx: Sender<Instant>,
    rx: Receiver<Instant>,
}

impl Default for ManualTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTicker {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn fire(&self) {
        let _ = self.tx.send(Instant::now());
    }
}

impl TickSource for ManualTicker {
    fn ticks(&self) -> Receiver<Instant> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_ticker_delivers_ticks() {
        let ticker = IntervalTicker::new(Duration::from_millis(2));
        let rx = ticker.ticks();
        for _ in 0..3 {
            assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        }
    }

    #[test]
    fn manual_ticker_fires_on_demand() {
        let ticker = ManualTicker::new();
        let rx = ticker.ticks();
        assert!(rx.try_recv().is_err());
        ticker.fire();
        ticker.fire();
        assert_eq!(rx.try_iter().count(), 2);
    }
}
