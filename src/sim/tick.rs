//! Explicit tick scheduling
//!
//! Drivers never own a timer. The host calls `poll(now)` from whatever loop
//! it runs; tests call it with synthetic timestamps.

use crate::consts::MAX_SUBSTEPS;

/// Something that advances on its own periodic driver
pub trait Tickable {
    /// Begin ticking; the first tick is due immediately
    fn start(&mut self, now: f64);
    /// Stop ticking. Safe to call repeatedly; no tick runs afterwards.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Periodic deadline tracker
#[derive(Debug, Clone)]
pub struct TickDriver {
    interval: f64,
    next_due: Option<f64>,
    last_tick: Option<f64>,
}

impl TickDriver {
    /// `interval` in seconds; non-positive intervals are clamped to 1ms
    pub fn new(interval: f64) -> Self {
        Self {
            interval: interval.max(0.001),
            next_due: None,
            last_tick: None,
        }
    }

    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: f64) {
        self.interval = interval.max(0.001);
    }

    pub fn start(&mut self, now: f64) {
        if self.next_due.is_none() {
            self.next_due = Some(now);
        }
    }

    /// Clears the pending deadline so nothing scheduled can fire
    pub fn stop(&mut self) {
        self.next_due = None;
        self.last_tick = None;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Time of the last tick that ran
    #[inline]
    pub fn last_tick(&self) -> Option<f64> {
        self.last_tick
    }

    /// If a tick is due, consume it and return how many intervals elapsed
    /// since the previous tick (1.0 for the first tick after start).
    ///
    /// Missed deadlines collapse into one tick whose scale is capped at
    /// `MAX_SUBSTEPS` intervals.
    pub fn poll(&mut self, now: f64) -> Option<f32> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        Some(self.mark(now))
    }

    /// Record a tick at `now` regardless of the deadline (running only)
    pub fn force(&mut self, now: f64) -> Option<f32> {
        self.next_due?;
        Some(self.mark(now))
    }

    fn mark(&mut self, now: f64) -> f32 {
        let scale = match self.last_tick {
            Some(last) => ((now - last) / self.interval).clamp(0.0, MAX_SUBSTEPS as f64),
            None => 1.0,
        };
        self.last_tick = Some(now);
        let mut next = self.next_due.unwrap_or(now) + self.interval;
        if next <= now {
            // Fell behind; realign instead of bursting
            next = now + self.interval;
        }
        self.next_due = Some(next);
        scale as f32
    }
}
