//! Touch gesture recognition
//!
//! The recognizer owns no timers. The host forwards touch events with their
//! timestamps and calls `poll(now)` every frame; deadlines that passed are
//! resolved there. Each touch sequence resolves to exactly one gesture.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Seconds after the first touch-down during which a second one makes a double tap
    pub double_tap_window: f64,
    /// Max screen distance between the two taps of a double tap
    pub double_tap_radius: f32,
    /// Hold time for a long press
    pub long_press: f64,
    /// Movement that turns a press into a drag
    pub drag_radius: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_window: 0.3,
            double_tap_radius: 30.0,
            long_press: 0.5,
            drag_radius: 10.0,
        }
    }
}

/// Resolved gesture, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gesture {
    Tap { position: Vec2 },
    DoubleTap { position: Vec2 },
    LongPress { position: Vec2 },
    DragStart { origin: Vec2, position: Vec2 },
}

impl Gesture {
    pub fn position(&self) -> Vec2 {
        match *self {
            Gesture::Tap { position }
            | Gesture::DoubleTap { position }
            | Gesture::LongPress { position }
            | Gesture::DragStart { position, .. } => position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// Finger down, nothing resolved yet
    Pressed { origin: Vec2, since: f64 },
    /// Released quickly; waiting to see whether a second tap follows
    AwaitingTap { position: Vec2, since: f64 },
    /// Gesture already emitted; swallow events until the finger lifts
    Consumed,
}

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: GestureConfig,
    phase: Phase,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
        }
    }

    /// True while a sequence is in flight
    pub fn is_pending(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// A finger went down. May resolve a double tap, or flush a pending tap
    /// that the new touch does not pair with.
    pub fn touch_down(&mut self, position: Vec2, now: f64) -> Option<Gesture> {
        let mut flushed = None;
        if let Phase::AwaitingTap { position: first, since } = self.phase {
            let in_window = now - since <= self.config.double_tap_window;
            if in_window && first.distance(position) <= self.config.double_tap_radius {
                self.phase = Phase::Consumed;
                return Some(Gesture::DoubleTap { position: first });
            }
            flushed = Some(Gesture::Tap { position: first });
        }
        self.phase = Phase::Pressed {
            origin: position,
            since: now,
        };
        flushed
    }

    pub fn touch_move(&mut self, position: Vec2, _now: f64) -> Option<Gesture> {
        let Phase::Pressed { origin, .. } = self.phase else {
            return None;
        };
        if origin.distance(position) > self.config.drag_radius {
            self.phase = Phase::Consumed;
            return Some(Gesture::DragStart { origin, position });
        }
        None
    }

    pub fn touch_up(&mut self, _position: Vec2, now: f64) -> Option<Gesture> {
        match self.phase {
            Phase::Pressed { origin, since } if now - since >= self.config.long_press => {
                self.phase = Phase::Idle;
                Some(Gesture::LongPress { position: origin })
            }
            Phase::Pressed { origin, since } => {
                self.phase = Phase::AwaitingTap {
                    position: origin,
                    since,
                };
                None
            }
            Phase::Consumed => {
                self.phase = Phase::Idle;
                None
            }
            Phase::Idle | Phase::AwaitingTap { .. } => None,
        }
    }

    /// Resolve any deadline that has passed
    pub fn poll(&mut self, now: f64) -> Option<Gesture> {
        match self.phase {
            Phase::Pressed { origin, since } if now - since >= self.config.long_press => {
                self.phase = Phase::Consumed;
                Some(Gesture::LongPress { position: origin })
            }
            Phase::AwaitingTap { position, since } if now - since > self.config.double_tap_window => {
                self.phase = Phase::Idle;
                Some(Gesture::Tap { position })
            }
            _ => None,
        }
    }

    /// Drop the sequence in flight without emitting anything
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
    }
}
