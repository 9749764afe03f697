//! Touch-driven resource harvesting
//!
//! Maps a screen touch to the nearest star system, extracts a bounded amount
//! through the lifecycle controller and leaves short-lived feedback records
//! for the presentation layer to draw and expire.

use std::collections::VecDeque;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::gesture::Gesture;
use crate::error::HarvestError;
use crate::sim::star::{LifecycleController, ResourceKind, StarId};
use crate::view::Viewport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchConfig {
    /// Finger radius in screen pixels
    pub touch_radius_px: f32,
    pub tap_essence_cap: u32,
    pub tap_fragment_cap: u32,
    /// Double-tap amount relative to a single tap
    pub double_tap_multiplier: f32,
    pub double_essence_cap: u32,
    pub double_fragment_cap: u32,
    pub ripple_duration: f64,
    pub success_duration: f64,
    pub failure_duration: f64,
    /// Oldest feedback is dropped past this
    pub feedback_limit: usize,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            touch_radius_px: 22.0,
            tap_essence_cap: 5,
            tap_fragment_cap: 3,
            double_tap_multiplier: 1.5,
            double_essence_cap: 8,
            double_fragment_cap: 5,
            ripple_duration: 0.4,
            success_duration: 0.8,
            failure_duration: 0.6,
            feedback_limit: 32,
        }
    }
}

impl TouchConfig {
    /// Most a single gesture may extract of `kind`
    pub fn cap(&self, kind: ResourceKind, double: bool) -> u32 {
        let (base, double_cap) = match kind {
            ResourceKind::StellarEssence => (self.tap_essence_cap, self.double_essence_cap),
            ResourceKind::VoidFragments => (self.tap_fragment_cap, self.double_fragment_cap),
        };
        if double {
            ((base as f32 * self.double_tap_multiplier).round() as u32).min(double_cap)
        } else {
            base
        }
    }
}

/// A resolved touch target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub star: StarId,
    /// Resource generation observed when the target was resolved
    pub generation: u32,
    /// World-space distance from the touch point
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    Ripple,
    Success,
    Failure,
}

/// Transient visual hint; carries no authority
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    /// World position
    pub position: Vec2,
    pub star: Option<StarId>,
    pub amount: Option<u32>,
    pub created: f64,
    pub duration: f64,
}

impl Feedback {
    #[inline]
    pub fn expires_at(&self) -> f64 {
        self.created + self.duration
    }

    /// Fraction of the lifetime left, 1.0 when fresh
    pub fn remaining(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (1.0 - (now - self.created) / self.duration).clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HarvestOutcome {
    Harvested {
        star: StarId,
        kind: ResourceKind,
        amount: u32,
        remaining: u32,
    },
    Rejected {
        star: StarId,
        error: HarvestError,
    },
    /// Long press on a star (or on empty space)
    Inspected(Option<StarId>),
    /// Nothing under the finger
    Missed,
    /// Drags are left to the camera
    Ignored,
}

type HarvestCallback = Box<dyn FnMut(StarId, ResourceKind, u32)>;

pub struct TouchHarvester {
    config: TouchConfig,
    feedback: VecDeque<Feedback>,
    feedback_enabled: bool,
    on_harvest: Option<HarvestCallback>,
}

impl fmt::Debug for TouchHarvester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TouchHarvester")
            .field("config", &self.config)
            .field("feedback", &self.feedback.len())
            .field("feedback_enabled", &self.feedback_enabled)
            .finish_non_exhaustive()
    }
}

impl Default for TouchHarvester {
    fn default() -> Self {
        Self::new(TouchConfig::default())
    }
}

impl TouchHarvester {
    pub fn new(config: TouchConfig) -> Self {
        Self {
            config,
            feedback: VecDeque::new(),
            feedback_enabled: true,
            on_harvest: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    /// Called synchronously after every successful extraction
    pub fn set_on_harvest(&mut self, callback: impl FnMut(StarId, ResourceKind, u32) + 'static) {
        self.on_harvest = Some(Box::new(callback));
    }

    /// Governor hook; existing records are dropped when switched off
    pub fn set_feedback_enabled(&mut self, enabled: bool) {
        self.feedback_enabled = enabled;
        if !enabled {
            self.feedback.clear();
        }
    }

    /// Live feedback records, oldest first
    pub fn feedback(&self) -> &VecDeque<Feedback> {
        &self.feedback
    }

    /// Drop feedback whose duration ran out
    pub fn expire(&mut self, now: f64) {
        self.feedback.retain(|f| f.expires_at() > now);
    }

    /// Nearest star whose radius plus the finger radius covers the touch
    pub fn find_target(
        &self,
        screen: Vec2,
        viewport: &Viewport,
        lifecycle: &LifecycleController,
    ) -> Option<Target> {
        let world = viewport.screen_to_world(screen);
        let reach = self.config.touch_radius_px / viewport.scale();
        lifecycle
            .stars()
            .filter_map(|star| {
                let distance = star.position.distance(world);
                (distance <= reach + star.radius).then_some(Target {
                    star: star.id,
                    generation: star.generation(),
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Act on a resolved gesture
    pub fn handle(
        &mut self,
        gesture: Gesture,
        viewport: &Viewport,
        lifecycle: &mut LifecycleController,
        now: f64,
    ) -> HarvestOutcome {
        let double = match gesture {
            Gesture::Tap { .. } => false,
            Gesture::DoubleTap { .. } => true,
            Gesture::LongPress { position } => {
                let target = self.find_target(position, viewport, lifecycle);
                return HarvestOutcome::Inspected(target.map(|t| t.star));
            }
            Gesture::DragStart { .. } => return HarvestOutcome::Ignored,
        };

        let world = viewport.screen_to_world(gesture.position());
        self.push(FeedbackKind::Ripple, world, None, None, now);
        match self.find_target(gesture.position(), viewport, lifecycle) {
            Some(target) => self.harvest_target(target, double, lifecycle, now),
            None => HarvestOutcome::Missed,
        }
    }

    /// Extract from a previously resolved target. Refused if the star changed
    /// state since the target was resolved.
    pub fn harvest_target(
        &mut self,
        target: Target,
        double: bool,
        lifecycle: &mut LifecycleController,
        now: f64,
    ) -> HarvestOutcome {
        let Some(star) = lifecycle.get(target.star) else {
            return HarvestOutcome::Rejected {
                star: target.star,
                error: HarvestError::UnknownStar(target.star),
            };
        };
        let position = star.position;

        let request = star
            .state()
            .resource()
            .filter(|_| star.is_harvestable())
            .map(|kind| (kind, self.config.cap(kind, double).min(star.available())));
        let result = match request {
            Some((kind, amount)) => lifecycle
                .harvest_if_current(target.star, kind, amount, target.generation)
                .map(|star| (kind, amount, star.available())),
            None => Err(HarvestError::NoResources(target.star)),
        };

        match result {
            Ok((kind, amount, remaining)) => {
                if let Some(callback) = self.on_harvest.as_mut() {
                    callback(target.star, kind, amount);
                }
                self.push(FeedbackKind::Success, position, Some(target.star), Some(amount), now);
                HarvestOutcome::Harvested {
                    star: target.star,
                    kind,
                    amount,
                    remaining,
                }
            }
            Err(error) => {
                log::debug!("Harvest of {} refused: {}", target.star, error);
                self.push(FeedbackKind::Failure, position, Some(target.star), None, now);
                HarvestOutcome::Rejected {
                    star: target.star,
                    error,
                }
            }
        }
    }

    fn push(
        &mut self,
        kind: FeedbackKind,
        position: Vec2,
        star: Option<StarId>,
        amount: Option<u32>,
        now: f64,
    ) {
        if !self.feedback_enabled {
            return;
        }
        let duration = match kind {
            FeedbackKind::Ripple => self.config.ripple_duration,
            FeedbackKind::Success => self.config.success_duration,
            FeedbackKind::Failure => self.config.failure_duration,
        };
        while self.feedback.len() >= self.config.feedback_limit.max(1) {
            self.feedback.pop_front();
        }
        self.feedback.push_back(Feedback {
            kind,
            position,
            star,
            amount,
            created: now,
            duration,
        });
    }
}
