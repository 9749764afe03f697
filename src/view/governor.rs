//! Adaptive quality governor
//!
//! Watches a rolling frame-time window and walks a fixed degradation ladder
//! one rung per evaluation: shrink render caps, raise the visibility
//! threshold, switch off effect categories, and under critical load switch
//! off optional subsystems. Recovery undoes the most recent rung first and
//! only when FPS sits clearly above the degrade threshold.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Particles,
    Glow,
    NeighborTint,
}

impl Effect {
    /// Order in which effects are switched off
    pub const LADDER: [Effect; 3] = [Effect::Particles, Effect::Glow, Effect::NeighborTint];
}

/// Optional subsystems the consumer can drop entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsystem {
    /// Ripple/success/failure feedback from touch input
    TouchFeedback,
    /// Entropy colouring of sectors (flat colour when off)
    EntropyOverlay,
    /// Star system sprites
    StarSystems,
}

impl Subsystem {
    pub const LADDER: [Subsystem; 3] = [
        Subsystem::TouchFeedback,
        Subsystem::EntropyOverlay,
        Subsystem::StarSystems,
    ];
}

/// What the culler is currently allowed to emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderBudget {
    pub max_sectors: usize,
    pub max_entities: usize,
    /// Sectors below this entropy are not emitted
    pub visibility_threshold: f32,
    pub disabled_effects: Vec<Effect>,
    pub disabled_subsystems: Vec<Subsystem>,
}

impl RenderBudget {
    pub fn new(max_sectors: usize, max_entities: usize, visibility_threshold: f32) -> Self {
        Self {
            max_sectors,
            max_entities,
            visibility_threshold,
            disabled_effects: Vec::new(),
            disabled_subsystems: Vec::new(),
        }
    }

    pub fn effect_enabled(&self, effect: Effect) -> bool {
        !self.disabled_effects.contains(&effect)
    }

    pub fn subsystem_enabled(&self, subsystem: Subsystem) -> bool {
        !self.disabled_subsystems.contains(&subsystem)
    }
}

impl Default for RenderBudget {
    fn default() -> Self {
        Self::new(500, 200, 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Frames in the rolling average
    pub window: usize,
    /// Degrade when average FPS drops below this
    pub degrade_fps: f32,
    /// Recover only when average FPS rises above this (> degrade_fps)
    pub recover_fps: f32,
    /// Below this, optional subsystems go first
    pub critical_fps: f32,
    /// Minimum seconds between evaluations that changed something
    pub cooldown: f64,
    /// Cap multiplier per shrink step
    pub cap_factor: f32,
    pub min_sectors: usize,
    pub min_entities: usize,
    pub threshold_step: f32,
    pub max_threshold: f32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            window: 60,
            degrade_fps: 45.0,
            recover_fps: 55.0,
            critical_fps: 25.0,
            cooldown: 1.0,
            cap_factor: 0.75,
            min_sectors: 100,
            min_entities: 40,
            threshold_step: 0.1,
            max_threshold: 0.4,
        }
    }
}

/// One rung of the ladder, with enough to undo it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Adjustment {
    ShrinkCaps {
        sectors: (usize, usize),
        entities: (usize, usize),
    },
    RaiseThreshold { from: f32, to: f32 },
    DisableEffect(Effect),
    DisableSubsystem(Subsystem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisoryKind {
    Degraded,
    Recovered,
}

/// Non-fatal notice for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovernorAdvisory {
    pub kind: AdvisoryKind,
    pub adjustment: Adjustment,
    pub average_fps: f32,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceGovernor {
    config: GovernorConfig,
    base: RenderBudget,
    budget: RenderBudget,
    frame_times: VecDeque<f32>,
    applied: Vec<Adjustment>,
    last_change: Option<f64>,
}

impl PerformanceGovernor {
    pub fn new(config: GovernorConfig, base: RenderBudget) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(config.window.max(1)),
            budget: base.clone(),
            base,
            config,
            applied: Vec::new(),
            last_change: None,
        }
    }

    #[inline]
    pub fn budget(&self) -> &RenderBudget {
        &self.budget
    }

    #[inline]
    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Rungs currently applied, oldest first
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.applied
    }

    pub fn is_degraded(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Rolling average FPS, once at least half the window is filled
    pub fn average_fps(&self) -> Option<f32> {
        if self.frame_times.len() < (self.config.window / 2).max(1) {
            return None;
        }
        let total: f32 = self.frame_times.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(self.frame_times.len() as f32 / total)
    }

    /// Record one frame duration (seconds) and evaluate
    pub fn record_frame(&mut self, frame_seconds: f32, now: f64) -> Option<GovernorAdvisory> {
        if frame_seconds.is_finite() && frame_seconds > 0.0 {
            if self.frame_times.len() >= self.config.window.max(1) {
                self.frame_times.pop_front();
            }
            self.frame_times.push_back(frame_seconds);
        }
        self.evaluate(now)
    }

    /// At most one change per call
    pub fn evaluate(&mut self, now: f64) -> Option<GovernorAdvisory> {
        let fps = self.average_fps()?;
        if let Some(last) = self.last_change {
            if now - last < self.config.cooldown {
                return None;
            }
        }

        let (kind, adjustment) = if fps < self.config.degrade_fps {
            (AdvisoryKind::Degraded, self.degrade(fps)?)
        } else if fps > self.config.recover_fps {
            (AdvisoryKind::Recovered, self.recover()?)
        } else {
            return None;
        };

        self.last_change = Some(now);
        // Fresh window so the next decision sees the new settings
        self.frame_times.clear();
        let advisory = GovernorAdvisory {
            kind,
            adjustment,
            average_fps: fps,
            timestamp: now,
        };
        match kind {
            AdvisoryKind::Degraded => log::warn!("Quality reduced at {:.1} FPS: {:?}", fps, adjustment),
            AdvisoryKind::Recovered => log::info!("Quality restored at {:.1} FPS: {:?}", fps, adjustment),
        }
        Some(advisory)
    }

    fn degrade(&mut self, fps: f32) -> Option<Adjustment> {
        let critical = fps < self.config.critical_fps;
        let next_subsystem = Subsystem::LADDER
            .into_iter()
            .find(|s| self.budget.subsystem_enabled(*s));

        let adjustment = match next_subsystem {
            Some(subsystem) if critical => Adjustment::DisableSubsystem(subsystem),
            _ => self.next_rung().or_else(|| next_subsystem.map(Adjustment::DisableSubsystem))?,
        };
        self.apply(adjustment);
        self.applied.push(adjustment);
        Some(adjustment)
    }

    fn next_rung(&self) -> Option<Adjustment> {
        let b = &self.budget;
        let c = &self.config;
        if b.max_sectors > c.min_sectors || b.max_entities > c.min_entities {
            let shrink = |n: usize, floor: usize| ((n as f32 * c.cap_factor) as usize).max(floor).min(n);
            return Some(Adjustment::ShrinkCaps {
                sectors: (b.max_sectors, shrink(b.max_sectors, c.min_sectors)),
                entities: (b.max_entities, shrink(b.max_entities, c.min_entities)),
            });
        }
        if b.visibility_threshold < c.max_threshold {
            return Some(Adjustment::RaiseThreshold {
                from: b.visibility_threshold,
                to: (b.visibility_threshold + c.threshold_step).min(c.max_threshold),
            });
        }
        Effect::LADDER
            .into_iter()
            .find(|e| b.effect_enabled(*e))
            .map(Adjustment::DisableEffect)
    }

    fn recover(&mut self) -> Option<Adjustment> {
        let adjustment = self.applied.pop()?;
        match adjustment {
            Adjustment::ShrinkCaps { sectors, entities } => {
                self.budget.max_sectors = sectors.0;
                self.budget.max_entities = entities.0;
            }
            Adjustment::RaiseThreshold { from, .. } => self.budget.visibility_threshold = from,
            Adjustment::DisableEffect(e) => self.budget.disabled_effects.retain(|&x| x != e),
            Adjustment::DisableSubsystem(s) => self.budget.disabled_subsystems.retain(|&x| x != s),
        }
        Some(adjustment)
    }

    fn apply(&mut self, adjustment: Adjustment) {
        match adjustment {
            Adjustment::ShrinkCaps { sectors, entities } => {
                self.budget.max_sectors = sectors.1;
                self.budget.max_entities = entities.1;
            }
            Adjustment::RaiseThreshold { to, .. } => self.budget.visibility_threshold = to,
            Adjustment::DisableEffect(e) => self.budget.disabled_effects.push(e),
            Adjustment::DisableSubsystem(s) => self.budget.disabled_subsystems.push(s),
        }
    }

    /// Drop every adjustment and the frame window
    pub fn reset(&mut self) {
        self.budget = self.base.clone();
        self.applied.clear();
        self.frame_times.clear();
        self.last_change = None;
    }
}
