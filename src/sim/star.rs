//! Star systems and their entropy-driven lifecycle
//!
//! A star only ever moves forward: healthy, then dying, then dead. Each
//! transition assigns the resource that state yields and bumps the star's
//! resource generation, so harvests aimed at the previous state are refused.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::ops::RangeInclusive;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::sector::{SectorId, SectorStore};
use super::tick::{TickDriver, Tickable};
use crate::consts::{DEAD_THRESHOLD, DYING_THRESHOLD};
use crate::error::HarvestError;

/// Stable star system identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarId(pub u32);

impl fmt::Display for StarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "star-{:05}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StarState {
    Healthy,
    Dying,
    Dead,
}

impl StarState {
    /// The resource a star in this state yields
    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            StarState::Healthy => None,
            StarState::Dying => Some(ResourceKind::StellarEssence),
            StarState::Dead => Some(ResourceKind::VoidFragments),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StarState::Healthy => "healthy",
            StarState::Dying => "dying",
            StarState::Dead => "dead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    StellarEssence,
    VoidFragments,
}

/// Harvestable quantities; at most one field is set, matching the state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarResources {
    pub stellar_essence: Option<u32>,
    pub void_fragments: Option<u32>,
}

impl StarResources {
    pub fn get(&self, kind: ResourceKind) -> Option<u32> {
        match kind {
            ResourceKind::StellarEssence => self.stellar_essence,
            ResourceKind::VoidFragments => self.void_fragments,
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut Option<u32> {
        match kind {
            ResourceKind::StellarEssence => &mut self.stellar_essence,
            ResourceKind::VoidFragments => &mut self.void_fragments,
        }
    }
}

/// A star system on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: StarId,
    pub position: Vec2,
    pub radius: f32,
    pub brightness: f32,
    state: StarState,
    resources: Option<StarResources>,
    /// Smoothed copy of the containing sector's entropy
    pub entropy: f32,
    pub last_state_change: f64,
    /// Containing sector (membership, not geometry)
    pub sector: Option<SectorId>,
    /// Bumped on every transition
    #[serde(default)]
    generation: u32,
}

impl StarSystem {
    pub fn new(id: StarId, position: Vec2, radius: f32, brightness: f32, now: f64) -> Self {
        Self {
            id,
            position,
            radius,
            brightness,
            state: StarState::Healthy,
            resources: None,
            entropy: 0.0,
            last_state_change: now,
            sector: None,
            generation: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> StarState {
        self.state
    }

    #[inline]
    pub fn resources(&self) -> Option<&StarResources> {
        self.resources.as_ref()
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Quantity of the state-appropriate resource (0 when none)
    pub fn available(&self) -> u32 {
        self.state
            .resource()
            .and_then(|kind| self.resources.and_then(|r| r.get(kind)))
            .unwrap_or(0)
    }

    /// Not healthy and its state's resource is present and non-zero
    pub fn is_harvestable(&self) -> bool {
        self.state != StarState::Healthy && self.available() > 0
    }

    /// State and resources agree with each other
    pub fn is_consistent(&self) -> bool {
        match (self.state, self.resources) {
            (StarState::Healthy, None) => true,
            (StarState::Dying, Some(r)) => r.stellar_essence.is_some() && r.void_fragments.is_none(),
            (StarState::Dead, Some(r)) => r.void_fragments.is_some() && r.stellar_essence.is_none(),
            _ => false,
        }
    }

    /// Debit exactly `amount` of `kind`; nothing changes on failure
    fn debit(&mut self, kind: ResourceKind, amount: u32) -> Result<u32, HarvestError> {
        if amount == 0 {
            return Err(HarvestError::ZeroAmount);
        }
        let expected = self.state.resource();
        let resources = self
            .resources
            .as_mut()
            .ok_or(HarvestError::NoResources(self.id))?;
        let Some(expected) = expected else {
            return Err(HarvestError::NoResources(self.id));
        };
        if expected != kind {
            return Err(HarvestError::WrongResource {
                star: self.id,
                requested: kind,
                available: expected,
            });
        }
        let slot = resources.slot(kind);
        let available = slot.unwrap_or(0);
        if amount > available {
            return Err(HarvestError::Insufficient {
                requested: amount,
                available,
            });
        }
        let remaining = available - amount;
        *slot = Some(remaining);
        Ok(remaining)
    }
}

/// Why a star changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// Containing sector crossed a threshold
    Entropy,
    /// Slow organic decay after a long quiet period
    NaturalProgression,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarSystemStateChangeEvent {
    pub id: StarId,
    pub old_state: StarState,
    pub new_state: StarState,
    pub cause: TransitionCause,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Seconds between lifecycle ticks
    pub tick_interval: f64,
    pub dying_threshold: f32,
    pub dead_threshold: f32,
    pub essence_range: RangeInclusive<u32>,
    pub fragment_range: RangeInclusive<u32>,
    /// Brightness multiplier on death
    pub death_dimming: f32,
    pub min_brightness: f32,
    /// Quiet period before natural progression can kick in (seconds)
    pub natural_window: f64,
    /// Chance per second of natural healthy -> dying once the window passed
    pub natural_rate: f64,
    /// Fraction of the gap to sector entropy closed per tick interval
    pub entropy_smoothing: f32,
    pub event_limit: usize,
    pub seed: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval: 1.0,
            dying_threshold: DYING_THRESHOLD,
            dead_threshold: DEAD_THRESHOLD,
            essence_range: 10..=50,
            fragment_range: 5..=25,
            death_dimming: 0.3,
            min_brightness: 0.1,
            natural_window: 300.0,
            natural_rate: 0.001,
            entropy_smoothing: 0.2,
            event_limit: 500,
            seed: 0xd1e,
        }
    }
}

/// Owns star state and resources; the only writer besides harvests
#[derive(Debug, Clone)]
pub struct LifecycleController {
    config: LifecycleConfig,
    stars: BTreeMap<StarId, StarSystem>,
    rng: Pcg32,
    driver: TickDriver,
    events: VecDeque<StarSystemStateChangeEvent>,
    next_id: u32,
}

impl LifecycleController {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(config.seed),
            driver: TickDriver::new(config.tick_interval),
            events: VecDeque::new(),
            stars: BTreeMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Rebuild from persisted records
    pub(crate) fn with_stars(config: LifecycleConfig, stars: BTreeMap<StarId, StarSystem>) -> Self {
        let next_id = stars.keys().map(|id| id.0 + 1).max().unwrap_or(1);
        Self {
            stars,
            next_id,
            ..Self::new(config)
        }
    }

    #[inline]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn get(&self, id: StarId) -> Option<&StarSystem> {
        self.stars.get(&id)
    }

    /// Stars in id order
    pub fn stars(&self) -> impl Iterator<Item = &StarSystem> {
        self.stars.values()
    }

    pub fn star_map(&self) -> &BTreeMap<StarId, StarSystem> {
        &self.stars
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Recent transitions, oldest first
    pub fn events(&self) -> impl Iterator<Item = &StarSystemStateChangeEvent> {
        self.events.iter()
    }

    /// Counts of stars per state
    pub fn census(&self) -> BTreeMap<StarState, usize> {
        let mut counts = BTreeMap::new();
        for star in self.stars.values() {
            *counts.entry(star.state).or_insert(0) += 1;
        }
        counts
    }

    /// Add a healthy star and register it with its sector
    pub fn add_star(
        &mut self,
        store: &mut SectorStore,
        position: Vec2,
        radius: f32,
        brightness: f32,
        now: f64,
    ) -> StarId {
        let id = StarId(self.next_id);
        self.next_id += 1;
        let mut star = StarSystem::new(id, position, radius, brightness, now);
        star.sector = store.assign_entity(id, position);
        if let Some(entropy) = star.sector.and_then(|s| store.entropy(s)) {
            star.entropy = entropy;
        }
        if star.sector.is_none() {
            log::warn!("{} at {} lies outside every sector", id, position);
        }
        self.stars.insert(id, star);
        id
    }

    pub fn remove_star(&mut self, store: &mut SectorStore, id: StarId) -> Option<StarSystem> {
        let star = self.stars.remove(&id)?;
        store.remove_entity(id);
        Some(star)
    }

    /// Move a star and re-home its sector membership
    pub fn move_star(
        &mut self,
        store: &mut SectorStore,
        id: StarId,
        position: Vec2,
    ) -> Option<SectorId> {
        let star = self.stars.get_mut(&id)?;
        star.position = position;
        star.sector = store.assign_entity(id, position);
        if star.sector.is_none() {
            store.remove_entity(id);
        }
        star.sector
    }

    /// Re-derive every star's sector after the sector set was replaced
    pub fn rehome_all(&mut self, store: &mut SectorStore) {
        for star in self.stars.values_mut() {
            star.sector = store.assign_entity(star.id, star.position);
            if star.sector.is_none() {
                store.remove_entity(star.id);
            }
        }
    }

    /// Tick if the driver says one is due
    pub fn poll(&mut self, store: &SectorStore, now: f64) -> Vec<StarSystemStateChangeEvent> {
        match self.driver.poll(now) {
            Some(scale) => self.step(store, now, scale),
            None => Vec::new(),
        }
    }

    /// Tick now regardless of the interval. Empty while stopped.
    pub fn tick(&mut self, store: &SectorStore, now: f64) -> Vec<StarSystemStateChangeEvent> {
        match self.driver.force(now) {
            Some(scale) => self.step(store, now, scale),
            None => Vec::new(),
        }
    }

    fn step(&mut self, store: &SectorStore, now: f64, scale: f32) -> Vec<StarSystemStateChangeEvent> {
        let dt = scale as f64 * self.driver.interval();
        let smoothing = (self.config.entropy_smoothing * scale).min(1.0);
        let mut changes = Vec::new();

        for star in self.stars.values_mut() {
            let sector_entropy = star.sector.and_then(|s| store.entropy(s));
            if let Some(target) = sector_entropy {
                star.entropy += (target - star.entropy) * smoothing;
            }

            let transition = match (star.state, sector_entropy) {
                (StarState::Healthy, Some(e)) if e > self.config.dying_threshold => {
                    Some((StarState::Dying, TransitionCause::Entropy))
                }
                (StarState::Dying, Some(e)) if e > self.config.dead_threshold => {
                    Some((StarState::Dead, TransitionCause::Entropy))
                }
                (StarState::Healthy, _)
                    if now - star.last_state_change > self.config.natural_window
                        && self.rng.random_bool((self.config.natural_rate * dt).clamp(0.0, 1.0)) =>
                {
                    Some((StarState::Dying, TransitionCause::NaturalProgression))
                }
                _ => None,
            };

            if let Some((new_state, cause)) = transition {
                let old_state = star.state;
                apply_transition(star, new_state, &self.config, &mut self.rng, now);
                log::debug!(
                    "{} {} -> {} ({:?})",
                    star.id,
                    old_state.as_str(),
                    new_state.as_str(),
                    cause
                );
                changes.push(StarSystemStateChangeEvent {
                    id: star.id,
                    old_state,
                    new_state,
                    cause,
                    timestamp: now,
                });
            }
        }

        for event in &changes {
            if self.events.len() >= self.config.event_limit.max(1) {
                self.events.pop_front();
            }
            self.events.push_back(*event);
        }
        changes
    }

    /// Debit `amount` of `kind` from a star. Fails without any change when
    /// the star is unknown, has no resources, yields a different resource, or
    /// holds less than `amount`.
    pub fn harvest(
        &mut self,
        id: StarId,
        kind: ResourceKind,
        amount: u32,
    ) -> Result<&StarSystem, HarvestError> {
        let star = self.stars.get_mut(&id).ok_or(HarvestError::UnknownStar(id))?;
        star.debit(kind, amount)?;
        Ok(star)
    }

    /// Like `harvest`, but refuses if the star transitioned since `generation`
    /// was read
    pub fn harvest_if_current(
        &mut self,
        id: StarId,
        kind: ResourceKind,
        amount: u32,
        generation: u32,
    ) -> Result<&StarSystem, HarvestError> {
        let star = self.stars.get_mut(&id).ok_or(HarvestError::UnknownStar(id))?;
        if star.generation != generation {
            return Err(HarvestError::StaleGeneration { star: id });
        }
        star.debit(kind, amount)?;
        Ok(star)
    }
}

impl Tickable for LifecycleController {
    fn start(&mut self, now: f64) {
        if !self.driver.is_running() {
            log::info!("Star lifecycle started ({} systems)", self.stars.len());
        }
        self.driver.start(now);
    }

    fn stop(&mut self) {
        if self.driver.is_running() {
            log::info!("Star lifecycle stopped");
        }
        self.driver.stop();
    }

    fn is_running(&self) -> bool {
        self.driver.is_running()
    }
}

fn apply_transition(
    star: &mut StarSystem,
    new_state: StarState,
    config: &LifecycleConfig,
    rng: &mut Pcg32,
    now: f64,
) {
    match new_state {
        StarState::Dying => {
            star.resources = Some(StarResources {
                stellar_essence: Some(rng.random_range(config.essence_range.clone())),
                void_fragments: None,
            });
        }
        StarState::Dead => {
            star.resources = Some(StarResources {
                stellar_essence: None,
                void_fragments: Some(rng.random_range(config.fragment_range.clone())),
            });
            star.brightness = (star.brightness * config.death_dimming).max(config.min_brightness);
        }
        StarState::Healthy => {}
    }
    star.state = new_state;
    star.last_state_change = now;
    star.generation = star.generation.wrapping_add(1);
}
