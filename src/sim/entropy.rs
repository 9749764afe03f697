//! Entropy cellular automata
//!
//! The whole sector set advances together: every sector is evaluated against
//! the previous tick's values, then the new values are committed in one pass.

use std::collections::{BTreeMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::rules::{Neighborhood, RuleKind, RuleSet};
use super::sector::{SectorId, SectorStore};
use super::tick::{TickDriver, Tickable};
use crate::consts::{MATERIAL_CHANGE, MAX_ENTROPY};
use crate::error::SimError;

/// Deltas at least this large are classified as cascades regardless of rule
const CASCADE_MAGNITUDE: f32 = 0.1;

/// Noise is clamped to this many standard deviations
const NOISE_SIGMA_BOUND: f32 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyConfig {
    /// Neighbor influence rate
    pub base_spread_rate: f32,
    /// Minimum neighbor-average gap for influence
    pub spread_threshold: f32,
    pub max_entropy: f32,
    pub natural_decay_rate: f32,
    /// Standard deviation of the per-tick Gaussian perturbation
    pub random_variance: f32,
    /// Seconds between ticks
    pub tick_interval: f64,
    /// Event history cap
    pub history_limit: usize,
    pub seed: u64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            base_spread_rate: 0.1,
            spread_threshold: 0.1,
            max_entropy: MAX_ENTROPY,
            natural_decay_rate: 0.02,
            random_variance: 0.005,
            tick_interval: 0.5,
            history_limit: 1000,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpreadClass {
    Stabilize,
    Cascade,
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadCause {
    Rule(RuleKind),
    /// Perturbation alone moved the value
    Noise,
    PlayerAction,
}

/// A material entropy change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropySpreadEvent {
    pub sector: SectorId,
    pub old: f32,
    pub new: f32,
    pub timestamp: f64,
    pub class: SpreadClass,
    pub cause: SpreadCause,
}

/// Per-sector entropy trajectory from `predict`; `values[0]` is the current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntropyTrajectory {
    pub sector: SectorId,
    pub values: Vec<f32>,
}

/// Outcome of one tick
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub scale: f32,
    /// Events recorded during this tick
    pub events: Vec<EntropySpreadEvent>,
    pub rules_fired: BTreeMap<RuleKind, usize>,
}

/// Cellular automata engine; the single writer of sector entropy
#[derive(Debug, Clone)]
pub struct EntropySimulator {
    config: EntropyConfig,
    rules: RuleSet,
    rng: Pcg32,
    driver: TickDriver,
    history: VecDeque<EntropySpreadEvent>,
    tick_count: u64,
}

impl EntropySimulator {
    pub fn new(config: EntropyConfig) -> Self {
        let rules = RuleSet::standard(
            config.base_spread_rate,
            config.spread_threshold,
            config.natural_decay_rate,
        );
        Self::with_rules(config, rules)
    }

    pub fn with_rules(config: EntropyConfig, rules: RuleSet) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(config.seed),
            driver: TickDriver::new(config.tick_interval),
            history: VecDeque::with_capacity(config.history_limit.min(4096)),
            tick_count: 0,
            config,
            rules,
        }
    }

    #[inline]
    pub fn config(&self) -> &EntropyConfig {
        &self.config
    }

    #[inline]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Recorded events, oldest first
    pub fn history(&self) -> impl Iterator<Item = &EntropySpreadEvent> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Event counts per classification over the retained history
    pub fn event_counts(&self) -> BTreeMap<SpreadClass, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.history {
            *counts.entry(event.class).or_insert(0) += 1;
        }
        counts
    }

    /// Tick if the driver says one is due
    pub fn poll(&mut self, store: &mut SectorStore, now: f64) -> Option<TickSummary> {
        let scale = self.driver.poll(now)?;
        Some(self.step(store, now, scale))
    }

    /// Tick now, regardless of the interval. No-op while stopped.
    pub fn tick(&mut self, store: &mut SectorStore, now: f64) -> Option<TickSummary> {
        let scale = self.driver.force(now)?;
        Some(self.step(store, now, scale))
    }

    fn step(&mut self, store: &mut SectorStore, now: f64, scale: f32) -> TickSummary {
        let current = store.entropies();
        let neighbors = store.neighbor_indices();
        let outcomes = advance(
            &current,
            &neighbors,
            &self.rules,
            &self.config,
            &mut self.rng,
            scale,
        );

        let mut summary = TickSummary {
            scale,
            ..Default::default()
        };
        let mut next = Vec::with_capacity(outcomes.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            next.push(outcome.value);
            if let Some(kind) = outcome.rule {
                *summary.rules_fired.entry(kind).or_insert(0) += 1;
            }
            let old = current[i];
            let delta = outcome.value - old;
            if delta.abs() > MATERIAL_CHANGE {
                let cause = outcome.rule.map(SpreadCause::Rule).unwrap_or(SpreadCause::Noise);
                summary.events.push(EntropySpreadEvent {
                    sector: SectorId(i as u32),
                    old,
                    new: outcome.value,
                    timestamp: now,
                    class: classify(delta, outcome.rule),
                    cause,
                });
            }
        }

        store.commit_entropies(&next, now);
        for event in &summary.events {
            self.record(*event);
        }
        self.tick_count += 1;
        log::trace!(
            "Entropy tick {}: {} material changes",
            self.tick_count,
            summary.events.len()
        );
        summary
    }

    /// Player-driven increase; bypasses rules
    pub fn increase(
        &mut self,
        store: &mut SectorStore,
        sector: SectorId,
        amount: f32,
        now: f64,
    ) -> Result<EntropySpreadEvent, SimError> {
        self.validate_amount(amount)?;
        self.inject(store, sector, amount, now)
    }

    /// Player-driven decrease; bypasses rules
    pub fn decrease(
        &mut self,
        store: &mut SectorStore,
        sector: SectorId,
        amount: f32,
        now: f64,
    ) -> Result<EntropySpreadEvent, SimError> {
        self.validate_amount(amount)?;
        self.inject(store, sector, -amount, now)
    }

    fn validate_amount(&self, amount: f32) -> Result<(), SimError> {
        if !amount.is_finite() || amount < 0.0 || amount > self.config.max_entropy {
            return Err(SimError::EntropyOutOfRange(amount));
        }
        Ok(())
    }

    fn inject(
        &mut self,
        store: &mut SectorStore,
        sector: SectorId,
        signed_amount: f32,
        now: f64,
    ) -> Result<EntropySpreadEvent, SimError> {
        let max = self.config.max_entropy;
        let record = store.get_mut(sector).ok_or(SimError::UnknownSector(sector))?;
        let old = record.entropy;
        let new = (old + signed_amount).clamp(0.0, max);
        record.entropy = new;
        record.last_update = now;

        let event = EntropySpreadEvent {
            sector,
            old,
            new,
            timestamp: now,
            class: if new >= old {
                SpreadClass::Increase
            } else {
                SpreadClass::Decrease
            },
            cause: SpreadCause::PlayerAction,
        };
        self.record(event);
        log::debug!("Player set {} entropy {:.3} -> {:.3}", sector, old, new);
        Ok(event)
    }

    /// Run `steps` ticks forward on a private copy. Live entropy and the
    /// live RNG are left untouched.
    pub fn predict(&self, store: &SectorStore, steps: usize) -> Vec<EntropyTrajectory> {
        let neighbors = store.neighbor_indices();
        let mut rng = self.rng.clone();
        let mut values = store.entropies();
        let mut trajectories: Vec<EntropyTrajectory> = store
            .all()
            .iter()
            .map(|s| {
                let mut v = Vec::with_capacity(steps + 1);
                v.push(s.entropy);
                EntropyTrajectory {
                    sector: s.id,
                    values: v,
                }
            })
            .collect();

        for _ in 0..steps {
            let outcomes = advance(&values, &neighbors, &self.rules, &self.config, &mut rng, 1.0);
            values = outcomes.into_iter().map(|o| o.value).collect();
            for (traj, &v) in trajectories.iter_mut().zip(&values) {
                traj.values.push(v);
            }
        }
        trajectories
    }

    fn record(&mut self, event: EntropySpreadEvent) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

impl Tickable for EntropySimulator {
    fn start(&mut self, now: f64) {
        if !self.driver.is_running() {
            log::info!("Entropy simulation started ({}s interval)", self.driver.interval());
        }
        self.driver.start(now);
    }

    fn stop(&mut self) {
        if self.driver.is_running() {
            log::info!("Entropy simulation stopped after {} ticks", self.tick_count);
        }
        self.driver.stop();
    }

    fn is_running(&self) -> bool {
        self.driver.is_running()
    }
}

struct Outcome {
    value: f32,
    rule: Option<RuleKind>,
}

/// One synchronous automata step over a value vector
fn advance(
    values: &[f32],
    neighbors: &[Vec<usize>],
    rules: &RuleSet,
    config: &EntropyConfig,
    rng: &mut Pcg32,
    scale: f32,
) -> Vec<Outcome> {
    let mut scratch = Vec::new();
    values
        .iter()
        .enumerate()
        .map(|(i, &entropy)| {
            scratch.clear();
            scratch.extend(
                neighbors[i]
                    .iter()
                    .filter_map(|&n| values.get(n).copied()),
            );
            let hood = Neighborhood {
                entropy,
                neighbors: &scratch,
            };
            let fired = rules.evaluate(&hood);
            let mut delta = fired.map(|(_, d)| d).unwrap_or(0.0);
            if config.random_variance > 0.0 {
                let z: f32 = rng.sample(StandardNormal);
                delta += z.clamp(-NOISE_SIGMA_BOUND, NOISE_SIGMA_BOUND) * config.random_variance;
            }
            Outcome {
                value: (entropy + delta * scale).clamp(0.0, config.max_entropy),
                rule: fired.map(|(kind, _)| kind),
            }
        })
        .collect()
}

fn classify(delta: f32, rule: Option<RuleKind>) -> SpreadClass {
    match rule {
        Some(RuleKind::Cascade) => SpreadClass::Cascade,
        _ if delta.abs() >= CASCADE_MAGNITUDE => SpreadClass::Cascade,
        Some(RuleKind::Stabilization) => SpreadClass::Stabilize,
        _ if delta > 0.0 => SpreadClass::Increase,
        _ => SpreadClass::Decrease,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::sector::tests::strip_store;
    use crate::sim::sector::{Sector, SectorStore};
    use glam::Vec2;
    use proptest::prelude::*;

    fn quiet() -> EntropyConfig {
        EntropyConfig {
            random_variance: 0.0,
            ..Default::default()
        }
    }

    fn running(config: EntropyConfig) -> EntropySimulator {
        let mut sim = EntropySimulator::new(config);
        sim.start(0.0);
        sim
    }

    fn isolated_store(entropy: f32) -> SectorStore {
        let poly = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let mut s = Sector::new(SectorId(0), poly, Vec2::new(5.0, 5.0)).unwrap();
        s.entropy = entropy;
        SectorStore::from_sectors(vec![s]).unwrap()
    }

    #[test]
    fn test_cascade_scenario() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.85);
        store.set_entropy(SectorId(1), 0.3);
        let mut sim = running(EntropyConfig::default());

        let summary = sim.tick(&mut store, 0.0).unwrap();
        assert!(store.entropy(SectorId(0)).unwrap() > 0.85);
        let event = summary
            .events
            .iter()
            .find(|e| e.sector == SectorId(0))
            .expect("event for hot sector");
        assert_eq!(event.class, SpreadClass::Cascade);
        assert_eq!(event.cause, SpreadCause::Rule(RuleKind::Cascade));
        assert!(sim.history().any(|e| e.sector == SectorId(0)));
    }

    #[test]
    fn test_decay_to_rest() {
        let mut store = isolated_store(0.5);
        let mut sim = running(quiet());
        let mut last = 0.5;
        for i in 0..500 {
            sim.tick(&mut store, i as f64 * 0.5);
            let e = store.entropy(SectorId(0)).unwrap();
            assert!(e <= last);
            assert!(e >= 0.0);
            last = e;
        }
        assert!(last < 0.11);
    }

    #[test]
    fn test_neighbor_influence_pulls_together() {
        let mut store = strip_store();
        store.set_entropy(SectorId(1), 0.6);
        let mut sim = running(quiet());
        sim.tick(&mut store, 0.0);
        assert!(store.entropy(SectorId(0)).unwrap() > 0.0);
        assert!(store.entropy(SectorId(1)).unwrap() < 0.6);
    }

    #[test]
    fn test_delta_scaled_by_elapsed_time() {
        let mut one = isolated_store(0.5);
        let mut two = isolated_store(0.5);
        let mut a = running(quiet());
        let mut b = running(quiet());
        a.tick(&mut one, 0.0);
        b.tick(&mut two, 0.0);
        let (ea, eb) = (one.entropy(SectorId(0)).unwrap(), two.entropy(SectorId(0)).unwrap());
        assert_eq!(ea, eb);
        // Second tick: `a` after one interval, `b` after two
        a.tick(&mut one, 0.5);
        b.tick(&mut two, 1.0);
        let drop_a = ea - one.entropy(SectorId(0)).unwrap();
        let drop_b = eb - two.entropy(SectorId(0)).unwrap();
        assert!((drop_b - 2.0 * drop_a).abs() < 1e-5);
    }

    #[test]
    fn test_manual_injection() {
        let mut store = strip_store();
        let mut sim = EntropySimulator::new(quiet());
        let event = sim.increase(&mut store, SectorId(1), 0.4, 1.0).unwrap();
        assert_eq!(event.cause, SpreadCause::PlayerAction);
        assert_eq!(event.class, SpreadClass::Increase);
        sim.increase(&mut store, SectorId(1), 0.9, 2.0).unwrap();
        assert_eq!(store.entropy(SectorId(1)), Some(1.0));
        let event = sim.decrease(&mut store, SectorId(1), 0.25, 3.0).unwrap();
        assert_eq!(event.class, SpreadClass::Decrease);
        assert_eq!(store.entropy(SectorId(1)), Some(0.75));
        assert_eq!(sim.history().count(), 3);
    }

    #[test]
    fn test_manual_injection_rejects_bad_input() {
        let mut store = strip_store();
        let mut sim = EntropySimulator::new(quiet());
        assert_eq!(
            sim.increase(&mut store, SectorId(9), 0.1, 0.0),
            Err(SimError::UnknownSector(SectorId(9)))
        );
        assert!(matches!(
            sim.increase(&mut store, SectorId(0), f32::NAN, 0.0),
            Err(SimError::EntropyOutOfRange(_))
        ));
        assert_eq!(
            sim.decrease(&mut store, SectorId(0), 1.5, 0.0),
            Err(SimError::EntropyOutOfRange(1.5))
        );
        assert!(sim.increase(&mut store, SectorId(0), -0.2, 0.0).is_err());
        assert_eq!(sim.history().count(), 0);
    }

    #[test]
    fn test_predict_does_not_touch_live_state() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.85);
        let mut sim = running(EntropyConfig::default());
        let before = store.entropies();
        let forecast = sim.predict(&store, 10);
        assert_eq!(store.entropies(), before);
        assert_eq!(forecast.len(), 3);
        assert!(forecast.iter().all(|t| t.values.len() == 11));
        assert_eq!(forecast[0].values[0], 0.85);

        // The live RNG was not advanced: the first real tick matches the forecast
        sim.tick(&mut store, 0.0);
        for traj in &forecast {
            let live = store.entropy(traj.sector).unwrap();
            assert!((live - traj.values[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stop_prevents_mutation() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.85);
        let mut sim = running(EntropyConfig::default());
        sim.tick(&mut store, 0.0);
        sim.stop();
        sim.stop();
        let frozen = store.entropies();
        assert!(sim.tick(&mut store, 1.0).is_none());
        assert!(sim.poll(&mut store, 2.0).is_none());
        assert_eq!(store.entropies(), frozen);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = strip_store();
        let mut sim = EntropySimulator::new(EntropyConfig {
            history_limit: 4,
            ..quiet()
        });
        for i in 0..10 {
            sim.increase(&mut store, SectorId(0), 0.05, i as f64).unwrap();
        }
        let kept: Vec<f64> = sim.history().map(|e| e.timestamp).collect();
        assert_eq!(kept, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(sim.event_counts().get(&SpreadClass::Increase), Some(&4));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0.02, Some(RuleKind::Cascade)), SpreadClass::Cascade);
        assert_eq!(classify(0.2, Some(RuleKind::NeighborInfluence)), SpreadClass::Cascade);
        assert_eq!(classify(0.02, Some(RuleKind::Stabilization)), SpreadClass::Stabilize);
        assert_eq!(classify(0.02, None), SpreadClass::Increase);
        assert_eq!(classify(-0.02, Some(RuleKind::NaturalDecay)), SpreadClass::Decrease);
    }

    proptest! {
        #[test]
        fn entropy_stays_in_range(
            initial in proptest::collection::vec(0.0f32..=1.0, 3),
            ops in proptest::collection::vec((0u8..3, 0u32..3, 0.0f32..=1.0), 1..40),
        ) {
            let mut store = strip_store();
            for (i, e) in initial.iter().enumerate() {
                store.set_entropy(SectorId(i as u32), *e);
            }
            let mut sim = running(EntropyConfig {
                random_variance: 0.05,
                ..Default::default()
            });
            for (step, (op, sector, amount)) in ops.into_iter().enumerate() {
                let now = step as f64 * 0.7;
                match op {
                    0 => { sim.tick(&mut store, now); }
                    1 => { let _ = sim.increase(&mut store, SectorId(sector), amount, now); }
                    _ => { let _ = sim.decrease(&mut store, SectorId(sector), amount, now); }
                }
                for e in store.entropies() {
                    prop_assert!((0.0..=1.0).contains(&e));
                }
            }
        }
    }
}
