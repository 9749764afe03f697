//! World composition
//!
//! Owns the sector store, both simulation drivers, the harvest ledger and
//! the touch harvester. Hosts hold a `World` and call `update(now)` from
//! their loop; nothing here is global.

use std::path::Path;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::entropy::{EntropySimulator, EntropySpreadEvent, EntropyTrajectory, TickSummary};
use super::sector::{SectorId, SectorStore};
use super::star::{LifecycleController, ResourceKind, StarId, StarSystemStateChangeEvent};
use super::tessellate::{self, Tessellation};
use super::tick::Tickable;
use crate::error::{HarvestError, PersistenceError, SimError};
use crate::geometry::Bounds;
use crate::input::{Gesture, HarvestOutcome, TouchHarvester};
use crate::ledger::HarvestLedger;
use crate::persistence::{self, SAVE_VERSION, SaveData};
use crate::settings::Settings;
use crate::view::{Culler, PerformanceGovernor, RenderData, Subsystem, Viewport};

/// Star radius range (world units)
const STAR_RADIUS: std::ops::Range<f32> = 4.0..12.0;
/// Initial star brightness range
const STAR_BRIGHTNESS: std::ops::Range<f32> = 0.6..1.0;

/// What one `update` call did
#[derive(Debug, Clone, Default)]
pub struct WorldUpdate {
    pub entropy: Option<TickSummary>,
    pub transitions: Vec<StarSystemStateChangeEvent>,
}

#[derive(Debug)]
pub struct World {
    settings: Settings,
    bounds: Bounds,
    store: SectorStore,
    entropy: EntropySimulator,
    lifecycle: LifecycleController,
    ledger: HarvestLedger,
    culler: Culler,
    harvester: TouchHarvester,
    /// Seed the current tessellation was built from
    tessellation_seed: u64,
}

impl World {
    /// Generate sectors and scatter star systems
    pub fn new(settings: Settings, now: f64) -> Result<Self, SimError> {
        let bounds = settings.world_bounds();
        let tess = tessellate::generate(bounds, &settings.tessellation_config())?;
        let mut store = SectorStore::from_tessellation(&tess)?;
        let mut lifecycle = LifecycleController::new(settings.lifecycle_config());
        scatter_stars(&mut lifecycle, &mut store, &tess, settings.star_count, now);

        log::info!(
            "World generated: {} sectors, {} star systems (seed {})",
            store.len(),
            lifecycle.len(),
            tess.rng_seed
        );

        Ok(Self {
            entropy: EntropySimulator::new(settings.entropy_config()),
            culler: Culler::new(settings.culling_config()),
            harvester: TouchHarvester::new(settings.touch_config()),
            ledger: HarvestLedger::new(),
            tessellation_seed: tess.rng_seed,
            bounds,
            store,
            lifecycle,
            settings,
        })
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[inline]
    pub fn store(&self) -> &SectorStore {
        &self.store
    }

    #[inline]
    pub fn entropy(&self) -> &EntropySimulator {
        &self.entropy
    }

    pub fn entropy_mut(&mut self) -> &mut EntropySimulator {
        &mut self.entropy
    }

    #[inline]
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    #[inline]
    pub fn ledger(&self) -> &HarvestLedger {
        &self.ledger
    }

    #[inline]
    pub fn harvester(&self) -> &TouchHarvester {
        &self.harvester
    }

    /// For registering the harvest callback
    pub fn harvester_mut(&mut self) -> &mut TouchHarvester {
        &mut self.harvester
    }

    pub fn tessellation_seed(&self) -> u64 {
        self.tessellation_seed
    }

    /// Replace every sector with a fresh tessellation. Stars keep their
    /// positions and are re-homed; entropy starts over.
    pub fn regenerate(&mut self, seed: Option<u64>) -> Result<(), SimError> {
        let mut config = self.settings.tessellation_config();
        config.seed = seed;
        let tess = tessellate::generate(self.bounds, &config)?;
        let mut store = SectorStore::from_tessellation(&tess)?;
        self.lifecycle.rehome_all(&mut store);
        self.store = store;
        self.tessellation_seed = tess.rng_seed;
        self.entropy.clear_history();
        log::info!(
            "World regenerated: {} sectors (seed {})",
            self.store.len(),
            tess.rng_seed
        );
        Ok(())
    }

    pub fn start(&mut self, now: f64) {
        self.entropy.start(now);
        self.lifecycle.start(now);
    }

    pub fn stop(&mut self) {
        self.entropy.stop();
        self.lifecycle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.entropy.is_running() || self.lifecycle.is_running()
    }

    /// Poll both drivers. Entropy commits first so the lifecycle sees this
    /// tick's values.
    pub fn update(&mut self, now: f64) -> WorldUpdate {
        let entropy = self.entropy.poll(&mut self.store, now);
        let transitions = self.lifecycle.poll(&self.store, now);
        self.harvester.expire(now);
        WorldUpdate {
            entropy,
            transitions,
        }
    }

    pub fn increase_entropy(
        &mut self,
        sector: SectorId,
        amount: f32,
        now: f64,
    ) -> Result<EntropySpreadEvent, SimError> {
        self.entropy.increase(&mut self.store, sector, amount, now)
    }

    pub fn decrease_entropy(
        &mut self,
        sector: SectorId,
        amount: f32,
        now: f64,
    ) -> Result<EntropySpreadEvent, SimError> {
        self.entropy.decrease(&mut self.store, sector, amount, now)
    }

    pub fn predict(&self, steps: usize) -> Vec<EntropyTrajectory> {
        self.entropy.predict(&self.store, steps)
    }

    /// Debit a star and credit the ledger. Returns what is left on the star.
    pub fn harvest(
        &mut self,
        star: StarId,
        kind: ResourceKind,
        amount: u32,
        now: f64,
    ) -> Result<u32, HarvestError> {
        let remaining = self.lifecycle.harvest(star, kind, amount)?.available();
        self.ledger.credit(star, kind, amount, now);
        Ok(remaining)
    }

    /// Route a resolved gesture through the harvester
    pub fn handle_gesture(&mut self, gesture: Gesture, viewport: &Viewport, now: f64) -> HarvestOutcome {
        let outcome = self
            .harvester
            .handle(gesture, viewport, &mut self.lifecycle, now);
        if let HarvestOutcome::Harvested {
            star, kind, amount, ..
        } = outcome
        {
            self.ledger.credit(star, kind, amount, now);
        }
        outcome
    }

    pub fn render_data(&self, viewport: &Viewport, governor: &PerformanceGovernor) -> RenderData {
        self.culler
            .generate_render_data(&self.store, self.lifecycle.stars(), viewport, governor)
    }

    /// Follow the governor's subsystem switches
    pub fn apply_budget(&mut self, governor: &PerformanceGovernor) {
        let enabled = governor.budget().subsystem_enabled(Subsystem::TouchFeedback);
        self.harvester.set_feedback_enabled(enabled);
    }

    pub fn snapshot(&self, now: f64) -> SaveData {
        SaveData {
            version: SAVE_VERSION,
            saved_at: now,
            bounds: self.bounds,
            sectors: self.store.all().iter().map(|s| (s.id, s.clone())).collect(),
            star_systems: self.lifecycle.star_map().clone(),
            harvested: self.ledger.totals,
        }
    }

    pub fn save(&self, path: &Path, now: f64) -> Result<(), PersistenceError> {
        persistence::save_to_path(path, &self.snapshot(now))
    }

    /// Replace sectors, stars and totals from a file. On any failure the
    /// current state is left exactly as it was; the backup is never read.
    pub fn load(&mut self, path: &Path, now: f64) -> Result<(), PersistenceError> {
        let data = persistence::load_from_path(path).inspect_err(|err| {
            log::warn!("Load from {} rejected: {err}", path.display());
        })?;
        self.restore(data, now)
    }

    /// Restore from the backup written by the previous [`World::save`]
    pub fn load_backup(&mut self, path: &Path, now: f64) -> Result<(), PersistenceError> {
        let data = persistence::load_backup(path).inspect_err(|err| {
            log::warn!("Backup for {} rejected: {err}", path.display());
        })?;
        log::warn!("Recovering {} from its backup", path.display());
        self.restore(data, now)
    }

    /// All-or-nothing restore: everything is rebuilt first, then swapped in.
    /// Drivers that were running restart at `now`.
    pub fn restore(&mut self, data: SaveData, now: f64) -> Result<(), PersistenceError> {
        data.validate()?;
        let store = SectorStore::from_sectors(data.sectors.into_values().collect())?;
        let lifecycle = LifecycleController::with_stars(self.settings.lifecycle_config(), data.star_systems);

        let was_running = self.is_running();
        self.stop();
        self.bounds = data.bounds;
        self.store = store;
        self.lifecycle = lifecycle;
        self.ledger = HarvestLedger::from_totals(data.harvested);
        self.entropy.clear_history();
        if was_running {
            self.start(now);
        }
        log::info!(
            "Restored {} sectors, {} star systems (saved at {:.1}s)",
            self.store.len(),
            self.lifecycle.len(),
            data.saved_at
        );
        Ok(())
    }
}

fn scatter_stars(
    lifecycle: &mut LifecycleController,
    store: &mut SectorStore,
    tess: &Tessellation,
    count: usize,
    now: f64,
) {
    let mut rng = Pcg32::seed_from_u64(tess.rng_seed ^ 0x5a17_5a17);
    let b = tess.bounds;
    for _ in 0..count {
        let position = Vec2::new(
            rng.random_range(b.min.x..b.max.x),
            rng.random_range(b.min.y..b.max.y),
        );
        let radius = rng.random_range(STAR_RADIUS);
        let brightness = rng.random_range(STAR_BRIGHTNESS);
        lifecycle.add_star(store, position, radius, brightness, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::star::StarState;

    fn small_settings() -> Settings {
        Settings {
            sector_count: 30,
            star_count: 20,
            tessellation_seed: Some(7),
            world_width: 600.0,
            world_height: 400.0,
            relaxation_iterations: 1,
            ..Default::default()
        }
    }

    fn temp_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("entropy-field-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_new_world_homes_every_star() {
        let world = World::new(small_settings(), 0.0).unwrap();
        assert_eq!(world.store().len(), 30);
        assert_eq!(world.lifecycle().len(), 20);
        for star in world.lifecycle().stars() {
            if let Some(sector) = star.sector {
                assert!(world.store().get(sector).unwrap().star_systems.contains(&star.id));
            }
        }
        assert_eq!(world.tessellation_seed(), 7);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = World::new(small_settings(), 0.0).unwrap();
        let b = World::new(small_settings(), 0.0).unwrap();
        assert_eq!(a.store().all(), b.store().all());
        assert_eq!(a.lifecycle().star_map(), b.lifecycle().star_map());
    }

    #[test]
    fn test_update_only_while_running() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.increase_entropy(SectorId(0), 0.9, 0.0).unwrap();
        assert!(world.update(1.0).entropy.is_none());
        world.start(1.0);
        assert!(world.update(1.0).entropy.is_some());
        world.stop();
        let frozen = world.store().entropies();
        world.update(5.0);
        assert_eq!(world.store().entropies(), frozen);
    }

    #[test]
    fn test_hot_sector_kills_its_stars() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        let (star, sector) = world
            .lifecycle()
            .stars()
            .find_map(|s| s.sector.map(|sec| (s.id, sec)))
            .unwrap();
        world.start(0.0);
        world.increase_entropy(sector, 1.0, 0.0).unwrap();
        let mut now = 0.0;
        while now < 10.0 && world.lifecycle().get(star).unwrap().state() == StarState::Healthy {
            now += 0.25;
            world.increase_entropy(sector, 1.0, now).unwrap();
            world.update(now);
        }
        assert_ne!(world.lifecycle().get(star).unwrap().state(), StarState::Healthy);

        let kind = ResourceKind::StellarEssence;
        let available = world.lifecycle().get(star).unwrap().available();
        if world.lifecycle().get(star).unwrap().state() == StarState::Dying {
            assert_eq!(world.harvest(star, kind, 2, now).unwrap(), available - 2);
            assert_eq!(world.ledger().total(kind), 2);
        }
    }

    #[test]
    fn test_harvest_failure_leaves_ledger_alone() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        let star = world.lifecycle().stars().next().unwrap().id;
        assert!(world.harvest(star, ResourceKind::StellarEssence, 1, 0.0).is_err());
        assert!(world.ledger().is_empty());
    }

    #[test]
    fn test_regenerate_rehomes_stars() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.regenerate(Some(99)).unwrap();
        assert_eq!(world.tessellation_seed(), 99);
        for star in world.lifecycle().stars() {
            let holder = world.store().sector_of(star.id);
            assert_eq!(holder, star.sector);
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_file("world");
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.increase_entropy(SectorId(3), 0.6, 1.0).unwrap();
        world.save(&path, 2.0).unwrap();
        let saved = world.snapshot(2.0);

        world.increase_entropy(SectorId(3), 0.3, 3.0).unwrap();
        world.load(&path, 3.0).unwrap();
        assert_eq!(world.snapshot(2.0), saved);
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(persistence::backup_path(&path)).ok();
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let path = temp_file("corrupt");
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.increase_entropy(SectorId(1), 0.4, 1.0).unwrap();
        let before = world.snapshot(5.0);

        std::fs::write(&path, "{\"version\": 1, \"sectors\": 3}").unwrap();
        assert!(world.load(&path, 5.0).is_err());
        assert_eq!(world.snapshot(5.0), before);

        let mut bad = before.clone();
        bad.sectors.get_mut(&SectorId(0)).unwrap().entropy = 2.0;
        assert!(world.restore(bad, 5.0).is_err());
        assert_eq!(world.snapshot(5.0), before);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupt_save_fails_even_with_backup() {
        let path = temp_file("with-backup");
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.increase_entropy(SectorId(2), 0.5, 1.0).unwrap();
        world.save(&path, 1.0).unwrap();
        let first = world.snapshot(1.0);
        world.increase_entropy(SectorId(2), 0.2, 2.0).unwrap();
        world.save(&path, 2.0).unwrap();

        world.increase_entropy(SectorId(4), 0.7, 3.0).unwrap();
        let before = world.snapshot(3.0);
        std::fs::write(&path, "garbage").unwrap();
        assert!(matches!(world.load(&path, 3.0), Err(PersistenceError::Parse(_))));
        assert_eq!(world.snapshot(3.0), before);

        world.load_backup(&path, 3.0).unwrap();
        assert_eq!(world.snapshot(1.0), first);
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(persistence::backup_path(&path)).ok();
    }

    #[test]
    fn test_restore_while_running_restarts_at_now() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        world.start(0.0);
        world.update(0.5);
        // Saved far in the future of the current clock
        let data = world.snapshot(5000.0);

        world.restore(data, 1.0).unwrap();
        assert!(world.is_running());
        assert!(world.update(1.0).entropy.is_some());
    }

    #[test]
    fn test_restore_while_stopped_stays_stopped() {
        let mut world = World::new(small_settings(), 0.0).unwrap();
        let data = world.snapshot(10.0);
        world.restore(data, 1.0).unwrap();
        assert!(!world.is_running());
        assert!(world.update(2.0).entropy.is_none());
    }

    #[test]
    fn test_render_data_respects_budget() {
        let world = World::new(small_settings(), 0.0).unwrap();
        let governor = PerformanceGovernor::new(
            Default::default(),
            crate::view::RenderBudget::new(5, 3, 0.0),
        );
        let vp = Viewport::looking_at(Vec2::new(800.0, 600.0), Vec2::new(300.0, 200.0), 1.0);
        let data = world.render_data(&vp, &governor);
        assert_eq!(data.visible_sectors.len(), 5);
        assert!(data.visible_entities.len() <= 3);
        assert_eq!(data.metrics.total_sectors, 30);
    }
}
