//! Viewport culling, ranking and level of detail
//!
//! `generate_render_data` is the hand-off point to the presentation layer:
//! it picks what is worth drawing this frame and how richly.

use std::collections::BTreeMap;

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use super::governor::{Effect, PerformanceGovernor, RenderBudget, Subsystem};
use super::viewport::Viewport;
use crate::consts::ENTROPY_PRIORITY_WEIGHT;
use crate::geometry::Bounds;
use crate::sim::sector::{Sector, SectorId, SectorStore};
use crate::sim::star::{StarId, StarState, StarSystem};

/// Rendering richness tier, interpreted by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LodLevel {
    Hidden,
    Simplified,
    Standard,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CullingConfig {
    /// Screen pixels added around the viewport before culling
    pub padding_px: f32,
    /// Normalized distance (0 = centre, 1 = screen corner) limits for
    /// Full, Standard and Simplified; anything beyond is Hidden
    pub lod_distances: [f32; 3],
    /// Below the first scale nothing is better than Simplified; Full needs
    /// at least the second
    pub lod_zoom: [f32; 2],
    /// Particle count at entropy 1.0 for a Full sector
    pub max_particles_per_sector: u32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            padding_px: 100.0,
            lod_distances: [0.5, 1.0, 1.5],
            lod_zoom: [0.25, 1.0],
            max_particles_per_sector: 12,
        }
    }
}

impl CullingConfig {
    /// Step function of zoom scale and normalized distance
    pub fn lod_for(&self, scale: f32, distance: f32) -> LodLevel {
        let [full, standard, simplified] = self.lod_distances;
        let [min_detail_zoom, full_zoom] = self.lod_zoom;
        if distance > simplified {
            LodLevel::Hidden
        } else if distance > standard || scale < min_detail_zoom {
            LodLevel::Simplified
        } else if distance <= full && scale >= full_zoom {
            LodLevel::Full
        } else {
            LodLevel::Standard
        }
    }
}

/// Per-sector presentation hints
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorRenderInfo {
    pub should_render: bool,
    pub lod: LodLevel,
    /// RGBA, derived from entropy
    pub color: Vec4,
    pub opacity: f32,
    pub glow: bool,
    /// Entropy differs sharply from a neighbor
    pub neighbor_tint: bool,
    pub particles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntityRenderInfo {
    pub id: StarId,
    pub position: Vec2,
    pub radius: f32,
    pub brightness: f32,
    pub state: StarState,
    pub lod: LodLevel,
    pub harvestable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_sectors: usize,
    /// Sectors overlapping the padded viewport
    pub candidate_sectors: usize,
    pub visible_sectors: usize,
    pub total_entities: usize,
    pub visible_entities: usize,
    /// Indexed by `LodLevel as usize`
    pub lod_counts: [usize; 4],
    pub average_fps: Option<f32>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderData {
    /// Highest priority first
    pub visible_sectors: Vec<SectorId>,
    pub sector_info: BTreeMap<SectorId, SectorRenderInfo>,
    pub visible_entities: Vec<EntityRenderInfo>,
    pub metrics: PerformanceMetrics,
}

/// Neighbor entropy gap that earns a tint
const TINT_GAP: f32 = 0.2;
/// Sectors above this entropy glow
const GLOW_ENTROPY: f32 = 0.6;

const CALM: Vec4 = Vec4::new(0.20, 0.45, 0.95, 1.0);
const CORRUPT: Vec4 = Vec4::new(0.85, 0.12, 0.35, 1.0);
const FLAT: Vec4 = Vec4::new(0.35, 0.35, 0.45, 1.0);

#[derive(Debug, Clone, Default)]
pub struct Culler {
    config: CullingConfig,
}

impl Culler {
    pub fn new(config: CullingConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// Sectors overlapping the padded viewport and passing the visibility
    /// threshold, ranked and truncated. Pairs carry the normalized distance.
    pub fn cull_sectors<'a>(
        &self,
        store: &'a SectorStore,
        viewport: &Viewport,
        budget: &RenderBudget,
    ) -> Vec<(&'a Sector, f32)> {
        let area = viewport.expanded_bounds(self.config.padding_px);
        let mut ranked: Vec<(&Sector, f32)> = store
            .in_bounds(area)
            .filter(|s| s.entropy >= budget.visibility_threshold)
            .map(|s| (s, bounds_distance(viewport, &s.bounds)))
            .collect();
        sort_by_priority(&mut ranked, |(s, d)| (s.entropy, *d, s.id.0));
        ranked.truncate(budget.max_sectors);
        ranked
    }

    /// Star systems overlapping the padded viewport, ranked and truncated
    pub fn cull_entities<'a>(
        &self,
        stars: impl IntoIterator<Item = &'a StarSystem>,
        viewport: &Viewport,
        budget: &RenderBudget,
    ) -> Vec<(&'a StarSystem, f32)> {
        if !budget.subsystem_enabled(Subsystem::StarSystems) {
            return Vec::new();
        }
        let area = viewport.expanded_bounds(self.config.padding_px);
        let mut ranked: Vec<(&StarSystem, f32)> = stars
            .into_iter()
            .filter(|star| star_bounds(star).intersects(&area))
            .map(|star| (star, viewport.normalized_distance(star.position)))
            .collect();
        sort_by_priority(&mut ranked, |(star, d)| (interest(star), *d, star.id.0));
        ranked.truncate(budget.max_entities);
        ranked
    }

    pub fn sector_info(
        &self,
        sector: &Sector,
        store: &SectorStore,
        lod: LodLevel,
        budget: &RenderBudget,
    ) -> SectorRenderInfo {
        let e = sector.entropy.clamp(0.0, 1.0);
        let overlay = budget.subsystem_enabled(Subsystem::EntropyOverlay);
        let color = if overlay { CALM.lerp(CORRUPT, e) } else { FLAT };
        let mut opacity = if overlay { 0.15 + 0.6 * e } else { 0.3 };
        if lod == LodLevel::Simplified {
            opacity *= 0.7;
        }
        let detailed = lod >= LodLevel::Standard;
        let glow = overlay && detailed && budget.effect_enabled(Effect::Glow) && e > GLOW_ENTROPY;
        let neighbor_tint = overlay
            && lod == LodLevel::Full
            && budget.effect_enabled(Effect::NeighborTint)
            && store
                .neighbors_of(sector.id)
                .any(|n| (n.entropy - sector.entropy).abs() > TINT_GAP);
        let particles = if lod == LodLevel::Full && budget.effect_enabled(Effect::Particles) {
            (e * self.config.max_particles_per_sector as f32).round() as u32
        } else {
            0
        };
        SectorRenderInfo {
            should_render: lod != LodLevel::Hidden,
            lod,
            color,
            opacity,
            glow,
            neighbor_tint,
            particles,
        }
    }

    /// Everything the presentation layer needs for one frame
    pub fn generate_render_data<'a>(
        &self,
        store: &SectorStore,
        stars: impl IntoIterator<Item = &'a StarSystem>,
        viewport: &Viewport,
        governor: &PerformanceGovernor,
    ) -> RenderData {
        let budget = governor.budget();
        let mut data = RenderData::default();
        data.metrics.total_sectors = store.len();
        data.metrics.candidate_sectors = store
            .in_bounds(viewport.expanded_bounds(self.config.padding_px))
            .count();

        for (sector, distance) in self.cull_sectors(store, viewport, budget) {
            let lod = self.config.lod_for(viewport.scale(), distance);
            data.metrics.lod_counts[lod as usize] += 1;
            data.visible_sectors.push(sector.id);
            data.sector_info
                .insert(sector.id, self.sector_info(sector, store, lod, budget));
        }

        let stars: Vec<&StarSystem> = stars.into_iter().collect();
        data.metrics.total_entities = stars.len();
        for (star, distance) in self.cull_entities(stars, viewport, budget) {
            let lod = self.config.lod_for(viewport.scale(), distance);
            if lod == LodLevel::Hidden {
                continue;
            }
            data.visible_entities.push(EntityRenderInfo {
                id: star.id,
                position: star.position,
                radius: star.radius,
                brightness: star.brightness,
                state: star.state(),
                lod,
                harvestable: star.is_harvestable(),
            });
        }

        data.metrics.visible_sectors = data.visible_sectors.len();
        data.metrics.visible_entities = data.visible_entities.len();
        data.metrics.average_fps = governor.average_fps();
        data.metrics.degraded = governor.is_degraded();
        data
    }
}

/// Interest level of a star: its smoothed entropy, boosted once harvestable
fn interest(star: &StarSystem) -> f32 {
    match star.state() {
        StarState::Healthy => star.entropy,
        _ if star.is_harvestable() => star.entropy + 1.0,
        _ => star.entropy,
    }
}

fn star_bounds(star: &StarSystem) -> Bounds {
    let r = Vec2::splat(star.radius.max(0.0));
    Bounds::new(star.position - r, star.position + r)
}

/// Normalized distance from the view centre to the nearest point of `bounds`
fn bounds_distance(viewport: &Viewport, bounds: &Bounds) -> f32 {
    viewport.normalized_distance(bounds.clamp(viewport.center()))
}

/// Sort by entropy * weight - distance, descending; id breaks exact ties
fn sort_by_priority<T>(items: &mut [T], key: impl Fn(&T) -> (f32, f32, u32)) {
    items.sort_by(|a, b| {
        let (ea, da, ia) = key(a);
        let (eb, db, ib) = key(b);
        let sa = ea * ENTROPY_PRIORITY_WEIGHT - da;
        let sb = eb * ENTROPY_PRIORITY_WEIGHT - db;
        sb.total_cmp(&sa).then(ia.cmp(&ib))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::sector::tests::strip_store;
    use crate::view::governor::GovernorConfig;

    fn governor(budget: RenderBudget) -> PerformanceGovernor {
        PerformanceGovernor::new(GovernorConfig::default(), budget)
    }

    /// Viewport showing world x in [0, 8], y in [0, 6] at scale 100
    fn tight_view() -> Viewport {
        Viewport::with_transform(100.0, Vec2::ZERO, Vec2::new(800.0, 600.0)).unwrap()
    }

    #[test]
    fn test_lod_step_function() {
        let c = CullingConfig::default();
        assert_eq!(c.lod_for(2.0, 0.1), LodLevel::Full);
        assert_eq!(c.lod_for(0.5, 0.1), LodLevel::Standard);
        assert_eq!(c.lod_for(2.0, 0.8), LodLevel::Standard);
        assert_eq!(c.lod_for(0.1, 0.1), LodLevel::Simplified);
        assert_eq!(c.lod_for(2.0, 1.2), LodLevel::Simplified);
        assert_eq!(c.lod_for(2.0, 2.0), LodLevel::Hidden);
    }

    #[test]
    fn test_outside_excluded_partial_included() {
        let store = strip_store();
        // Padding of 300px at scale 100 reaches x = 11, partially overlapping sector 1
        let culler = Culler::new(CullingConfig {
            padding_px: 300.0,
            ..Default::default()
        });
        let data = culler.generate_render_data(
            &store,
            std::iter::empty(),
            &tight_view(),
            &governor(RenderBudget::default()),
        );
        assert!(data.visible_sectors.contains(&SectorId(0)));
        assert!(data.visible_sectors.contains(&SectorId(1)));
        assert!(!data.visible_sectors.contains(&SectorId(2)));
        assert_eq!(data.metrics.candidate_sectors, 2);
    }

    #[test]
    fn test_ranking_prefers_entropy_then_proximity() {
        let mut store = strip_store();
        store.set_entropy(SectorId(2), 0.9);
        let view = Viewport::with_transform(0.5, Vec2::ZERO, Vec2::new(800.0, 600.0)).unwrap();
        let culler = Culler::default();
        let ranked = culler.cull_sectors(&store, &view, &RenderBudget::default());
        assert_eq!(ranked[0].0.id, SectorId(2));
        // Remaining ties on entropy go to whichever is closer to the centre
        assert_eq!(ranked[1].0.id, SectorId(1));

        let ranked = culler.cull_sectors(&store, &view, &RenderBudget::new(1, 10, 0.0));
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_visibility_threshold_hides_quiet_sectors() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.5);
        let view = Viewport::with_transform(0.5, Vec2::ZERO, Vec2::new(800.0, 600.0)).unwrap();
        let ranked = Culler::default().cull_sectors(&store, &view, &RenderBudget::new(10, 10, 0.2));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0.id, SectorId(0));
    }

    #[test]
    fn test_sector_info_follows_budget() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.9);
        let culler = Culler::default();
        let sector = store.get(SectorId(0)).unwrap();

        let rich = culler.sector_info(sector, &store, LodLevel::Full, &RenderBudget::default());
        assert!(rich.should_render && rich.glow && rich.neighbor_tint);
        assert!(rich.particles > 0);

        let mut lean = RenderBudget::default();
        lean.disabled_effects = vec![Effect::Particles, Effect::Glow];
        let info = culler.sector_info(sector, &store, LodLevel::Full, &lean);
        assert!(!info.glow && info.particles == 0 && info.neighbor_tint);

        let hidden = culler.sector_info(sector, &store, LodLevel::Hidden, &RenderBudget::default());
        assert!(!hidden.should_render);
    }

    #[test]
    fn test_entities_culled_and_dropped_with_subsystem() {
        let mut store = strip_store();
        let mut lc = crate::sim::star::LifecycleController::new(Default::default());
        let near = lc.add_star(&mut store, Vec2::new(4.0, 3.0), 0.5, 1.0, 0.0);
        lc.add_star(&mut store, Vec2::new(25.0, 5.0), 0.5, 1.0, 0.0);
        let culler = Culler::new(CullingConfig {
            padding_px: 0.0,
            ..Default::default()
        });
        let data = culler.generate_render_data(
            &store,
            lc.stars(),
            &tight_view(),
            &governor(RenderBudget::default()),
        );
        assert_eq!(data.metrics.total_entities, 2);
        assert_eq!(data.visible_entities.len(), 1);
        assert_eq!(data.visible_entities[0].id, near);

        let mut budget = RenderBudget::default();
        budget.disabled_subsystems.push(Subsystem::StarSystems);
        assert!(culler.cull_entities(lc.stars(), &tight_view(), &budget).is_empty());
    }
}
