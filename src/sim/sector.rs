//! Sector records and the authoritative sector store
//!
//! Sectors live in an arena indexed by their dense `SectorId`. Geometry is
//! fixed at construction; entropy is written only by the entropy simulator
//! through crate-private accessors.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::star::StarId;
use super::tessellate::Tessellation;
use crate::consts::{DEAD_THRESHOLD, DYING_THRESHOLD};
use crate::error::SimError;
use crate::geometry::{Bounds, point_in_polygon, validate_polygon, vertex_centroid};

/// Stable sector identifier (index into the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorId(pub u32);

impl SectorId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector-{:04}", self.0)
    }
}

/// A polygonal region of the galaxy map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    /// Vertices in winding order (at least 3)
    pub polygon: Vec<Vec2>,
    /// Cached bounding box of `polygon`
    pub bounds: Bounds,
    /// Tessellation seed point
    pub seed: Vec2,
    /// Vertex centroid of `polygon`
    pub centroid: Vec2,
    /// Corruption level in [0, max entropy]
    pub entropy: f32,
    /// Adjacent sectors (symmetric)
    pub neighbors: Vec<SectorId>,
    /// Star systems whose position lies in this sector
    pub star_systems: Vec<StarId>,
    /// Timestamp (seconds) of the last entropy write
    #[serde(default)]
    pub last_update: f64,
}

impl Sector {
    /// Build a sector from a polygon, deriving bounds and centroid
    pub fn new(id: SectorId, polygon: Vec<Vec2>, seed: Vec2) -> Result<Self, SimError> {
        validate_polygon(&polygon)?;
        let bounds =
            Bounds::from_points(&polygon).ok_or(SimError::InvalidPolygon { vertices: 0 })?;
        let centroid = vertex_centroid(&polygon);
        Ok(Self {
            id,
            polygon,
            bounds,
            seed,
            centroid,
            entropy: 0.0,
            neighbors: Vec::new(),
            star_systems: Vec::new(),
            last_update: 0.0,
        })
    }

    /// Point-in-polygon test with a bounding-box early out
    pub fn contains(&self, p: Vec2) -> bool {
        self.bounds.contains(p) && point_in_polygon(p, &self.polygon)
    }
}

/// Aggregate entropy figures across the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EntropyStats {
    pub average: f32,
    pub min: f32,
    pub max: f32,
    /// Sectors hot enough to start killing stars
    pub dying_sectors: usize,
    /// Sectors hot enough to finish them off
    pub dead_sectors: usize,
}

/// Owns every sector record
#[derive(Debug, Clone, Default)]
pub struct SectorStore {
    sectors: Vec<Sector>,
}

impl SectorStore {
    /// Build the store from tessellation output; all sectors start at zero entropy
    pub fn from_tessellation(tess: &Tessellation) -> Result<Self, SimError> {
        let mut sectors = Vec::with_capacity(tess.cells.len());
        for (i, cell) in tess.cells.iter().enumerate() {
            let id = SectorId(i as u32);
            let mut sector = Sector::new(id, cell.polygon.clone(), cell.seed)?;
            sector.neighbors = tess.neighbors[i].iter().map(|&n| SectorId(n as u32)).collect();
            sectors.push(sector);
        }
        Ok(Self { sectors })
    }

    /// Rebuild from full records (used by load). Ids must be dense 0..n.
    pub fn from_sectors(mut sectors: Vec<Sector>) -> Result<Self, SimError> {
        sectors.sort_by_key(|s| s.id);
        for (i, sector) in sectors.iter().enumerate() {
            if sector.id.index() != i {
                return Err(SimError::UnknownSector(SectorId(i as u32)));
            }
            validate_polygon(&sector.polygon)?;
        }
        Ok(Self { sectors })
    }

    #[inline]
    pub fn get(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id.index())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.get_mut(id.index())
    }

    /// All sectors in id order
    #[inline]
    pub fn all(&self) -> &[Sector] {
        &self.sectors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn entropy(&self, id: SectorId) -> Option<f32> {
        self.get(id).map(|s| s.entropy)
    }

    /// Entropy values in id order
    pub fn entropies(&self) -> Vec<f32> {
        self.sectors.iter().map(|s| s.entropy).collect()
    }

    /// Neighbor lists as arena indices, in id order
    pub(crate) fn neighbor_indices(&self) -> Vec<Vec<usize>> {
        self.sectors
            .iter()
            .map(|s| s.neighbors.iter().map(|n| n.index()).collect())
            .collect()
    }

    /// Commit a whole tick of entropy values at once
    pub(crate) fn commit_entropies(&mut self, values: &[f32], now: f64) {
        for (sector, &value) in self.sectors.iter_mut().zip(values) {
            if sector.entropy != value {
                sector.entropy = value;
                sector.last_update = now;
            }
        }
    }

    /// Sector whose polygon contains `point` (first match in id order)
    pub fn containing(&self, point: Vec2) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.contains(point))
    }

    /// Sectors whose bounding box overlaps `bounds`
    pub fn in_bounds(&self, bounds: Bounds) -> impl Iterator<Item = &Sector> + '_ {
        self.sectors.iter().filter(move |s| s.bounds.intersects(&bounds))
    }

    pub fn neighbors_of(&self, id: SectorId) -> impl Iterator<Item = &Sector> {
        self.get(id)
            .into_iter()
            .flat_map(|s| s.neighbors.iter())
            .filter_map(|&n| self.get(n))
    }

    /// Sector currently holding `entity`
    pub fn sector_of(&self, entity: StarId) -> Option<SectorId> {
        self.sectors
            .iter()
            .find(|s| s.star_systems.contains(&entity))
            .map(|s| s.id)
    }

    /// Put `entity` into the sector containing `position`.
    ///
    /// Idempotent: repeating the call leaves a single membership. An entity
    /// already held by another sector is moved.
    pub fn assign_entity(&mut self, entity: StarId, position: Vec2) -> Option<SectorId> {
        let target = self.containing(position)?.id;
        if let Some(current) = self.sector_of(entity) {
            if current == target {
                return Some(target);
            }
            self.remove_entity(entity);
        }
        if let Some(sector) = self.get_mut(target) {
            sector.star_systems.push(entity);
        }
        Some(target)
    }

    /// Drop `entity` from whichever sector holds it
    pub fn remove_entity(&mut self, entity: StarId) -> Option<SectorId> {
        let holder = self.sector_of(entity)?;
        if let Some(sector) = self.get_mut(holder) {
            sector.star_systems.retain(|&e| e != entity);
        }
        Some(holder)
    }

    /// Owned copy for readers that need stability across mutation
    pub fn snapshot(&self) -> Vec<Sector> {
        self.sectors.clone()
    }

    pub fn entropy_stats(&self) -> EntropyStats {
        if self.sectors.is_empty() {
            return EntropyStats::default();
        }
        let mut stats = EntropyStats {
            min: f32::MAX,
            max: f32::MIN,
            ..Default::default()
        };
        let mut sum = 0.0;
        for s in &self.sectors {
            sum += s.entropy;
            stats.min = stats.min.min(s.entropy);
            stats.max = stats.max.max(s.entropy);
            if s.entropy > DYING_THRESHOLD {
                stats.dying_sectors += 1;
            }
            if s.entropy > DEAD_THRESHOLD {
                stats.dead_sectors += 1;
            }
        }
        stats.average = sum / self.sectors.len() as f32;
        stats
    }

    /// Test helper: overwrite a sector's entropy directly
    #[cfg(test)]
    pub(crate) fn set_entropy(&mut self, id: SectorId, value: f32) {
        if let Some(s) = self.get_mut(id) {
            s.entropy = value;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sim::tessellate::{TessellationConfig, generate};

    /// Three squares in a row: 0 - 1 - 2
    pub(crate) fn strip_store() -> SectorStore {
        let square = |x: f32| {
            vec![
                Vec2::new(x, 0.0),
                Vec2::new(x + 10.0, 0.0),
                Vec2::new(x + 10.0, 10.0),
                Vec2::new(x, 10.0),
            ]
        };
        let mut sectors = Vec::new();
        for i in 0..3u32 {
            let x = i as f32 * 10.0;
            let mut s = Sector::new(SectorId(i), square(x), Vec2::new(x + 5.0, 5.0)).unwrap();
            s.neighbors = match i {
                0 => vec![SectorId(1)],
                1 => vec![SectorId(0), SectorId(2)],
                _ => vec![SectorId(1)],
            };
            sectors.push(s);
        }
        SectorStore::from_sectors(sectors).unwrap()
    }

    #[test]
    fn test_containing_and_in_bounds() {
        let store = strip_store();
        assert_eq!(store.containing(Vec2::new(15.0, 5.0)).unwrap().id, SectorId(1));
        assert!(store.containing(Vec2::new(50.0, 5.0)).is_none());

        let view = Bounds::new(Vec2::new(12.0, 2.0), Vec2::new(18.0, 8.0));
        let hits: Vec<_> = store.in_bounds(view).map(|s| s.id).collect();
        assert_eq!(hits, vec![SectorId(1)]);

        let partial = Bounds::new(Vec2::new(8.0, 2.0), Vec2::new(12.0, 8.0));
        assert_eq!(store.in_bounds(partial).count(), 2);
    }

    #[test]
    fn test_assign_entity_is_idempotent() {
        let mut store = strip_store();
        let star = StarId(7);
        let pos = Vec2::new(5.0, 5.0);
        assert_eq!(store.assign_entity(star, pos), Some(SectorId(0)));
        assert_eq!(store.assign_entity(star, pos), Some(SectorId(0)));
        assert_eq!(store.get(SectorId(0)).unwrap().star_systems, vec![star]);
    }

    #[test]
    fn test_assign_entity_moves_between_sectors() {
        let mut store = strip_store();
        let star = StarId(1);
        store.assign_entity(star, Vec2::new(5.0, 5.0));
        store.assign_entity(star, Vec2::new(25.0, 5.0));
        assert!(store.get(SectorId(0)).unwrap().star_systems.is_empty());
        assert_eq!(store.sector_of(star), Some(SectorId(2)));
        assert_eq!(store.remove_entity(star), Some(SectorId(2)));
        assert_eq!(store.sector_of(star), None);
        assert_eq!(store.remove_entity(star), None);
    }

    #[test]
    fn test_assign_outside_every_sector() {
        let mut store = strip_store();
        assert_eq!(store.assign_entity(StarId(3), Vec2::new(-5.0, 5.0)), None);
    }

    #[test]
    fn test_from_sectors_rejects_gaps() {
        let mut sectors = strip_store().snapshot();
        sectors.remove(1);
        assert!(SectorStore::from_sectors(sectors).is_err());
    }

    #[test]
    fn test_centroid_is_contained() {
        let tess = generate(
            Bounds::from_size(1000.0, 800.0),
            &TessellationConfig {
                count: 60,
                seed: Some(42),
                ..Default::default()
            },
        )
        .unwrap();
        let store = SectorStore::from_tessellation(&tess).unwrap();
        for sector in store.all() {
            assert!(
                sector.contains(sector.centroid),
                "{} does not contain its centroid",
                sector.id
            );
        }
    }

    #[test]
    fn test_entropy_stats() {
        let mut store = strip_store();
        store.set_entropy(SectorId(0), 0.2);
        store.set_entropy(SectorId(1), 0.8);
        store.set_entropy(SectorId(2), 0.95);
        let stats = store.entropy_stats();
        assert!((stats.average - 0.65).abs() < 1e-5);
        assert_eq!(stats.min, 0.2);
        assert_eq!(stats.max, 0.95);
        assert_eq!(stats.dying_sectors, 2);
        assert_eq!(stats.dead_sectors, 1);
    }
}
