//! Voronoi-style tessellation of the world rectangle into sectors
//!
//! Seeds are scattered with a seeded RNG, each seed's cell is built either by
//! exact half-plane clipping or by radial sampling (rays shrunk to the
//! nearest perpendicular bisector), and optional Lloyd relaxation evens the
//! cells out. The neighbor graph is a distance heuristic, not exact adjacency.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::geometry::{Bounds, clip_to_bisector, vertex_centroid};
use crate::{angle_around, polar_to_cartesian};

/// Fraction of the way a seed moves toward its cell centroid per Lloyd step
pub const RELAXATION_STEP: f32 = 0.5;

/// Vertices closer than this are merged
const DEDUP_EPSILON: f32 = 1e-3;

/// How cell polygons are built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellShape {
    /// Rays at fixed angular steps, shrunk to the nearest bisector. Border
    /// stretches are exact; interior corners are approximated.
    Radial,
    /// Bounds rectangle clipped by every bisector half-plane
    #[default]
    Exact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TessellationConfig {
    /// Number of sectors
    pub count: usize,
    /// RNG seed; `None` draws a fresh one
    pub seed: Option<u64>,
    /// Lloyd relaxation rounds
    pub relaxation_iterations: u32,
    /// Rays per cell for `CellShape::Radial`
    pub rays: usize,
    pub shape: CellShape,
    /// Neighbor threshold as a multiple of the median nearest-seed distance
    pub neighbor_factor: f32,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            count: 400,
            seed: None,
            relaxation_iterations: 2,
            rays: 48,
            shape: CellShape::Exact,
            neighbor_factor: 1.8,
        }
    }
}

/// One generated cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub seed: Vec2,
    pub polygon: Vec<Vec2>,
}

/// Tessellation output: cells plus a symmetric adjacency list by index
#[derive(Debug, Clone)]
pub struct Tessellation {
    pub bounds: Bounds,
    pub cells: Vec<Cell>,
    pub neighbors: Vec<Vec<usize>>,
    /// Seed actually used (useful when none was configured)
    pub rng_seed: u64,
}

/// Partition `bounds` into `config.count` cells
pub fn generate(bounds: Bounds, config: &TessellationConfig) -> Result<Tessellation, SimError> {
    if !bounds.is_valid() {
        return Err(SimError::InvalidBounds);
    }
    if config.count == 0 {
        return Err(SimError::InvalidSectorCount);
    }

    let rng_seed = config.seed.unwrap_or_else(|| {
        let seed = rand::rng().random();
        log::info!("No tessellation seed configured, using {}", seed);
        seed
    });
    let mut rng = Pcg32::seed_from_u64(rng_seed);

    let mut seeds: Vec<Vec2> = (0..config.count)
        .map(|_| {
            Vec2::new(
                rng.random_range(bounds.min.x..bounds.max.x),
                rng.random_range(bounds.min.y..bounds.max.y),
            )
        })
        .collect();

    for iteration in 0..config.relaxation_iterations {
        let polygons = build_cells(&seeds, bounds, config);
        let mut total_shift = 0.0;
        for (seed, polygon) in seeds.iter_mut().zip(&polygons) {
            let target = vertex_centroid(polygon);
            let next = bounds.clamp(*seed + (target - *seed) * RELAXATION_STEP);
            total_shift += next.distance(*seed);
            *seed = next;
        }
        log::debug!(
            "Lloyd iteration {}: mean seed shift {:.3}",
            iteration + 1,
            total_shift / seeds.len() as f32
        );
    }

    let polygons = build_cells(&seeds, bounds, config);
    let neighbors = neighbor_graph(&seeds, config.neighbor_factor);
    let cells = seeds
        .into_iter()
        .zip(polygons)
        .map(|(seed, polygon)| Cell { seed, polygon })
        .collect();

    Ok(Tessellation {
        bounds,
        cells,
        neighbors,
        rng_seed,
    })
}

fn build_cells(seeds: &[Vec2], bounds: Bounds, config: &TessellationConfig) -> Vec<Vec<Vec2>> {
    (0..seeds.len())
        .map(|i| {
            let others = others_by_distance(i, seeds);
            match config.shape {
                CellShape::Radial => radial_cell(seeds[i], &others, bounds, config.rays),
                CellShape::Exact => exact_cell(seeds[i], &others, bounds),
            }
        })
        .collect()
}

/// Other seeds sorted by ascending distance from `seeds[index]`
fn others_by_distance(index: usize, seeds: &[Vec2]) -> Vec<(f32, Vec2)> {
    let p = seeds[index];
    let mut others: Vec<(f32, Vec2)> = seeds
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .map(|(_, &q)| (p.distance(q), q))
        .collect();
    others.sort_by(|a, b| a.0.total_cmp(&b.0));
    others
}

fn radial_cell(p: Vec2, others: &[(f32, Vec2)], bounds: Bounds, rays: usize) -> Vec<Vec2> {
    let rays = rays.max(8);
    let mut points = Vec::with_capacity(rays + 8);

    for k in 0..rays {
        let dir = polar_to_cartesian(1.0, k as f32 * TAU / rays as f32);
        let mut t = bounds.ray_exit(p, dir);
        for &(dist, q) in others {
            // Every bisector crossing is at least dist / 2 away
            if dist * 0.5 >= t {
                break;
            }
            let d = q - p;
            let along = dir.dot(d);
            if along <= f32::EPSILON {
                continue;
            }
            t = t.min(d.length_squared() / (2.0 * along));
        }
        points.push(p + dir * t);
    }

    // Where the cell meets the bounds the border stretch is taken exactly, so
    // cells along an edge reach each other and the corners
    let corners = bounds.corners();
    for i in 0..4 {
        if let Some((a, b)) = edge_span(p, others, corners[i], corners[(i + 1) % 4]) {
            points.push(a);
            points.push(b);
        }
    }

    points.sort_by(|a, b| angle_around(p, *a).total_cmp(&angle_around(p, *b)));
    dedup_ring(points)
}

/// Part of the segment `a`-`b` closer to `p` than to any other seed
fn edge_span(p: Vec2, others: &[(f32, Vec2)], a: Vec2, b: Vec2) -> Option<(Vec2, Vec2)> {
    let edge = b - a;
    let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
    for &(dist, q) in others {
        let reach = (a + edge * lo).distance(p).max((a + edge * hi).distance(p));
        // Bisectors farther than the span's reach cannot cut it
        if dist * 0.5 > reach {
            break;
        }
        let normal = q - p;
        let midpoint = (p + q) * 0.5;
        // Kept part satisfies start + slope * t <= 0
        let start = (a - midpoint).dot(normal);
        let slope = edge.dot(normal);
        if slope.abs() <= f32::EPSILON {
            if start > 0.0 {
                return None;
            }
            continue;
        }
        let t = -start / slope;
        if slope > 0.0 {
            hi = hi.min(t);
        } else {
            lo = lo.max(t);
        }
        if lo >= hi {
            return None;
        }
    }
    Some((a + edge * lo, a + edge * hi))
}

fn exact_cell(p: Vec2, others: &[(f32, Vec2)], bounds: Bounds) -> Vec<Vec2> {
    let mut polygon = bounds.corners().to_vec();
    for &(dist, q) in others {
        let reach = polygon
            .iter()
            .map(|v| v.distance(p))
            .fold(0.0_f32, f32::max);
        // Bisectors farther than the cell's reach cannot cut it
        if dist * 0.5 > reach {
            break;
        }
        if dist <= f32::EPSILON {
            continue;
        }
        polygon = clip_to_bisector(&polygon, p, q);
    }
    dedup_ring(polygon)
}

fn dedup_ring(mut points: Vec<Vec2>) -> Vec<Vec2> {
    points.dedup_by(|a, b| a.distance(*b) < DEDUP_EPSILON);
    while points.len() > 3 {
        let (first, last) = (points[0], points[points.len() - 1]);
        if first.distance(last) < DEDUP_EPSILON {
            points.pop();
        } else {
            break;
        }
    }
    points
}

/// Symmetric distance-threshold adjacency.
///
/// Two seeds are neighbors when closer than `factor` times the median
/// nearest-seed distance. Every seed also keeps its nearest seed, so no
/// sector is isolated when there is more than one.
pub fn neighbor_graph(seeds: &[Vec2], factor: f32) -> Vec<Vec<usize>> {
    let n = seeds.len();
    let mut graph = vec![Vec::new(); n];
    if n < 2 {
        return graph;
    }

    let mut nearest = vec![(0usize, f32::INFINITY); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = seeds[i].distance(seeds[j]);
            if d < nearest[i].1 {
                nearest[i] = (j, d);
            }
            if d < nearest[j].1 {
                nearest[j] = (i, d);
            }
        }
    }

    let mut nn: Vec<f32> = nearest.iter().map(|&(_, d)| d).collect();
    nn.sort_by(|a, b| a.total_cmp(b));
    let threshold = nn[n / 2] * factor;

    for i in 0..n {
        for j in (i + 1)..n {
            if seeds[i].distance(seeds[j]) < threshold {
                graph[i].push(j);
                graph[j].push(i);
            }
        }
    }
    for (i, &(j, _)) in nearest.iter().enumerate() {
        graph[i].push(j);
        graph[j].push(i);
    }
    for list in &mut graph {
        list.sort_unstable();
        list.dedup();
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{point_in_polygon, polygon_area};

    fn world() -> Bounds {
        Bounds::from_size(1000.0, 600.0)
    }

    fn config(count: usize, shape: CellShape) -> TessellationConfig {
        TessellationConfig {
            count,
            seed: Some(7),
            shape,
            ..Default::default()
        }
    }

    /// Grid of sample points offset so they avoid cell edges
    fn samples(bounds: Bounds) -> Vec<Vec2> {
        let mut pts = Vec::new();
        for i in 0..40 {
            for j in 0..25 {
                let x = bounds.min.x + (i as f32 + 0.37) * bounds.width() / 40.0;
                let y = bounds.min.y + (j as f32 + 0.61) * bounds.height() / 25.0;
                pts.push(Vec2::new(x, y));
            }
        }
        pts
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert_eq!(
            generate(world(), &config(0, CellShape::Radial)).unwrap_err(),
            SimError::InvalidSectorCount
        );
        let flat = Bounds::new(Vec2::ZERO, Vec2::new(100.0, 0.0));
        assert_eq!(
            generate(flat, &config(5, CellShape::Radial)).unwrap_err(),
            SimError::InvalidBounds
        );
    }

    #[test]
    fn test_cells_are_valid_polygons() {
        for shape in [CellShape::Radial, CellShape::Exact] {
            let tess = generate(world(), &config(80, shape)).unwrap();
            assert_eq!(tess.cells.len(), 80);
            for cell in &tess.cells {
                assert!(cell.polygon.len() >= 3);
                assert!(polygon_area(&cell.polygon) > 0.0);
            }
        }
    }

    #[test]
    fn test_single_cell_covers_bounds() {
        let tess = generate(world(), &config(1, CellShape::Radial)).unwrap();
        let poly = &tess.cells[0].polygon;
        assert!((polygon_area(poly) - 600_000.0).abs() < 60.0);
        assert!(tess.neighbors[0].is_empty());
    }

    fn cell_boxes(tess: &Tessellation) -> Vec<Bounds> {
        tess.cells
            .iter()
            .map(|c| Bounds::from_points(&c.polygon).unwrap())
            .collect()
    }

    /// Points every 5 units along the four edges of `bounds`
    fn border_samples(bounds: Bounds) -> Vec<Vec2> {
        let mut pts = Vec::new();
        let mut x = bounds.min.x;
        while x <= bounds.max.x {
            pts.push(Vec2::new(x, bounds.min.y));
            pts.push(Vec2::new(x, bounds.max.y));
            x += 5.0;
        }
        let mut y = bounds.min.y;
        while y <= bounds.max.y {
            pts.push(Vec2::new(bounds.min.x, y));
            pts.push(Vec2::new(bounds.max.x, y));
            y += 5.0;
        }
        pts
    }

    /// Dense 5-unit grid over `bounds`, edges included
    fn dense_samples(bounds: Bounds) -> Vec<Vec2> {
        let mut pts = Vec::new();
        let mut x = bounds.min.x;
        while x <= bounds.max.x {
            let mut y = bounds.min.y;
            while y <= bounds.max.y {
                pts.push(Vec2::new(x, y));
                y += 5.0;
            }
            x += 5.0;
        }
        pts
    }

    #[test]
    fn test_bounding_boxes_cover_bounds() {
        let b = world();
        for seed in 0..20 {
            let tess = generate(
                b,
                &TessellationConfig {
                    count: 120,
                    seed: Some(seed),
                    ..Default::default()
                },
            )
            .unwrap();
            let boxes = cell_boxes(&tess);
            let uncovered = dense_samples(b)
                .into_iter()
                .filter(|p| !boxes.iter().any(|bb| bb.contains(*p)))
                .count();
            assert_eq!(uncovered, 0, "seed {seed}");
        }
    }

    #[test]
    fn test_radial_cells_reach_every_border_point() {
        let b = world();
        for seed in 0..20 {
            let tess = generate(
                b,
                &TessellationConfig {
                    count: 120,
                    seed: Some(seed),
                    shape: CellShape::Radial,
                    ..Default::default()
                },
            )
            .unwrap();
            let boxes = cell_boxes(&tess);
            for p in border_samples(b) {
                assert!(boxes.iter().any(|bb| bb.contains(p)), "seed {seed}: {p} uncovered");
            }
        }
    }

    #[test]
    fn test_edge_span_splits_border_between_seeds() {
        let left = Vec2::new(20.0, 50.0);
        let right = Vec2::new(80.0, 50.0);
        let others = [(left.distance(right), right)];
        let (a, b) = edge_span(left, &others, Vec2::ZERO, Vec2::new(100.0, 0.0)).unwrap();
        assert_eq!(a, Vec2::ZERO);
        assert!((b - Vec2::new(50.0, 0.0)).length() < 1e-4);
        // The far edge belongs entirely to the other seed
        assert!(edge_span(left, &others, Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)).is_none());
    }

    #[test]
    fn test_exact_cells_partition_bounds() {
        let b = world();
        let tess = generate(b, &config(60, CellShape::Exact)).unwrap();
        let total: f32 = tess.cells.iter().map(|c| polygon_area(&c.polygon)).sum();
        assert!((total - 600_000.0).abs() / 600_000.0 < 1e-3);
        for p in samples(b) {
            let hits = tess
                .cells
                .iter()
                .filter(|c| point_in_polygon(p, &c.polygon))
                .count();
            assert_eq!(hits, 1, "{p} in {hits} cells");
        }
    }

    #[test]
    fn test_radial_cells_do_not_overlap() {
        let b = world();
        let tess = generate(b, &config(60, CellShape::Radial)).unwrap();
        for p in samples(b) {
            let hits = tess
                .cells
                .iter()
                .filter(|c| point_in_polygon(p, &c.polygon))
                .count();
            assert!(hits <= 1, "{p} in {hits} cells");
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = generate(world(), &config(40, CellShape::Radial)).unwrap();
        let b = generate(world(), &config(40, CellShape::Radial)).unwrap();
        assert_eq!(a.cells, b.cells);
        assert_eq!(a.neighbors, b.neighbors);
        assert_eq!(a.rng_seed, 7);
    }

    #[test]
    fn test_neighbor_graph_is_symmetric_and_connected_locally() {
        let tess = generate(world(), &config(100, CellShape::Radial)).unwrap();
        for (i, list) in tess.neighbors.iter().enumerate() {
            assert!(!list.is_empty(), "cell {i} isolated");
            assert!(!list.contains(&i));
            for &j in list {
                assert!(tess.neighbors[j].contains(&i));
            }
        }
    }

    #[test]
    fn test_relaxation_evens_out_cells() {
        let area_spread = |iterations: u32| {
            let tess = generate(
                world(),
                &TessellationConfig {
                    count: 50,
                    seed: Some(11),
                    relaxation_iterations: iterations,
                    shape: CellShape::Exact,
                    ..Default::default()
                },
            )
            .unwrap();
            let areas: Vec<f32> = tess.cells.iter().map(|c| polygon_area(&c.polygon)).collect();
            let mean = areas.iter().sum::<f32>() / areas.len() as f32;
            areas.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / areas.len() as f32
        };
        assert!(area_spread(6) < area_spread(0));
    }

    #[test]
    fn test_relaxed_seeds_stay_in_bounds() {
        let b = world();
        let tess = generate(
            b,
            &TessellationConfig {
                count: 30,
                seed: Some(3),
                relaxation_iterations: 4,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(tess.cells.iter().all(|c| b.contains(c.seed)));
    }
}
