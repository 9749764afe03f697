//! Planar geometry for sectors
//!
//! Axis-aligned bounds and the polygon helpers the sector store and the
//! tessellator share. Polygons are plain vertex lists in winding order.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Bounds anchored at the origin with the given size
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(Vec2::ZERO, Vec2::new(width, height))
    }

    /// Smallest box containing every point (None for an empty slice)
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Half the diagonal length
    pub fn half_diagonal(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    /// Positive, finite extent on both axes
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.width() > 0.0 && self.height() > 0.0
    }

    /// Strict overlap test; boxes that only touch do not intersect
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Inclusive point test
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Grow by `margin` on every side
    pub fn expand(&self, margin: f32) -> Self {
        Self::new(self.min - Vec2::splat(margin), self.max + Vec2::splat(margin))
    }

    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Clamp a point into the box
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Corners in counter-clockwise order starting at `min`
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// Distance from `origin` along unit `dir` to the box boundary.
    /// `origin` must lie inside the box.
    pub fn ray_exit(&self, origin: Vec2, dir: Vec2) -> f32 {
        let mut t = f32::INFINITY;
        if dir.x > f32::EPSILON {
            t = t.min((self.max.x - origin.x) / dir.x);
        } else if dir.x < -f32::EPSILON {
            t = t.min((self.min.x - origin.x) / dir.x);
        }
        if dir.y > f32::EPSILON {
            t = t.min((self.max.y - origin.y) / dir.y);
        } else if dir.y < -f32::EPSILON {
            t = t.min((self.min.y - origin.y) / dir.y);
        }
        t.max(0.0)
    }
}

/// Even-odd point-in-polygon test.
///
/// Casts a horizontal ray from `p` and toggles on every edge it crosses.
pub fn point_in_polygon(p: Vec2, polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Signed shoelace area (positive for counter-clockwise winding)
pub fn signed_area(polygon: &[Vec2]) -> f32 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        twice += a.perp_dot(b);
    }
    twice * 0.5
}

#[inline]
pub fn polygon_area(polygon: &[Vec2]) -> f32 {
    signed_area(polygon).abs()
}

/// Mean of the vertices (not the area centroid)
pub fn vertex_centroid(polygon: &[Vec2]) -> Vec2 {
    if polygon.is_empty() {
        return Vec2::ZERO;
    }
    polygon.iter().copied().sum::<Vec2>() / polygon.len() as f32
}

/// Reject polygons a sector cannot be built from
pub fn validate_polygon(polygon: &[Vec2]) -> Result<(), SimError> {
    let invalid = SimError::InvalidPolygon {
        vertices: polygon.len(),
    };
    if polygon.len() < 3 || polygon.iter().any(|v| !v.is_finite()) {
        return Err(invalid);
    }
    if polygon_area(polygon) <= f32::EPSILON {
        return Err(invalid);
    }
    Ok(())
}

/// Clip a convex polygon to the half-plane of points closer to `keep` than
/// to `other` (Sutherland-Hodgman against the perpendicular bisector).
pub fn clip_to_bisector(polygon: &[Vec2], keep: Vec2, other: Vec2) -> Vec<Vec2> {
    let normal = other - keep;
    let midpoint = (keep + other) * 0.5;
    // Positive side is closer to `other`
    let side = |p: Vec2| (p - midpoint).dot(normal);

    let n = polygon.len();
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..n {
        let cur = polygon[i];
        let next = polygon[(i + 1) % n];
        let sc = side(cur);
        let sn = side(next);
        if sc <= 0.0 {
            out.push(cur);
        }
        if (sc <= 0.0) != (sn <= 0.0) {
            let t = sc / (sc - sn);
            out.push(cur + (next - cur) * t);
        }
    }
    out
}
