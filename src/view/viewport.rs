//! Pan/zoom camera over the world plane
//!
//! Screen = world * scale + translation. Screen y grows downward like world y,
//! so no flip is involved.

use glam::Vec2;
use serde::Serialize;

use crate::geometry::Bounds;

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 8.0;

/// Camera state. Fields are private so the scale stays positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    /// Zoom factor (> 0)
    scale: f32,
    /// Screen-space offset of the world origin
    translation: Vec2,
    /// Screen size in pixels
    screen_size: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

impl Viewport {
    pub fn new(screen_size: Vec2) -> Self {
        Self {
            scale: 1.0,
            translation: Vec2::ZERO,
            screen_size,
        }
    }

    /// Explicit transform. `None` unless `scale` is positive and finite and
    /// `translation` is finite.
    pub fn with_transform(scale: f32, translation: Vec2, screen_size: Vec2) -> Option<Self> {
        if !scale.is_finite() || scale <= 0.0 || !translation.is_finite() {
            return None;
        }
        Some(Self {
            scale,
            translation,
            screen_size: screen_size.max(Vec2::ONE),
        })
    }

    /// Centre the view on `world` at the given zoom, clamped to the zoom range
    pub fn looking_at(screen_size: Vec2, world: Vec2, scale: f32) -> Self {
        let scale = if scale.is_nan() {
            1.0
        } else {
            scale.clamp(MIN_ZOOM, MAX_ZOOM)
        };
        Self {
            scale,
            translation: screen_size * 0.5 - world * scale,
            screen_size,
        }
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    #[inline]
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        (screen - self.translation) / self.scale
    }

    #[inline]
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world * self.scale + self.translation
    }

    /// World-space rectangle currently on screen
    pub fn visible_bounds(&self) -> Bounds {
        Bounds::new(
            self.screen_to_world(Vec2::ZERO),
            self.screen_to_world(self.screen_size),
        )
    }

    /// Visible bounds grown by `padding_px` screen pixels on every side
    pub fn expanded_bounds(&self, padding_px: f32) -> Bounds {
        self.visible_bounds().expand(padding_px / self.scale)
    }

    /// World point at the centre of the screen
    pub fn center(&self) -> Vec2 {
        self.screen_to_world(self.screen_size * 0.5)
    }

    /// Distance from the view centre divided by the visible half-diagonal.
    /// 0 at the centre, 1 at a screen corner.
    pub fn normalized_distance(&self, world: Vec2) -> f32 {
        let half = self.visible_bounds().half_diagonal();
        if half <= 0.0 {
            return 0.0;
        }
        world.distance(self.center()) / half
    }

    /// Move by a screen-space delta
    pub fn pan(&mut self, delta_px: Vec2) {
        if delta_px.is_finite() {
            self.translation += delta_px;
        }
    }

    /// Multiply zoom by `factor`, keeping the world point under `anchor_px` fixed
    pub fn zoom_at(&mut self, anchor_px: Vec2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor_world = self.screen_to_world(anchor_px);
        self.scale = (self.scale * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.translation = anchor_px - anchor_world * self.scale;
    }

    pub fn resize(&mut self, screen_size: Vec2) {
        self.screen_size = screen_size.max(Vec2::ONE);
    }
}
