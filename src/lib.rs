//! Entropy Field - galaxy map simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tessellation, entropy automata, star lifecycle)
//! - `view`: Viewport culling, level of detail and the performance governor
//! - `input`: Gesture recognition and touch harvesting
//! - `persistence`: Versioned save/load with all-or-nothing restore
//! - `settings`: Flat configuration surface with documented defaults

pub mod error;
pub mod geometry;
pub mod input;
pub mod ledger;
pub mod persistence;
pub mod settings;
pub mod sim;
pub mod view;

pub use error::{ConfigError, HarvestError, PersistenceError, SimError};
pub use geometry::Bounds;
pub use ledger::HarvestLedger;
pub use settings::{QualityPreset, Settings};
pub use sim::World;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Upper bound of sector entropy
    pub const MAX_ENTROPY: f32 = 1.0;
    /// Entropy changes smaller than this are not logged
    pub const MATERIAL_CHANGE: f32 = 0.01;

    /// Sector entropy above which a healthy star starts dying
    pub const DYING_THRESHOLD: f32 = 0.7;
    /// Sector entropy above which a dying star dies
    pub const DEAD_THRESHOLD: f32 = 0.9;

    /// Default world extent (world units)
    pub const WORLD_WIDTH: f32 = 4000.0;
    pub const WORLD_HEIGHT: f32 = 4000.0;

    /// Weight of entropy in the render priority score
    pub const ENTROPY_PRIORITY_WEIGHT: f32 = 1000.0;

    /// Maximum catch-up ticks per poll to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Angle of `point` around `origin`, in [-π, π]
#[inline]
pub fn angle_around(origin: Vec2, point: Vec2) -> f32 {
    let d = point - origin;
    d.y.atan2(d.x)
}
