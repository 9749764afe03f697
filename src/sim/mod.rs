//! Deterministic simulation module
//!
//! All map logic lives here. This module must stay deterministic:
//! - Explicit timestamps only, no wall clock
//! - Seeded RNG only
//! - Stable iteration order (by sector and star ID)
//! - No rendering or platform dependencies

pub mod entropy;
pub mod rules;
pub mod sector;
pub mod star;
pub mod tessellate;
pub mod tick;
pub mod world;

pub use entropy::{
    EntropyConfig, EntropySimulator, EntropySpreadEvent, EntropyTrajectory, SpreadCause,
    SpreadClass, TickSummary,
};
pub use rules::{EntropyRule, Neighborhood, RuleKind, RuleSet};
pub use sector::{EntropyStats, Sector, SectorId, SectorStore};
pub use star::{
    LifecycleConfig, LifecycleController, ResourceKind, StarId, StarResources, StarState,
    StarSystem, StarSystemStateChangeEvent, TransitionCause,
};
pub use tessellate::{CellShape, Tessellation, TessellationConfig, generate};
pub use tick::{TickDriver, Tickable};
pub use world::{World, WorldUpdate};
