//! Per-frame view pipeline
//!
//! Reads whatever the simulation last committed; never writes to it.

pub mod culling;
pub mod governor;
pub mod viewport;

pub use culling::{
    CullingConfig, Culler, EntityRenderInfo, LodLevel, PerformanceMetrics, RenderData,
    SectorRenderInfo,
};
pub use governor::{
    Adjustment, AdvisoryKind, Effect, GovernorAdvisory, GovernorConfig, PerformanceGovernor,
    RenderBudget, Subsystem,
};
pub use viewport::Viewport;
