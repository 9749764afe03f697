//! Error types for invalid input, failed harvests, settings and saves
//!
//! Every failure here is local and recoverable; the drivers never see them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sim::sector::SectorId;
use crate::sim::star::{ResourceKind, StarId};

/// Invalid-input failures from generation, stores and manual injection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("bounds must have positive, finite width and height")]
    InvalidBounds,
    #[error("sector count must be at least 1")]
    InvalidSectorCount,
    #[error("polygon has {vertices} vertices; at least 3 with non-zero area required")]
    InvalidPolygon { vertices: usize },
    #[error("unknown sector {0}")]
    UnknownSector(SectorId),
    #[error("unknown star system {0}")]
    UnknownStar(StarId),
    #[error("entropy amount {0} outside [0, max entropy]")]
    EntropyOutOfRange(f32),
}

/// Reasons a harvest was rejected. No partial debit happens in any case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarvestError {
    #[error("unknown star system {0}")]
    UnknownStar(StarId),
    #[error("star system {0} has no resources")]
    NoResources(StarId),
    #[error("star system {star} yields {available:?}, not {requested:?}")]
    WrongResource {
        star: StarId,
        requested: ResourceKind,
        available: ResourceKind,
    },
    #[error("harvest amount must be positive")]
    ZeroAmount,
    #[error("requested {requested} but only {available} available")]
    Insufficient { requested: u32, available: u32 },
    #[error("star system {star} changed state since it was targeted")]
    StaleGeneration { star: StarId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write settings to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Save/load failures. A failed load never touches live state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to parse save data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to access save file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unsupported save version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("invalid save data: {0}")]
    Invalid(String),
    #[error("save data does not rebuild: {0}")]
    Rebuild(#[from] SimError),
}
