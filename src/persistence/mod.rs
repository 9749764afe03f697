//! Save/load persistence
//!
//! Features:
//! - Versioned JSON envelope
//! - Backup rotation (tmp → save, old save → backup)
//! - Full validation before anything is rebuilt
//! - Explicit recovery from the backup slot

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::MAX_ENTROPY;
use crate::error::PersistenceError;
use crate::geometry::{Bounds, validate_polygon};
use crate::ledger::HarvestTotals;
use crate::sim::sector::{Sector, SectorId};
use crate::sim::star::{StarId, StarSystem};

/// Current save format version
pub const SAVE_VERSION: u32 = 1;

/// Everything needed to rebuild a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Simulation time (seconds) when saved
    pub saved_at: f64,
    pub bounds: Bounds,
    pub sectors: BTreeMap<SectorId, Sector>,
    pub star_systems: BTreeMap<StarId, StarSystem>,
    #[serde(default)]
    pub harvested: HarvestTotals,
}

impl SaveData {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let data: SaveData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Structural checks: version, dense sector ids, well-formed polygons,
    /// entropy in range, no dangling references, every star held by exactly
    /// the sector it names, and star state agreeing with its resources.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.version != SAVE_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: self.version,
                expected: SAVE_VERSION,
            });
        }
        let invalid =
            |msg: String| -> Result<(), PersistenceError> { Err(PersistenceError::Invalid(msg)) };

        if self.sectors.is_empty() {
            return invalid("no sectors".into());
        }
        let mut holders: BTreeMap<StarId, SectorId> = BTreeMap::new();
        for (i, (key, sector)) in self.sectors.iter().enumerate() {
            if *key != sector.id || sector.id.index() != i {
                return invalid(format!("sector key {key} does not match a dense id"));
            }
            if validate_polygon(&sector.polygon).is_err() {
                return invalid(format!("{key} has a malformed polygon"));
            }
            if !sector.entropy.is_finite() || !(0.0..=MAX_ENTROPY).contains(&sector.entropy) {
                return invalid(format!("{key} entropy {} out of range", sector.entropy));
            }
            if let Some(n) = sector
                .neighbors
                .iter()
                .find(|n| **n == sector.id || !self.sectors.contains_key(*n))
            {
                return invalid(format!("{key} lists bad neighbor {n}"));
            }
            for star in &sector.star_systems {
                if !self.star_systems.contains_key(star) {
                    return invalid(format!("{key} holds unknown {star}"));
                }
                if let Some(other) = holders.insert(*star, sector.id) {
                    return invalid(format!("{star} is held by both {other} and {key}"));
                }
            }
        }

        for (key, star) in &self.star_systems {
            if *key != star.id {
                return invalid(format!("star key {key} does not match record {}", star.id));
            }
            if !star.position.is_finite() || !star.radius.is_finite() || star.radius < 0.0 {
                return invalid(format!("{key} has a bad position or radius"));
            }
            if !star.is_consistent() {
                return invalid(format!(
                    "{key} is {} but its resources disagree",
                    star.state().as_str()
                ));
            }
            match (star.sector, holders.get(key)) {
                (Some(claimed), holder) if holder != Some(&claimed) => {
                    return invalid(format!("{key} claims {claimed} which does not hold it"));
                }
                (None, Some(holder)) => {
                    return invalid(format!("{key} has no sector but {holder} holds it"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Backup path next to `path`
pub fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("bak")
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write to a temp file, move the previous save to the backup slot, then
/// rename the temp file into place
pub fn save_to_path(path: &Path, data: &SaveData) -> Result<(), PersistenceError> {
    let json = data.to_json()?;
    let tmp = temp_path(path);
    fs::write(&tmp, json).map_err(io_err(&tmp))?;
    if path.exists() {
        let backup = backup_path(path);
        fs::rename(path, &backup).map_err(io_err(&backup))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))?;
    log::info!(
        "Saved {} sectors, {} star systems to {}",
        data.sectors.len(),
        data.star_systems.len(),
        path.display()
    );
    Ok(())
}

fn read_validated(path: &Path) -> Result<SaveData, PersistenceError> {
    let json = fs::read_to_string(path).map_err(io_err(path))?;
    SaveData::from_json(&json)
}

/// Load and validate the save at `path`
pub fn load_from_path(path: &Path) -> Result<SaveData, PersistenceError> {
    read_validated(path)
}

/// Load and validate the backup kept next to `path` by [`save_to_path`]
pub fn load_backup(path: &Path) -> Result<SaveData, PersistenceError> {
    let backup = backup_path(path);
    let data = read_validated(&backup)?;
    log::info!("Read backup {}", backup.display());
    Ok(data)
}
