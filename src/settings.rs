//! Settings and tuning
//!
//! One flat, serde-friendly struct. Missing fields fall back to their
//! defaults, so partial JSON files are fine. Each subsystem gets its own
//! config built from here.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ENTROPY, WORLD_HEIGHT, WORLD_WIDTH};
use crate::error::ConfigError;
use crate::geometry::Bounds;
use crate::input::{GestureConfig, TouchConfig};
use crate::sim::entropy::EntropyConfig;
use crate::sim::star::LifecycleConfig;
use crate::sim::tessellate::{CellShape, TessellationConfig};
use crate::view::{CullingConfig, GovernorConfig, RenderBudget};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Sector render cap for this preset
    pub fn max_sectors(&self) -> usize {
        match self {
            QualityPreset::Low => 150,
            QualityPreset::Medium => 400,
            QualityPreset::High => 1000,
        }
    }

    /// Star system render cap for this preset
    pub fn max_entities(&self) -> usize {
        match self {
            QualityPreset::Low => 60,
            QualityPreset::Medium => 150,
            QualityPreset::High => 400,
        }
    }

    /// Particles per sector at full entropy
    pub fn max_particles(&self) -> u32 {
        match self {
            QualityPreset::Low => 4,
            QualityPreset::Medium => 12,
            QualityPreset::High => 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Render quality preset
    pub quality: QualityPreset,

    // === Entropy ===
    pub base_spread_rate: f32,
    pub spread_threshold: f32,
    pub max_entropy: f32,
    pub natural_decay_rate: f32,
    /// Std-dev of the per-tick Gaussian perturbation
    pub random_variance: f32,
    /// Seconds between entropy ticks
    pub simulation_tick_interval: f64,
    pub simulation_seed: u64,
    pub event_history_limit: usize,

    // === Star lifecycle ===
    pub lifecycle_tick_interval: f64,
    pub star_count: usize,
    /// Seconds without a state change before natural progression applies
    pub natural_progression_window: f64,
    /// Per-second chance of natural healthy -> dying
    pub natural_progression_rate: f64,

    // === World generation ===
    pub world_width: f32,
    pub world_height: f32,
    pub sector_count: usize,
    /// `None` picks a fresh seed each generation
    pub tessellation_seed: Option<u64>,
    pub relaxation_iterations: u32,
    pub rays_per_cell: usize,
    pub neighbor_factor: f32,
    /// Exact half-plane cells; `false` switches to radial sampling
    pub exact_cells: bool,

    // === Rendering ===
    pub max_rendered_sectors: usize,
    pub max_rendered_entities: usize,
    /// Full / Standard / Simplified normalized-distance limits
    pub lod_distances: [f32; 3],
    /// Simplified-below / Full-from zoom levels
    pub lod_zoom: [f32; 2],
    pub viewport_padding: f32,

    // === Performance governor ===
    pub governor_degrade_fps: f32,
    pub governor_recover_fps: f32,
    pub governor_critical_fps: f32,
}

impl Default for Settings {
    fn default() -> Self {
        let quality = QualityPreset::Medium;
        Self {
            quality,

            base_spread_rate: 0.1,
            spread_threshold: 0.1,
            max_entropy: MAX_ENTROPY,
            natural_decay_rate: 0.02,
            random_variance: 0.005,
            simulation_tick_interval: 0.5,
            simulation_seed: 0x5eed,
            event_history_limit: 1000,

            lifecycle_tick_interval: 1.0,
            star_count: 150,
            natural_progression_window: 300.0,
            natural_progression_rate: 0.001,

            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            sector_count: 400,
            tessellation_seed: None,
            relaxation_iterations: 2,
            rays_per_cell: 48,
            neighbor_factor: 1.8,
            exact_cells: true,

            max_rendered_sectors: quality.max_sectors(),
            max_rendered_entities: quality.max_entities(),
            lod_distances: [0.5, 1.0, 1.5],
            lod_zoom: [0.25, 1.0],
            viewport_padding: 100.0,

            governor_degrade_fps: 45.0,
            governor_recover_fps: 55.0,
            governor_critical_fps: 25.0,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset (applies preset defaults)
    pub fn from_preset(preset: QualityPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a quality preset (updates quality-dependent settings)
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
        self.max_rendered_sectors = preset.max_sectors();
        self.max_rendered_entities = preset.max_entities();
    }

    /// Read settings from a JSON file
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings, falling back to defaults on any failure
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(err) => {
                log::warn!("{err}; using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.into(),
            })
        }

        let rates = [
            ("base_spread_rate", self.base_spread_rate),
            ("spread_threshold", self.spread_threshold),
            ("natural_decay_rate", self.natural_decay_rate),
            ("random_variance", self.random_variance),
        ];
        for (field, value) in rates {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return invalid(field, format!("{value} is outside [0, 1]"));
            }
        }
        if !(self.max_entropy > 0.0 && self.max_entropy <= MAX_ENTROPY) {
            return invalid("max_entropy", format!("must be in (0, {MAX_ENTROPY}]"));
        }
        if !(self.simulation_tick_interval > 0.0) {
            return invalid("simulation_tick_interval", "must be positive");
        }
        if !(self.lifecycle_tick_interval > 0.0) {
            return invalid("lifecycle_tick_interval", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.natural_progression_rate) {
            return invalid("natural_progression_rate", "must be a probability");
        }
        if self.sector_count == 0 {
            return invalid("sector_count", "must be at least 1");
        }
        if !self.world_bounds().is_valid() {
            return invalid("world_width", "world size must be positive");
        }
        if self.rays_per_cell < 8 {
            return invalid("rays_per_cell", "need at least 8 rays");
        }
        if !(self.neighbor_factor > 1.0) {
            return invalid("neighbor_factor", "must exceed 1.0");
        }
        let [full, standard, simplified] = self.lod_distances;
        if !(full > 0.0 && full <= standard && standard <= simplified) {
            return invalid("lod_distances", "must be positive and ascending");
        }
        if !(self.lod_zoom[0] > 0.0 && self.lod_zoom[0] <= self.lod_zoom[1]) {
            return invalid("lod_zoom", "must be positive and ascending");
        }
        if !(self.governor_critical_fps < self.governor_degrade_fps
            && self.governor_degrade_fps < self.governor_recover_fps)
        {
            return invalid(
                "governor_recover_fps",
                "need critical < degrade < recover thresholds",
            );
        }
        Ok(())
    }

    pub fn world_bounds(&self) -> Bounds {
        Bounds::new(Vec2::ZERO, Vec2::new(self.world_width, self.world_height))
    }

    pub fn tessellation_config(&self) -> TessellationConfig {
        TessellationConfig {
            count: self.sector_count,
            seed: self.tessellation_seed,
            relaxation_iterations: self.relaxation_iterations,
            rays: self.rays_per_cell,
            shape: if self.exact_cells {
                CellShape::Exact
            } else {
                CellShape::Radial
            },
            neighbor_factor: self.neighbor_factor,
        }
    }

    pub fn entropy_config(&self) -> EntropyConfig {
        EntropyConfig {
            base_spread_rate: self.base_spread_rate,
            spread_threshold: self.spread_threshold,
            max_entropy: self.max_entropy,
            natural_decay_rate: self.natural_decay_rate,
            random_variance: self.random_variance,
            tick_interval: self.simulation_tick_interval,
            history_limit: self.event_history_limit,
            seed: self.simulation_seed,
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            tick_interval: self.lifecycle_tick_interval,
            natural_window: self.natural_progression_window,
            natural_rate: self.natural_progression_rate,
            seed: self.simulation_seed.rotate_left(17),
            ..Default::default()
        }
    }

    pub fn culling_config(&self) -> CullingConfig {
        CullingConfig {
            padding_px: self.viewport_padding,
            lod_distances: self.lod_distances,
            lod_zoom: self.lod_zoom,
            max_particles_per_sector: self.quality.max_particles(),
        }
    }

    /// Starting budget for the governor
    pub fn render_budget(&self) -> RenderBudget {
        RenderBudget::new(self.max_rendered_sectors, self.max_rendered_entities, 0.0)
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            degrade_fps: self.governor_degrade_fps,
            recover_fps: self.governor_recover_fps,
            critical_fps: self.governor_critical_fps,
            min_sectors: (self.max_rendered_sectors / 4).max(1),
            min_entities: (self.max_rendered_entities / 4).max(1),
            ..Default::default()
        }
    }

    pub fn touch_config(&self) -> TouchConfig {
        TouchConfig::default()
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig::default()
    }
}
