//! Cellular automata rules for entropy spread
//!
//! Rules are plain data: a tagged variant carrying its tuning constants.
//! A rule set keeps them sorted by descending priority and applies the
//! first one whose condition holds.

use serde::{Deserialize, Serialize};

/// Which rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    Cascade,
    NeighborInfluence,
    Stabilization,
    NaturalDecay,
}

/// A condition + effect pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntropyRule {
    /// Hot sector next to cool neighbors flares up further
    Cascade {
        /// Sector entropy must exceed this
        trigger: f32,
        /// Neighbors below this count as low-entropy
        low_neighbor: f32,
        /// Increase per low-entropy neighbor
        strength: f32,
    },
    /// Move toward the neighbor average when far from it
    NeighborInfluence { threshold: f32, rate: f32 },
    /// Gentle drift toward the average inside settled regions
    Stabilization { max_variance: f32, rate: f32 },
    /// Self-proportional decay
    NaturalDecay { floor: f32, rate: f32 },
}

impl EntropyRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            EntropyRule::Cascade { .. } => RuleKind::Cascade,
            EntropyRule::NeighborInfluence { .. } => RuleKind::NeighborInfluence,
            EntropyRule::Stabilization { .. } => RuleKind::Stabilization,
            EntropyRule::NaturalDecay { .. } => RuleKind::NaturalDecay,
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            EntropyRule::Cascade { .. } => 10,
            EntropyRule::NeighborInfluence { .. } => 5,
            EntropyRule::Stabilization { .. } => 3,
            EntropyRule::NaturalDecay { .. } => 1,
        }
    }

    /// Delta this rule would apply, or None when its condition fails
    pub fn apply(&self, hood: &Neighborhood) -> Option<f32> {
        match *self {
            EntropyRule::Cascade {
                trigger,
                low_neighbor,
                strength,
            } => {
                if hood.entropy <= trigger {
                    return None;
                }
                let low = hood.count_below(low_neighbor);
                (low > 0).then(|| low as f32 * strength)
            }
            EntropyRule::NeighborInfluence { threshold, rate } => {
                let average = hood.average()?;
                let diff = average - hood.entropy;
                (diff.abs() > threshold).then(|| diff * rate)
            }
            EntropyRule::Stabilization { max_variance, rate } => {
                let variance = hood.variance()?;
                let average = hood.average()?;
                (variance < max_variance).then(|| (average - hood.entropy) * rate)
            }
            EntropyRule::NaturalDecay { floor, rate } => {
                (hood.entropy > floor).then(|| -hood.entropy * rate)
            }
        }
    }
}

/// A sector's entropy plus its neighbors' values for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood<'a> {
    pub entropy: f32,
    pub neighbors: &'a [f32],
}

impl Neighborhood<'_> {
    pub fn average(&self) -> Option<f32> {
        if self.neighbors.is_empty() {
            return None;
        }
        Some(self.neighbors.iter().sum::<f32>() / self.neighbors.len() as f32)
    }

    /// Population variance of neighbor entropy
    pub fn variance(&self) -> Option<f32> {
        let mean = self.average()?;
        let sum: f32 = self.neighbors.iter().map(|e| (e - mean).powi(2)).sum();
        Some(sum / self.neighbors.len() as f32)
    }

    pub fn count_below(&self, threshold: f32) -> usize {
        self.neighbors.iter().filter(|&&e| e < threshold).count()
    }
}

/// Ordered rule list, highest priority first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<EntropyRule>,
    #[serde(default)]
    disabled: Vec<RuleKind>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<EntropyRule>) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        Self {
            rules,
            disabled: Vec::new(),
        }
    }

    /// The stock rule set with the given tuning
    pub fn standard(spread_rate: f32, spread_threshold: f32, decay_rate: f32) -> Self {
        Self::new(vec![
            EntropyRule::Cascade {
                trigger: 0.8,
                low_neighbor: 0.5,
                strength: 0.05,
            },
            EntropyRule::NeighborInfluence {
                threshold: spread_threshold,
                rate: spread_rate,
            },
            EntropyRule::Stabilization {
                max_variance: 0.05,
                rate: spread_rate * 0.2,
            },
            EntropyRule::NaturalDecay {
                floor: 0.1,
                rate: decay_rate,
            },
        ])
    }

    pub fn rules(&self) -> &[EntropyRule] {
        &self.rules
    }

    pub fn set_enabled(&mut self, kind: RuleKind, enabled: bool) {
        self.disabled.retain(|&k| k != kind);
        if !enabled {
            self.disabled.push(kind);
        }
    }

    pub fn is_enabled(&self, kind: RuleKind) -> bool {
        !self.disabled.contains(&kind)
    }

    /// First enabled rule whose condition holds, with its delta
    pub fn evaluate(&self, hood: &Neighborhood) -> Option<(RuleKind, f32)> {
        self.rules
            .iter()
            .filter(|r| self.is_enabled(r.kind()))
            .find_map(|r| r.apply(hood).map(|delta| (r.kind(), delta)))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard(0.1, 0.1, 0.02)
    }
}
