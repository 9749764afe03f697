//! Player-facing harvest ledger
//!
//! Running totals per resource plus the most recent harvests, newest first.

use serde::{Deserialize, Serialize};

use crate::sim::star::{ResourceKind, StarId};

/// Maximum number of recent harvests to keep
pub const MAX_RECENT_HARVESTS: usize = 20;

/// Accumulated totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestTotals {
    pub stellar_essence: u64,
    pub void_fragments: u64,
}

impl HarvestTotals {
    pub fn get(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::StellarEssence => self.stellar_essence,
            ResourceKind::VoidFragments => self.void_fragments,
        }
    }
}

/// A single credited harvest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvestEntry {
    pub star: StarId,
    pub kind: ResourceKind,
    pub amount: u32,
    /// Simulation time (seconds) of the harvest
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestLedger {
    pub totals: HarvestTotals,
    #[serde(default)]
    pub recent: Vec<HarvestEntry>,
}

impl HarvestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from persisted totals; recent history starts empty
    pub fn from_totals(totals: HarvestTotals) -> Self {
        Self {
            totals,
            recent: Vec::new(),
        }
    }

    pub fn credit(&mut self, star: StarId, kind: ResourceKind, amount: u32, timestamp: f64) {
        if amount == 0 {
            return;
        }
        let slot = match kind {
            ResourceKind::StellarEssence => &mut self.totals.stellar_essence,
            ResourceKind::VoidFragments => &mut self.totals.void_fragments,
        };
        *slot = slot.saturating_add(amount as u64);

        self.recent.insert(
            0,
            HarvestEntry {
                star,
                kind,
                amount,
                timestamp,
            },
        );
        self.recent.truncate(MAX_RECENT_HARVESTS);
    }

    pub fn total(&self, kind: ResourceKind) -> u64 {
        self.totals.get(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty() && self.totals == HarvestTotals::default()
    }

    /// Most recent harvest (if any)
    pub fn last(&self) -> Option<&HarvestEntry> {
        self.recent.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_accumulates() {
        let mut ledger = HarvestLedger::new();
        assert!(ledger.is_empty());
        ledger.credit(StarId(1), ResourceKind::StellarEssence, 5, 1.0);
        ledger.credit(StarId(2), ResourceKind::VoidFragments, 3, 2.0);
        ledger.credit(StarId(1), ResourceKind::StellarEssence, 4, 3.0);
        assert_eq!(ledger.total(ResourceKind::StellarEssence), 9);
        assert_eq!(ledger.total(ResourceKind::VoidFragments), 3);
        assert_eq!(ledger.last().unwrap().timestamp, 3.0);
    }

    #[test]
    fn test_zero_amount_ignored() {
        let mut ledger = HarvestLedger::new();
        ledger.credit(StarId(1), ResourceKind::StellarEssence, 0, 1.0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_recent_is_bounded() {
        let mut ledger = HarvestLedger::new();
        for i in 0..(MAX_RECENT_HARVESTS + 5) {
            ledger.credit(StarId(i as u32), ResourceKind::VoidFragments, 1, i as f64);
        }
        assert_eq!(ledger.recent.len(), MAX_RECENT_HARVESTS);
        assert_eq!(ledger.recent[0].star, StarId((MAX_RECENT_HARVESTS + 4) as u32));
        assert_eq!(ledger.total(ResourceKind::VoidFragments), (MAX_RECENT_HARVESTS + 5) as u64);
    }
}
