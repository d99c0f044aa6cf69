//! Published results of the latest refresh cycle.
//!
//! The serving layer only ever reads a whole [`CacheSnapshot`]. The scheduler replaces it with
//! a single pointer swap, so there are no partial writes to observe.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};

use crate::types::{sort_for_display, NetworkSelection, NetworkType, UpgradeRecord};

/// Records of one completed cycle, split by network type and sorted for display.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub mainnets: Vec<UpgradeRecord>,
    pub testnets: Vec<UpgradeRecord>,
    pub refreshed_at: DateTime<Utc>,
    pub cycle_duration: Duration,
}

impl CacheSnapshot {
    #[must_use]
    pub fn new(records: Vec<UpgradeRecord>, refreshed_at: DateTime<Utc>, cycle_duration: Duration) -> Self {
        let (mut mainnets, mut testnets): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.network_type == NetworkType::Mainnet);
        sort_for_display(&mut mainnets);
        sort_for_display(&mut testnets);

        Self { mainnets, testnets, refreshed_at, cycle_duration }
    }

    #[must_use]
    pub fn records(&self, network_type: NetworkType) -> &[UpgradeRecord] {
        match network_type {
            NetworkType::Mainnet => &self.mainnets,
            NetworkType::Testnet => &self.testnets,
        }
    }

    /// Records for exactly the requested networks, upgrades first across both types.
    #[must_use]
    pub fn select(&self, selection: &NetworkSelection) -> Vec<UpgradeRecord> {
        let mut selected: Vec<UpgradeRecord> = self
            .mainnets
            .iter()
            .chain(self.testnets.iter())
            .filter(|r| selection.contains(&r.network, r.network_type))
            .cloned()
            .collect();
        sort_for_display(&mut selected);
        selected
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mainnets.len() + self.testnets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holder of the latest snapshot. Empty until the first cycle publishes.
#[derive(Default)]
pub struct UpgradeCache {
    snapshot: ArcSwapOption<CacheSnapshot>,
}

impl UpgradeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the previous snapshot.
    pub fn publish(&self, snapshot: CacheSnapshot) {
        self.snapshot.store(Some(Arc::new(snapshot)));
    }

    #[must_use]
    pub fn load(&self) -> Option<Arc<CacheSnapshot>> {
        self.snapshot.load_full()
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.snapshot.load().is_some()
    }
}
