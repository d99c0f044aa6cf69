//! Background refresh loop.
//!
//! One cycle loads the registry, fans detection out with one task per network, converts
//! every per-network failure (error or panic) into an error record, and publishes the full
//! set as a new [`CacheSnapshot`]. A cycle that fails before detection starts leaves the
//! previous snapshot in place.

use chrono::Utc;
use futures::future::join_all;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheSnapshot, UpgradeCache},
    detector::NetworkInspector,
    metrics,
    registry::{RegistryError, RegistrySource},
    types::{NetworkDescriptor, NetworkSelection, NetworkType, UpgradeRecord},
};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    #[error("registry returned no networks in scope")]
    NoNetworks,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
    /// Delay before retrying after a failed cycle
    pub retry_backoff: Duration,
    /// Empty selection means every network in the registry.
    pub watch_list: NetworkSelection,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(10),
            watch_list: NetworkSelection::default(),
        }
    }
}

/// Counts of one published cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub networks: usize,
    pub upgrades_found: usize,
    pub errors: usize,
    pub duration: Duration,
}

impl CycleSummary {
    fn from_snapshot(snapshot: &CacheSnapshot) -> Self {
        let all = || snapshot.mainnets.iter().chain(snapshot.testnets.iter());
        Self {
            networks: snapshot.len(),
            upgrades_found: all().filter(|r| r.upgrade_found).count(),
            errors: all().filter(|r| r.is_error()).count(),
            duration: snapshot.cycle_duration,
        }
    }
}

pub struct RefreshScheduler {
    registry: Arc<dyn RegistrySource>,
    inspector: Arc<dyn NetworkInspector>,
    cache: Arc<UpgradeCache>,
    config: RefreshConfig,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(
        registry: Arc<dyn RegistrySource>,
        inspector: Arc<dyn NetworkInspector>,
        cache: Arc<UpgradeCache>,
        config: RefreshConfig,
    ) -> Self {
        Self { registry, inspector, cache, config }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<UpgradeCache> {
        &self.cache
    }

    /// Spawns the refresh loop. The first cycle starts immediately.
    ///
    /// The loop waits `interval` after a published cycle and `retry_backoff` after a failed
    /// one, and exits as soon as `shutdown_rx` fires.
    #[must_use]
    pub fn start_with_shutdown(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let delay = tokio::select! {
                    result = scheduler.run_cycle() => match result {
                        Ok(summary) => {
                            info!(
                                networks = summary.networks,
                                upgrades_found = summary.upgrades_found,
                                errors = summary.errors,
                                duration_ms = summary.duration.as_millis(),
                                "refresh cycle published"
                            );
                            scheduler.config.interval
                        }
                        Err(e) => {
                            error!(error = %e, backoff_secs = scheduler.config.retry_backoff.as_secs(), "refresh cycle failed, keeping previous snapshot");
                            scheduler.config.retry_backoff
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        info!("refresh scheduler shutting down");
                        break;
                    }
                };

                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.recv() => {
                        info!("refresh scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Runs one full cycle and publishes its snapshot.
    ///
    /// # Errors
    ///
    /// [`RefreshError`] when the registry cannot be loaded or yields nothing in scope; the
    /// cache is not touched in that case.
    pub async fn run_cycle(&self) -> Result<CycleSummary, RefreshError> {
        let started = Instant::now();

        let networks = match self.load_in_scope().await {
            Ok(networks) => networks,
            Err(e) => {
                metrics::record_cycle_failure();
                return Err(e);
            }
        };

        debug!(networks = networks.len(), "refresh cycle started");
        let records = self.inspect_all(networks).await;

        let snapshot = CacheSnapshot::new(records, Utc::now(), started.elapsed());
        let summary = CycleSummary::from_snapshot(&snapshot);
        metrics::record_cycle(&snapshot);
        self.cache.publish(snapshot);

        Ok(summary)
    }

    async fn load_in_scope(&self) -> Result<Vec<NetworkDescriptor>, RefreshError> {
        let networks: Vec<NetworkDescriptor> = self
            .registry
            .load_networks()
            .await?
            .into_iter()
            .filter(|n| self.config.watch_list.admits(&n.name, n.network_type))
            .collect();

        if networks.is_empty() {
            return Err(RefreshError::NoNetworks);
        }
        Ok(networks)
    }

    /// Inspects every network concurrently, one task each.
    ///
    /// Always returns exactly one record per input network.
    pub async fn inspect_all(&self, networks: Vec<NetworkDescriptor>) -> Vec<UpgradeRecord> {
        let (keys, handles): (Vec<_>, Vec<_>) = networks
            .into_iter()
            .map(|network| {
                let key = (network.name.clone(), network.network_type);
                let inspector = Arc::clone(&self.inspector);
                let handle = tokio::spawn(async move { inspector.inspect(&network).await });
                (key, handle)
            })
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(keys)
            .map(|(outcome, (name, network_type))| match outcome {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => {
                    warn!(network = %name, network_type = %network_type, error = %e, "network inspection failed");
                    UpgradeRecord::failed(name, network_type, e)
                }
                Err(join_error) => {
                    error!(network = %name, network_type = %network_type, error = %join_error, "network inspection task aborted");
                    UpgradeRecord::failed(name, network_type, format!("inspection aborted: {join_error}"))
                }
            })
            .collect()
    }

    /// Best-effort live detection for exactly the requested networks.
    ///
    /// Used by the serving layer while the cache has never been populated. Networks missing
    /// from the registry come back as error records.
    pub async fn inspect_selection(&self, selection: &NetworkSelection) -> Vec<UpgradeRecord> {
        let mut found = Vec::new();
        let mut records = Vec::new();

        for (name, network_type) in selection.iter() {
            match self.registry.load_network(name, network_type).await {
                Ok(Some(network)) => found.push(network),
                Ok(None) => records.push(UpgradeRecord::failed(name, network_type, not_in_registry(network_type))),
                Err(e) => records.push(UpgradeRecord::failed(name, network_type, e)),
            }
        }

        let mut inspected = self.inspect_all(found).await;
        inspected.append(&mut records);
        crate::types::sort_for_display(&mut inspected);
        inspected
    }
}

fn not_in_registry(network_type: NetworkType) -> String {
    format!("{network_type} not found in chain registry")
}
