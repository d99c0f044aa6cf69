//! Per-network upgrade detection.
//!
//! # Protocol
//!
//! ```text
//! probe RPC + REST ──► height discovery (first RPC with a positive height)
//!                            │
//!                            ▼
//!        for each healthy REST endpoint (random order, blacklist skipped):
//!            active proposals ─┐
//!            current plan ─────┴─► Attempt
//!                                   ├─ Found      → stop, record upgrade
//!                                   ├─ NoUpgrade  → stop, record "nothing scheduled"
//!                                   └─ Skip       → next endpoint
//! ```
//!
//! `NoUpgrade` is only returned when an endpoint answers with no upgrade proposal and no
//! current plan. Iteration stops there even though a lagging endpoint could have missed an
//! upgrade another one would report.

pub mod eta;

pub use eta::{BlockTimeSample, EtaEstimator};

use async_trait::async_trait;
use std::{collections::HashSet, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    types::{
        DetectedUpgrade, EndpointDescriptor, NetworkDescriptor, Protocol, UpgradeRecord,
        UpgradeSource, VersionCandidate,
    },
    upstream::{
        cosmos::{PlanPayload, Proposal},
        CosmosClient, EndpointProber, HttpClient, ProbeConfig, UpstreamError,
    },
    version::{extract_version, SemverTagCache, VersionResolver},
};

/// Endpoints that answer liveness probes but serve wrong upgrade data.
pub const DEFAULT_BLACKLIST: [&str; 3] = [
    "https://stride.api.bccnodes.com:443",
    "https://api.omniflix.nodestake.top",
    "https://cosmos-lcd.quickapi.com:443",
];

/// Terminal per-network conditions. Each renders with a remediation hint, since the text ends
/// up in the record's `error` field.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(
        "no healthy {protocol} endpoints ({declared} declared); check the apis.{protocol} entries \
         for this network in the chain registry"
    )]
    NoHealthyEndpoints { protocol: Protocol, declared: usize },

    #[error("no RPC servers returned latest block height")]
    NoBlockHeight,
}

/// Produces the record for one network.
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`DetectError`] when the network cannot be inspected at all; the caller
    /// turns it into an error record.
    async fn inspect(&self, network: &NetworkDescriptor) -> Result<UpgradeRecord, DetectError>;
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub probe: ProbeConfig,
    pub query_timeout: Duration,
    pub eta_window_blocks: u64,
    pub blacklist: HashSet<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            query_timeout: Duration::from_secs(3),
            eta_window_blocks: 10_000,
            blacklist: DEFAULT_BLACKLIST.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug)]
enum SkipReason {
    Blacklisted,
    QueryFailed(UpstreamError),
    NothingQualified,
}

/// Outcome of querying one REST endpoint.
#[derive(Debug)]
enum Attempt {
    Found(DetectedUpgrade),
    NoUpgrade,
    Skip(SkipReason),
}

struct UpgradeScan {
    rest_server: String,
    upgrade: Option<DetectedUpgrade>,
}

/// Drives the detection protocol for one network at a time.
pub struct UpgradeDetector {
    prober: EndpointProber,
    cosmos: CosmosClient,
    resolver: VersionResolver,
    estimator: EtaEstimator,
    blacklist: HashSet<String>,
}

impl UpgradeDetector {
    #[must_use]
    pub fn new(
        http_client: Arc<HttpClient>,
        tag_cache: Arc<SemverTagCache>,
        config: DetectorConfig,
    ) -> Self {
        let cosmos = CosmosClient::new(Arc::clone(&http_client), config.query_timeout);
        let blacklist =
            config.blacklist.iter().map(|addr| addr.trim_end_matches('/').to_string()).collect();

        Self {
            prober: EndpointProber::new(http_client, config.probe),
            estimator: EtaEstimator::new(cosmos.clone(), config.eta_window_blocks),
            cosmos,
            resolver: VersionResolver::new(tag_cache),
            blacklist,
        }
    }

    /// First healthy RPC endpoint reporting a positive height.
    async fn discover_height(&self, healthy_rpc: &[EndpointDescriptor]) -> Option<(String, u64)> {
        for endpoint in healthy_rpc {
            match self.cosmos.latest_block_height(endpoint.base_url()).await {
                Ok(height) if height > 0 => return Some((endpoint.address.clone(), height)),
                Ok(_) => debug!(rpc = %endpoint.address, "endpoint reported zero height"),
                Err(e) => debug!(rpc = %endpoint.address, error = %e, "block height query failed"),
            }
        }
        None
    }

    async fn discover_upgrade(
        &self,
        network: &NetworkDescriptor,
        healthy_rest: &[EndpointDescriptor],
        latest_height: u64,
    ) -> UpgradeScan {
        let mut answered = String::new();

        for (index, endpoint) in healthy_rest.iter().enumerate() {
            match self.attempt(network, endpoint, latest_height).await {
                Attempt::Found(upgrade) => {
                    return UpgradeScan { rest_server: endpoint.address.clone(), upgrade: Some(upgrade) }
                }
                Attempt::NoUpgrade => {
                    debug!(network = %network.name, rest = %endpoint.address, "no upgrade scheduled");
                    return UpgradeScan { rest_server: endpoint.address.clone(), upgrade: None };
                }
                Attempt::Skip(reason) => {
                    let remaining = healthy_rest.len() - index - 1;
                    match &reason {
                        SkipReason::Blacklisted => {
                            debug!(network = %network.name, rest = %endpoint.address, "skipping blacklisted endpoint");
                        }
                        SkipReason::QueryFailed(e) => {
                            warn!(network = %network.name, rest = %endpoint.address, error = %e, remaining, "upgrade query failed");
                        }
                        SkipReason::NothingQualified => {
                            debug!(network = %network.name, rest = %endpoint.address, remaining, "no qualifying upgrade on endpoint");
                            answered.clone_from(&endpoint.address);
                        }
                    }
                }
            }
        }

        UpgradeScan { rest_server: answered, upgrade: None }
    }

    async fn attempt(
        &self,
        network: &NetworkDescriptor,
        endpoint: &EndpointDescriptor,
        latest_height: u64,
    ) -> Attempt {
        let base = endpoint.base_url();
        if self.blacklist.contains(base) {
            return Attempt::Skip(SkipReason::Blacklisted);
        }

        let proposals = match self.cosmos.active_proposals(base).await {
            Ok(proposals) => proposals.unwrap_or_default(),
            Err(e) => return Attempt::Skip(SkipReason::QueryFailed(e)),
        };
        let plan = match self.cosmos.current_plan(base).await {
            Ok(plan) => plan,
            Err(e) => return Attempt::Skip(SkipReason::QueryFailed(e)),
        };

        let has_upgrade_proposal = proposals.iter().any(|p| p.upgrade_content().is_some());
        if !has_upgrade_proposal && plan.is_none() {
            return Attempt::NoUpgrade;
        }

        if let Some(upgrade) = self.from_proposals(network, &proposals, latest_height).await {
            return Attempt::Found(upgrade);
        }
        if let Some(upgrade) = self.from_current_plan(network, plan.as_ref(), latest_height).await {
            return Attempt::Found(upgrade);
        }

        Attempt::Skip(SkipReason::NothingQualified)
    }

    /// First upgrade proposal whose resolved version is non-empty and whose plan height is
    /// ahead of the chain.
    async fn from_proposals(
        &self,
        network: &NetworkDescriptor,
        proposals: &[Proposal],
        latest_height: u64,
    ) -> Option<DetectedUpgrade> {
        for content in proposals.iter().filter_map(Proposal::upgrade_content) {
            let (name, height) =
                content.plan.as_ref().map_or((String::new(), 0), |plan| (plan.name.clone(), plan.height));

            let candidates: Vec<VersionCandidate> = [name.as_str(), content.description.as_str()]
                .into_iter()
                .filter_map(extract_version)
                .map(|raw| VersionCandidate { raw: raw.to_string(), height })
                .collect();

            if let Some(upgrade) = self
                .accept(network, name, height, &candidates, UpgradeSource::ActiveProposal, None, latest_height)
                .await
            {
                return Some(upgrade);
            }
        }
        None
    }

    async fn from_current_plan(
        &self,
        network: &NetworkDescriptor,
        plan: Option<&PlanPayload>,
        latest_height: u64,
    ) -> Option<DetectedUpgrade> {
        let plan = plan?;
        let candidates: Vec<VersionCandidate> = extract_version(&plan.name)
            .map(|raw| VersionCandidate { raw: raw.to_string(), height: plan.height })
            .into_iter()
            .collect();

        self.accept(
            network,
            plan.name.clone(),
            plan.height,
            &candidates,
            UpgradeSource::CurrentPlan,
            Some(plan),
            latest_height,
        )
        .await
    }

    /// Resolves the version and applies the acceptance rule.
    #[allow(clippy::too_many_arguments)]
    async fn accept(
        &self,
        network: &NetworkDescriptor,
        name: String,
        height: u64,
        candidates: &[VersionCandidate],
        source: UpgradeSource,
        plan: Option<&PlanPayload>,
        latest_height: u64,
    ) -> Option<DetectedUpgrade> {
        if height <= latest_height {
            debug!(network = %network.name, upgrade = %name, height, latest_height, "ignoring plan at or below current height");
            return None;
        }

        let raw: Vec<String> = candidates.iter().map(|c| c.raw.clone()).collect();
        let version = self.resolver.resolve(network.git_repo.as_deref(), &raw).await?;
        if version.is_empty() {
            return None;
        }

        Some(DetectedUpgrade { name, version, height, source, plan: plan.map(PlanPayload::to_upgrade_plan) })
    }
}

#[async_trait]
impl NetworkInspector for UpgradeDetector {
    async fn inspect(&self, network: &NetworkDescriptor) -> Result<UpgradeRecord, DetectError> {
        debug!(
            network = %network.name,
            network_type = %network.network_type,
            rpc = network.rpc.len(),
            rest = network.rest.len(),
            "inspecting network"
        );

        let (healthy_rpc, healthy_rest) = tokio::join!(
            self.prober.healthy_endpoints(&network.rpc, Protocol::Rpc),
            self.prober.healthy_endpoints(&network.rest, Protocol::Rest)
        );

        if healthy_rpc.is_empty() {
            return Err(DetectError::NoHealthyEndpoints { protocol: Protocol::Rpc, declared: network.rpc.len() });
        }
        let (rpc_server, latest_height) =
            self.discover_height(&healthy_rpc).await.ok_or(DetectError::NoBlockHeight)?;

        if healthy_rest.is_empty() {
            return Err(DetectError::NoHealthyEndpoints { protocol: Protocol::Rest, declared: network.rest.len() });
        }

        let scan = self.discover_upgrade(network, &healthy_rest, latest_height).await;

        let estimated_upgrade_time = match &scan.upgrade {
            Some(upgrade) => {
                let rpc = rpc_server.trim_end_matches('/');
                self.estimator.estimate(rpc, latest_height, upgrade.height).await
            }
            None => None,
        };

        if let Some(upgrade) = &scan.upgrade {
            info!(
                network = %network.name,
                version = %upgrade.version,
                height = upgrade.height,
                source = ?upgrade.source,
                eta = ?estimated_upgrade_time,
                "upgrade detected"
            );
        }

        Ok(UpgradeRecord::detected(
            network,
            rpc_server,
            scan.rest_server,
            latest_height,
            scan.upgrade,
            estimated_upgrade_time,
        ))
    }
}
