//! Core data types shared by the detection pipeline and the serving layer.
//!
//! # Type Categories
//!
//! ## Registry Types
//! - [`NetworkDescriptor`], [`EndpointDescriptor`]: what the chain registry declares
//! - [`NetworkSelection`]: an explicit list of mainnets/testnets (watch-list, `/fetch` body)
//!
//! ## Detection Types
//! - [`DetectedUpgrade`], [`UpgradePlan`], [`UpgradeSource`]: an accepted upgrade
//! - [`UpgradeRecord`]: the per-network result published to the cache
//!
//! # Record Invariants
//!
//! `upgrade_found` is true exactly when a non-empty version was resolved, and
//! `upgrade_block_height` is present exactly when `upgrade_found` is true. Both hold because
//! records are only built through [`UpgradeRecord::detected`] and [`UpgradeRecord::failed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Deployment class of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

impl NetworkType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint protocol as declared under `apis` in a chain registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Rest,
    Rpc,
}

impl Protocol {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Rpc => "rpc",
        }
    }

    /// Path of a cheap, always-available call used as a liveness proxy when `/health`
    /// answers 501.
    #[must_use]
    pub fn liveness_fallback_path(&self) -> &'static str {
        match self {
            Self::Rest => "/cosmos/base/tendermint/v1beta1/node_info",
            Self::Rpc => "/status",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared endpoint, kept as the registry describes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    #[serde(default)]
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), provider: None }
    }

    /// Address without trailing slashes, ready for path concatenation.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.address.trim().trim_end_matches('/')
    }
}

/// Everything the engine needs to know about one network for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub name: String,
    pub network_type: NetworkType,
    pub rest: Vec<EndpointDescriptor>,
    pub rpc: Vec<EndpointDescriptor>,
    /// Source repository URL (`codebase.git_repo`), used to look up release tags.
    pub git_repo: Option<String>,
}

impl NetworkDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, network_type: NetworkType) -> Self {
        Self {
            name: name.into(),
            network_type,
            rest: Vec::new(),
            rpc: Vec::new(),
            git_repo: None,
        }
    }

    #[must_use]
    pub fn endpoints(&self, protocol: Protocol) -> &[EndpointDescriptor] {
        match protocol {
            Protocol::Rest => &self.rest,
            Protocol::Rpc => &self.rpc,
        }
    }
}

/// Explicit set of networks, split by type.
///
/// Deserializes from the `/fetch` request body (`{"MAINNETS": [...], "TESTNETS": [...]}`) and
/// doubles as the optional refresh watch-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSelection {
    #[serde(rename = "MAINNETS", alias = "mainnets", default)]
    pub mainnets: Vec<String>,

    #[serde(rename = "TESTNETS", alias = "testnets", default)]
    pub testnets: Vec<String>,
}

impl NetworkSelection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mainnets.is_empty() && self.testnets.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str, network_type: NetworkType) -> bool {
        let names = match network_type {
            NetworkType::Mainnet => &self.mainnets,
            NetworkType::Testnet => &self.testnets,
        };
        names.iter().any(|n| n == name)
    }

    /// Watch-list semantics: an empty selection admits every network.
    #[must_use]
    pub fn admits(&self, name: &str, network_type: NetworkType) -> bool {
        self.is_empty() || self.contains(name, network_type)
    }

    /// Iterates every requested `(name, type)` pair, mainnets first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NetworkType)> {
        self.mainnets
            .iter()
            .map(|n| (n.as_str(), NetworkType::Mainnet))
            .chain(self.testnets.iter().map(|n| (n.as_str(), NetworkType::Testnet)))
    }
}

/// Where an accepted upgrade was discovered.
///
/// Serializes to the wire names consumed by clients; [`UpgradeSource::None`] is the empty
/// string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeSource {
    #[serde(rename = "active_upgrade_proposals")]
    ActiveProposal,
    #[serde(rename = "current_upgrade_plan")]
    CurrentPlan,
    #[default]
    #[serde(rename = "")]
    None,
}

impl UpgradeSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeSource::ActiveProposal => "active_upgrade_proposals",
            UpgradeSource::CurrentPlan => "current_upgrade_plan",
            UpgradeSource::None => "",
        }
    }
}

/// Structured view of an on-chain upgrade plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradePlan {
    pub name: String,
    pub height: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    /// Download URLs per platform, when `info` carries the conventional `binaries` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binaries: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_client_state: Option<serde_json::Value>,
}

/// A raw version-like string matched in plan or proposal text, with the activation height of
/// the plan it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    pub raw: String,
    pub height: u64,
}

/// An upgrade that passed acceptance: resolved version is non-empty and its height lies
/// strictly above the current chain height.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedUpgrade {
    pub name: String,
    pub version: String,
    pub height: u64,
    pub source: UpgradeSource,
    pub plan: Option<UpgradePlan>,
}

/// Final per-network result of one refresh cycle.
///
/// Field order matches the JSON array served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    pub network: String,

    #[serde(rename = "type")]
    pub network_type: NetworkType,

    pub rpc_server: String,
    pub rest_server: String,
    pub latest_block_height: Option<u64>,
    pub upgrade_found: bool,
    pub upgrade_name: String,
    pub source: UpgradeSource,
    pub upgrade_block_height: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_plan: Option<UpgradePlan>,

    pub estimated_upgrade_time: Option<DateTime<Utc>>,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpgradeRecord {
    /// Builds the record for a network whose detection ran to completion.
    ///
    /// An upgrade whose version is empty is treated as "no upgrade" so the record invariants
    /// cannot be broken by a caller.
    #[must_use]
    pub fn detected(
        network: &NetworkDescriptor,
        rpc_server: impl Into<String>,
        rest_server: impl Into<String>,
        latest_block_height: u64,
        upgrade: Option<DetectedUpgrade>,
        estimated_upgrade_time: Option<DateTime<Utc>>,
    ) -> Self {
        let mut record = Self {
            network: network.name.clone(),
            network_type: network.network_type,
            rpc_server: rpc_server.into(),
            rest_server: rest_server.into(),
            latest_block_height: Some(latest_block_height),
            upgrade_found: false,
            upgrade_name: String::new(),
            source: UpgradeSource::None,
            upgrade_block_height: None,
            upgrade_plan: None,
            estimated_upgrade_time: None,
            version: String::new(),
            error: None,
        };

        if let Some(upgrade) = upgrade.filter(|u| !u.version.is_empty()) {
            record.upgrade_found = true;
            record.upgrade_name = upgrade.name;
            record.source = upgrade.source;
            record.upgrade_block_height = Some(upgrade.height);
            record.upgrade_plan = upgrade.plan;
            record.estimated_upgrade_time = estimated_upgrade_time;
            record.version = upgrade.version;
        }

        record
    }

    /// Builds an error record for a network that could not be inspected.
    #[must_use]
    pub fn failed(
        network: impl Into<String>,
        network_type: NetworkType,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            network: network.into(),
            network_type,
            rpc_server: String::new(),
            rest_server: String::new(),
            latest_block_height: None,
            upgrade_found: false,
            upgrade_name: String::new(),
            source: UpgradeSource::None,
            upgrade_block_height: None,
            upgrade_plan: None,
            estimated_upgrade_time: None,
            version: String::new(),
            error: Some(error.to_string()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Default presentation order: records with an upgrade first, otherwise stable.
pub fn sort_for_display(records: &mut [UpgradeRecord]) {
    records.sort_by_key(|r| !r.upgrade_found);
}
