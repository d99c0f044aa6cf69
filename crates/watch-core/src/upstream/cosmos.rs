//! Typed queries against Cosmos SDK RPC and REST endpoints.
//!
//! Payloads from community nodes are loosely shaped, so every field is optional on the wire
//! and given an explicit default here rather than being probed dynamically downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use super::{HttpClient, UpstreamError};
use crate::types::UpgradePlan;

pub const UPGRADE_PROPOSAL_TYPE: &str = "/cosmos.upgrade.v1beta1.SoftwareUpgradeProposal";

const STATUS_PATH: &str = "/status";
const ACTIVE_PROPOSALS_PATH: &str = "/cosmos/gov/v1beta1/proposals?proposal_status=2";
const CURRENT_PLAN_PATH: &str = "/cosmos/upgrade/v1beta1/current_plan";

/// Governance proposal as returned by the v1beta1 gov module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Proposal {
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub content: Option<ProposalContent>,
}

impl Proposal {
    /// Content of a software-upgrade proposal; `None` for every other proposal type.
    #[must_use]
    pub fn upgrade_content(&self) -> Option<&ProposalContent> {
        self.content.as_ref().filter(|c| c.type_url == UPGRADE_PROPOSAL_TYPE)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalContent {
    #[serde(rename = "@type", default)]
    pub type_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub plan: Option<PlanPayload>,
}

/// Raw upgrade plan, shared by proposals and the `current_plan` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanPayload {
    #[serde(default)]
    pub name: String,
    /// Nodes encode heights as strings; anything unparseable reads as 0 and is then rejected
    /// by the height check.
    #[serde(default, deserialize_with = "lenient_height")]
    pub height: u64,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub upgraded_client_state: Option<Value>,
}

impl PlanPayload {
    /// Structured view of the plan, with `binaries` lifted out of `info` when it holds the
    /// conventional JSON document.
    #[must_use]
    pub fn to_upgrade_plan(&self) -> UpgradePlan {
        let binaries = serde_json::from_str::<Value>(&self.info)
            .ok()
            .and_then(|info| info.get("binaries").cloned())
            .and_then(|binaries| serde_json::from_value::<BTreeMap<String, String>>(binaries).ok());

        UpgradePlan {
            name: self.name.clone(),
            height: self.height,
            info: (!self.info.is_empty()).then(|| self.info.clone()),
            binaries,
            upgraded_client_state: self.upgraded_client_state.clone().filter(|v| !v.is_null()),
        }
    }
}

#[derive(Deserialize)]
struct ProposalsPage {
    #[serde(default)]
    proposals: Vec<Proposal>,
}

#[derive(Deserialize)]
struct CurrentPlanResponse {
    #[serde(default)]
    plan: Option<PlanPayload>,
}

fn lenient_height<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(height_from_value(&value).unwrap_or(0))
}

fn height_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Parses a Tendermint header timestamp.
///
/// Fractional seconds are truncated to microseconds before parsing; headers routinely carry
/// nanosecond precision.
#[must_use]
pub fn parse_block_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let normalized = match raw.find('.') {
        Some(dot) => {
            let fraction = &raw[dot + 1..];
            let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
            let keep = digits.min(6);
            if keep == 0 {
                format!("{}{}", &raw[..dot], &fraction[digits..])
            } else {
                format!("{}{}", &raw[..=dot + keep], &fraction[digits..])
            }
        }
        None => raw.to_string(),
    };

    DateTime::parse_from_rfc3339(&normalized).ok().map(|t| t.with_timezone(&Utc))
}

/// Thin typed layer over [`HttpClient`] for the queries the detector and estimator issue.
#[derive(Clone)]
pub struct CosmosClient {
    http_client: Arc<HttpClient>,
    timeout: Duration,
}

impl CosmosClient {
    #[must_use]
    pub fn new(http_client: Arc<HttpClient>, timeout: Duration) -> Self {
        Self { http_client, timeout }
    }

    /// Latest block height from `GET {rpc}/status`.
    ///
    /// # Errors
    ///
    /// Transport errors, or [`UpstreamError::InvalidResponse`] when no height is present.
    pub async fn latest_block_height(&self, rpc: &str) -> Result<u64, UpstreamError> {
        let body = self.http_client.get_json(&format!("{rpc}{STATUS_PATH}"), self.timeout).await?;

        body.pointer("/result/sync_info/latest_block_height")
            .or_else(|| body.pointer("/sync_info/latest_block_height"))
            .and_then(height_from_value)
            .ok_or_else(|| UpstreamError::InvalidResponse("status without latest_block_height".into()))
    }

    /// Header timestamp of the block at `height`.
    ///
    /// # Errors
    ///
    /// Transport errors, or [`UpstreamError::InvalidResponse`] when the header time is
    /// missing or malformed.
    pub async fn block_time(&self, rpc: &str, height: u64) -> Result<DateTime<Utc>, UpstreamError> {
        let url = format!("{rpc}/block?height={height}");
        let body = self.http_client.get_json(&url, self.timeout).await?;

        body.pointer("/result/block/header/time")
            .or_else(|| body.pointer("/block/header/time"))
            .and_then(Value::as_str)
            .and_then(parse_block_time)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("block {height} without header time")))
    }

    /// Proposals currently in their voting period.
    ///
    /// Returns `Ok(None)` when the node answers 501, meaning the gov query is not served.
    ///
    /// # Errors
    ///
    /// Any other transport or payload failure.
    pub async fn active_proposals(&self, rest: &str) -> Result<Option<Vec<Proposal>>, UpstreamError> {
        let url = format!("{rest}{ACTIVE_PROPOSALS_PATH}");
        let body = match self.http_client.get_json(&url, self.timeout).await {
            Ok(body) => body,
            Err(e) if e.is_not_implemented() => return Ok(None),
            Err(e) => return Err(e),
        };

        let page: ProposalsPage = serde_json::from_value(body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("proposals: {e}")))?;
        Ok(Some(page.proposals))
    }

    /// The on-chain scheduled plan, `None` when nothing is scheduled.
    ///
    /// # Errors
    ///
    /// Transport or payload failure.
    pub async fn current_plan(&self, rest: &str) -> Result<Option<PlanPayload>, UpstreamError> {
        let url = format!("{rest}{CURRENT_PLAN_PATH}");
        let body = self.http_client.get_json(&url, self.timeout).await?;

        let response: CurrentPlanResponse = serde_json::from_value(body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("current_plan: {e}")))?;
        Ok(response.plan)
    }
}
