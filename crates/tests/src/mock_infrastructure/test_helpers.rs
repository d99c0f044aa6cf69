//! Fixtures for governance payloads and engine components wired to mock servers.

use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use watch_core::{
    detector::{DetectorConfig, UpgradeDetector},
    types::{EndpointDescriptor, NetworkDescriptor, NetworkType},
    upstream::{HttpClient, ProbeConfig},
    version::{GithubTagSource, SemverTagCache},
};

/// A software-upgrade proposal as served by the gov v1beta1 API.
#[must_use]
pub fn upgrade_proposal(id: u64, plan_name: &str, height: u64, description: &str) -> Value {
    json!({
        "proposal_id": id.to_string(),
        "content": {
            "@type": "/cosmos.upgrade.v1beta1.SoftwareUpgradeProposal",
            "title": plan_name,
            "description": description,
            "plan": {
                "name": plan_name,
                "time": "0001-01-01T00:00:00Z",
                "height": height.to_string(),
                "info": "",
                "upgraded_client_state": null
            }
        },
        "status": "PROPOSAL_STATUS_VOTING_PERIOD"
    })
}

/// A non-upgrade proposal, which detection must ignore.
#[must_use]
pub fn text_proposal(id: u64, title: &str) -> Value {
    json!({
        "proposal_id": id.to_string(),
        "content": {
            "@type": "/cosmos.gov.v1beta1.TextProposal",
            "title": title,
            "description": "Signal v99.0.0 support"
        },
        "status": "PROPOSAL_STATUS_VOTING_PERIOD"
    })
}

/// A current-plan object with the given `info` string.
#[must_use]
pub fn plan(name: &str, height: u64, info: &str) -> Value {
    json!({
        "name": name,
        "time": "0001-01-01T00:00:00Z",
        "height": height.to_string(),
        "info": info,
        "upgraded_client_state": null
    })
}

#[must_use]
pub fn network(name: &str, rpc: &[String], rest: &[String]) -> NetworkDescriptor {
    let mut network = NetworkDescriptor::new(name, NetworkType::Mainnet);
    network.rpc = rpc.iter().map(EndpointDescriptor::new).collect();
    network.rest = rest.iter().map(EndpointDescriptor::new).collect();
    network
}

#[must_use]
pub fn test_http_client() -> Arc<HttpClient> {
    Arc::new(HttpClient::new().unwrap_or_else(|e| panic!("http client: {e}")))
}

#[must_use]
pub fn test_detector_config() -> DetectorConfig {
    DetectorConfig {
        probe: ProbeConfig { timeout: Duration::from_secs(2), concurrency: 10, max_healthy: 5 },
        query_timeout: Duration::from_secs(2),
        ..DetectorConfig::default()
    }
}

/// Tag cache whose GitHub API calls go to `api_base_url`.
#[must_use]
pub fn test_tag_cache(http: &Arc<HttpClient>, api_base_url: &str) -> Arc<SemverTagCache> {
    let source = GithubTagSource::new(Arc::clone(http), api_base_url, None, 1, Duration::from_secs(2));
    Arc::new(SemverTagCache::new(Arc::new(source), Duration::from_secs(600)))
}

/// Detector with test timeouts and a tag cache pointed at `tag_api`.
#[must_use]
pub fn test_detector(tag_api: &str, config: DetectorConfig) -> UpgradeDetector {
    let http = test_http_client();
    let tags = test_tag_cache(&http, tag_api);
    UpgradeDetector::new(http, tags, config)
}
