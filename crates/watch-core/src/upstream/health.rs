use futures::{stream, StreamExt};
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use std::{sync::Arc, time::Duration};
use tracing::{debug, trace};

use super::HttpClient;
use crate::{
    metrics,
    types::{EndpointDescriptor, Protocol},
};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-request liveness timeout
    pub timeout: Duration,
    /// Width of the probe worker pool
    pub concurrency: usize,
    /// Upper bound on healthy endpoints handed to the detector
    pub max_healthy: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(1), concurrency: 10, max_healthy: 5 }
    }
}

/// Outcome of probing one endpoint. Consumed once, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub endpoint: EndpointDescriptor,
    pub healthy: bool,
}

/// Tests reachability of declared endpoints with bounded concurrency.
///
/// Never fails: every transport error, timeout or non-2xx answer simply marks the endpoint
/// unhealthy.
pub struct EndpointProber {
    http_client: Arc<HttpClient>,
    config: ProbeConfig,
}

impl EndpointProber {
    #[must_use]
    pub fn new(http_client: Arc<HttpClient>, config: ProbeConfig) -> Self {
        Self { http_client, config }
    }

    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Liveness check for a single endpoint, with the 501 fallback for nodes that do not
    /// serve `/health`.
    pub async fn is_healthy(&self, endpoint: &EndpointDescriptor, protocol: Protocol) -> bool {
        let base = endpoint.base_url();
        if base.is_empty() {
            return false;
        }

        match self.http_client.get_status(&format!("{base}/health"), self.config.timeout).await {
            Ok(status) if status.is_success() => true,
            Ok(status) if status == StatusCode::NOT_IMPLEMENTED => {
                let fallback = format!("{base}{}", protocol.liveness_fallback_path());
                match self.http_client.get_status(&fallback, self.config.timeout).await {
                    Ok(status) => status.is_success(),
                    Err(e) => {
                        trace!(endpoint = base, error = %e, "fallback liveness probe failed");
                        false
                    }
                }
            }
            Ok(status) => {
                trace!(endpoint = base, status = status.as_u16(), "liveness probe rejected");
                false
            }
            Err(e) => {
                trace!(endpoint = base, error = %e, "liveness probe failed");
                false
            }
        }
    }

    /// Probes every endpoint, preserving input order in the results.
    pub async fn probe_all(
        &self,
        endpoints: &[EndpointDescriptor],
        protocol: Protocol,
    ) -> Vec<ProbeResult> {
        stream::iter(endpoints.iter().cloned())
            .map(|endpoint| async move {
                let healthy = self.is_healthy(&endpoint, protocol).await;
                ProbeResult { endpoint, healthy }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Returns up to `max_healthy` reachable endpoints in random order.
    ///
    /// The result is always a subset of `endpoints`. An empty result is terminal for the
    /// caller's network in this cycle.
    pub async fn healthy_endpoints(
        &self,
        endpoints: &[EndpointDescriptor],
        protocol: Protocol,
    ) -> Vec<EndpointDescriptor> {
        let results = self.probe_all(endpoints, protocol).await;

        let mut healthy: Vec<EndpointDescriptor> =
            results.into_iter().filter(|r| r.healthy).map(|r| r.endpoint).collect();
        healthy.shuffle(&mut rand::rng());
        healthy.truncate(self.config.max_healthy);

        debug!(
            protocol = %protocol,
            declared = endpoints.len(),
            healthy = healthy.len(),
            "endpoint probing complete"
        );
        metrics::record_healthy_endpoints(protocol, healthy.len());

        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober() -> EndpointProber {
        let http = Arc::new(HttpClient::new().unwrap());
        EndpointProber::new(
            http,
            ProbeConfig { timeout: Duration::from_millis(500), ..ProbeConfig::default() },
        )
    }

    #[tokio::test]
    async fn test_health_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/health").with_status(200).create_async().await;

        let endpoint = EndpointDescriptor::new(server.url());
        assert!(prober().is_healthy(&endpoint, Protocol::Rpc).await);
    }

    #[tokio::test]
    async fn test_health_501_uses_protocol_fallback() {
        let mut server = mockito::Server::new_async().await;
        let _health = server.mock("GET", "/health").with_status(501).create_async().await;
        let _node_info = server
            .mock("GET", "/cosmos/base/tendermint/v1beta1/node_info")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let endpoint = EndpointDescriptor::new(format!("{}/", server.url()));
        assert!(prober().is_healthy(&endpoint, Protocol::Rest).await);
    }

    #[tokio::test]
    async fn test_health_error_status_is_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/health").with_status(503).create_async().await;

        let endpoint = EndpointDescriptor::new(server.url());
        assert!(!prober().is_healthy(&endpoint, Protocol::Rest).await);
    }

    #[tokio::test]
    async fn test_unreachable_and_empty_endpoints_are_unhealthy() {
        let p = prober();
        assert!(!p.is_healthy(&EndpointDescriptor::new("http://127.0.0.1:1"), Protocol::Rpc).await);
        assert!(!p.is_healthy(&EndpointDescriptor::new(""), Protocol::Rpc).await);
    }

    #[tokio::test]
    async fn test_probe_all_preserves_order() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/health").with_status(200).create_async().await;

        let endpoints =
            vec![EndpointDescriptor::new("http://127.0.0.1:1"), EndpointDescriptor::new(server.url())];
        let results = prober().probe_all(&endpoints, Protocol::Rpc).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].endpoint, endpoints[0]);
        assert!(!results[0].healthy);
        assert!(results[1].healthy);
    }
}
