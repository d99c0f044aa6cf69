use std::{collections::HashSet, time::Duration};
use watch_core::{
    types::{EndpointDescriptor, Protocol},
    upstream::{EndpointProber, ProbeConfig},
};

use crate::mock_infrastructure::{test_http_client, ChainMockBuilder};

fn prober(max_healthy: usize) -> EndpointProber {
    EndpointProber::new(
        test_http_client(),
        ProbeConfig { timeout: Duration::from_secs(2), concurrency: 4, max_healthy },
    )
}

#[tokio::test]
async fn test_healthy_subset_is_capped() {
    let mut nodes = Vec::new();
    for _ in 0..8 {
        let mut node = ChainMockBuilder::new().await;
        node.health(200).await;
        nodes.push(node);
    }
    let mut down = ChainMockBuilder::new().await;
    down.health(503).await;

    let mut endpoints: Vec<EndpointDescriptor> = nodes.iter().map(|n| EndpointDescriptor::new(n.url())).collect();
    endpoints.push(EndpointDescriptor::new(down.url()));

    let healthy = prober(5).healthy_endpoints(&endpoints, Protocol::Rest).await;

    assert_eq!(healthy.len(), 5);
    let declared: HashSet<&str> = endpoints.iter().map(|e| e.address.as_str()).collect();
    assert!(healthy.iter().all(|e| declared.contains(e.address.as_str())));
    assert!(healthy.iter().all(|e| e.address != down.url()));

    let unique: HashSet<&str> = healthy.iter().map(|e| e.address.as_str()).collect();
    assert_eq!(unique.len(), healthy.len());
}

#[tokio::test]
async fn test_fallback_depends_on_protocol() {
    let mut rest_only = ChainMockBuilder::new().await;
    rest_only.health(501).await;
    rest_only.node_info(200).await;

    let mut rpc_only = ChainMockBuilder::new().await;
    rpc_only.health(501).await;
    rpc_only.status(100).await;

    let prober = prober(5);
    let rest = EndpointDescriptor::new(rest_only.url());
    let rpc = EndpointDescriptor::new(rpc_only.url());

    assert!(prober.is_healthy(&rest, Protocol::Rest).await);
    assert!(!prober.is_healthy(&rest, Protocol::Rpc).await);
    assert!(prober.is_healthy(&rpc, Protocol::Rpc).await);
    assert!(!prober.is_healthy(&rpc, Protocol::Rest).await);
}

#[tokio::test]
async fn test_no_healthy_endpoints() {
    let mut down = ChainMockBuilder::new().await;
    down.health(500).await;

    let endpoints = vec![
        EndpointDescriptor::new(down.url()),
        EndpointDescriptor::new("http://127.0.0.1:1"),
        EndpointDescriptor::new(""),
    ];

    assert!(prober(5).healthy_endpoints(&endpoints, Protocol::Rpc).await.is_empty());
}
