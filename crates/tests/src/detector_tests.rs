//! Detection protocol against mocked Cosmos nodes.

use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use watch_core::{
    detector::{DetectError, NetworkInspector},
    types::UpgradeSource,
};

use crate::mock_infrastructure::{
    network, plan, test_detector, test_detector_config, text_proposal, upgrade_proposal, ChainMockBuilder,
};

#[tokio::test]
async fn test_active_proposal_end_to_end() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals(vec![upgrade_proposal(42, "v4.0.0 Upgrade", 1000, "Upgrade to v4")]).await;
    node.current_plan(None).await;

    let url = node.url();
    let detector = test_detector(&url, test_detector_config());
    let record = detector.inspect(&network("osmosis", &[url.clone()], &[url.clone()])).await.unwrap();

    assert!(record.upgrade_found);
    assert_eq!(record.version, "v4.0.0");
    assert_eq!(record.upgrade_name, "v4.0.0 Upgrade");
    assert_eq!(record.source, UpgradeSource::ActiveProposal);
    assert_eq!(record.upgrade_block_height, Some(1000));
    assert_eq!(record.latest_block_height, Some(900));
    assert_eq!(record.rpc_server, url);
    assert_eq!(record.rest_server, url);
    assert!(record.upgrade_plan.is_none());
    assert!(record.error.is_none());
    // 900 blocks is younger than the sampling window
    assert!(record.estimated_upgrade_time.is_none());
}

#[tokio::test]
async fn test_current_plan_with_eta() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(20_000).await;
    node.proposals(Vec::new()).await;
    node.current_plan(Some(plan(
        "v15",
        20_100,
        r#"{"binaries":{"linux/amd64":"https://github.com/CosmosContracts/juno/releases/download/v15.0.0/junod"}}"#,
    )))
    .await;
    node.block(20_000, "2024-06-01T12:00:00.000000000Z").await;
    node.block(10_000, "2024-05-31T09:20:00Z").await;

    let url = node.url();
    let detector = test_detector(&url, test_detector_config());
    let record = detector.inspect(&network("juno", &[url.clone()], &[url])).await.unwrap();

    assert!(record.upgrade_found);
    assert_eq!(record.source, UpgradeSource::CurrentPlan);
    assert_eq!(record.version, "v15");
    assert_eq!(record.upgrade_block_height, Some(20_100));

    let upgrade_plan = record.upgrade_plan.unwrap();
    assert_eq!(upgrade_plan.height, 20_100);
    assert!(upgrade_plan.binaries.unwrap().contains_key("linux/amd64"));

    // 96000s over 10000 blocks is 9.6s per block; 100 blocks ahead
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(record.estimated_upgrade_time, Some(t0 + chrono::Duration::seconds(960)));
}

#[tokio::test]
async fn test_version_resolved_against_release_tags() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals(vec![upgrade_proposal(7, "v25.1 upgrade", 1000, "")]).await;
    node.current_plan(None).await;
    node.tags("osmosis-labs", "osmosis", &["v26.0.0", "v25.1.3", "v25.1.0", "v25.0.0", "nightly"]).await;

    let url = node.url();
    let mut osmosis = network("osmosis", &[url.clone()], &[url.clone()]);
    osmosis.git_repo = Some("https://github.com/osmosis-labs/osmosis".to_string());

    let record = test_detector(&url, test_detector_config()).inspect(&osmosis).await.unwrap();
    assert_eq!(record.version, "v25.1.3");
}

#[tokio::test]
async fn test_blacklisted_endpoint_is_never_queried() {
    let mut liar = ChainMockBuilder::new().await;
    liar.health(200).await;
    liar.proposals(vec![upgrade_proposal(1, "v9.0.0", 5000, "")]).await;
    liar.current_plan(None).await;

    let mut honest = ChainMockBuilder::new().await;
    honest.quiet_node(900).await;

    let mut config = test_detector_config();
    config.blacklist = HashSet::from([liar.url()]);

    let detector = test_detector(&honest.url(), config);
    let record = detector
        .inspect(&network("stride", &[honest.url()], &[liar.url(), honest.url()]))
        .await
        .unwrap();

    assert!(!record.upgrade_found);
    assert_eq!(record.rest_server, honest.url());
}

#[tokio::test]
async fn test_plan_at_or_below_current_height_is_rejected() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals(vec![upgrade_proposal(3, "v3.0.0", 900, "")]).await;
    node.current_plan(Some(plan("v2.0.0", 800, ""))).await;

    let url = node.url();
    let record = test_detector(&url, test_detector_config())
        .inspect(&network("akash", &[url.clone()], &[url.clone()]))
        .await
        .unwrap();

    assert!(!record.upgrade_found);
    assert_eq!(record.version, "");
    assert_eq!(record.source, UpgradeSource::None);
    assert_eq!(record.rest_server, url);
}

#[tokio::test]
async fn test_no_upgrade_proposal_and_no_plan_is_definitive() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals(vec![text_proposal(5, "Community pool spend")]).await;
    node.current_plan(None).await;

    let url = node.url();
    let record = test_detector(&url, test_detector_config())
        .inspect(&network("cosmoshub", &[url.clone()], &[url.clone()]))
        .await
        .unwrap();

    assert!(!record.upgrade_found);
    assert_eq!(record.upgrade_name, "");
    assert_eq!(record.rest_server, url);
    assert!(record.error.is_none());
}

#[tokio::test]
async fn test_failing_rest_endpoint_is_skipped() {
    let mut rpc = ChainMockBuilder::new().await;
    rpc.health(200).await;
    rpc.status(900).await;

    let mut broken = ChainMockBuilder::new().await;
    broken.health(200).await;
    broken.proposals_failure(500).await;
    broken.current_plan(None).await;

    let mut working = ChainMockBuilder::new().await;
    working.health(200).await;
    working.proposals(Vec::new()).await;
    working.current_plan(Some(plan("v18.1.0", 950, ""))).await;

    let record = test_detector(&rpc.url(), test_detector_config())
        .inspect(&network("neutron", &[rpc.url()], &[broken.url(), working.url()]))
        .await
        .unwrap();

    assert!(record.upgrade_found);
    assert_eq!(record.version, "v18.1.0");
    assert_eq!(record.rest_server, working.url());
    assert_eq!(record.rpc_server, rpc.url());
}

#[tokio::test]
async fn test_unsupported_proposals_fall_through_to_current_plan() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals_failure(501).await;
    node.current_plan(Some(plan("v5.0.2", 1200, ""))).await;

    let url = node.url();
    let record = test_detector(&url, test_detector_config())
        .inspect(&network("kujira", &[url.clone()], &[url]))
        .await
        .unwrap();

    assert!(record.upgrade_found);
    assert_eq!(record.source, UpgradeSource::CurrentPlan);
    assert_eq!(record.version, "v5.0.2");
}

#[tokio::test]
async fn test_liveness_fallback_on_501() {
    let mut node = ChainMockBuilder::new().await;
    node.health(501).await;
    node.node_info(200).await;
    node.status(900).await;
    node.proposals(Vec::new()).await;
    node.current_plan(None).await;

    let url = node.url();
    let record = test_detector(&url, test_detector_config())
        .inspect(&network("agoric", &[url.clone()], &[url.clone()]))
        .await
        .unwrap();

    assert_eq!(record.rpc_server, url);
    assert_eq!(record.rest_server, url);
}

#[tokio::test]
async fn test_no_healthy_rest_endpoints_is_terminal() {
    let mut rpc = ChainMockBuilder::new().await;
    rpc.health(200).await;
    rpc.status(900).await;

    let mut rest = ChainMockBuilder::new().await;
    rest.health(503).await;

    let result = test_detector(&rpc.url(), test_detector_config())
        .inspect(&network("evmos", &[rpc.url()], &[rest.url()]))
        .await;

    match result {
        Err(e @ DetectError::NoHealthyEndpoints { .. }) => {
            let message = e.to_string();
            assert!(message.starts_with("no healthy rest endpoints (1 declared)"));
            assert!(message.contains("apis.rest"));
        }
        other => panic!("expected NoHealthyEndpoints, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rpc_without_height_is_terminal() {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status_failure(500).await;

    let url = node.url();
    let result = test_detector(&url, test_detector_config())
        .inspect(&network("dydx", &[url.clone()], &[url]))
        .await;

    assert!(matches!(result, Err(DetectError::NoBlockHeight)));
}
