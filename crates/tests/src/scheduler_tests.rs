//! Refresh cycles over a local registry and mocked nodes.

use serial_test::serial;
use std::{fs, path::Path, sync::Arc};
use watch_core::{
    cache::UpgradeCache,
    metrics,
    registry::DirectoryRegistry,
    scheduler::{RefreshConfig, RefreshError, RefreshScheduler},
    types::{NetworkSelection, NetworkType},
};

use crate::mock_infrastructure::{
    test_detector, test_detector_config, upgrade_proposal, ChainMockBuilder,
};

fn write_chain(root: &Path, relative: &str, rpc: &str, rest: &str) {
    let dir = root.join(relative);
    fs::create_dir_all(&dir).unwrap();
    let body = serde_json::json!({
        "chain_name": relative.rsplit('/').next().unwrap(),
        "apis": {
            "rpc": [{"address": rpc, "provider": "mock"}],
            "rest": [{"address": rest, "provider": "mock"}]
        }
    });
    fs::write(dir.join("chain.json"), body.to_string()).unwrap();
}

fn scheduler(root: &Path, tag_api: &str, watch_list: NetworkSelection) -> Arc<RefreshScheduler> {
    Arc::new(RefreshScheduler::new(
        Arc::new(DirectoryRegistry::new(root)),
        Arc::new(test_detector(tag_api, test_detector_config())),
        Arc::new(UpgradeCache::new()),
        RefreshConfig { watch_list, ..RefreshConfig::default() },
    ))
}

async fn upgrading_node() -> ChainMockBuilder {
    let mut node = ChainMockBuilder::new().await;
    node.health(200).await;
    node.status(900).await;
    node.proposals(vec![upgrade_proposal(1, "v4.0.0 Upgrade", 1000, "")]).await;
    node.current_plan(None).await;
    node
}

#[tokio::test]
async fn test_cycle_publishes_every_network() {
    let upgrading = upgrading_node().await;
    let mut quiet = ChainMockBuilder::new().await;
    quiet.quiet_node(5_000).await;

    let tmp = tempfile::tempdir().unwrap();
    write_chain(tmp.path(), "osmosis", &upgrading.url(), &upgrading.url());
    write_chain(tmp.path(), "juno", &quiet.url(), &quiet.url());
    write_chain(tmp.path(), "dead", "http://127.0.0.1:1", "http://127.0.0.1:1");
    write_chain(tmp.path(), "testnets/osmosistestnet", &quiet.url(), &quiet.url());

    let scheduler = scheduler(tmp.path(), &quiet.url(), NetworkSelection::default());
    let summary = scheduler.run_cycle().await.unwrap();

    assert_eq!(summary.networks, 4);
    assert_eq!(summary.upgrades_found, 1);
    assert_eq!(summary.errors, 1);

    let snapshot = scheduler.cache().load().unwrap();
    let mainnets = snapshot.records(NetworkType::Mainnet);
    assert_eq!(mainnets.len(), 3);
    assert_eq!(mainnets[0].network, "osmosis");
    assert!(mainnets[0].upgrade_found);

    let dead = mainnets.iter().find(|r| r.network == "dead").unwrap();
    assert!(dead.error.as_deref().unwrap().starts_with("no healthy rpc endpoints"));

    let testnets = snapshot.records(NetworkType::Testnet);
    assert_eq!(testnets.len(), 1);
    assert_eq!(testnets[0].latest_block_height, Some(5_000));
}

#[tokio::test]
async fn test_failed_network_does_not_change_the_others() {
    let upgrading = upgrading_node().await;

    let with_dead = tempfile::tempdir().unwrap();
    write_chain(with_dead.path(), "osmosis", &upgrading.url(), &upgrading.url());
    write_chain(with_dead.path(), "dead", "http://127.0.0.1:1", "http://127.0.0.1:1");

    let without_dead = tempfile::tempdir().unwrap();
    write_chain(without_dead.path(), "osmosis", &upgrading.url(), &upgrading.url());

    let full = scheduler(with_dead.path(), &upgrading.url(), NetworkSelection::default());
    let reduced = scheduler(without_dead.path(), &upgrading.url(), NetworkSelection::default());
    full.run_cycle().await.unwrap();
    reduced.run_cycle().await.unwrap();

    let full = full.cache().load().unwrap();
    let reduced = reduced.cache().load().unwrap();
    let osmosis = full.records(NetworkType::Mainnet).iter().find(|r| r.network == "osmosis").unwrap();
    assert_eq!(osmosis, &reduced.records(NetworkType::Mainnet)[0]);
}

#[tokio::test]
async fn test_registry_loss_keeps_previous_snapshot() {
    let upgrading = upgrading_node().await;
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("chain-registry");
    write_chain(&root, "osmosis", &upgrading.url(), &upgrading.url());

    let scheduler = scheduler(&root, &upgrading.url(), NetworkSelection::default());
    scheduler.run_cycle().await.unwrap();
    let before = scheduler.cache().load().unwrap();

    fs::remove_dir_all(&root).unwrap();
    assert!(matches!(scheduler.run_cycle().await, Err(RefreshError::Registry(_))));

    let after = scheduler.cache().load().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_watch_list_and_inline_selection() {
    let upgrading = upgrading_node().await;
    let tmp = tempfile::tempdir().unwrap();
    write_chain(tmp.path(), "osmosis", &upgrading.url(), &upgrading.url());
    write_chain(tmp.path(), "juno", "http://127.0.0.1:1", "http://127.0.0.1:1");

    let watch_list = NetworkSelection { mainnets: vec!["osmosis".to_string()], testnets: Vec::new() };
    let scheduler = scheduler(tmp.path(), &upgrading.url(), watch_list.clone());

    let summary = scheduler.run_cycle().await.unwrap();
    assert_eq!(summary.networks, 1);

    let request = NetworkSelection {
        mainnets: vec!["osmosis".to_string()],
        testnets: vec!["osmosistestnet".to_string()],
    };
    let records = scheduler.inspect_selection(&request).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].network, "osmosis");
    assert_eq!(records[0].version, "v4.0.0");
    assert_eq!(records[1].error.as_deref(), Some("testnet not found in chain registry"));
}

#[tokio::test]
#[serial]
async fn test_cycle_metrics_are_rendered() {
    let handle = metrics::install_recorder();

    let mut quiet = ChainMockBuilder::new().await;
    quiet.quiet_node(5_000).await;
    let tmp = tempfile::tempdir().unwrap();
    write_chain(tmp.path(), "juno", &quiet.url(), &quiet.url());

    scheduler(tmp.path(), &quiet.url(), NetworkSelection::default()).run_cycle().await.unwrap();

    let rendered = handle.render();
    assert!(rendered.contains("upgrade_watch_cycles_total"));
    assert!(rendered.contains("upgrade_watch_networks"));
    assert!(rendered.contains("upgrade_watch_healthy_endpoints"));
}
