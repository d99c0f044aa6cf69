//! Prometheus metrics for the refresh pipeline.
//!
//! Recording goes through the `metrics` facade and is a no-op until [`install_recorder`] has
//! run, so library code records unconditionally.
//!
//! | Metric | Kind | Labels |
//! |---|---|---|
//! | `upgrade_watch_cycles_total` | counter | `outcome` |
//! | `upgrade_watch_cycle_duration_seconds` | histogram | |
//! | `upgrade_watch_networks` | gauge | `type` |
//! | `upgrade_watch_upgrades_found` | gauge | `type` |
//! | `upgrade_watch_network_errors_total` | counter | `type` |
//! | `upgrade_watch_healthy_endpoints` | histogram | `protocol` |

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::OnceLock;

use crate::{
    cache::CacheSnapshot,
    types::{NetworkType, Protocol},
};

pub use metrics_exporter_prometheus::PrometheusHandle;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder once and returns its render handle.
///
/// If another recorder is already installed, a detached recorder is returned so rendering
/// still works, though it will not see facade metrics.
pub fn install_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install Prometheus recorder, using a detached one");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

pub fn record_cycle(snapshot: &CacheSnapshot) {
    counter!("upgrade_watch_cycles_total", "outcome" => "published").increment(1);
    histogram!("upgrade_watch_cycle_duration_seconds").record(snapshot.cycle_duration.as_secs_f64());

    for network_type in [NetworkType::Mainnet, NetworkType::Testnet] {
        let records = snapshot.records(network_type);
        let label = network_type.as_str();

        #[allow(clippy::cast_precision_loss)]
        let (total, found) =
            (records.len() as f64, records.iter().filter(|r| r.upgrade_found).count() as f64);
        let errors = records.iter().filter(|r| r.is_error()).count() as u64;

        gauge!("upgrade_watch_networks", "type" => label).set(total);
        gauge!("upgrade_watch_upgrades_found", "type" => label).set(found);
        counter!("upgrade_watch_network_errors_total", "type" => label).increment(errors);
    }
}

pub fn record_cycle_failure() {
    counter!("upgrade_watch_cycles_total", "outcome" => "failed").increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_healthy_endpoints(protocol: Protocol, healthy: usize) {
    histogram!("upgrade_watch_healthy_endpoints", "protocol" => protocol.as_str()).record(healthy as f64);
}
