use anyhow::{anyhow, Context, Result};
use prettytable::{row, Table};
use std::path::PathBuf;
use tracing::debug;
use watch_core::{
    config::{AppConfig, RegistrySourceKind},
    detector::NetworkInspector,
    runtime::WatchComponents,
    types::{NetworkType, UpgradeRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

pub struct CheckOptions {
    pub network: String,
    pub network_type: NetworkType,
    pub config_path: Option<PathBuf>,
    pub registry_dir: Option<PathBuf>,
    pub output: OutputFormat,
}

/// Runs one detection for one network and prints the record.
pub async fn run_check(options: CheckOptions) -> Result<()> {
    let mut config = match &options.config_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    if let Some(dir) = &options.registry_dir {
        config.registry.source = RegistrySourceKind::Directory;
        config.registry.directory = Some(dir.display().to_string());
    }
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;

    let components = WatchComponents::from_config(&config)?;
    let network = components
        .registry
        .load_network(&options.network, options.network_type)
        .await?
        .ok_or_else(|| anyhow!("{} {} not found in chain registry", options.network_type, options.network))?;

    debug!(
        network = %network.name,
        rpc = network.rpc.len(),
        rest = network.rest.len(),
        "inspecting network"
    );
    let record = match components.detector.inspect(&network).await {
        Ok(record) => record,
        Err(e) => UpgradeRecord::failed(&network.name, network.network_type, e),
    };

    match options.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Table => record_table(&record).printstd(),
    }

    Ok(())
}

fn or_dash(value: Option<String>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| "-".to_string())
}

/// Two-column field/value view of a record.
pub fn record_table(record: &UpgradeRecord) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Field", "Value"]);
    table.add_row(row!["Network", record.network]);
    table.add_row(row!["Type", record.network_type]);
    table.add_row(row!["RPC server", or_dash(Some(record.rpc_server.clone()))]);
    table.add_row(row!["REST server", or_dash(Some(record.rest_server.clone()))]);
    table.add_row(row!["Latest height", or_dash(record.latest_block_height.map(|h| h.to_string()))]);
    table.add_row(row!["Upgrade found", if record.upgrade_found { "yes" } else { "no" }]);

    if record.upgrade_found {
        table.add_row(row!["Upgrade name", record.upgrade_name]);
        table.add_row(row!["Version", record.version]);
        table.add_row(row!["Source", record.source.as_str()]);
        table.add_row(row!["Upgrade height", or_dash(record.upgrade_block_height.map(|h| h.to_string()))]);
        table.add_row(row![
            "Estimated time",
            or_dash(record.estimated_upgrade_time.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string()))
        ]);
    }

    if let Some(error) = &record.error {
        table.add_row(row!["Error", error]);
    }

    table
}
