//! Google Calendar links for upgrades reported by a running server.

use anyhow::{Context, Result};
use chrono::Duration;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};
use url::Url;
use watch_core::types::{NetworkType, UpgradeRecord};

pub const DEFAULT_API_URL: &str = "https://cosmos-upgrades.apis.defiantlabs.net";

const CALENDAR_URL: &str = "https://www.google.com/calendar/render";
const EVENT_LENGTH_MINUTES: i64 = 30;
const CALENDAR_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub struct CalendarOptions {
    pub api_url: String,
    /// Empty means every mainnet with an upgrade.
    pub mainnets: Vec<String>,
    pub testnets: Vec<String>,
    pub timeout: StdDuration,
}

pub async fn run_calendar(options: CalendarOptions) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .context("failed to build HTTP client")?;
    let api_url = options.api_url.trim_end_matches('/');

    for (network_type, wanted) in
        [(NetworkType::Mainnet, &options.mainnets), (NetworkType::Testnet, &options.testnets)]
    {
        let url = format!("{api_url}/{network_type}s");
        let records: Vec<UpgradeRecord> = client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("request to {url} failed"))?
            .json()
            .await
            .with_context(|| format!("unexpected payload from {url}"))?;
        debug!(url = %url, records = records.len(), "fetched upgrade records");

        for record in select_events(&records, wanted) {
            match calendar_link(record) {
                Some(link) => println!("{link}"),
                None => warn!(network = %record.network, "upgrade has no block height, skipping"),
            }
        }
    }

    Ok(())
}

/// Records with a found upgrade and a known estimate, restricted to `wanted` when non-empty.
pub fn select_events<'a>(records: &'a [UpgradeRecord], wanted: &[String]) -> Vec<&'a UpgradeRecord> {
    records
        .iter()
        .filter(|r| r.upgrade_found && r.estimated_upgrade_time.is_some())
        .filter(|r| wanted.is_empty() || wanted.iter().any(|w| *w == r.network))
        .collect()
}

/// "Add event" link for a 30 minute event starting at the estimated upgrade time.
pub fn calendar_link(record: &UpgradeRecord) -> Option<Url> {
    let start = record.estimated_upgrade_time?;
    let height = record.upgrade_block_height?;
    let end = start + Duration::minutes(EVENT_LENGTH_MINUTES);

    let title = format!("{} - {} - {}", record.network, record.network_type, record.version);
    let details = format!("https://www.mintscan.io/{}/blocks/{height}", record.network);
    let dates = format!("{}/{}", start.format(CALENDAR_DATE_FORMAT), end.format(CALENDAR_DATE_FORMAT));

    Url::parse_with_params(
        CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", title.as_str()),
            ("dates", dates.as_str()),
            ("details", details.as_str()),
            ("sf", "true"),
            ("output", "xml"),
        ],
    )
    .ok()
}
