use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use super::{chain_file_path, is_network_dir, ChainDocument, RegistryError, RegistrySource, TESTNETS_DIR};
use crate::{
    types::{NetworkDescriptor, NetworkType},
    upstream::{HttpClient, UpstreamError},
};

#[derive(Debug, Clone)]
pub struct GithubRegistryConfig {
    pub api_base_url: String,
    pub raw_base_url: String,
    /// `owner/name` of the registry repository
    pub repository: String,
    pub branch: String,
    pub retain: Duration,
    pub fetch_concurrency: usize,
    pub request_timeout: Duration,
    pub token: Option<String>,
}

impl Default for GithubRegistryConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            repository: "cosmos/chain-registry".to_string(),
            branch: "master".to_string(),
            retain: Duration::from_secs(3 * 3600),
            fetch_concurrency: 10,
            request_timeout: Duration::from_secs(10),
            token: None,
        }
    }
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

struct RetainedListing {
    networks: Arc<Vec<NetworkDescriptor>>,
    fetched_at: Instant,
}

/// Chain registry read straight from GitHub.
///
/// A listing is kept for `retain`; when a later download fails the retained listing keeps
/// being served.
pub struct GithubRegistry {
    http_client: Arc<HttpClient>,
    config: GithubRegistryConfig,
    retained: ArcSwapOption<RetainedListing>,
}

impl GithubRegistry {
    #[must_use]
    pub fn new(http_client: Arc<HttpClient>, config: GithubRegistryConfig) -> Self {
        Self { http_client, config, retained: ArcSwapOption::empty() }
    }

    fn api_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("accept", "application/vnd.github+json".to_string())];
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            headers.push(("authorization", format!("Bearer {token}")));
        }
        headers
    }

    /// Network directories under `path` ("" for the registry root).
    async fn list_dirs(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        let subpath = if path.is_empty() { String::new() } else { format!("/{path}") };
        let url = format!(
            "{}/repos/{}/contents{subpath}?ref={}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.repository,
            self.config.branch
        );
        let body = self
            .http_client
            .get_json_with_headers(&url, &self.api_headers(), self.config.request_timeout)
            .await?;

        let entries: Vec<ContentEntry> = serde_json::from_value(body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("contents listing: {e}")))?;

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == "dir" && is_network_dir(&e.name))
            .map(|e| e.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn fetch_descriptor(
        &self,
        name: &str,
        network_type: NetworkType,
    ) -> Result<Option<NetworkDescriptor>, RegistryError> {
        let url = format!(
            "{}/{}/{}/{}",
            self.config.raw_base_url.trim_end_matches('/'),
            self.config.repository,
            self.config.branch,
            chain_file_path(name, network_type)
        );

        let body = match self.http_client.get_json(&url, self.config.request_timeout).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document: ChainDocument = serde_json::from_value(body)
            .map_err(|source| RegistryError::Parse { network: name.to_string(), source })?;
        Ok(Some(document.into_descriptor(name, network_type)))
    }

    async fn download(&self) -> Result<Vec<NetworkDescriptor>, RegistryError> {
        let (mainnets, testnets) = tokio::try_join!(self.list_dirs(""), self.list_dirs(TESTNETS_DIR))?;

        let wanted: Vec<(String, NetworkType)> = mainnets
            .into_iter()
            .map(|n| (n, NetworkType::Mainnet))
            .chain(testnets.into_iter().map(|n| (n, NetworkType::Testnet)))
            .collect();

        let results: Vec<_> = stream::iter(wanted)
            .map(|(name, network_type)| async move {
                let result = self.fetch_descriptor(&name, network_type).await;
                (name, result)
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        // Any failed download fails the listing; malformed documents are skipped.
        let mut networks = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result {
                Ok(Some(network)) => networks.push(network),
                Ok(None) => debug!(network = %name, "no chain.json, skipping"),
                Err(e @ RegistryError::Parse { .. }) => {
                    warn!(network = %name, error = %e, "malformed chain document, skipping");
                }
                Err(e) => {
                    warn!(network = %name, error = %e, "failed to fetch chain document");
                    return Err(e);
                }
            }
        }

        Ok(networks)
    }
}

#[async_trait]
impl RegistrySource for GithubRegistry {
    async fn load_networks(&self) -> Result<Vec<NetworkDescriptor>, RegistryError> {
        let retained = self.retained.load_full();
        if let Some(listing) = &retained {
            if listing.fetched_at.elapsed() < self.config.retain {
                return Ok(listing.networks.as_ref().clone());
            }
        }

        match self.download().await {
            Ok(networks) => {
                info!(networks = networks.len(), repository = %self.config.repository, "chain registry downloaded");
                let networks = Arc::new(networks);
                self.retained.store(Some(Arc::new(RetainedListing {
                    networks: Arc::clone(&networks),
                    fetched_at: Instant::now(),
                })));
                Ok(networks.as_ref().clone())
            }
            Err(e) => match retained {
                Some(listing) => {
                    warn!(error = %e, "chain registry download failed, serving retained listing");
                    Ok(listing.networks.as_ref().clone())
                }
                None => Err(e),
            },
        }
    }

    async fn load_network(
        &self,
        name: &str,
        network_type: NetworkType,
    ) -> Result<Option<NetworkDescriptor>, RegistryError> {
        if let Some(listing) = self.retained.load_full() {
            if let Some(network) =
                listing.networks.iter().find(|n| n.name == name && n.network_type == network_type)
            {
                return Ok(Some(network.clone()));
            }
        }

        if !is_network_dir(name) || name.contains('/') {
            return Ok(None);
        }
        self.fetch_descriptor(name, network_type).await
    }
}
