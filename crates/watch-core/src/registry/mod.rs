//! Network metadata from the Cosmos chain registry.
//!
//! The registry lays out one directory per network, each holding a `chain.json`:
//!
//! ```text
//! osmosis/chain.json
//! juno/chain.json
//! _non-cosmos/...          (ignored: leading '_' or '.')
//! testnets/osmosistestnet/chain.json
//! ```
//!
//! Only `apis.rest`, `apis.rpc` and `codebase.git_repo` are read.

pub mod directory;
pub mod github;

pub use directory::DirectoryRegistry;
pub use github::{GithubRegistry, GithubRegistryConfig};

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::{
    types::{EndpointDescriptor, NetworkDescriptor, NetworkType},
    upstream::UpstreamError,
};

/// Directory holding testnets inside the registry.
pub const TESTNETS_DIR: &str = "testnets";
pub const CHAIN_FILE: &str = "chain.json";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed chain document for {network}: {source}")]
    Parse {
        network: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry request failed: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Supplier of network descriptors.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Every mainnet and testnet in the registry.
    ///
    /// # Errors
    ///
    /// Fails only when the registry as a whole is unavailable; individual networks that
    /// cannot be read are skipped.
    async fn load_networks(&self) -> Result<Vec<NetworkDescriptor>, RegistryError>;

    /// One network, `None` if the registry has no such entry.
    ///
    /// # Errors
    ///
    /// Fails when the entry exists but cannot be read or parsed.
    async fn load_network(
        &self,
        name: &str,
        network_type: NetworkType,
    ) -> Result<Option<NetworkDescriptor>, RegistryError>;
}

/// Whether a top-level registry directory names a network.
#[must_use]
pub fn is_network_dir(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.starts_with('_') && name != TESTNETS_DIR
}

/// Relative path of a network's chain document inside the registry.
#[must_use]
pub fn chain_file_path(name: &str, network_type: NetworkType) -> String {
    match network_type {
        NetworkType::Mainnet => format!("{name}/{CHAIN_FILE}"),
        NetworkType::Testnet => format!("{TESTNETS_DIR}/{name}/{CHAIN_FILE}"),
    }
}

/// The subset of `chain.json` the engine consumes. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ChainDocument {
    #[serde(default)]
    pub apis: ChainApis,
    #[serde(default)]
    pub codebase: Option<Codebase>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChainApis {
    #[serde(default)]
    pub rest: Vec<EndpointDescriptor>,
    #[serde(default)]
    pub rpc: Vec<EndpointDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Codebase {
    #[serde(default)]
    pub git_repo: Option<String>,
}

impl ChainDocument {
    /// # Errors
    ///
    /// [`RegistryError::Parse`] if the bytes are not a JSON object of the expected shape.
    pub fn parse(network: &str, bytes: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(bytes)
            .map_err(|source| RegistryError::Parse { network: network.to_string(), source })
    }

    /// Builds the descriptor, dropping endpoint entries without an address.
    #[must_use]
    pub fn into_descriptor(self, name: &str, network_type: NetworkType) -> NetworkDescriptor {
        let keep = |endpoints: Vec<EndpointDescriptor>| -> Vec<EndpointDescriptor> {
            endpoints.into_iter().filter(|e| !e.base_url().is_empty()).collect()
        };

        NetworkDescriptor {
            name: name.to_string(),
            network_type,
            rest: keep(self.apis.rest),
            rpc: keep(self.apis.rpc),
            git_repo: self
                .codebase
                .and_then(|c| c.git_repo)
                .filter(|repo| !repo.trim().is_empty()),
        }
    }
}
