use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use super::{chain_file_path, is_network_dir, ChainDocument, RegistryError, RegistrySource, TESTNETS_DIR};
use crate::types::{NetworkDescriptor, NetworkType};

/// Reads a local chain-registry checkout.
pub struct DirectoryRegistry {
    root: PathBuf,
}

impl DirectoryRegistry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted network directory names under `dir`. A missing directory lists as empty.
    async fn list_network_dirs(dir: &Path) -> Result<Vec<String>, RegistryError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(RegistryError::Io { path: dir.to_path_buf(), source }),
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(RegistryError::Io { path: dir.to_path_buf(), source }),
            };

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && is_network_dir(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read_descriptor(
        &self,
        name: &str,
        network_type: NetworkType,
    ) -> Result<Option<NetworkDescriptor>, RegistryError> {
        let path = self.root.join(chain_file_path(name, network_type));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RegistryError::Io { path, source }),
        };

        Ok(Some(ChainDocument::parse(name, &bytes)?.into_descriptor(name, network_type)))
    }
}

#[async_trait]
impl RegistrySource for DirectoryRegistry {
    async fn load_networks(&self) -> Result<Vec<NetworkDescriptor>, RegistryError> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(RegistryError::Io {
                path: self.root.clone(),
                source: std::io::Error::new(ErrorKind::NotFound, "registry directory does not exist"),
            });
        }

        let mainnets = Self::list_network_dirs(&self.root).await?;
        let testnets = Self::list_network_dirs(&self.root.join(TESTNETS_DIR)).await?;

        let wanted = mainnets
            .iter()
            .map(|n| (n, NetworkType::Mainnet))
            .chain(testnets.iter().map(|n| (n, NetworkType::Testnet)));

        let mut networks = Vec::with_capacity(mainnets.len() + testnets.len());
        for (name, network_type) in wanted {
            match self.read_descriptor(name, network_type).await {
                Ok(Some(network)) => networks.push(network),
                Ok(None) => debug!(network = %name, "directory without chain.json, skipping"),
                Err(e) => warn!(network = %name, error = %e, "unreadable chain document, skipping"),
            }
        }

        debug!(root = %self.root.display(), networks = networks.len(), "registry directory loaded");
        Ok(networks)
    }

    async fn load_network(
        &self,
        name: &str,
        network_type: NetworkType,
    ) -> Result<Option<NetworkDescriptor>, RegistryError> {
        if !is_network_dir(name) || name.contains(['/', '\\']) {
            return Ok(None);
        }
        self.read_descriptor(name, network_type).await
    }
}
