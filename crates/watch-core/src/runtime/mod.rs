//! Wiring of the detection engine and lifecycle of its background refresh task.
//!
//! [`WatchComponents`] builds every shared piece from an [`AppConfig`] without starting
//! anything, which is what one-shot callers such as the CLI need. [`WatchRuntime`] takes
//! the components and runs the refresh loop until [`WatchRuntime::shutdown`].
//!
//! ```text
//! AppConfig ──> HttpClient ──┬─> RegistrySource (github | directory)
//!                            ├─> GithubTagSource ──> SemverTagCache
//!                            └─> UpgradeDetector
//!                                      │
//!                  RefreshScheduler <──┘──> UpgradeCache
//! ```

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    cache::UpgradeCache,
    config::{AppConfig, RegistrySourceKind},
    detector::UpgradeDetector,
    registry::{DirectoryRegistry, GithubRegistry, GithubRegistryConfig, RegistrySource},
    scheduler::RefreshScheduler,
    upstream::{HttpClient, UpstreamError},
    version::tags::{GithubTagSource, SemverTagCache},
};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] UpstreamError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Every shared engine component, built but not running.
#[derive(Clone)]
pub struct WatchComponents {
    pub http_client: Arc<HttpClient>,
    pub registry: Arc<dyn RegistrySource>,
    pub tag_cache: Arc<SemverTagCache>,
    pub detector: Arc<UpgradeDetector>,
    pub cache: Arc<UpgradeCache>,
    pub scheduler: Arc<RefreshScheduler>,
}

impl WatchComponents {
    /// # Errors
    ///
    /// [`RuntimeError`] if the HTTP client cannot be built or the registry source is
    /// misconfigured.
    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        let http_client = Arc::new(HttpClient::with_config(config.http_client_config())?);
        let registry = build_registry(config, Arc::clone(&http_client))?;

        let tag_source = GithubTagSource::new(
            Arc::clone(&http_client),
            config.tags.api_base_url.clone(),
            config.github_token(),
            config.tags.max_pages,
            Duration::from_millis(config.tags.request_timeout_ms),
        );
        let tag_cache = Arc::new(SemverTagCache::new(
            Arc::new(tag_source),
            Duration::from_secs(config.tags.ttl_seconds),
        ));

        let detector = Arc::new(UpgradeDetector::new(
            Arc::clone(&http_client),
            Arc::clone(&tag_cache),
            config.detector_config(),
        ));
        let cache = Arc::new(UpgradeCache::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&registry),
            detector.clone(),
            Arc::clone(&cache),
            config.refresh_config(),
        ));

        Ok(Self { http_client, registry, tag_cache, detector, cache, scheduler })
    }
}

/// Picks the registry source named by `registry.source`.
///
/// # Errors
///
/// [`RuntimeError::Config`] when the directory source has no directory.
pub fn build_registry(
    config: &AppConfig,
    http_client: Arc<HttpClient>,
) -> Result<Arc<dyn RegistrySource>, RuntimeError> {
    let settings = &config.registry;
    match settings.source {
        RegistrySourceKind::Directory => {
            let directory = settings
                .directory
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| RuntimeError::Config("registry.directory is required for the directory source".to_string()))?;
            debug!(directory, "using local chain registry");
            Ok(Arc::new(DirectoryRegistry::new(directory)))
        }
        RegistrySourceKind::Github => {
            debug!(repository = %settings.repository, branch = %settings.branch, "using GitHub chain registry");
            Ok(Arc::new(GithubRegistry::new(
                http_client,
                GithubRegistryConfig {
                    api_base_url: settings.api_base_url.clone(),
                    raw_base_url: settings.raw_base_url.clone(),
                    repository: settings.repository.clone(),
                    branch: settings.branch.clone(),
                    retain: Duration::from_secs(settings.retain_hours * 3600),
                    fetch_concurrency: settings.fetch_concurrency,
                    request_timeout: Duration::from_millis(settings.request_timeout_ms),
                    token: config.github_token(),
                },
            )))
        }
    }
}

/// A running engine: components plus the refresh task.
pub struct WatchRuntime {
    components: WatchComponents,
    shutdown_tx: broadcast::Sender<()>,
    refresh_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown_initiated: AtomicBool,
}

impl WatchRuntime {
    /// Builds the components and starts the refresh loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`WatchComponents::from_config`].
    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        Ok(Self::start(WatchComponents::from_config(config)?))
    }

    /// Starts the refresh loop over already built components.
    #[must_use]
    pub fn start(components: WatchComponents) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let refresh_task = components.scheduler.start_with_shutdown(shutdown_tx.subscribe());
        info!("upgrade watch runtime started");

        Self {
            components,
            shutdown_tx,
            refresh_task: tokio::sync::Mutex::new(Some(refresh_task)),
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<UpgradeCache> {
        &self.components.cache
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.components.scheduler
    }

    #[must_use]
    pub fn detector(&self) -> &Arc<UpgradeDetector> {
        &self.components.detector
    }

    #[must_use]
    pub fn components(&self) -> &WatchComponents {
        &self.components
    }

    /// A receiver that fires when shutdown begins.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Signals the refresh task and waits for it to exit. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("initiating upgrade watch runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!(error = %e, "failed to send shutdown signal (no receivers)");
        }

        if let Some(task) = self.refresh_task.lock().await.take() {
            match task.await {
                Ok(()) => debug!("refresh task completed"),
                Err(e) if e.is_cancelled() => debug!("refresh task cancelled"),
                Err(e) => error!(error = %e, "refresh task failed"),
            }
        }

        info!("upgrade watch runtime shutdown complete");
    }
}
