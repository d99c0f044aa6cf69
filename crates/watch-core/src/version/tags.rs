use arc_swap::ArcSwap;
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::upstream::{HttpClient, UpstreamError};

#[derive(Debug, Error)]
pub enum TagError {
    #[error("unsupported repository host: {0}")]
    UnsupportedHost(String),

    #[error("invalid repository url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Lists release tag names for a source repository.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// # Errors
    ///
    /// [`TagError::UnsupportedHost`] when the repository is not hosted where this source can
    /// look, otherwise whatever the hosting API returned.
    async fn list_tags(&self, repo_url: &str) -> Result<Vec<String>, TagError>;
}

#[derive(Deserialize)]
struct GithubTag {
    name: String,
}

/// Tag listing through the GitHub REST API (`/repos/{owner}/{repo}/tags`).
pub struct GithubTagSource {
    http_client: Arc<HttpClient>,
    api_base_url: String,
    token: Option<String>,
    max_pages: u32,
    timeout: Duration,
}

impl GithubTagSource {
    const PER_PAGE: usize = 100;

    #[must_use]
    pub fn new(
        http_client: Arc<HttpClient>,
        api_base_url: impl Into<String>,
        token: Option<String>,
        max_pages: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            max_pages: max_pages.max(1),
            timeout,
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("accept", "application/vnd.github+json".to_string()),
            ("x-github-api-version", "2022-11-28".to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("authorization", format!("Bearer {token}")));
        }
        headers
    }
}

/// `(owner, repo)` of a github.com repository URL.
///
/// # Errors
///
/// [`TagError::InvalidUrl`] for unparseable URLs or ones without an owner/repo path,
/// [`TagError::UnsupportedHost`] for any host other than github.com.
pub fn github_repo_path(repo_url: &str) -> Result<(String, String), TagError> {
    let url = Url::parse(repo_url.trim()).map_err(|_| TagError::InvalidUrl(repo_url.to_string()))?;

    let host = url.host_str().unwrap_or_default();
    if host != "github.com" && host != "www.github.com" {
        return Err(TagError::UnsupportedHost(host.to_string()));
    }

    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => {
            Ok((owner.to_string(), repo.trim_end_matches(".git").to_string()))
        }
        _ => Err(TagError::InvalidUrl(repo_url.to_string())),
    }
}

#[async_trait]
impl TagSource for GithubTagSource {
    async fn list_tags(&self, repo_url: &str) -> Result<Vec<String>, TagError> {
        let (owner, repo) = github_repo_path(repo_url)?;
        let headers = self.headers();
        let mut names = Vec::new();

        for page in 1..=self.max_pages {
            let url = format!(
                "{}/repos/{owner}/{repo}/tags?per_page={}&page={page}",
                self.api_base_url,
                Self::PER_PAGE
            );
            let body = self.http_client.get_json_with_headers(&url, &headers, self.timeout).await?;
            let batch: Vec<GithubTag> = serde_json::from_value(body)
                .map_err(|e| UpstreamError::InvalidResponse(format!("tag listing: {e}")))?;

            let batch_len = batch.len();
            names.extend(batch.into_iter().map(|t| t.name));
            if batch_len < Self::PER_PAGE {
                break;
            }
        }

        Ok(names)
    }
}

/// Parses tag names into versions, dropping anything that is not semver after an optional
/// leading `v`.
#[must_use]
pub fn parse_tags<S: AsRef<str>>(raw: &[S]) -> Vec<Version> {
    raw.iter()
        .filter_map(|t| {
            let name = t.as_ref().trim();
            Version::parse(name.strip_prefix('v').unwrap_or(name)).ok()
        })
        .collect()
}

fn normalize_repo_url(repo_url: &str) -> String {
    repo_url.trim().trim_end_matches('/').trim_end_matches(".git").to_ascii_lowercase()
}

struct TagEntry {
    tags: Arc<Vec<Version>>,
    fetched_at: Instant,
}

/// Release tags per repository with a time-to-live.
///
/// The map is replaced wholesale on every insert, so readers never see a partially
/// updated entry set.
pub struct SemverTagCache {
    source: Arc<dyn TagSource>,
    ttl: Duration,
    entries: ArcSwap<HashMap<String, Arc<TagEntry>>>,
}

impl SemverTagCache {
    #[must_use]
    pub fn new(source: Arc<dyn TagSource>, ttl: Duration) -> Self {
        Self { source, ttl, entries: ArcSwap::from_pointee(HashMap::new()) }
    }

    /// Known tags for `repo_url`, fetched on miss or expiry.
    ///
    /// Never fails. Transient fetch failures yield an empty list (or the expired entry, if
    /// one exists) and are not cached. Unsupported hosts and missing repositories cache an
    /// empty list for the TTL.
    pub async fn tags_for(&self, repo_url: &str) -> Arc<Vec<Version>> {
        let key = normalize_repo_url(repo_url);
        let cached = self.entries.load().get(&key).cloned();

        if let Some(entry) = &cached {
            if entry.fetched_at.elapsed() < self.ttl {
                return Arc::clone(&entry.tags);
            }
        }

        match self.source.list_tags(repo_url).await {
            Ok(raw) => {
                let tags = Arc::new(parse_tags(&raw));
                debug!(repo = %key, tags = tags.len(), "release tags refreshed");
                self.store(key, Arc::clone(&tags));
                tags
            }
            Err(e @ (TagError::UnsupportedHost(_) | TagError::InvalidUrl(_))) => {
                debug!(repo = %key, error = %e, "release tags unavailable for repository");
                let tags = Arc::new(Vec::new());
                self.store(key, Arc::clone(&tags));
                tags
            }
            Err(TagError::Upstream(e)) if !e.is_transient() => {
                warn!(repo = %key, error = %e, "release tag listing rejected");
                let tags = Arc::new(Vec::new());
                self.store(key, Arc::clone(&tags));
                tags
            }
            Err(e) => {
                warn!(repo = %key, error = %e, "failed to fetch release tags");
                cached.map(|entry| Arc::clone(&entry.tags)).unwrap_or_default()
            }
        }
    }

    fn store(&self, key: String, tags: Arc<Vec<Version>>) {
        let entry = Arc::new(TagEntry { tags, fetched_at: Instant::now() });
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(key.clone(), Arc::clone(&entry));
            next
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}
