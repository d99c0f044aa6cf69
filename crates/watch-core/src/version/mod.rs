//! Version-string extraction and resolution.
//!
//! Upgrade plan names are written by humans ("v4 Upgrade", "v2.1-rc", "Neutron v3.0.1
//! upgrade") and often do not match the released tag exactly. Resolution runs in two tiers:
//!
//! 1. match every candidate against the repository's release tags on the components the
//!    candidate actually spells out, and take the highest match;
//! 2. otherwise fall back to the longest raw candidate.

pub mod tags;

pub use tags::{GithubTagSource, SemverTagCache, TagError, TagSource};

use regex::Regex;
use semver::Version;
use std::sync::{Arc, LazyLock};
use tracing::debug;

#[allow(clippy::expect_used)]
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v(\d+(?:\.\d+){0,2})").expect("version pattern is valid"));

/// First version-like token in `text`, including its leading `v`.
#[must_use]
pub fn extract_version(text: &str) -> Option<&str> {
    VERSION_PATTERN.find(text).map(|m| m.as_str())
}

/// Candidate normalized to major.minor.patch, remembering which components were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartialVersion {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
}

impl PartialVersion {
    fn parse(raw: &str) -> Option<Self> {
        let captures = VERSION_PATTERN.captures(raw)?;
        let mut components = captures.get(1)?.as_str().split('.');

        let major = components.next()?.parse().ok()?;
        let minor = match components.next() {
            Some(c) => Some(c.parse().ok()?),
            None => None,
        };
        let patch = match components.next() {
            Some(c) => Some(c.parse().ok()?),
            None => None,
        };

        Some(Self { major, minor, patch })
    }

    fn matches(&self, tag: &Version) -> bool {
        tag.major == self.major &&
            self.minor.map_or(true, |minor| tag.minor == minor) &&
            self.patch.map_or(true, |patch| tag.patch == patch)
    }
}

/// First of the longest non-empty candidates.
fn longest_candidate<S: AsRef<str>>(candidates: &[S]) -> Option<&str> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !c.is_empty())
        .fold(None, |best: Option<&str>, c| match best {
            Some(b) if b.len() >= c.len() => Some(b),
            _ => Some(c),
        })
}

/// Picks the best version for a set of raw candidates given the authoritative tag list.
///
/// Returns `None` only when there is no non-empty candidate. Pure and deterministic.
#[must_use]
pub fn resolve_version<S: AsRef<str>>(candidates: &[S], tags: &[Version]) -> Option<String> {
    let longest = longest_candidate(candidates)?;

    if tags.is_empty() {
        return Some(longest.to_string());
    }

    let best = candidates
        .iter()
        .filter_map(|c| PartialVersion::parse(c.as_ref()))
        .flat_map(|wanted| tags.iter().filter(move |tag| wanted.matches(tag)))
        .max();

    match best {
        Some(tag) => Some(format!("v{}.{}.{}", tag.major, tag.minor, tag.patch)),
        None => {
            debug!(candidate = longest, tags = tags.len(), "no release tag matches, keeping raw version");
            Some(longest.to_string())
        }
    }
}

/// Resolves versions against a network's release tags, fetched through the shared cache.
#[derive(Clone)]
pub struct VersionResolver {
    tag_cache: Arc<SemverTagCache>,
}

impl VersionResolver {
    #[must_use]
    pub fn new(tag_cache: Arc<SemverTagCache>) -> Self {
        Self { tag_cache }
    }

    /// Resolves `candidates` for a network whose source lives at `repo_url`.
    ///
    /// Tags are only fetched when there is something to resolve.
    pub async fn resolve(&self, repo_url: Option<&str>, candidates: &[String]) -> Option<String> {
        longest_candidate(candidates)?;

        let tags = match repo_url {
            Some(url) => self.tag_cache.tags_for(url).await,
            None => Arc::default(),
        };
        resolve_version(candidates, &tags)
    }
}
