//! # Watch Core
//!
//! Core library for Upgrade Watch, a service that tracks scheduled software upgrades across
//! a fleet of Cosmos networks and estimates when each one will activate.
//!
//! - **[`upstream`]**: HTTP plumbing towards community-operated chain endpoints: the shared
//!   concurrency-limited client, liveness probing, and typed Cosmos RPC/REST queries.
//!
//! - **[`version`]**: Version-string extraction and resolution against a network's published
//!   release tags, with a TTL cache of tag lists keyed by repository.
//!
//! - **[`detector`]**: The per-network detection protocol (height discovery, upgrade discovery
//!   across healthy REST endpoints) and the upgrade ETA estimator.
//!
//! - **[`registry`]**: Loading network descriptors from a chain-registry checkout or from GitHub.
//!
//! - **[`scheduler`]** and **[`cache`]**: The background refresh loop and the snapshot it
//!   publishes for the serving layer.
//!
//! - **[`runtime`]**: Wiring of all components from an [`config::AppConfig`].
//!
//! ## Data Flow
//!
//! ```text
//! Registry ──► NetworkDescriptor (per network, fanned out)
//!                    │
//!                    ▼
//!            ┌───────────────┐
//!            │ EndpointProber│  RPC + REST liveness, capped at 5, shuffled
//!            └───────┬───────┘
//!                    ▼
//!            ┌───────────────┐
//!            │UpgradeDetector│  height discovery ─► proposals ─► current plan
//!            └───────┬───────┘         │
//!                    │          VersionResolver ◄── SemverTagCache
//!                    ▼
//!              EtaEstimator
//!                    │
//!                    ▼
//!              UpgradeRecord ──► CacheSnapshot (swapped atomically)
//! ```

pub mod cache;
pub mod config;
pub mod detector;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod types;
pub mod upstream;
pub mod version;
