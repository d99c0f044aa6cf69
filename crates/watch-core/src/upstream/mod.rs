//! Communication with community-operated chain endpoints.
//!
//! Every call leaving the process goes through the shared [`HttpClient`], which bounds
//! concurrency with a semaphore and applies a per-call timeout. On top of it:
//!
//! - [`EndpointProber`] decides which declared endpoints are alive right now
//! - [`CosmosClient`] issues the typed RPC/REST queries the detector needs
//!
//! # Liveness Protocol
//!
//! ```text
//! GET {addr}/health
//!    ├─ 2xx ─────────► healthy
//!    ├─ 501 ─────────► GET {addr}{fallback}  (RPC: /status, REST: node_info)
//!    │                    ├─ 2xx ► healthy
//!    │                    └─ else ► unhealthy
//!    └─ else/error ──► unhealthy
//! ```

pub mod cosmos;
pub mod errors;
pub mod health;
pub mod http_client;

pub use cosmos::CosmosClient;
pub use errors::UpstreamError;
pub use health::{EndpointProber, ProbeConfig, ProbeResult};
pub use http_client::{HttpClient, HttpClientConfig};
