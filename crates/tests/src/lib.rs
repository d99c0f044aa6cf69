//! Integration Tests for Upgrade Watch
//!
//! This crate contains various test modules:
//!
//! - `prober_tests`: liveness probing, the 501 fallback and the healthy-subset cap
//! - `detector_tests`: the per-network detection protocol against mocked Cosmos nodes
//! - `scheduler_tests`: full refresh cycles over a local chain registry
//! - `mock_infrastructure`: reusable Cosmos node mocks and fixtures
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! No external services are needed; every node and the GitHub tag API are served by mockito.

#[cfg(test)]
mod prober_tests;

#[cfg(test)]
mod detector_tests;

#[cfg(test)]
mod scheduler_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
