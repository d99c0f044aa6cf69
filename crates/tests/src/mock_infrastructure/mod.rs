//! Mock Infrastructure for Testing Upgrade Watch
//!
//! Reusable mocks for exercising the detection engine without real network connections.
//!
//! ## Components
//!
//! - `ChainMockBuilder`: wraps mockito to answer the Cosmos RPC, REST and GitHub tag paths
//! - Test helpers for governance payloads and engine components
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{upgrade_proposal, ChainMockBuilder};
//!
//! let mut node = ChainMockBuilder::new().await;
//! node.health(200).await;
//! node.status(900).await;
//! node.proposals(vec![upgrade_proposal(1, "v4.0.0 Upgrade", 1000, "")]).await;
//! ```

pub mod chain_mock;
pub mod test_helpers;

pub use chain_mock::ChainMockBuilder;
pub use test_helpers::*;
