//! Cosmos node mock built on mockito.
//!
//! One builder stands in for one node and answers both the RPC paths (`/status`, `/block`)
//! and the REST paths (`/health`, gov proposals, current plan). mockito answers unmatched
//! requests with 501, which the liveness probe treats as "try the fallback path", so every
//! test states explicitly which liveness paths answer.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

pub struct ChainMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl ChainMockBuilder {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    async fn json_mock(&mut self, path: &str, query: Matcher, status: usize, body: String) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(query)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        self.mocks.push(mock);
        self
    }

    /// `GET /health` answering with `status`.
    pub async fn health(&mut self, status: usize) -> &mut Self {
        self.json_mock("/health", Matcher::Any, status, "{}".to_string()).await
    }

    /// `GET /cosmos/base/tendermint/v1beta1/node_info`, the REST liveness fallback.
    pub async fn node_info(&mut self, status: usize) -> &mut Self {
        self.json_mock("/cosmos/base/tendermint/v1beta1/node_info", Matcher::Any, status, "{}".to_string())
            .await
    }

    /// `GET /status` reporting `height` in the wrapped `result.sync_info` shape.
    pub async fn status(&mut self, height: u64) -> &mut Self {
        let body = json!({"result": {"sync_info": {"latest_block_height": height.to_string()}}});
        self.json_mock("/status", Matcher::Any, 200, body.to_string()).await
    }

    pub async fn status_failure(&mut self, status: usize) -> &mut Self {
        self.json_mock("/status", Matcher::Any, status, "{}".to_string()).await
    }

    /// `GET /block?height=H` with the given header time.
    pub async fn block(&mut self, height: u64, time: &str) -> &mut Self {
        let body = json!({"result": {"block": {"header": {"height": height.to_string(), "time": time}}}});
        self.json_mock("/block", Matcher::UrlEncoded("height".into(), height.to_string()), 200, body.to_string())
            .await
    }

    /// Active proposals (`proposal_status=2`).
    pub async fn proposals(&mut self, proposals: Vec<Value>) -> &mut Self {
        let body = json!({"proposals": proposals, "pagination": {"next_key": null, "total": "0"}});
        self.json_mock(
            "/cosmos/gov/v1beta1/proposals",
            Matcher::UrlEncoded("proposal_status".into(), "2".into()),
            200,
            body.to_string(),
        )
        .await
    }

    pub async fn proposals_failure(&mut self, status: usize) -> &mut Self {
        self.json_mock("/cosmos/gov/v1beta1/proposals", Matcher::Any, status, "{}".to_string()).await
    }

    /// `GET /cosmos/upgrade/v1beta1/current_plan`; `None` serves `{"plan": null}`.
    pub async fn current_plan(&mut self, plan: Option<Value>) -> &mut Self {
        let body = json!({ "plan": plan });
        self.json_mock("/cosmos/upgrade/v1beta1/current_plan", Matcher::Any, 200, body.to_string()).await
    }

    pub async fn current_plan_failure(&mut self, status: usize) -> &mut Self {
        self.json_mock("/cosmos/upgrade/v1beta1/current_plan", Matcher::Any, status, "{}".to_string()).await
    }

    /// GitHub tag listing for `owner/repo`, a single page.
    pub async fn tags(&mut self, owner: &str, repo: &str, tags: &[&str]) -> &mut Self {
        let body: Vec<Value> = tags.iter().map(|t| json!({"name": t})).collect();
        self.json_mock(&format!("/repos/{owner}/{repo}/tags"), Matcher::Any, 200, Value::from(body).to_string())
            .await
    }

    /// A healthy node at `height` with no governance activity.
    pub async fn quiet_node(&mut self, height: u64) -> &mut Self {
        self.health(200).await;
        self.status(height).await;
        self.proposals(Vec::new()).await;
        self.current_plan(None).await
    }
}
