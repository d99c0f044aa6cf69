use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, trace, warn};

use crate::upstream::UpstreamError;

/// Longest response body kept in an [`UpstreamError::HttpError`].
const MAX_ERROR_BODY_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Requests allowed in flight at once across the whole process
    pub concurrent_limit: usize,
    /// How long a caller may wait for a free slot
    pub permit_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Community endpoints frequently run with self-signed or expired certificates
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 256,
            permit_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            accept_invalid_certs: true,
            user_agent: concat!("upgrade-watch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared GET client for chain nodes, the chain registry and the tag API.
///
/// In-flight requests are capped by a semaphore. Every call carries its own timeout and
/// waiting for a slot is bounded too, so no call can block indefinitely.
pub struct HttpClient {
    client: Client,
    permits: Arc<Semaphore>,
    permit_timeout: Duration,
}

/// Holds a request slot for the lifetime of one call.
struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    permits: Arc<Semaphore>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        trace!(free_slots = self.permits.available_permits(), "request slot released");
    }
}

impl HttpClient {
    /// # Errors
    ///
    /// [`UpstreamError::ConnectionFailed`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// # Errors
    ///
    /// [`UpstreamError::ConnectionFailed`] if the TLS backend cannot be initialised.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(3))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| {
                error!(error = %e, "could not build HTTP client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.concurrent_limit.max(1))),
            permit_timeout: Duration::from_millis(config.permit_timeout_ms),
        })
    }

    /// Transport failure without host, port or path details.
    fn describe_transport_error(e: &reqwest::Error) -> &'static str {
        match () {
            () if e.is_connect() => "connection refused or unreachable",
            () if e.is_timeout() => "timed out",
            () if e.is_redirect() => "redirect limit exceeded",
            () if e.is_body() || e.is_decode() => "failed to read response body",
            () if e.is_request() => "request could not be sent",
            () => "network error",
        }
    }

    fn transport_error(e: &reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::ConnectionFailed(Self::describe_transport_error(e).to_string())
        }
    }

    async fn reserve_slot(&self, url: &str) -> Result<SlotGuard, UpstreamError> {
        let waiting = Arc::clone(&self.permits).acquire_owned();
        let permit = match tokio::time::timeout(self.permit_timeout, waiting).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(UpstreamError::ConcurrencyLimit(url.to_string())),
            Err(_elapsed) => {
                warn!(url, free_slots = self.permits.available_permits(), "timed out waiting for a request slot");
                return Err(UpstreamError::Timeout);
            }
        };

        Ok(SlotGuard { _permit: permit, permits: Arc::clone(&self.permits) })
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<(SlotGuard, Response), UpstreamError> {
        let slot = self.reserve_slot(url).await?;
        let response = request.send().await.map_err(|e| Self::transport_error(&e))?;
        Ok((slot, response))
    }

    /// Status code of a GET; the body is never read.
    ///
    /// # Errors
    ///
    /// [`UpstreamError::Timeout`] or [`UpstreamError::ConnectionFailed`] when no response
    /// arrived.
    pub async fn get_status(&self, url: &str, timeout: Duration) -> Result<StatusCode, UpstreamError> {
        let (_slot, response) = self.send(url, self.client.get(url).timeout(timeout)).await?;
        Ok(response.status())
    }

    /// GET and parse the body as JSON.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::HttpError`] for non-2xx statuses, with the body cut to 256 bytes
    /// - [`UpstreamError::InvalidResponse`] when the body is not JSON
    /// - [`UpstreamError::Timeout`] / [`UpstreamError::ConnectionFailed`] for transport failures
    pub async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, UpstreamError> {
        self.get_json_with_headers(url, &[], timeout).await
    }

    /// [`HttpClient::get_json`] with extra request headers.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::get_json`].
    pub async fn get_json_with_headers(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Value, UpstreamError> {
        let request = headers
            .iter()
            .fold(self.client.get(url).timeout(timeout), |request, (name, value)| {
                request.header(*name, value.as_str())
            });
        let (_slot, response) = self.send(url, request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            trace!(url, status = status.as_u16(), "non-success response");
            return Err(UpstreamError::HttpError(status.as_u16(), truncate_body(body)));
        }

        let bytes = response.bytes().await.map_err(|e| Self::transport_error(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::InvalidResponse(format!("malformed JSON: {e}")))
    }

    #[cfg(test)]
    fn free_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Cuts a response body down to [`MAX_ERROR_BODY_LEN`] bytes on a char boundary.
fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body;
    }

    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}
