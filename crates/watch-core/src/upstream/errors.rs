use thiserror::Error;

/// Errors that can occur when talking to a chain endpoint or to GitHub.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx status code.
    ///
    /// First field is the HTTP status code, second is the (truncated) response body.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// Response body could not be parsed or did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Maximum concurrent requests limit has been reached.
    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl UpstreamError {
    /// HTTP status code, when the endpoint answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError(status, _) => Some(*status),
            _ => None,
        }
    }

    /// `true` for a 501 answer, which Cosmos nodes use for "query not served here".
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        self.status() == Some(501)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }
}
