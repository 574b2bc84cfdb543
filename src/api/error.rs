//! Error type for catalog action calls.

/// A failed call against one catalog action.
///
/// `status` is the HTTP status the server answered with, or `0` when the request
/// never produced a response (connection refused, DNS, TLS, timeout, or a local
/// precondition that stopped the call from being sent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{action} failed with status {status}: {message}")]
pub struct CatalogError {
    pub status: u16,
    pub action: String,
    pub message: String,
}

impl CatalogError {
    pub fn new(status: u16, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            action: action.into(),
            message: message.into(),
        }
    }

    /// Error for a request that failed before any response arrived
    pub fn transport(action: impl Into<String>, error: &reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16()).unwrap_or(0);
        Self::new(status, action, error.to_string())
    }

    /// Error for a call that was never sent because its inputs were unusable
    pub fn precondition(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(0, action, message)
    }

    /// Error for a successful response whose `result` did not have the expected shape
    pub fn invalid_result(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(200, action, message)
    }

    /// Error for a call that needs an API key on a Context without one
    pub fn missing_api_key(action: impl Into<String>) -> Self {
        Self::new(401, action, "no API key configured for this catalog instance")
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_transport(&self) -> bool {
        self.status == 0
    }
}

/// Result type for catalog calls.
pub type Result<T> = std::result::Result<T, CatalogError>;
