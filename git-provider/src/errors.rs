//! Crate-wide error hierarchy for git-provider.

use thiserror::Error;

/// Convenient alias for results of remote API calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Convenient alias for crate-wide results.
pub type GitProviderResult<T> = Result<T, GitProviderError>;

/// Root error type for the git-provider crate.
#[derive(Debug, Error)]
pub enum GitProviderError {
    /// Remote API call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Client could not be built from the given settings.
    #[error(transparent)]
    Config(#[from] ClientConfigError),
}

/// Failure of a single call against the hosting API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404). Returned by `get_project` for deleted projects.
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors (base API URL, missing token, etc.).
#[derive(Debug, Error)]
pub enum ClientConfigError {
    /// Missing required provider access token.
    #[error("missing provider token")]
    MissingToken,

    /// Invalid base API URL.
    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be built.
    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

impl RemoteError {
    /// True when the resource is gone rather than the call failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }
}

// ===== Mapping from reqwest::Error into RemoteError =====

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return RemoteError::Timeout;
        }

        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => RemoteError::Unauthorized,
                403 => RemoteError::Forbidden,
                404 => RemoteError::NotFound,
                429 => RemoteError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => RemoteError::Server(code),
                _ => RemoteError::HttpStatus(code),
            };
        }

        if e.is_decode() {
            return RemoteError::InvalidResponse(e.to_string());
        }

        RemoteError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for GitProviderError {
    fn from(e: reqwest::Error) -> Self {
        GitProviderError::Remote(RemoteError::from(e))
    }
}
