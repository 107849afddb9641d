//! Error hierarchy for mr-digest.
//!
//! Only [`ConfigError`] is fatal to the process. Remote and delivery
//! failures are scoped to one notification target and logged by the
//! notifier.

use chat_webhook::DeliveryError;
use git_provider::{GitProviderError, RemoteError};
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type DigestResult<T> = Result<T, DigestError>;

/// Root error type for the mr-digest crate.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Malformed or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Any hosting API call failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Webhook post failure.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Configuration load and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for the expected shape.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A field holds a value outside what the notifier accepts.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// The GitLab client could not be constructed.
    #[error("cannot build gitlab client: {0}")]
    Client(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<GitProviderError> for DigestError {
    fn from(e: GitProviderError) -> Self {
        match e {
            GitProviderError::Remote(r) => DigestError::Remote(r),
            GitProviderError::Config(c) => DigestError::Config(ConfigError::Client(c.to_string())),
        }
    }
}
