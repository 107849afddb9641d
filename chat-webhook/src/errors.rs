use thiserror::Error;

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Why a webhook message did not arrive.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The webhook answered with a non-2xx status.
    #[error("webhook rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Timeout at transport level.
    #[error("webhook timeout")]
    Timeout,

    /// DNS/connect/reset or any other transport failure.
    #[error("webhook transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return DeliveryError::Timeout;
        }
        DeliveryError::Transport(e.to_string())
    }
}
