//! Slack incoming-webhook client.
//!
//! A message is a single JSON object `{"text": "..."}` POSTed to the webhook
//! URL. Failures are reported once; nothing is retried here.

mod errors;

pub use errors::{DeliveryError, DeliveryResult};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

/// Longest response body kept in a [`DeliveryError::Rejected`].
const BODY_SNIPPET_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct SlackWebhookClient {
    http: Client,
}

impl SlackWebhookClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Posts `text` to `webhook_url`.
    pub async fn post_message(&self, webhook_url: &str, text: &str) -> DeliveryResult<()> {
        debug!(chars = text.len(), "posting webhook message");

        let resp = self
            .http
            .post(webhook_url)
            .json(&WebhookMessage { text })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "webhook rejected message");
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: snippet(&body),
        })
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_LIMIT) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
