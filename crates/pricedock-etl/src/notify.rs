// Run outcome notification
//
// Notifier failures are reported to the caller as NotifyError so they can be
// logged; the pipeline never turns them into a run failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EtlConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification rejected with HTTP status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes reports to the log; used when no delivery channel is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject, "Run report\n{}", body);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// POSTs `{"subject": ..., "body": ...}` as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { subject, body })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(subject, "Run report delivered");
        Ok(())
    }
}

/// Webhook notifier when configured, otherwise the log notifier
pub fn notifier_from_config(config: &EtlConfig) -> Box<dyn Notifier> {
    let Some(url) = config.notify_webhook.as_deref() else {
        warn!("No notification webhook configured; run reports go to the log only");
        return Box::new(LogNotifier);
    };

    match WebhookNotifier::new(url, config.feed.timeout()) {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            warn!(error = %e, "Webhook notifier unavailable; falling back to log");
            Box::new(LogNotifier)
        },
    }
}
