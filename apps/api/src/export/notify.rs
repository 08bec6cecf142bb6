//! Completion notifications. Best effort: a failed notification is logged
//! and never changes the export's status.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionNotice {
    pub export_id: Uuid,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn export_ready(&self, notice: &CompletionNotice) -> Result<(), NotifyError>;
}

/// POSTs the notice as JSON to a configured URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn export_ready(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notice).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        debug!(export_id = %notice.export_id, "Completion webhook delivered");
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn export_ready(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        debug!(export_id = %notice.export_id, "Notifications disabled; skipping");
        Ok(())
    }
}

/// Fires the notification on a detached task.
pub fn notify_in_background(notifier: Arc<dyn Notifier>, notice: CompletionNotice) {
    tokio::spawn(async move {
        if let Err(e) = notifier.export_ready(&notice).await {
            warn!(export_id = %notice.export_id, "Completion notification failed: {e}");
        }
    });
}
