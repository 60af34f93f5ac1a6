use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::NotificationsConfig;
use crate::models::AlertReason;
use crate::utils::error::{AppError, Result};

/// Wire payload for the outbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertPayload {
    pub title: String,
    pub url: String,
    pub signal_value: f64,
    pub reason: AlertReason,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Suppressed,
}

/// Outbound alert channel. The pipeline decides *whether* to alert (ledger
/// check); implementations only deliver.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, payload: &AlertPayload) -> Result<()>;
}

pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
}

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

impl WebhookNotifier {
    pub fn new(config: &NotificationsConfig) -> Self {
        WebhookNotifier {
            client: Client::new(),
            webhook_url: config.webhook_url.clone(),
        }
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn send(&self, payload: &AlertPayload) -> Result<()> {
        let Some(webhook_url) = &self.webhook_url else {
            return Err(AppError::Notify("no webhook URL configured".to_string()));
        };

        let response = self
            .client
            .post(webhook_url)
            .timeout(SEND_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Notify(format!("webhook unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Notify(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
