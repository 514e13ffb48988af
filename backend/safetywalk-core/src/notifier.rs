// src/notifier.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::pending_extractor::PendencyReport;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid webhook URL: {0}")]
    InvalidTarget(String),
    #[error("Failed to send notification: {0}")]
    SendError(String),
}

/// An outgoing chat alert: the text plus the user IDs to @-mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub content: String,
    pub mentions: Vec<String>,
}

#[async_trait]
pub trait Notifier {
    async fn send_notification(&self, alert: &Alert) -> Result<(), NotificationError>;
}

/// Builds the reminder text for a week with pending leads.
pub fn compose_message(report: &PendencyReport, pillar: &str) -> String {
    format!(
        "⚠️ **{pillar} Pendente**\n\n\
         📅 Período: {week}\n\
         ❗ {count} nomes não realizaram:\n\n\
         {list}\n\n\
         Por favor, regularizar até o dia {due}!",
        pillar = pillar,
        week = report.week_label,
        count = report.count(),
        list = report.pending.join("\n"),
        due = report.due_date_label(),
    )
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    format: u8,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mentioned_list: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    tag: &'static str,
    text: TextBody<'a>,
}

impl<'a> TextMessage<'a> {
    fn new(alert: &'a Alert) -> Self {
        Self {
            tag: "text",
            text: TextBody {
                format: 1,
                content: &alert.content,
                mentioned_list: if alert.mentions.is_empty() {
                    None
                } else {
                    Some(&alert.mentions)
                },
            },
        }
    }
}

//=============================================================================
// Group chat webhook
//=============================================================================

/// Posts `{"tag": "text", ...}` messages to a group chat bot webhook.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, NotificationError> {
        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(NotificationError::InvalidTarget(webhook_url.to_string()));
        }
        url::Url::parse(webhook_url).map_err(|e| NotificationError::InvalidTarget(format!("{}: {}", webhook_url, e)))?;
        Ok(Self {
            client: Client::new(),
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_notification(&self, alert: &Alert) -> Result<(), NotificationError> {
        let payload = TextMessage::new(alert);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            error!("Webhook error: {} - {}", status, body);
            return Err(NotificationError::SendError(format!("Webhook error: {} - {}", status, body)));
        }

        info!("Webhook delivered ({} mentions)", alert.mentions.len());
        Ok(())
    }
}
