use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::summary::sorted_lines;
use crate::utils::send_with_retry;
use crate::{send_each, BatchSummaries, ChannelMeta, NotificationChannel};
use async_trait::async_trait;
use idxmon_common::types::Notification;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Chat-style messaging webhook (Slack, Mattermost, Discord...).
///
/// Posts `{"<text_field>": "<message>"}`. With batch summaries, a whole
/// batch collapses into a single digest post.
pub struct WebhookChannel {
    meta: ChannelMeta,
    client: reqwest::Client,
    url: String,
    text_field: String,
    username: Option<String>,
}

impl WebhookChannel {
    pub fn new(meta: ChannelMeta, url: &str, text_field: &str, username: Option<String>) -> Self {
        Self {
            meta,
            client: reqwest::Client::new(),
            url: url.to_string(),
            text_field: text_field.to_string(),
            username,
        }
    }

    pub(crate) fn format_message(notification: &Notification) -> String {
        format!(
            "[{severity}] {rule}: {message}",
            severity = notification.severity,
            rule = notification.rule_name,
            message = notification.message,
        )
    }

    pub(crate) fn format_digest(
        notifications: &[Notification],
        summaries: &BatchSummaries,
    ) -> String {
        let mut text = format!("idxmon: {} notifications", notifications.len());
        for line in sorted_lines(summaries) {
            text.push_str("\n• ");
            text.push_str(line);
        }
        for notification in notifications {
            text.push('\n');
            text.push_str(&Self::format_message(notification));
        }
        text
    }

    fn payload(&self, text: String) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(self.text_field.clone(), Value::String(text));
        if let Some(username) = &self.username {
            body.insert("username".to_string(), Value::String(username.clone()));
        }
        Value::Object(body)
    }

    async fn post(&self, text: String) -> Result<()> {
        let payload = self.payload(text);
        send_with_retry("webhook", || self.client.post(&self.url).json(&payload)).await
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn meta(&self) -> &ChannelMeta {
        &self.meta
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        self.post(Self::format_message(notification)).await
    }

    async fn send_batch(
        &self,
        notifications: &[Notification],
        summaries: Option<&BatchSummaries>,
    ) -> Result<()> {
        match summaries {
            Some(summaries) if !summaries.is_empty() => {
                self.post(Self::format_digest(notifications, summaries)).await
            }
            _ => send_each(self, notifications).await,
        }
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    #[serde(default = "default_text_field")]
    text_field: String,
    username: Option<String>,
}

fn default_text_field() -> String {
    "text".to_string()
}

pub struct WebhookPlugin;

impl WebhookPlugin {
    fn parse(config: &Value) -> Result<WebhookConfig> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        if !cfg.url.starts_with("http://") && !cfg.url.starts_with("https://") {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook: url must be http(s), got '{}'",
                cfg.url
            )));
        }
        Ok(cfg)
    }
}

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        Self::parse(config).map(|_| ())
    }

    fn create_channel(
        &self,
        meta: ChannelMeta,
        config: &Value,
    ) -> Result<Arc<dyn NotificationChannel>> {
        let cfg = Self::parse(config)?;
        Ok(Arc::new(WebhookChannel::new(
            meta,
            &cfg.url,
            &cfg.text_field,
            cfg.username,
        )))
    }
}
