use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::utils::send_with_retry;
use crate::{ChannelMeta, NotificationChannel};
use async_trait::async_trait;
use idxmon_common::types::{Notification, Severity};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Push notification service in the ntfy style: the body is the message,
/// title and priority travel as headers. One push per notification.
pub struct PushChannel {
    meta: ChannelMeta,
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl PushChannel {
    pub fn new(meta: ChannelMeta, url: &str, token: Option<String>) -> Self {
        Self {
            meta,
            client: reqwest::Client::new(),
            url: url.to_string(),
            token,
        }
    }

    fn priority(severity: Severity) -> &'static str {
        match severity {
            Severity::Info => "default",
            Severity::Warning => "high",
            Severity::Critical => "urgent",
        }
    }

    fn title(notification: &Notification) -> String {
        format!("[{}] {}", notification.severity, notification.rule_name)
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    fn meta(&self) -> &ChannelMeta {
        &self.meta
    }

    fn channel_type(&self) -> &str {
        "push"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let title = Self::title(notification);
        let priority = Self::priority(notification.severity);
        send_with_retry("push", || {
            let mut req = self
                .client
                .post(&self.url)
                .header("Title", title.as_str())
                .header("Priority", priority)
                .header("Tags", notification.rule_type.as_str())
                .body(notification.message.clone());
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }
            req
        })
        .await
    }
}

// Plugin

#[derive(Deserialize)]
struct PushConfig {
    url: String,
    token: Option<String>,
}

pub struct PushPlugin;

impl ChannelPlugin for PushPlugin {
    fn name(&self) -> &str {
        "push"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<PushConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("push: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        meta: ChannelMeta,
        config: &Value,
    ) -> Result<Arc<dyn NotificationChannel>> {
        let cfg: PushConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("push: {e}")))?;
        Ok(Arc::new(PushChannel::new(meta, &cfg.url, cfg.token)))
    }
}
