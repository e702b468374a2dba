use crate::error::Result;
use crate::plugin::ChannelPlugin;
use crate::summary::sorted_lines;
use crate::{BatchSummaries, ChannelMeta, NotificationChannel};
use async_trait::async_trait;
use idxmon_common::types::{Notification, Severity};
use serde_json::Value;
use std::sync::Arc;

/// Writes notifications to the process log. Never fails.
pub struct LogChannel {
    meta: ChannelMeta,
}

impl LogChannel {
    pub fn new(meta: ChannelMeta) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn meta(&self) -> &ChannelMeta {
        &self.meta
    }

    fn channel_type(&self) -> &str {
        "log"
    }

    async fn send(&self, n: &Notification) -> Result<()> {
        match n.severity {
            Severity::Info => tracing::info!(
                channel = %self.meta.id,
                rule_id = %n.rule_id,
                subject = %n.subject,
                "{}",
                n.message
            ),
            Severity::Warning => tracing::warn!(
                channel = %self.meta.id,
                rule_id = %n.rule_id,
                subject = %n.subject,
                "{}",
                n.message
            ),
            Severity::Critical => tracing::error!(
                channel = %self.meta.id,
                rule_id = %n.rule_id,
                subject = %n.subject,
                "{}",
                n.message
            ),
        }
        Ok(())
    }

    async fn send_batch(
        &self,
        notifications: &[Notification],
        summaries: Option<&BatchSummaries>,
    ) -> Result<()> {
        if let Some(summaries) = summaries {
            for line in sorted_lines(summaries) {
                tracing::info!(channel = %self.meta.id, "{line}");
            }
        }
        for n in notifications {
            self.send(n).await?;
        }
        Ok(())
    }
}

// Plugin

pub struct LogPlugin;

impl ChannelPlugin for LogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    fn validate_config(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn create_channel(
        &self,
        meta: ChannelMeta,
        _config: &Value,
    ) -> Result<Arc<dyn NotificationChannel>> {
        Ok(Arc::new(LogChannel::new(meta)))
    }
}
