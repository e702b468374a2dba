use crate::error::NotifyError;
use crate::routing::route_batch;
use crate::{BatchSummaries, NotificationChannel};
use idxmon_common::types::Notification;
use std::sync::Arc;
use std::time::Duration;

/// A channel whose delivery failed during one dispatch.
#[derive(Debug)]
pub struct ChannelFailure {
    pub channel_id: String,
    pub channel_name: String,
    pub error: NotifyError,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Ids of channels that accepted their batch.
    pub delivered: Vec<String>,
    pub failures: Vec<ChannelFailure>,
    /// Ids of disabled channels, which were not called.
    pub skipped: Vec<String>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delivers notification batches to every enabled channel.
///
/// Each channel runs as its own task, so one channel's error, panic, or
/// timeout never affects the others. The dispatcher does not retry.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    timeout: Option<Duration>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            timeout: None,
        }
    }

    /// Abandon a channel's delivery after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn channels(&self) -> &[Arc<dyn NotificationChannel>] {
        &self.channels
    }

    pub fn replace_channels(&mut self, channels: Vec<Arc<dyn NotificationChannel>>) {
        self.channels = channels;
    }

    /// Sends `batch` to every enabled channel whose minimum severity lets at
    /// least one notification through.
    pub async fn dispatch(
        &self,
        batch: &[Notification],
        summaries: Option<BatchSummaries>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if batch.is_empty() {
            return report;
        }

        let summaries = summaries.map(Arc::new);
        let mut handles = Vec::new();

        for channel in &self.channels {
            if !channel.enabled() {
                report.skipped.push(channel.id().to_string());
                continue;
            }

            let routed = route_batch(channel.min_severity(), batch);
            if routed.is_empty() {
                continue;
            }

            let channel = channel.clone();
            let summaries = summaries.clone();
            let timeout = self.timeout;
            let task_channel = channel.clone();
            let handle = tokio::spawn(async move {
                let send = task_channel.send_batch(&routed, summaries.as_deref());
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, send)
                        .await
                        .unwrap_or(Err(NotifyError::Timeout(limit))),
                    None => send.await,
                }
            });
            handles.push((channel, handle));
        }

        for (channel, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(NotifyError::Other(format!(
                    "channel task aborted: {join_err}"
                ))),
            };
            match result {
                Ok(()) => {
                    tracing::debug!(channel = channel.id(), "Batch delivered");
                    report.delivered.push(channel.id().to_string());
                }
                Err(error) => {
                    tracing::error!(
                        channel = channel.id(),
                        channel_type = channel.channel_type(),
                        error = %error,
                        "Failed to send notification batch"
                    );
                    report.failures.push(ChannelFailure {
                        channel_id: channel.id().to_string(),
                        channel_name: channel.name().to_string(),
                        error,
                    });
                }
            }
        }

        report
    }
}
