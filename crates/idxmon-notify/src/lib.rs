//! Notification delivery with pluggable channel support.
//!
//! Each tick's notification batch is handed to the
//! [`dispatcher::NotificationDispatcher`], which delivers it to every
//! enabled [`NotificationChannel`] independently. Built-in channels are a
//! messaging webhook, a push service, and a log sink; new ones plug in
//! through [`plugin::ChannelRegistry`].

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod routing;
pub mod summary;
pub mod utils;


use async_trait::async_trait;
use error::{NotifyError, Result};
use idxmon_common::types::{Notification, Severity};
use std::collections::HashMap;

/// Grouping key (rule type) to human-readable digest line.
pub type BatchSummaries = HashMap<String, String>;

/// Definition fields shared by every channel instance.
#[derive(Debug, Clone)]
pub struct ChannelMeta {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub min_severity: Severity,
}

impl ChannelMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            min_severity: Severity::Info,
        }
    }

    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A delivery sink for notifications (e.g., chat webhook, push service).
///
/// Each channel owns its retry policy. Whether `send_batch` makes one
/// physical call or many is up to the implementation.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn meta(&self) -> &ChannelMeta;

    /// Returns the channel type name (e.g., `"webhook"`, `"push"`).
    fn channel_type(&self) -> &str;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn enabled(&self) -> bool {
        self.meta().enabled
    }

    fn min_severity(&self) -> Severity {
        self.meta().min_severity
    }

    /// Delivers exactly one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after the channel's own retries.
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Delivers a group of notifications. `summaries` maps a grouping key to
    /// a digest line for channels that compress repeated alerts.
    ///
    /// The default sends each notification in turn via [`send_each`].
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::BatchFailed`] if any notification failed.
    async fn send_batch(
        &self,
        notifications: &[Notification],
        _summaries: Option<&BatchSummaries>,
    ) -> Result<()> {
        send_each(self, notifications).await
    }
}

/// Sends each notification through `channel.send`, attempting all of them
/// even after a failure.
///
/// # Errors
///
/// Returns [`NotifyError::BatchFailed`] if any notification failed.
pub async fn send_each<C>(channel: &C, notifications: &[Notification]) -> Result<()>
where
    C: NotificationChannel + ?Sized,
{
    let mut failed = 0usize;
    let mut first_error = None;
    for notification in notifications {
        if let Err(e) = channel.send(notification).await {
            failed += 1;
            first_error.get_or_insert_with(|| e.to_string());
        }
    }
    match first_error {
        None => Ok(()),
        Some(first_error) => Err(NotifyError::BatchFailed {
            failed,
            total: notifications.len(),
            first_error,
        }),
    }
}
