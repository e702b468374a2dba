//! Rule evaluation engine for indexer allocations.
//!
//! Each tick the [`engine::RuleEngine`] hands one shared
//! [`RuleContext`] to every enabled [`AlertRule`] in configured order and
//! concatenates the resulting notifications into a single batch. The
//! [`tracker::SnapshotTracker`] keeps the previous tick's snapshot so rules
//! can diff against it. Built-in rule types cover allocation expiry, APR
//! thresholds, allocation status changes, and deployment signal changes.

pub mod engine;
pub mod error;
pub mod rules;
pub mod tracker;


use chrono::{DateTime, Utc};
use error::AlertError;
use idxmon_common::context::RuleContext;
use idxmon_common::types::{Notification, NotificationSubject, Severity};

/// A policy evaluated once per tick against the current [`RuleContext`].
///
/// Evaluation is synchronous and takes the context by shared reference.
/// Re-alerting policy (edge vs. level triggered) belongs to each rule's own
/// configuration, not to the engine.
pub trait AlertRule: Send + Sync {
    /// Unique identifier for this rule instance (e.g., `"apr-low"`).
    fn id(&self) -> &str;

    /// Human-readable name for this rule (e.g., `"APR below 5%"`).
    fn name(&self) -> &str;

    /// Type tag shared by every instance of the rule (e.g., `"apr_threshold"`).
    fn rule_type(&self) -> &'static str;

    /// Disabled rules are never evaluated by the engine.
    fn enabled(&self) -> bool;

    /// The severity level assigned to notifications produced by this rule.
    fn severity(&self) -> Severity;

    /// Evaluates the context and returns the notifications this rule raises.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Evaluation`] when the snapshot cannot be
    /// evaluated (e.g., inconsistent network figures). The engine contains
    /// the failure to this rule for the current tick.
    fn evaluate(&self, ctx: &RuleContext) -> Result<RuleResult, AlertError>;
}

/// Output of one rule evaluation.
///
/// `triggered` is derived from the notification list, so an untriggered
/// result never carries notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleResult {
    triggered: bool,
    notifications: Vec<Notification>,
}

impl RuleResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_notifications(notifications: Vec<Notification>) -> Self {
        Self {
            triggered: !notifications.is_empty(),
            notifications,
        }
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        self.notifications
    }
}

/// Definition fields shared by every built-in rule.
#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub severity: Severity,
}

impl RuleMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            severity,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Builds a notification attributed to this rule.
    pub fn notification(
        &self,
        rule_type: &str,
        severity: Severity,
        subject: NotificationSubject,
        message: String,
        now: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: idxmon_common::id::next_id(),
            severity,
            subject,
            message,
            timestamp: now,
            rule_id: self.id.clone(),
            rule_name: self.name.clone(),
            rule_type: rule_type.to_string(),
        }
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> AlertError {
        AlertError::InvalidConfig {
            rule_id: self.id.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn evaluation_failed(&self, reason: impl Into<String>) -> AlertError {
        AlertError::Evaluation {
            rule_id: self.id.clone(),
            reason: reason.into(),
        }
    }
}
