use crate::error::AlertError;
use crate::AlertRule;
use idxmon_common::context::RuleContext;
use idxmon_common::types::Notification;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A rule whose evaluation failed during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub rule_id: String,
    pub rule_name: String,
    pub error: AlertError,
}

/// Aggregate result of one evaluation tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Notifications from every triggered rule, in rule order and then in
    /// each rule's own order.
    pub notifications: Vec<Notification>,
    pub failures: Vec<RuleFailure>,
    /// Number of enabled rules that were evaluated (including failures).
    pub evaluated: usize,
    /// Number of rules that returned a triggered result.
    pub triggered: usize,
}

impl TickOutcome {
    pub fn is_quiet(&self) -> bool {
        self.notifications.is_empty() && self.failures.is_empty()
    }
}

pub struct RuleEngine {
    rules: Vec<Box<dyn AlertRule>>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn AlertRule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn AlertRule>] {
        &self.rules
    }

    /// Get a rule by its ID.
    pub fn get_rule(&self, id: &str) -> Option<&dyn AlertRule> {
        self.rules.iter().find(|r| r.id() == id).map(|r| r.as_ref())
    }

    /// Append a rule at the end of the evaluation order.
    pub fn add_rule(&mut self, rule: Box<dyn AlertRule>) {
        self.rules.push(rule);
    }

    /// Remove a rule by ID. Returns true if found and removed.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let len_before = self.rules.len();
        self.rules.retain(|r| r.id() != id);
        self.rules.len() < len_before
    }

    /// Replace all rules with a new set.
    pub fn replace_rules(&mut self, rules: Vec<Box<dyn AlertRule>>) {
        self.rules = rules;
    }

    /// Evaluates every enabled rule against `ctx`.
    ///
    /// A rule that returns an error or panics is reported in
    /// [`TickOutcome::failures`] and contributes nothing; the remaining
    /// rules still run.
    pub fn evaluate(&self, ctx: &RuleContext) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for rule in &self.rules {
            if !rule.enabled() {
                continue;
            }
            outcome.evaluated += 1;

            let evaluated = catch_unwind(AssertUnwindSafe(|| rule.evaluate(ctx)))
                .unwrap_or_else(|payload| {
                    Err(AlertError::Panicked {
                        rule_id: rule.id().to_string(),
                        reason: panic_reason(&*payload),
                    })
                });

            match evaluated {
                Ok(result) => {
                    if !result.triggered() {
                        continue;
                    }
                    outcome.triggered += 1;
                    tracing::debug!(
                        rule_id = rule.id(),
                        count = result.notifications().len(),
                        "Rule triggered"
                    );
                    outcome.notifications.extend(result.into_notifications());
                }
                Err(error) => {
                    tracing::error!(
                        rule_id = rule.id(),
                        rule_name = rule.name(),
                        error = %error,
                        "Rule evaluation failed"
                    );
                    outcome.failures.push(RuleFailure {
                        rule_id: rule.id().to_string(),
                        rule_name: rule.name().to_string(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
