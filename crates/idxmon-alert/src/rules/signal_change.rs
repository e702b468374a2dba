use super::SIGNAL_CHANGE;
use crate::error::AlertError;
use crate::{AlertRule, RuleMeta, RuleResult};
use idxmon_common::context::RuleContext;
use idxmon_common::types::{NotificationSubject, Severity};
use std::collections::HashSet;

/// Curation signal on an allocated deployment moved by more than
/// `rate_threshold` percent since the previous tick.
///
/// Reported once per deployment per tick, against the first allocation on
/// that deployment with a prior signal value. The prior value comes from the
/// same allocation, or from any previous allocation on the deployment. A
/// deployment seen for the first time never fires.
#[derive(Debug, Clone)]
pub struct SignalChangeRule {
    meta: RuleMeta,
    rate_threshold: f64,
}

impl SignalChangeRule {
    pub fn new(meta: RuleMeta, rate_threshold: f64) -> Result<Self, AlertError> {
        if !rate_threshold.is_finite() || rate_threshold <= 0.0 {
            return Err(meta.invalid(format!(
                "rate_threshold must be a positive percentage, got {rate_threshold}"
            )));
        }
        Ok(Self {
            meta,
            rate_threshold,
        })
    }
}

impl AlertRule for SignalChangeRule {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn rule_type(&self) -> &'static str {
        SIGNAL_CHANGE
    }

    fn enabled(&self) -> bool {
        self.meta.enabled
    }

    fn severity(&self) -> Severity {
        self.meta.severity
    }

    fn evaluate(&self, ctx: &RuleContext) -> Result<RuleResult, AlertError> {
        let mut seen = HashSet::new();
        let mut notifications = Vec::new();

        for allocation in ctx.allocations().iter().filter(|a| a.is_active()) {
            if seen.contains(allocation.deployment.as_str()) {
                continue;
            }
            // Signal belongs to the deployment, so a newly opened allocation
            // can borrow the prior value of another one on the same deployment.
            let Some(prev) = ctx.previous().allocation(&allocation.id).or_else(|| {
                ctx.previous()
                    .allocations()
                    .iter()
                    .find(|p| p.deployment == allocation.deployment)
            }) else {
                continue;
            };
            seen.insert(allocation.deployment.as_str());
            if prev.signalled_tokens.abs() < f64::EPSILON {
                continue;
            }

            let delta = allocation.signalled_tokens - prev.signalled_tokens;
            let rate = delta / prev.signalled_tokens * 100.0;
            if rate.abs() <= self.rate_threshold {
                continue;
            }

            notifications.push(self.meta.notification(
                SIGNAL_CHANGE,
                self.meta.severity,
                NotificationSubject::for_allocation(allocation),
                format!(
                    "Signal on {} changed by {:.1}% ({:.0} -> {:.0} GRT, threshold {:.1}%)",
                    allocation.deployment,
                    rate,
                    prev.signalled_tokens,
                    allocation.signalled_tokens,
                    self.rate_threshold
                ),
                ctx.evaluated_at(),
            ));
        }

        Ok(RuleResult::from_notifications(notifications))
    }
}
