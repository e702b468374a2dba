use super::ALLOCATION_STATUS;
use crate::error::AlertError;
use crate::{AlertRule, RuleMeta, RuleResult};
use idxmon_common::context::RuleContext;
use idxmon_common::types::{NotificationSubject, Severity};
use std::collections::HashSet;

/// Allocation state changes between two ticks.
///
/// Reports allocations that were opened, closed, or that disappeared from
/// the snapshot while active. Openings are not reported on the first tick,
/// where every allocation would otherwise look new.
#[derive(Debug, Clone)]
pub struct AllocationStatusRule {
    meta: RuleMeta,
    notify_opened: bool,
    notify_closed: bool,
}

impl AllocationStatusRule {
    pub fn new(
        meta: RuleMeta,
        notify_opened: bool,
        notify_closed: bool,
    ) -> Result<Self, AlertError> {
        if !notify_opened && !notify_closed {
            return Err(meta.invalid("at least one of notify_opened / notify_closed must be set"));
        }
        Ok(Self {
            meta,
            notify_opened,
            notify_closed,
        })
    }
}

impl AlertRule for AllocationStatusRule {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn rule_type(&self) -> &'static str {
        ALLOCATION_STATUS
    }

    fn enabled(&self) -> bool {
        self.meta.enabled
    }

    fn severity(&self) -> Severity {
        self.meta.severity
    }

    fn evaluate(&self, ctx: &RuleContext) -> Result<RuleResult, AlertError> {
        // An empty snapshot is treated as missing data, not as every
        // allocation vanishing at once.
        if ctx.allocations().is_empty() {
            return Ok(RuleResult::none());
        }

        let previous = ctx.previous();
        let first_tick = previous.network().is_none() && previous.is_empty();
        let now = ctx.evaluated_at();
        let mut notifications = Vec::new();

        for allocation in ctx.allocations() {
            match previous.allocation(&allocation.id) {
                None if self.notify_opened && !first_tick && allocation.is_active() => {
                    notifications.push(self.meta.notification(
                        ALLOCATION_STATUS,
                        self.meta.severity,
                        NotificationSubject::for_allocation(allocation),
                        format!(
                            "Allocation {} opened on {} with {:.0} GRT",
                            allocation.id, allocation.deployment, allocation.allocated_tokens
                        ),
                        now,
                    ));
                }
                Some(prev) if self.notify_closed && prev.is_active() && !allocation.is_active() => {
                    notifications.push(self.meta.notification(
                        ALLOCATION_STATUS,
                        self.meta.severity,
                        NotificationSubject::for_allocation(allocation),
                        format!(
                            "Allocation {} on {} closed with {:.2} GRT accrued rewards",
                            allocation.id, allocation.deployment, allocation.accrued_rewards
                        ),
                        now,
                    ));
                }
                _ => {}
            }
        }

        if self.notify_closed {
            let current: HashSet<&str> = ctx.allocations().iter().map(|a| a.id.as_str()).collect();
            for prev in previous.allocations() {
                if prev.is_active() && !current.contains(prev.id.as_str()) {
                    notifications.push(self.meta.notification(
                        ALLOCATION_STATUS,
                        self.meta.severity,
                        NotificationSubject::for_allocation(prev),
                        format!(
                            "Allocation {} on {} is no longer reported by the network",
                            prev.id, prev.deployment
                        ),
                        now,
                    ));
                }
            }
        }

        Ok(RuleResult::from_notifications(notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_some_transition() {
        let err = AllocationStatusRule::new(
            RuleMeta::new("status", "Status", Severity::Info),
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, AlertError::InvalidConfig { .. }));
    }
}
