use super::ALLOCATION_EXPIRY;
use crate::error::AlertError;
use crate::{AlertRule, RuleMeta, RuleResult};
use idxmon_common::context::RuleContext;
use idxmon_common::types::{Allocation, NotificationSubject, Severity};

/// Allocation nearing expiry.
///
/// An allocation has `max_thawing_period - age` epochs left before it must
/// be closed. Two tiers: warning when the remaining epochs drop to
/// `warning_margin`, critical at `critical_margin` (an overdue allocation
/// has zero epochs left and is always critical).
///
/// Edge-triggered unless `realert` is set: fires when an allocation's tier
/// is higher than it was on the previous tick. An allocation without a
/// previous snapshot counts as having no tier.
#[derive(Debug, Clone)]
pub struct AllocationExpiryRule {
    meta: RuleMeta,
    warning_margin: u64,
    critical_margin: u64,
    realert: bool,
}

impl AllocationExpiryRule {
    pub fn new(
        meta: RuleMeta,
        warning_margin: u64,
        critical_margin: u64,
        realert: bool,
    ) -> Result<Self, AlertError> {
        if critical_margin > warning_margin {
            return Err(meta.invalid(format!(
                "critical_margin ({critical_margin}) must not exceed warning_margin ({warning_margin})"
            )));
        }
        Ok(Self {
            meta,
            warning_margin,
            critical_margin,
            realert,
        })
    }

    fn tier(
        &self,
        allocation: &Allocation,
        current_epoch: u64,
        max_thawing: u64,
    ) -> Option<Severity> {
        if !allocation.is_active() {
            return None;
        }
        let remaining = max_thawing.saturating_sub(allocation.age_epochs(current_epoch));
        if remaining <= self.critical_margin {
            Some(Severity::Critical)
        } else if remaining <= self.warning_margin {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

impl AlertRule for AllocationExpiryRule {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn rule_type(&self) -> &'static str {
        ALLOCATION_EXPIRY
    }

    fn enabled(&self) -> bool {
        self.meta.enabled
    }

    fn severity(&self) -> Severity {
        // Highest possible tier; the actual tier is chosen per allocation.
        Severity::Critical
    }

    fn evaluate(&self, ctx: &RuleContext) -> Result<RuleResult, AlertError> {
        if ctx.allocations().is_empty() {
            return Ok(RuleResult::none());
        }

        let network = ctx.network();
        if network.max_thawing_period == 0 {
            return Err(self
                .meta
                .evaluation_failed("network snapshot reports a max thawing period of 0 epochs"));
        }

        let previous_network = ctx.previous().network();
        let mut notifications = Vec::new();

        for allocation in ctx.allocations() {
            let Some(tier) =
                self.tier(allocation, network.current_epoch, network.max_thawing_period)
            else {
                continue;
            };

            let previous_allocation = ctx.previous().allocation(&allocation.id);
            let previous_tier = match (previous_allocation, previous_network) {
                (Some(prev), Some(prev_net)) => {
                    self.tier(prev, prev_net.current_epoch, prev_net.max_thawing_period)
                }
                _ => None,
            };
            if !self.realert && previous_tier.is_some_and(|prev| prev >= tier) {
                continue;
            }

            let age = allocation.age_epochs(network.current_epoch);
            let max = network.max_thawing_period;
            let message = if age >= max {
                format!(
                    "Allocation {} on {} is {} epochs old and has exceeded the {}-epoch limit",
                    allocation.id, allocation.deployment, age, max
                )
            } else {
                let margin = if tier == Severity::Critical {
                    self.critical_margin
                } else {
                    self.warning_margin
                };
                format!(
                    "Allocation {} on {} expires in {} epochs (age {} of {}, {} margin {})",
                    allocation.id,
                    allocation.deployment,
                    max - age,
                    age,
                    max,
                    tier,
                    margin
                )
            };

            notifications.push(self.meta.notification(
                ALLOCATION_EXPIRY,
                tier,
                NotificationSubject::for_allocation(allocation),
                message,
                ctx.evaluated_at(),
            ));
        }

        Ok(RuleResult::from_notifications(notifications))
    }
}
