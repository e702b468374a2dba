use super::APR_THRESHOLD;
use crate::error::AlertError;
use crate::{AlertRule, RuleMeta, RuleResult};
use idxmon_common::context::RuleContext;
use idxmon_common::types::{NotificationSubject, Severity};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDirection {
    Below,
    Above,
}

impl FromStr for BoundDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "below" | "less_than" | "lt" => Ok(Self::Below),
            "above" | "greater_than" | "gt" => Ok(Self::Above),
            _ => Err(format!("unknown bound direction: {s}")),
        }
    }
}

impl std::fmt::Display for BoundDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Below => write!(f, "below"),
            Self::Above => write!(f, "above"),
        }
    }
}

impl BoundDirection {
    fn breached(self, apr: f64, bound: f64) -> bool {
        match self {
            Self::Below => apr < bound,
            Self::Above => apr > bound,
        }
    }
}

/// APR threshold breach.
///
/// Edge-triggered unless `realert` is set: an allocation fires when its
/// current APR is past the bound and its previous APR was not (or there is
/// no previous value). Allocations whose APR is undefined are skipped.
#[derive(Debug, Clone)]
pub struct AprThresholdRule {
    meta: RuleMeta,
    direction: BoundDirection,
    bound_percent: f64,
    realert: bool,
}

impl AprThresholdRule {
    pub fn new(
        meta: RuleMeta,
        direction: BoundDirection,
        bound_percent: f64,
        realert: bool,
    ) -> Result<Self, AlertError> {
        if !bound_percent.is_finite() || bound_percent < 0.0 {
            return Err(meta.invalid(format!(
                "bound_percent must be a non-negative number, got {bound_percent}"
            )));
        }
        Ok(Self {
            meta,
            direction,
            bound_percent,
            realert,
        })
    }
}

impl AlertRule for AprThresholdRule {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn rule_type(&self) -> &'static str {
        APR_THRESHOLD
    }

    fn enabled(&self) -> bool {
        self.meta.enabled
    }

    fn severity(&self) -> Severity {
        self.meta.severity
    }

    fn evaluate(&self, ctx: &RuleContext) -> Result<RuleResult, AlertError> {
        if ctx.allocations().is_empty() {
            return Ok(RuleResult::none());
        }

        let network = ctx.network();
        for (field, value) in [
            ("issuance_rate", network.issuance_rate),
            ("total_supply", network.total_supply),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(self
                    .meta
                    .evaluation_failed(format!("network {field} is invalid: {value}")));
            }
        }

        let previous_network = ctx.previous_network();
        let mut notifications = Vec::new();

        for allocation in ctx.allocations().iter().filter(|a| a.is_active()) {
            let Some(apr) = network.allocation_apr(allocation) else {
                continue;
            };
            if !self.direction.breached(apr, self.bound_percent) {
                continue;
            }

            let previous_apr = ctx
                .previous()
                .allocation(&allocation.id)
                .and_then(|prev| previous_network.allocation_apr(prev));
            let was_breached =
                previous_apr.is_some_and(|prev| self.direction.breached(prev, self.bound_percent));
            if was_breached && !self.realert {
                continue;
            }

            let message = match previous_apr {
                Some(prev) => format!(
                    "APR of allocation {} on {} is {:.2}% ({} {:.2}%), was {:.2}%",
                    allocation.id,
                    allocation.deployment,
                    apr,
                    self.direction,
                    self.bound_percent,
                    prev
                ),
                None => format!(
                    "APR of allocation {} on {} is {:.2}% ({} {:.2}%)",
                    allocation.id, allocation.deployment, apr, self.direction, self.bound_percent
                ),
            };

            notifications.push(self.meta.notification(
                APR_THRESHOLD,
                self.meta.severity,
                NotificationSubject::for_allocation(allocation),
                message,
                ctx.evaluated_at(),
            ));
        }

        Ok(RuleResult::from_notifications(notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_aliases() {
        assert_eq!("lt".parse::<BoundDirection>(), Ok(BoundDirection::Below));
        assert_eq!("greater_than".parse::<BoundDirection>(), Ok(BoundDirection::Above));
        assert!("sideways".parse::<BoundDirection>().is_err());
    }

    #[test]
    fn rejects_negative_bound() {
        let err = AprThresholdRule::new(
            RuleMeta::new("apr", "APR", Severity::Warning),
            BoundDirection::Below,
            -1.0,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bound_percent"));
    }

    #[test]
    fn rejects_nan_bound() {
        assert!(AprThresholdRule::new(
            RuleMeta::new("apr", "APR", Severity::Warning),
            BoundDirection::Above,
            f64::NAN,
            false,
        )
        .is_err());
    }
}
