use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use idxmon_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// What a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationSubject {
    Allocation { id: String, deployment: String },
    Network,
}

impl NotificationSubject {
    pub fn for_allocation(allocation: &Allocation) -> Self {
        Self::Allocation {
            id: allocation.id.clone(),
            deployment: allocation.deployment.clone(),
        }
    }

    /// The allocation id, if the subject is an allocation.
    pub fn allocation_id(&self) -> Option<&str> {
        match self {
            Self::Allocation { id, .. } => Some(id),
            Self::Network => None,
        }
    }
}

impl std::fmt::Display for NotificationSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation { id, deployment } => write!(f, "allocation {id} ({deployment})"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A fully formed alert produced by a rule during evaluation.
///
/// Channels only ever see notifications by shared reference; nothing
/// modifies one after the producing rule returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub severity: Severity,
    pub subject: NotificationSubject,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    /// Human-readable rule name (e.g., "Allocation nearing expiry")
    pub rule_name: String,
    /// Rule type tag, used as the grouping key for batch summaries.
    pub rule_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Closed,
}

/// Snapshot of one on-chain allocation, as supplied by the data-fetch layer.
///
/// Token amounts are in whole GRT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    /// Subgraph deployment IPFS hash (e.g., `Qm...`)
    pub deployment: String,
    pub allocated_tokens: f64,
    /// Total stake allocated to the deployment by all indexers
    pub staked_tokens: f64,
    /// Curation signal on the deployment
    pub signalled_tokens: f64,
    pub created_at_epoch: u64,
    pub created_at_block: u64,
    #[serde(default)]
    pub accrued_rewards: f64,
    pub status: AllocationStatus,
}

impl Allocation {
    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }

    /// Epochs elapsed since the allocation was opened.
    pub fn age_epochs(&self, current_epoch: u64) -> u64 {
        current_epoch.saturating_sub(self.created_at_epoch)
    }
}

/// Network-wide figures at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDataSnapshot {
    pub total_tokens_signalled: f64,
    /// Annual issuance as a fraction of total supply (e.g., `0.03`)
    pub issuance_rate: f64,
    pub total_supply: f64,
    pub current_epoch: u64,
    pub total_tokens_allocated: f64,
    /// Maximum epochs an allocation may stay open before it must be closed
    pub max_thawing_period: u64,
}

impl NetworkDataSnapshot {
    /// Annualized indexing reward rate of an allocation, in percent.
    ///
    /// The deployment's share of yearly issuance is its share of total
    /// signal; an allocation earns its share of the deployment's stake.
    /// Returns `None` when any denominator is zero or the result is not finite.
    ///
    /// ```
    /// use idxmon_common::types::{Allocation, AllocationStatus, NetworkDataSnapshot};
    ///
    /// let network = NetworkDataSnapshot {
    ///     total_tokens_signalled: 1_000.0,
    ///     issuance_rate: 0.03,
    ///     total_supply: 10_000_000.0,
    ///     current_epoch: 100,
    ///     total_tokens_allocated: 5_000_000.0,
    ///     max_thawing_period: 28,
    /// };
    /// let allocation = Allocation {
    ///     id: "0x01".into(),
    ///     deployment: "QmA".into(),
    ///     allocated_tokens: 1_000.0,
    ///     staked_tokens: 300_000.0,
    ///     signalled_tokens: 10.0,
    ///     created_at_epoch: 90,
    ///     created_at_block: 1,
    ///     accrued_rewards: 0.0,
    ///     status: AllocationStatus::Active,
    /// };
    /// let apr = network.allocation_apr(&allocation).unwrap();
    /// assert!((apr - 1.0).abs() < 1e-9);
    /// ```
    pub fn allocation_apr(&self, allocation: &Allocation) -> Option<f64> {
        if self.total_tokens_signalled <= 0.0
            || allocation.staked_tokens <= 0.0
            || allocation.allocated_tokens <= 0.0
        {
            return None;
        }
        let yearly_issuance = self.total_supply * self.issuance_rate;
        let deployment_rewards =
            yearly_issuance * (allocation.signalled_tokens / self.total_tokens_signalled);
        let apr = deployment_rewards / allocation.staked_tokens * 100.0;
        apr.is_finite().then_some(apr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_orders_for_filtering() {
        let mut all = vec![Severity::Critical, Severity::Info, Severity::Warning];
        all.sort();
        assert_eq!(all, vec![Severity::Info, Severity::Warning, Severity::Critical]);
    }

    #[test]
    fn allocation_deserializes_without_rewards() {
        let json = r#"{
            "id": "0xabc",
            "deployment": "QmDeployment",
            "allocated_tokens": 1000.0,
            "staked_tokens": 5000.0,
            "signalled_tokens": 10.0,
            "created_at_epoch": 5,
            "created_at_block": 123,
            "status": "active"
        }"#;
        let alloc: Allocation = serde_json::from_str(json).unwrap();
        assert!(alloc.is_active());
        assert_eq!(alloc.accrued_rewards, 0.0);
        assert_eq!(alloc.age_epochs(3), 0);
        assert_eq!(alloc.age_epochs(9), 4);
    }

    #[test]
    fn apr_is_none_without_signal() {
        let network = NetworkDataSnapshot {
            total_tokens_signalled: 0.0,
            issuance_rate: 0.03,
            total_supply: 1.0,
            current_epoch: 1,
            total_tokens_allocated: 1.0,
            max_thawing_period: 28,
        };
        let alloc = Allocation {
            id: "a".into(),
            deployment: "Qm".into(),
            allocated_tokens: 1.0,
            staked_tokens: 1.0,
            signalled_tokens: 1.0,
            created_at_epoch: 0,
            created_at_block: 0,
            accrued_rewards: 0.0,
            status: AllocationStatus::Active,
        };
        assert_eq!(network.allocation_apr(&alloc), None);
    }

    #[test]
    fn subject_display_names_allocation() {
        let subject = NotificationSubject::Allocation {
            id: "0x1".into(),
            deployment: "QmX".into(),
        };
        assert_eq!(subject.to_string(), "allocation 0x1 (QmX)");
        assert_eq!(subject.allocation_id(), Some("0x1"));
        assert_eq!(NotificationSubject::Network.allocation_id(), None);
    }
}
