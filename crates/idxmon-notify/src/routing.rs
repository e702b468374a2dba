use idxmon_common::types::{Notification, Severity};

/// Whether a notification of `severity` passes a channel's `min_severity`.
pub fn should_send(min_severity: Severity, severity: Severity) -> bool {
    severity >= min_severity
}

/// Notifications of `batch` that a channel with `min_severity` receives,
/// in batch order.
pub fn route_batch(min_severity: Severity, batch: &[Notification]) -> Vec<Notification> {
    batch
        .iter()
        .filter(|n| should_send(min_severity, n.severity))
        .cloned()
        .collect()
}
