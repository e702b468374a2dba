pub mod allocation_expiry;
pub mod allocation_status;
pub mod apr_threshold;
pub mod signal_change;

pub const ALLOCATION_EXPIRY: &str = "allocation_expiry";
pub const APR_THRESHOLD: &str = "apr_threshold";
pub const ALLOCATION_STATUS: &str = "allocation_status";
pub const SIGNAL_CHANGE: &str = "signal_change";

/// Every built-in rule type tag.
pub const RULE_TYPES: [&str; 4] = [
    ALLOCATION_EXPIRY,
    APR_THRESHOLD,
    ALLOCATION_STATUS,
    SIGNAL_CHANGE,
];
