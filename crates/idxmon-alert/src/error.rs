/// Errors raised while building or evaluating alert rules.
///
/// # Examples
///
/// ```rust
/// use idxmon_alert::error::AlertError;
///
/// let err = AlertError::UnknownRuleType("gas_price".to_string());
/// assert!(err.to_string().contains("gas_price"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlertError {
    /// Rule configuration is missing a field or holds an out-of-range value.
    /// The rule must not be registered.
    #[error("Alert: invalid configuration for rule '{rule_id}': {reason}")]
    InvalidConfig { rule_id: String, reason: String },

    /// The rule type tag is not one of the built-in rule types.
    #[error("Alert: unknown rule type '{0}'")]
    UnknownRuleType(String),

    /// The rule could not evaluate the current snapshot.
    #[error("Alert: rule '{rule_id}' failed to evaluate: {reason}")]
    Evaluation { rule_id: String, reason: String },

    /// The rule panicked while evaluating. The panic was contained by the
    /// engine.
    #[error("Alert: rule '{rule_id}' panicked: {reason}")]
    Panicked { rule_id: String, reason: String },
}

/// Convenience `Result` alias for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
