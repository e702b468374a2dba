use crate::config::RuleDefinition;
use anyhow::Result;
use idxmon_alert::engine::RuleEngine;
use idxmon_alert::error::AlertError;
use idxmon_alert::rules::allocation_expiry::AllocationExpiryRule;
use idxmon_alert::rules::allocation_status::AllocationStatusRule;
use idxmon_alert::rules::apr_threshold::{AprThresholdRule, BoundDirection};
use idxmon_alert::rules::signal_change::SignalChangeRule;
use idxmon_alert::rules::{ALLOCATION_EXPIRY, ALLOCATION_STATUS, APR_THRESHOLD, SIGNAL_CHANGE};
use idxmon_alert::{AlertRule, RuleMeta};
use idxmon_common::types::Severity;
use serde::{Deserialize, Serialize};

// ---- Per-rule-type config schemas ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationExpiryConfig {
    /// Epochs before the thawing limit at which a warning is raised
    #[serde(default = "default_warning_margin")]
    pub warning_margin: u64,
    #[serde(default = "default_critical_margin")]
    pub critical_margin: u64,
    #[serde(default)]
    pub realert: bool,
}

fn default_warning_margin() -> u64 {
    5
}

fn default_critical_margin() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AprThresholdConfig {
    #[serde(default = "default_direction")]
    pub direction: String,
    pub bound_percent: f64,
    #[serde(default)]
    pub realert: bool,
}

fn default_direction() -> String {
    "below".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationStatusConfig {
    #[serde(default = "default_true")]
    pub notify_opened: bool,
    #[serde(default = "default_true")]
    pub notify_closed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalChangeConfig {
    /// Percent change of curation signal between ticks
    pub rate_threshold: f64,
}

fn parse_config<T: serde::de::DeserializeOwned>(def: &RuleDefinition) -> Result<T> {
    serde_json::from_value(def.config.clone())
        .map_err(|e| anyhow::anyhow!("invalid {} config: {e}", def.rule_type))
}

// ---- Definition -> AlertRule trait object ----

/// Converts a single `[[rules]]` entry into a `Box<dyn AlertRule>`.
pub fn build_rule(def: &RuleDefinition) -> Result<Box<dyn AlertRule>> {
    let severity: Severity = def
        .severity
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{e}"))?;
    let mut meta = RuleMeta::new(def.id.clone(), def.name.clone(), severity);
    if !def.enabled {
        meta = meta.disabled();
    }

    match def.rule_type.as_str() {
        ALLOCATION_EXPIRY => {
            let cfg: AllocationExpiryConfig = parse_config(def)?;
            Ok(Box::new(AllocationExpiryRule::new(
                meta,
                cfg.warning_margin,
                cfg.critical_margin,
                cfg.realert,
            )?))
        }
        APR_THRESHOLD => {
            let cfg: AprThresholdConfig = parse_config(def)?;
            let direction: BoundDirection = cfg
                .direction
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{e}"))?;
            Ok(Box::new(AprThresholdRule::new(
                meta,
                direction,
                cfg.bound_percent,
                cfg.realert,
            )?))
        }
        ALLOCATION_STATUS => {
            let cfg: AllocationStatusConfig = parse_config(def)?;
            Ok(Box::new(AllocationStatusRule::new(
                meta,
                cfg.notify_opened,
                cfg.notify_closed,
            )?))
        }
        SIGNAL_CHANGE => {
            let cfg: SignalChangeConfig = parse_config(def)?;
            Ok(Box::new(SignalChangeRule::new(meta, cfg.rate_threshold)?))
        }
        other => Err(AlertError::UnknownRuleType(other.to_string()).into()),
    }
}

/// Converts every definition, skipping invalid ones with warnings.
pub fn build_rules(defs: &[RuleDefinition]) -> Vec<Box<dyn AlertRule>> {
    let mut rules = Vec::with_capacity(defs.len());
    for def in defs {
        match build_rule(def) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                tracing::warn!(
                    rule_id = %def.id,
                    rule_name = %def.name,
                    rule_type = %def.rule_type,
                    error = %e,
                    "Skipping invalid alert rule"
                );
            }
        }
    }
    rules
}

/// Rebuilds the engine's rule set from `defs`. Returns the number of loaded rules.
pub fn reload_rule_engine(engine: &mut RuleEngine, defs: &[RuleDefinition]) -> usize {
    let rules = build_rules(defs);
    let count = rules.len();
    engine.replace_rules(rules);
    tracing::info!(rule_count = count, "Rule engine reloaded from config");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(rule_type: &str, config: serde_json::Value) -> RuleDefinition {
        RuleDefinition {
            id: format!("{rule_type}-1"),
            name: format!("{rule_type} rule"),
            rule_type: rule_type.to_string(),
            enabled: true,
            severity: "warning".to_string(),
            config,
        }
    }

    #[test]
    fn builds_every_builtin_type() {
        let defs = vec![
            def(ALLOCATION_EXPIRY, json!({})),
            def(APR_THRESHOLD, json!({ "bound_percent": 5.0 })),
            def(ALLOCATION_STATUS, json!({ "notify_opened": false })),
            def(SIGNAL_CHANGE, json!({ "rate_threshold": 10.0 })),
        ];
        let rules = build_rules(&defs);
        let types: Vec<&str> = rules.iter().map(|r| r.rule_type()).collect();
        assert_eq!(types, vec![ALLOCATION_EXPIRY, APR_THRESHOLD, ALLOCATION_STATUS, SIGNAL_CHANGE]);
        assert_eq!(rules[1].severity(), Severity::Warning);
    }

    #[test]
    fn disabled_definition_builds_disabled_rule() {
        let mut d = def(SIGNAL_CHANGE, json!({ "rate_threshold": 10.0 }));
        d.enabled = false;
        assert!(!build_rule(&d).unwrap().enabled());
    }

    #[test]
    fn invalid_definitions_are_skipped() {
        let defs = vec![
            def(APR_THRESHOLD, json!({})),
            def(APR_THRESHOLD, json!({ "bound_percent": -1.0 })),
            def(APR_THRESHOLD, json!({ "bound_percent": 5.0, "direction": "sideways" })),
            def(ALLOCATION_EXPIRY, json!({ "warning_margin": 1, "critical_margin": 3 })),
            def(ALLOCATION_STATUS, json!({ "notify_opened": false, "notify_closed": false })),
            def(SIGNAL_CHANGE, json!({ "rate_threshold": 0.0 })),
            def("gas_price", json!({})),
            def(SIGNAL_CHANGE, json!({ "rate_threshold": 10.0 })),
        ];
        let rules = build_rules(&defs);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type(), SIGNAL_CHANGE);
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let mut d = def(SIGNAL_CHANGE, json!({ "rate_threshold": 10.0 }));
        d.severity = "fatal".to_string();
        assert!(build_rule(&d).is_err());
    }

    #[test]
    fn unknown_type_reports_alert_error() {
        let err = build_rule(&def("gas_price", json!({}))).err().unwrap();
        assert_eq!(
            err.downcast_ref::<AlertError>(),
            Some(&AlertError::UnknownRuleType("gas_price".to_string()))
        );
    }

    #[test]
    fn reload_replaces_rules() {
        let mut engine = RuleEngine::new(vec![]);
        let count = reload_rule_engine(&mut engine, &[def(ALLOCATION_EXPIRY, json!({}))]);
        assert_eq!(count, 1);
        assert_eq!(engine.rules().len(), 1);
        assert_eq!(reload_rule_engine(&mut engine, &[]), 0);
        assert!(engine.rules().is_empty());
    }
}
