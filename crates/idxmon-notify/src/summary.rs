use crate::BatchSummaries;
use idxmon_common::types::{Notification, Severity};
use std::collections::HashMap;

/// Groups a batch by rule type and describes each group in one line,
/// e.g. `"3 apr_threshold alerts (highest: warning)"`.
pub fn summarize_by_rule_type(batch: &[Notification]) -> BatchSummaries {
    let mut groups: HashMap<&str, (usize, Severity)> = HashMap::new();
    for n in batch {
        let entry = groups.entry(n.rule_type.as_str()).or_insert((0, n.severity));
        entry.0 += 1;
        entry.1 = entry.1.max(n.severity);
    }

    groups
        .into_iter()
        .map(|(rule_type, (count, highest))| {
            let noun = if count == 1 { "alert" } else { "alerts" };
            (
                rule_type.to_string(),
                format!("{count} {rule_type} {noun} (highest: {highest})"),
            )
        })
        .collect()
}

/// Summary lines sorted by key, for stable rendering.
pub fn sorted_lines(summaries: &BatchSummaries) -> Vec<&str> {
    let mut keys: Vec<&String> = summaries.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| summaries[k].as_str()).collect()
}
