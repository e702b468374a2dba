use crate::types::{Allocation, NetworkDataSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The allocation set as of the immediately prior evaluation tick.
///
/// On the first tick this is [`PreviousState::empty`]; rules must read a
/// missing entry as "no prior value".
#[derive(Debug, Clone, Default)]
pub struct PreviousState {
    allocations: Vec<Allocation>,
    network: Option<NetworkDataSnapshot>,
    by_id: HashMap<String, usize>,
}

impl PreviousState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(allocations: Vec<Allocation>, network: Option<NetworkDataSnapshot>) -> Self {
        let by_id = allocations
            .iter()
            .enumerate()
            .map(|(idx, a)| (a.id.clone(), idx))
            .collect();
        Self {
            allocations,
            network,
            by_id,
        }
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Network snapshot of the prior tick, when one was recorded.
    pub fn network(&self) -> Option<&NetworkDataSnapshot> {
        self.network.as_ref()
    }

    pub fn allocation(&self, id: &str) -> Option<&Allocation> {
        self.by_id.get(id).map(|&idx| &self.allocations[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

/// Input to one evaluation tick.
///
/// Built fresh each tick and handed to every rule by shared reference.
#[derive(Debug, Clone)]
pub struct RuleContext {
    allocations: Vec<Allocation>,
    network: NetworkDataSnapshot,
    previous: PreviousState,
    evaluated_at: DateTime<Utc>,
}

impl RuleContext {
    pub fn new(
        allocations: Vec<Allocation>,
        network: NetworkDataSnapshot,
        previous: PreviousState,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            allocations,
            network,
            previous,
            evaluated_at,
        }
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn network(&self) -> &NetworkDataSnapshot {
        &self.network
    }

    pub fn previous(&self) -> &PreviousState {
        &self.previous
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    /// Network snapshot to evaluate previous-tick values against: the
    /// recorded one if present, otherwise the current one.
    pub fn previous_network(&self) -> &NetworkDataSnapshot {
        self.previous.network().unwrap_or(&self.network)
    }

    /// Consumes the context, returning the current snapshot so it can become
    /// the next tick's previous state.
    pub fn into_current(self) -> (Vec<Allocation>, NetworkDataSnapshot) {
        (self.allocations, self.network)
    }
}
