use chrono::{DateTime, Utc};
use idxmon_common::context::{PreviousState, RuleContext};
use idxmon_common::types::{Allocation, NetworkDataSnapshot};

/// Holds the previous tick's snapshot and builds each tick's [`RuleContext`].
///
/// Every call to [`SnapshotTracker::advance`] moves the stored snapshot into
/// the new context and stores the current one, so the previous state always
/// lags by exactly one tick. Callers skip `advance` when a fetch fails.
///
/// An empty allocation list is treated as missing data: the context compares
/// against the stored snapshot, and the stored snapshot is kept for the next
/// tick instead of being replaced by the empty one.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    previous: PreviousState,
    ticks: u64,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(
        &mut self,
        allocations: Vec<Allocation>,
        network: NetworkDataSnapshot,
        now: DateTime<Utc>,
    ) -> RuleContext {
        let previous = if allocations.is_empty() {
            if !self.previous.is_empty() {
                tracing::warn!(
                    tick = self.ticks + 1,
                    "Snapshot has no allocations, keeping previous snapshot"
                );
            }
            self.previous.clone()
        } else {
            let next = PreviousState::new(allocations.clone(), Some(network.clone()));
            std::mem::replace(&mut self.previous, next)
        };
        self.ticks += 1;
        RuleContext::new(allocations, network, previous, now)
    }

    pub fn previous(&self) -> &PreviousState {
        &self.previous
    }

    /// Number of contexts built so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Forget the stored snapshot; the next tick behaves like the first.
    pub fn reset(&mut self) {
        self.previous = PreviousState::empty();
        self.ticks = 0;
    }
}
