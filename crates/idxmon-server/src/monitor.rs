use crate::source::SnapshotSource;
use anyhow::Result;
use chrono::Utc;
use idxmon_alert::engine::{RuleEngine, TickOutcome};
use idxmon_alert::tracker::SnapshotTracker;
use idxmon_notify::dispatcher::{DispatchReport, NotificationDispatcher};
use idxmon_notify::summary::summarize_by_rule_type;
use tokio::time::{interval, Duration};

/// Result of one monitor tick.
#[derive(Debug)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub dispatch: DispatchReport,
}

/// Owns the rule engine, the previous-tick snapshot and the dispatcher, and
/// drives them once per tick.
pub struct Monitor<S> {
    engine: RuleEngine,
    tracker: SnapshotTracker,
    dispatcher: NotificationDispatcher,
    source: S,
}

impl<S: SnapshotSource> Monitor<S> {
    pub fn new(engine: RuleEngine, dispatcher: NotificationDispatcher, source: S) -> Self {
        Self {
            engine,
            tracker: SnapshotTracker::new(),
            dispatcher,
            source,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.engine
    }

    pub fn dispatcher_mut(&mut self) -> &mut NotificationDispatcher {
        &mut self.dispatcher
    }

    pub fn tracker(&self) -> &SnapshotTracker {
        &self.tracker
    }

    /// Fetches a snapshot, evaluates every rule against it and dispatches
    /// the resulting batch.
    ///
    /// A failed fetch returns an error and leaves the previous snapshot in
    /// place, so the next successful tick still compares against the last
    /// good data.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let snapshot = self.source.fetch_snapshot().await?;

        let ctx = self
            .tracker
            .advance(snapshot.allocations, snapshot.network, Utc::now());
        let outcome = self.engine.evaluate(&ctx);

        let dispatch = if outcome.notifications.is_empty() {
            DispatchReport::default()
        } else {
            let summaries = summarize_by_rule_type(&outcome.notifications);
            self.dispatcher
                .dispatch(&outcome.notifications, Some(summaries))
                .await
        };

        tracing::info!(
            tick = self.tracker.ticks(),
            allocations = ctx.allocations().len(),
            evaluated = outcome.evaluated,
            triggered = outcome.triggered,
            notifications = outcome.notifications.len(),
            rule_failures = outcome.failures.len(),
            channels_delivered = dispatch.delivered.len(),
            channel_failures = dispatch.failures.len(),
            "Monitor tick finished"
        );

        Ok(TickReport { outcome, dispatch })
    }

    /// Ticks every `tick_secs` seconds until the future is dropped.
    pub async fn run(&mut self, tick_secs: u64) {
        tracing::info!(
            tick_secs,
            rules = self.engine.rules().len(),
            channels = self.dispatcher.channels().len(),
            "Allocation monitor started"
        );

        let mut tick = interval(Duration::from_secs(tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Monitor tick failed, keeping previous snapshot");
            }
        }
    }
}
