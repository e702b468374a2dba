mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{allocation, network, write_snapshot, RecordingChannel};
use idxmon_common::types::{Allocation, NetworkDataSnapshot};
use idxmon_alert::engine::RuleEngine;
use idxmon_common::types::{NotificationSubject, Severity};
use idxmon_notify::dispatcher::NotificationDispatcher;
use idxmon_notify::ChannelMeta;
use idxmon_server::config::ServerConfig;
use idxmon_server::monitor::Monitor;
use idxmon_server::rule_builder;
use idxmon_server::source::{
    CachedSnapshotSource, FileSnapshotSource, SnapshotFile, SnapshotSource,
};
use std::sync::atomic::{AtomicU64, Ordering};

const CONFIG: &str = r#"
[[rules]]
id = "apr-low"
name = "APR below 5%"
rule_type = "apr_threshold"
severity = "warning"
config = { direction = "below", bound_percent = 5.0 }

[[rules]]
id = "expiry"
name = "Allocation expiring"
rule_type = "allocation_expiry"
severity = "critical"

[[rules]]
id = "status"
name = "Allocation lifecycle"
rule_type = "allocation_status"

[[rules]]
id = "signal"
name = "Signal moved"
rule_type = "signal_change"
config = { rate_threshold = 20.0 }
"#;

fn engine() -> Result<RuleEngine> {
    let config = ServerConfig::parse(CONFIG)?;
    let mut engine = RuleEngine::new(vec![]);
    let loaded = rule_builder::reload_rule_engine(&mut engine, &config.rules);
    if loaded != 4 {
        return Err(anyhow!("expected 4 rules, loaded {loaded}"));
    }
    Ok(engine)
}

#[tokio::test]
async fn apr_drop_is_reported_once_and_delivered() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.json");
    write_snapshot(&path, vec![allocation("0xa1", 50_000.0, 95)], network(100))?;

    let (chat, chat_batches) = RecordingChannel::new(ChannelMeta::new("chat", "Chat"));
    let (muted, muted_batches) =
        RecordingChannel::new(ChannelMeta::new("muted", "Muted").disabled());
    let dispatcher = NotificationDispatcher::new(vec![chat, muted]);
    let source =
        CachedSnapshotSource::new(FileSnapshotSource::new(&path), chrono::Duration::seconds(60));
    let mut monitor = Monitor::new(engine()?, dispatcher, source);

    // First tick at 6% APR: nothing to report.
    let report = monitor.tick().await?;
    assert!(report.outcome.is_quiet());
    assert_eq!(report.outcome.evaluated, 4);
    assert!(chat_batches.lock().unwrap().is_empty());

    // APR falls to 4%.
    write_snapshot(&path, vec![allocation("0xa1", 75_000.0, 95)], network(100))?;
    let report = monitor.tick().await?;
    assert_eq!(report.outcome.notifications.len(), 1);
    let notification = &report.outcome.notifications[0];
    assert_eq!(notification.rule_id, "apr-low");
    assert_eq!(notification.rule_type, "apr_threshold");
    assert_eq!(notification.severity, Severity::Warning);
    assert_eq!(
        notification.subject,
        NotificationSubject::Allocation {
            id: "0xa1".to_string(),
            deployment: "Qma1".to_string(),
        }
    );
    assert_eq!(report.dispatch.delivered, vec!["chat"]);
    assert_eq!(report.dispatch.skipped, vec!["muted"]);
    assert_eq!(chat_batches.lock().unwrap().len(), 1);
    assert!(muted_batches.lock().unwrap().is_empty());

    // Still at 4%: already reported.
    let report = monitor.tick().await?;
    assert!(report.outcome.notifications.is_empty());
    assert_eq!(chat_batches.lock().unwrap().len(), 1);
    assert_eq!(monitor.tracker().ticks(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.json");
    write_snapshot(&path, vec![allocation("0xa1", 50_000.0, 95)], network(100))?;

    let mut monitor = Monitor::new(
        engine()?,
        NotificationDispatcher::new(vec![]),
        FileSnapshotSource::new(&path),
    );
    monitor.tick().await?;

    std::fs::remove_file(&path)?;
    assert!(monitor.tick().await.is_err());
    assert_eq!(monitor.tracker().ticks(), 1);

    // The drop is still detected against the last good snapshot.
    write_snapshot(&path, vec![allocation("0xa1", 75_000.0, 95)], network(100))?;
    let report = monitor.tick().await?;
    assert_eq!(report.outcome.notifications.len(), 1);
    assert_eq!(report.outcome.notifications[0].rule_id, "apr-low");
    Ok(())
}

#[tokio::test]
async fn lifecycle_and_expiry_across_ticks() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.json");
    // Opened at epoch 75: with a 28 epoch thawing period it expires at 103.
    write_snapshot(&path, vec![allocation("0xa1", 50_000.0, 75)], network(90))?;

    let (chat, chat_batches) = RecordingChannel::new(
        ChannelMeta::new("pager", "Pager").with_min_severity(Severity::Critical),
    );
    let mut monitor = Monitor::new(
        engine()?,
        NotificationDispatcher::new(vec![chat]),
        FileSnapshotSource::new(&path),
    );
    assert!(monitor.tick().await?.outcome.is_quiet());

    // A second allocation opens and the first enters its last epoch.
    write_snapshot(
        &path,
        vec![allocation("0xa1", 50_000.0, 75), allocation("0xb2", 50_000.0, 102)],
        network(102),
    )?;
    let report = monitor.tick().await?;
    let by_rule: Vec<&str> = report
        .outcome
        .notifications
        .iter()
        .map(|n| n.rule_id.as_str())
        .collect();
    assert_eq!(by_rule, vec!["expiry", "status"]);

    // Only the critical expiry reaches the pager.
    let batches = chat_batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].rule_id, "expiry");
    assert_eq!(batches[0][0].severity, Severity::Critical);
    Ok(())
}

#[tokio::test]
async fn empty_allocation_list_is_quiet() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.json");
    write_snapshot(&path, vec![allocation("0xa1", 50_000.0, 95)], network(100))?;

    let mut monitor = Monitor::new(
        engine()?,
        NotificationDispatcher::new(vec![]),
        FileSnapshotSource::new(&path),
    );
    monitor.tick().await?;

    write_snapshot(&path, vec![], network(101))?;
    let report = monitor.tick().await?;
    assert!(report.outcome.notifications.is_empty());
    assert_eq!(report.outcome.triggered, 0);
    Ok(())
}

/// Every split fetch sees a newer export than the one before it. Only
/// `fetch_snapshot` returns allocations and network from the same export.
#[derive(Default)]
struct RewritingSource {
    version: AtomicU64,
}

impl RewritingSource {
    fn export(version: u64) -> SnapshotFile {
        SnapshotFile {
            allocations: vec![allocation("0xa1", 50_000.0, version)],
            network: network(version),
        }
    }

    fn next(&self) -> SnapshotFile {
        Self::export(self.version.fetch_add(1, Ordering::SeqCst) + 100)
    }
}

#[async_trait]
impl SnapshotSource for RewritingSource {
    async fn fetch_allocations(&self) -> Result<Vec<Allocation>> {
        Ok(self.next().allocations)
    }

    async fn fetch_network(&self) -> Result<NetworkDataSnapshot> {
        Ok(self.next().network)
    }

    async fn fetch_snapshot(&self) -> Result<SnapshotFile> {
        Ok(self.next())
    }
}

#[tokio::test]
async fn tick_reads_allocations_and_network_from_one_export() -> Result<()> {
    let mut monitor = Monitor::new(
        engine()?,
        NotificationDispatcher::new(vec![]),
        RewritingSource::default(),
    );

    for _ in 0..3 {
        monitor.tick().await?;
        let previous = monitor.tracker().previous();
        let epoch = previous.network().map(|n| n.current_epoch);
        assert_eq!(epoch, Some(previous.allocations()[0].created_at_epoch));
    }
    Ok(())
}
