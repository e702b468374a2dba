#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use idxmon_common::types::{Allocation, AllocationStatus, NetworkDataSnapshot, Notification};
use idxmon_notify::{BatchSummaries, ChannelMeta, NotificationChannel};
use idxmon_server::source::SnapshotFile;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub fn network(current_epoch: u64) -> NetworkDataSnapshot {
    NetworkDataSnapshot {
        total_tokens_signalled: 1_000.0,
        issuance_rate: 0.03,
        total_supply: 10_000_000.0,
        current_epoch,
        total_tokens_allocated: 5_000_000.0,
        max_thawing_period: 28,
    }
}

/// With `network()`, 10 GRT of signal yields 3000 GRT of yearly rewards for
/// the deployment, so `staked_tokens = 50_000` is 6% APR and `75_000` is 4%.
pub fn allocation(id: &str, staked_tokens: f64, created_at_epoch: u64) -> Allocation {
    Allocation {
        id: id.to_string(),
        deployment: format!("Qm{}", id.trim_start_matches("0x")),
        allocated_tokens: 10_000.0,
        staked_tokens,
        signalled_tokens: 10.0,
        created_at_epoch,
        created_at_block: 19_000_000,
        accrued_rewards: 0.0,
        status: AllocationStatus::Active,
    }
}

pub fn write_snapshot(
    path: &Path,
    allocations: Vec<Allocation>,
    network: NetworkDataSnapshot,
) -> Result<()> {
    let file = SnapshotFile { allocations, network };
    std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
    Ok(())
}

/// Channel that records every batch it receives.
pub struct RecordingChannel {
    meta: ChannelMeta,
    batches: Arc<Mutex<Vec<Vec<Notification>>>>,
}

impl RecordingChannel {
    pub fn new(meta: ChannelMeta) -> (Arc<Self>, Arc<Mutex<Vec<Vec<Notification>>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(Self {
                meta,
                batches: batches.clone(),
            }),
            batches,
        )
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn meta(&self) -> &ChannelMeta {
        &self.meta
    }

    fn channel_type(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> idxmon_notify::error::Result<()> {
        self.batches.lock().unwrap().push(vec![notification.clone()]);
        Ok(())
    }

    async fn send_batch(
        &self,
        notifications: &[Notification],
        _summaries: Option<&BatchSummaries>,
    ) -> idxmon_notify::error::Result<()> {
        self.batches.lock().unwrap().push(notifications.to_vec());
        Ok(())
    }
}
