use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use idxmon_common::cache::TtlCache;
use idxmon_common::types::{Allocation, NetworkDataSnapshot};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Supplies the allocation list and network figures for each tick.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_allocations(&self) -> Result<Vec<Allocation>>;

    async fn fetch_network(&self) -> Result<NetworkDataSnapshot>;

    /// Fetches both halves of one tick's input. Sources backed by a single
    /// document override this so both halves come from the same read.
    async fn fetch_snapshot(&self) -> Result<SnapshotFile> {
        let (allocations, network) =
            tokio::try_join!(self.fetch_allocations(), self.fetch_network())?;
        Ok(SnapshotFile { allocations, network })
    }
}

/// On-disk snapshot layout read by [`FileSnapshotSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    pub network: NetworkDataSnapshot,
}

/// Reads a JSON snapshot file, typically written by an external exporter.
/// The file is re-read on every fetch, once per [`SnapshotSource::fetch_snapshot`].
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<SnapshotFile> {
        let path = self.path.display();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read snapshot '{path}': {e}"))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse snapshot '{path}': {e}"))
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch_allocations(&self) -> Result<Vec<Allocation>> {
        Ok(self.read().await?.allocations)
    }

    async fn fetch_network(&self) -> Result<NetworkDataSnapshot> {
        Ok(self.read().await?.network)
    }

    async fn fetch_snapshot(&self) -> Result<SnapshotFile> {
        self.read().await
    }
}

/// Memoizes the network snapshot of an inner source for a fixed TTL.
/// Allocations are always fetched fresh. On a cache miss the whole snapshot
/// comes from one [`SnapshotSource::fetch_snapshot`] call on the inner source.
pub struct CachedSnapshotSource<S> {
    inner: S,
    network: Mutex<TtlCache<NetworkDataSnapshot>>,
}

impl<S: SnapshotSource> CachedSnapshotSource<S> {
    pub fn new(inner: S, ttl: chrono::Duration) -> Self {
        Self {
            inner,
            network: Mutex::new(TtlCache::new(ttl)),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, TtlCache<NetworkDataSnapshot>> {
        self.network
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<S: SnapshotSource> SnapshotSource for CachedSnapshotSource<S> {
    async fn fetch_allocations(&self) -> Result<Vec<Allocation>> {
        self.inner.fetch_allocations().await
    }

    async fn fetch_network(&self) -> Result<NetworkDataSnapshot> {
        let cached = self.cache().get(Utc::now()).cloned();
        if let Some(network) = cached {
            return Ok(network);
        }

        match self.inner.fetch_network().await {
            Ok(network) => {
                self.cache().store(network.clone(), Utc::now());
                Ok(network)
            }
            Err(e) => {
                self.cache().invalidate();
                Err(e)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<SnapshotFile> {
        let cached = self.cache().get(Utc::now()).cloned();
        if let Some(network) = cached {
            let allocations = self.inner.fetch_allocations().await?;
            return Ok(SnapshotFile { allocations, network });
        }

        match self.inner.fetch_snapshot().await {
            Ok(snapshot) => {
                self.cache().store(snapshot.network.clone(), Utc::now());
                Ok(snapshot)
            }
            Err(e) => {
                self.cache().invalidate();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn network(epoch: u64) -> NetworkDataSnapshot {
        NetworkDataSnapshot {
            total_tokens_signalled: 1_000.0,
            issuance_rate: 0.03,
            total_supply: 10_000_000.0,
            current_epoch: epoch,
            total_tokens_allocated: 5_000_000.0,
            max_thawing_period: 28,
        }
    }

    #[derive(Default)]
    struct CountingSource {
        network_calls: AtomicUsize,
        snapshot_calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn fetch_allocations(&self) -> Result<Vec<Allocation>> {
            Ok(vec![])
        }

        async fn fetch_network(&self) -> Result<NetworkDataSnapshot> {
            let calls = self.network_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("subgraph unavailable");
            }
            Ok(network(100 + calls as u64))
        }

        async fn fetch_snapshot(&self) -> Result<SnapshotFile> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SnapshotFile {
                allocations: vec![],
                network: network(1),
            })
        }
    }

    #[tokio::test]
    async fn network_is_served_from_cache_within_ttl() {
        let source =
            CachedSnapshotSource::new(CountingSource::default(), chrono::Duration::seconds(60));
        let first = source.fetch_network().await.unwrap();
        let second = source.fetch_network().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.inner.network_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let source = CachedSnapshotSource::new(CountingSource::default(), chrono::Duration::zero());
        source.fetch_network().await.unwrap();
        source.fetch_network().await.unwrap();
        assert_eq!(source.inner.network_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_is_propagated_and_clears_cache() {
        let source = CachedSnapshotSource::new(CountingSource::default(), chrono::Duration::zero());
        source.fetch_network().await.unwrap();
        source.inner.failing.store(true, Ordering::SeqCst);
        assert!(source.fetch_network().await.is_err());
        assert!(source.cache().fetched_at().is_none());
    }

    #[tokio::test]
    async fn snapshot_miss_reads_inner_once_then_reuses_network() {
        let source =
            CachedSnapshotSource::new(CountingSource::default(), chrono::Duration::seconds(60));

        let cold = source.fetch_snapshot().await.unwrap();
        assert_eq!(cold.network.current_epoch, 1);
        assert_eq!(source.inner.snapshot_calls.load(Ordering::SeqCst), 1);

        let warm = source.fetch_snapshot().await.unwrap();
        assert_eq!(warm.network, cold.network);
        assert_eq!(source.inner.snapshot_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.inner.network_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn file_source_returns_whole_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let file = SnapshotFile {
            allocations: vec![],
            network: network(9),
        };
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let source = FileSnapshotSource::new(&path);
        let snapshot = source.fetch_snapshot().await.unwrap();
        assert!(snapshot.allocations.is_empty());
        assert_eq!(snapshot.network.current_epoch, 9);
    }

    #[tokio::test]
    async fn file_source_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let file = SnapshotFile {
            allocations: vec![],
            network: network(7),
        };
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let source = FileSnapshotSource::new(&path);
        assert!(source.fetch_allocations().await.unwrap().is_empty());
        assert_eq!(source.fetch_network().await.unwrap().current_epoch, 7);
    }

    #[tokio::test]
    async fn file_source_reports_missing_file() {
        let source = FileSnapshotSource::new("/nonexistent/snapshot.json");
        let err = source.fetch_allocations().await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snapshot.json"));
    }
}
