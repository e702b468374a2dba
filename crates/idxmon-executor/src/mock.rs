use crate::{rewind_command, ConnectionStatus, DeploymentExecutor, RewindResult};
use async_trait::async_trait;
use std::time::Duration;

pub const MOCK_TARGET: &str = "mock-graph-node";
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(1500);

/// Dry-run backend: waits a fixed delay and reports success without running
/// anything.
pub struct MockExecutor {
    delay: Duration,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_MOCK_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            "Mock executor initialized, rewinds will only be simulated"
        );
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentExecutor for MockExecutor {
    async fn rewind(&self, deployment: &str, block_number: u64, block_hash: &str) -> RewindResult {
        let command = rewind_command(deployment, block_number, block_hash);
        tracing::info!(command = %command, "Simulating rewind");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let output = format!(
            "[mocked] deployment {deployment} would be rewound to block {block_number} ({block_hash}); nothing was executed"
        );
        RewindResult::succeeded(command, output, true)
    }

    async fn check_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: true,
            target: MOCK_TARGET.to_string(),
            message: Some("mock executor, no container is contacted".to_string()),
        }
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
