//! Deployment rewind execution.
//!
//! A [`DeploymentExecutor`] rolls a subgraph deployment back to a historical
//! block. [`graphman::GraphmanExecutor`] runs graphman inside the graph-node
//! container; [`mock::MockExecutor`] only simulates it. Both build the same
//! command string through [`rewind_command`], and neither ever returns an
//! error from its operations: a failed rewind is reported in the
//! [`RewindResult`].

pub mod config;
pub mod error;
pub mod graphman;
pub mod mock;


use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Arguments passed to graphman for a rewind, after any global options.
pub fn rewind_args(deployment: &str, block_number: u64, block_hash: &str) -> Vec<String> {
    vec![
        "rewind".to_string(),
        deployment.to_string(),
        block_number.to_string(),
        block_hash.to_string(),
    ]
}

/// The operator-facing command for a rewind.
///
/// ```
/// assert_eq!(
///     idxmon_executor::rewind_command("Qm123", 1000, "0xabc"),
///     "graphman rewind Qm123 1000 0xabc"
/// );
/// ```
pub fn rewind_command(deployment: &str, block_number: u64, block_hash: &str) -> String {
    let mut parts = vec!["graphman".to_string()];
    parts.extend(rewind_args(deployment, block_number, block_hash));
    parts.join(" ")
}

/// Why a rewind did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewindFailure {
    /// Deployment or block hash was malformed; nothing was executed.
    InvalidInput,
    /// The container or the docker CLI could not be reached.
    Unreachable,
    /// graphman ran and exited unsuccessfully. `code` is `None` when the
    /// process was killed by a signal.
    NonZeroExit { code: Option<i32> },
}

impl fmt::Display for RewindFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewindFailure::InvalidInput => write!(f, "invalid input"),
            RewindFailure::Unreachable => write!(f, "target unreachable"),
            RewindFailure::NonZeroExit { code: Some(code) } => write!(f, "exited with code {code}"),
            RewindFailure::NonZeroExit { code: None } => write!(f, "terminated by signal"),
        }
    }
}

/// Outcome of one rewind attempt. `command` is always the command that was,
/// or would have been, executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewindResult {
    pub success: bool,
    pub command: String,
    pub output: String,
    pub dry_run: bool,
    pub failure: Option<RewindFailure>,
}

impl RewindResult {
    pub fn succeeded(command: String, output: String, dry_run: bool) -> Self {
        Self {
            success: true,
            command,
            output,
            dry_run,
            failure: None,
        }
    }

    pub fn failed(command: String, output: String, failure: RewindFailure) -> Self {
        Self {
            success: false,
            command,
            output,
            dry_run: false,
            failure: Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Container name, or the mock target.
    pub target: String,
    pub message: Option<String>,
}

/// Executes, or simulates, administrative rewinds against an indexing node.
#[async_trait]
pub trait DeploymentExecutor: Send + Sync {
    /// Rolls `deployment` back to `block_number`, identified again by
    /// `block_hash`. Resolves once the backend has finished.
    async fn rewind(&self, deployment: &str, block_number: u64, block_hash: &str) -> RewindResult;

    /// Whether the execution target is currently reachable.
    async fn check_connection(&self) -> ConnectionStatus;

    /// True when this backend only simulates execution.
    fn is_dry_run(&self) -> bool;
}
