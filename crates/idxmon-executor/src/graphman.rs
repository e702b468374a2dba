use crate::{
    rewind_args, rewind_command, ConnectionStatus, DeploymentExecutor, RewindFailure,
    RewindResult,
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Accepts an IPFS deployment hash (`Qm...`) or a deployment namespace
/// (`sgd42`).
pub fn validate_deployment(deployment: &str) -> Result<(), String> {
    if let Some(rest) = deployment.strip_prefix("Qm") {
        if !rest.is_empty() && rest.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Ok(());
        }
    } else if let Some(rest) = deployment.strip_prefix("sgd") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return Ok(());
        }
    }
    Err(format!(
        "invalid deployment '{deployment}': expected an IPFS hash (Qm...) or a namespace (sgdN)"
    ))
}

pub fn validate_block_hash(block_hash: &str) -> Result<(), String> {
    match block_hash.strip_prefix("0x") {
        Some(hex)
            if (1..=64).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            Ok(())
        }
        _ => Err(format!(
            "invalid block hash '{block_hash}': expected 0x followed by up to 64 hex digits"
        )),
    }
}

/// Docker reports these when the container is stopped or missing.
fn is_unreachable_container(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("is not running")
        || stderr.contains("no such container")
        || stderr.contains("cannot connect to the docker daemon")
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (true, true) => String::new(),
    }
}

/// Runs graphman inside a running graph-node container via `docker exec`.
pub struct GraphmanExecutor {
    docker_bin: String,
    container: String,
    graphman_config: Option<String>,
}

impl GraphmanExecutor {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            docker_bin: "docker".to_string(),
            container: container.into(),
            graphman_config: None,
        }
    }

    pub fn with_docker_bin(mut self, docker_bin: impl Into<String>) -> Self {
        self.docker_bin = docker_bin.into();
        self
    }

    /// Passes `--config <path>` to graphman. The path is inside the container.
    pub fn with_graphman_config(mut self, path: impl Into<String>) -> Self {
        self.graphman_config = Some(path.into());
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    fn exec_args(&self, deployment: &str, block_number: u64, block_hash: &str) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            self.container.clone(),
            "graphman".to_string(),
        ];
        if let Some(path) = &self.graphman_config {
            args.push("--config".to_string());
            args.push(path.clone());
        }
        args.extend(rewind_args(deployment, block_number, block_hash));
        args
    }
}

#[async_trait]
impl DeploymentExecutor for GraphmanExecutor {
    async fn rewind(&self, deployment: &str, block_number: u64, block_hash: &str) -> RewindResult {
        let command = rewind_command(deployment, block_number, block_hash);

        let valid = validate_deployment(deployment).and_then(|_| validate_block_hash(block_hash));
        if let Err(reason) = valid {
            tracing::warn!(command = %command, "Rejected rewind: {reason}");
            return RewindResult::failed(command, reason, RewindFailure::InvalidInput);
        }

        tracing::info!(
            container = %self.container,
            deployment,
            block_number,
            "Executing graphman rewind"
        );

        let output = Command::new(&self.docker_bin)
            .args(self.exec_args(deployment, block_number, block_hash))
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    docker_bin = %self.docker_bin,
                    error = %e,
                    "Failed to spawn docker"
                );
                return RewindResult::failed(
                    command,
                    format!("failed to run '{}': {e}", self.docker_bin),
                    RewindFailure::Unreachable,
                );
            }
        };

        let text = combine_output(&output.stdout, &output.stderr);
        if output.status.success() {
            tracing::info!(deployment, block_number, "Rewind completed");
            return RewindResult::succeeded(command, text, false);
        }

        let failure = if is_unreachable_container(&String::from_utf8_lossy(&output.stderr)) {
            RewindFailure::Unreachable
        } else {
            RewindFailure::NonZeroExit {
                code: output.status.code(),
            }
        };
        tracing::error!(deployment, block_number, failure = %failure, "Rewind failed");
        let text = if text.is_empty() {
            format!("graphman {failure} without output")
        } else {
            text
        };
        RewindResult::failed(command, text, failure)
    }

    async fn check_connection(&self) -> ConnectionStatus {
        let output = Command::new(&self.docker_bin)
            .args(["inspect", "-f", "{{.State.Running}}", self.container.as_str()])
            .stdin(Stdio::null())
            .output()
            .await;

        let (connected, message) = match output {
            Ok(output) if output.status.success() => {
                let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if state == "true" {
                    (true, None)
                } else {
                    (false, Some(format!("container is not running (state: {state})")))
                }
            }
            Ok(output) => (
                false,
                Some(combine_output(&output.stdout, &output.stderr)),
            ),
            Err(e) => (false, Some(format!("failed to run '{}': {e}", self.docker_bin))),
        };

        ConnectionStatus {
            connected,
            target: self.container.clone(),
            message,
        }
    }

    fn is_dry_run(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ipfs_hashes_and_namespaces() {
        assert!(validate_deployment("Qm123").is_ok());
        assert!(validate_deployment("QmWmyoMoctfbAaiEs2G46gpeUmhqFRDW6KWo64y5r581Vz").is_ok());
        assert!(validate_deployment("sgd42").is_ok());
    }

    #[test]
    fn rejects_malformed_deployments() {
        for bad in ["", "Qm", "Qm0OIl", "sgd", "sgdx", "Qm12; rm -rf /", "deployment"] {
            assert!(validate_deployment(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn block_hash_needs_hex_after_prefix() {
        assert!(validate_block_hash("0xabc").is_ok());
        assert!(validate_block_hash(&format!("0x{}", "f".repeat(64))).is_ok());
        assert!(validate_block_hash("0x").is_err());
        assert!(validate_block_hash("abc").is_err());
        assert!(validate_block_hash("0xzz").is_err());
        assert!(validate_block_hash(&format!("0x{}", "f".repeat(65))).is_err());
    }

    #[test]
    fn exec_args_include_graphman_config() {
        let executor =
            GraphmanExecutor::new("graph-node").with_graphman_config("/etc/graphman.toml");
        assert_eq!(
            executor.exec_args("Qm123", 1000, "0xabc").join(" "),
            "exec graph-node graphman --config /etc/graphman.toml rewind Qm123 1000 0xabc"
        );
    }

    #[test]
    fn output_joins_both_streams() {
        assert_eq!(combine_output(b"done\n", b""), "done");
        assert_eq!(combine_output(b"", b"boom\n"), "boom");
        assert_eq!(combine_output(b"a\n", b"b\n"), "a\nb");
    }

    #[test]
    fn recognizes_stopped_container() {
        assert!(is_unreachable_container(
            "Error response from daemon: container 1f2e is not running"
        ));
        assert!(is_unreachable_container("Error: No such container: graph-node"));
        assert!(!is_unreachable_container("deployment not found"));
    }
}
