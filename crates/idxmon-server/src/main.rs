use anyhow::Result;
use idxmon_alert::engine::RuleEngine;
use idxmon_executor::config::build_executor;
use idxmon_notify::dispatcher::NotificationDispatcher;
use idxmon_notify::plugin::ChannelRegistry;
use tokio::signal;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use idxmon_server::channel_builder;
use idxmon_server::config::ServerConfig;
use idxmon_server::monitor::Monitor;
use idxmon_server::rule_builder;
use idxmon_server::source::{CachedSnapshotSource, FileSnapshotSource};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  idxmon-server [config.toml]                                          Run the allocation monitor");
    eprintln!("  idxmon-server rewind <config.toml> <deployment> <block> <block_hash> Rewind a deployment");
    eprintln!("  idxmon-server check-executor <config.toml>                           Check the rewind backend");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("idxmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("rewind") => {
            let (Some(config_path), Some(deployment), Some(block), Some(block_hash)) =
                (args.get(2), args.get(3), args.get(4), args.get(5))
            else {
                print_usage();
                anyhow::bail!(
                    "rewind requires <config.toml> <deployment> <block_number> <block_hash> arguments"
                );
            };
            let block_number: u64 = block
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid block number '{block}': {e}"))?;
            run_rewind(config_path, deployment, block_number, block_hash).await
        }
        Some("check-executor") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("check-executor requires <config.toml> argument")
            })?;
            run_check_executor(config_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/idxmon.toml");
            run_monitor(config_path).await
        }
    }
}

#[allow(clippy::print_stdout)]
async fn run_rewind(
    config_path: &str,
    deployment: &str,
    block_number: u64,
    block_hash: &str,
) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let executor = build_executor(&config.executor)?;

    let status = executor.check_connection().await;
    if !status.connected {
        tracing::warn!(
            target_name = %status.target,
            detail = status.message.as_deref().unwrap_or(""),
            "Executor target not reachable, attempting rewind anyway"
        );
    }

    let result = executor.rewind(deployment, block_number, block_hash).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        tracing::info!(command = %result.command, dry_run = result.dry_run, "Rewind finished");
        Ok(())
    } else {
        let cause = result
            .failure
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown failure".to_string());
        Err(anyhow::anyhow!("Rewind failed ({cause}): {}", result.command))
    }
}

#[allow(clippy::print_stdout)]
async fn run_check_executor(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let executor = build_executor(&config.executor)?;
    let status = executor.check_connection().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    tracing::info!(
        mode = %config.executor.mode,
        dry_run = executor.is_dry_run(),
        connected = status.connected,
        "Executor checked"
    );
    if status.connected {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Executor target '{}' is not reachable", status.target))
    }
}

async fn run_monitor(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    idxmon_common::id::init(config.monitor.machine_id, config.monitor.node_id);

    tracing::info!(
        tick_secs = config.monitor.tick_secs,
        snapshot = %config.monitor.snapshot_path,
        executor = %config.executor.mode,
        "idxmon-server starting"
    );

    let mut engine = RuleEngine::new(vec![]);
    rule_builder::reload_rule_engine(&mut engine, &config.rules);

    let registry = ChannelRegistry::default();
    let channels = channel_builder::build_channels(&registry, &config.channels);
    let mut dispatcher = NotificationDispatcher::new(channels);
    if let Some(secs) = config.monitor.dispatch_timeout_secs {
        dispatcher = dispatcher.with_timeout(Duration::from_secs(secs));
    }

    let ttl = i64::try_from(config.monitor.network_cache_ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow::anyhow!("monitor.network_cache_ttl_secs is out of range"))?;
    let source = CachedSnapshotSource::new(
        FileSnapshotSource::new(&config.monitor.snapshot_path),
        ttl,
    );

    let mut monitor = Monitor::new(engine, dispatcher, source);

    tokio::select! {
        _ = monitor.run(config.monitor.tick_secs) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    tracing::info!("Monitor stopped");
    Ok(())
}
