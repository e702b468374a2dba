use crate::config::ChannelDefinition;
use anyhow::Result;
use idxmon_common::types::Severity;
use idxmon_notify::plugin::ChannelRegistry;
use idxmon_notify::{ChannelMeta, NotificationChannel};
use std::sync::Arc;

/// Instantiates one `[[channels]]` entry through its plugin.
pub fn build_channel(
    registry: &ChannelRegistry,
    def: &ChannelDefinition,
) -> Result<Arc<dyn NotificationChannel>> {
    let min_severity: Severity = def
        .min_severity
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{e}"))?;
    let mut meta =
        ChannelMeta::new(def.id.clone(), def.name.clone()).with_min_severity(min_severity);
    if !def.enabled {
        meta = meta.disabled();
    }
    Ok(registry.create_channel(&def.channel_type, meta, &def.config)?)
}

/// Instantiates every definition, skipping invalid ones with warnings.
/// Disabled channels are kept so dispatch can report them as skipped.
pub fn build_channels(
    registry: &ChannelRegistry,
    defs: &[ChannelDefinition],
) -> Vec<Arc<dyn NotificationChannel>> {
    let mut channels = Vec::with_capacity(defs.len());
    for def in defs {
        match build_channel(registry, def) {
            Ok(channel) => {
                let config = registry
                    .get_plugin(&def.channel_type)
                    .map(|p| p.redact_config(&def.config))
                    .unwrap_or_default();
                tracing::info!(
                    channel_id = %def.id,
                    channel_type = %def.channel_type,
                    enabled = def.enabled,
                    config = %config,
                    "Notification channel loaded"
                );
                channels.push(channel);
            }
            Err(e) => {
                tracing::warn!(
                    channel_id = %def.id,
                    channel_name = %def.name,
                    channel_type = %def.channel_type,
                    error = %e,
                    "Skipping invalid notification channel"
                );
            }
        }
    }
    channels
}
