use crate::publish::parse_sink_uri;
use crate::signal::SignalConfig;

/// Called from `SignalConfig::from_str`.
pub(crate) fn validate(config: &SignalConfig) -> anyhow::Result<()> {
    if config.scheduler.max_poll_interval.is_zero() {
        anyhow::bail!("scheduler.max_poll_interval must be > 0");
    }
    if config.rules.cache_capacity == 0 {
        anyhow::bail!("rules.cache_capacity must be > 0");
    }
    if config.publish.sinks.is_empty() {
        anyhow::bail!("publish.sinks must contain at least one sink URI");
    }
    for (i, uri) in config.publish.sinks.iter().enumerate() {
        parse_sink_uri(uri).map_err(|e| anyhow::anyhow!("publish.sinks[{i}]: {e}"))?;
    }
    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }
    Ok(())
}
