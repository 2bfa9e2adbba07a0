use serde::Deserialize;

use crate::types::HumanDuration;

pub const DEFAULT_MAX_POLL_INTERVAL: HumanDuration = HumanDuration::from_secs(60);

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Upper bound on the time between two spool passes.
    pub max_poll_interval: HumanDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}
