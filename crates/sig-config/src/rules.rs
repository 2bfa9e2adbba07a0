use serde::Deserialize;

pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// `[rules]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Maximum number of compiled rules kept in the evaluator cache.
    pub cache_capacity: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
