use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::publish::PublishConfig;
use crate::rules::RulesConfig;
use crate::scheduler::SchedulerConfig;
use crate::validate;

/// `[triggers]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggersConfig {
    /// JSON file holding the trigger definitions loaded at startup.
    pub file: Option<PathBuf>,
}

impl TriggersConfig {
    pub fn resolved_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.file.as_ref().map(|f| base_dir.join(f))
    }
}

/// Parsed and validated `sigtrigger.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    pub publish: PublishConfig,
    #[serde(default)]
    pub triggers: TriggersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SignalConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        content
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
    }

    /// Directory that relative paths in a config loaded from `path` refer to.
    pub fn base_dir(path: &Path) -> PathBuf {
        match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl FromStr for SignalConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: SignalConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}
