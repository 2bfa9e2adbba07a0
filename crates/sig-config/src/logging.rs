use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// `[logging]` section. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level directive (`"info"`, `"debug"`, ...).
    pub level: String,
    /// Per-target overrides, e.g. `{ "sig_core::trigger" = "debug" }`.
    pub modules: BTreeMap<String, String>,
    /// Log file; relative paths are taken from the config file's directory.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: BTreeMap::new(),
            file: None,
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive string: the default level followed by the
    /// per-module overrides.
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            self.modules
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        directives.join(",")
    }

    pub fn resolved_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.file.as_ref().map(|f| {
            if f.is_absolute() {
                f.clone()
            } else {
                base_dir.join(f)
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}
