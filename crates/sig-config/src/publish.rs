use std::path::{Path, PathBuf};

use serde::Deserialize;

/// `[publish]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Signal destinations, e.g. `"file:///var/log/signals.jsonl"`.
    pub sinks: Vec<String>,
}

impl PublishConfig {
    /// Parse every sink, resolving relative file paths against `base_dir`.
    pub fn sink_uris(&self, base_dir: &Path) -> anyhow::Result<Vec<SinkUri>> {
        self.sinks
            .iter()
            .map(|s| parse_sink_uri(s).map(|uri| uri.relative_to(base_dir)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUri {
    /// Append one JSON line per signal.
    File(PathBuf),
}

impl SinkUri {
    fn relative_to(self, base_dir: &Path) -> Self {
        match self {
            SinkUri::File(p) if p.is_relative() => SinkUri::File(base_dir.join(p)),
            other => other,
        }
    }
}

pub fn parse_sink_uri(uri: &str) -> anyhow::Result<SinkUri> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| anyhow::anyhow!("sink {uri:?} has no scheme"))?;
    match scheme {
        "file" => {
            if rest.is_empty() {
                anyhow::bail!("sink {uri:?} has an empty path");
            }
            Ok(SinkUri::File(PathBuf::from(rest)))
        }
        other => anyhow::bail!("unsupported sink scheme {other:?} in {uri:?}"),
    }
}
