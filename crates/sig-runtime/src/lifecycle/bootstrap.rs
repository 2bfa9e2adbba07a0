use std::path::Path;
use std::sync::Arc;

use orion_error::{ErrorOwe, ErrorOweBase};
use orion_error::prelude::*;
use sig_config::{SignalConfig, SinkUri};
use sig_core::model::Trigger;
use sig_core::signal::{FanOutPublisher, JsonlSignalPublisher, SignalPublisher};

use crate::error::{RuntimeReason, RuntimeResult};

/// One publisher per configured sink; several are wrapped in a fan-out.
pub(crate) fn build_publisher(
    config: &SignalConfig,
    base_dir: &Path,
) -> RuntimeResult<Arc<dyn SignalPublisher>> {
    let uris = config.publish.sink_uris(base_dir).owe_conf()?;
    let mut publishers: Vec<Box<dyn SignalPublisher>> = Vec::with_capacity(uris.len());
    for uri in uris {
        match uri {
            SinkUri::File(path) => {
                let publisher = JsonlSignalPublisher::open(&path)
                    .owe(RuntimeReason::Bootstrap)
                    .position(path.display().to_string())?;
                sig_debug!(res, path = %path.display(), "file sink opened");
                publishers.push(Box::new(publisher));
            }
        }
    }
    if publishers.len() == 1
        && let Some(single) = publishers.pop()
    {
        return Ok(Arc::from(single));
    }
    Ok(Arc::new(FanOutPublisher::new(publishers)))
}

/// Read trigger definitions (a JSON array) from `path`.
pub fn load_triggers(path: &Path) -> RuntimeResult<Vec<Trigger>> {
    let content = std::fs::read_to_string(path)
        .owe_sys()
        .position(path.display().to_string())?;
    let triggers: Vec<Trigger> = serde_json::from_str(&content)
        .owe(RuntimeReason::Bootstrap)
        .position(path.display().to_string())?;
    let enabled = triggers.iter().filter(|t| t.enabled).count();
    sig_info!(conf, path = %path.display(), triggers = triggers.len(), enabled, "triggers loaded");
    Ok(triggers)
}
