pub mod logging;
pub mod publish;
pub mod rules;
pub mod scheduler;
pub mod signal;
pub mod types;
mod validate;

pub use logging::{LogFormat, LoggingConfig};
pub use publish::{PublishConfig, SinkUri, parse_sink_uri};
pub use rules::RulesConfig;
pub use scheduler::SchedulerConfig;
pub use signal::{SignalConfig, TriggersConfig};
pub use types::HumanDuration;
