use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use sig_config::SignalConfig;
use sig_core::model::EventSummary;
use sig_core::rule::{ExprCompiler, RuleCompiler, RuleContext};
use sig_core::store::memory::{MemoryEventStore, MemoryStores, MemoryTriggerStore};
use sig_runtime::lifecycle::{TriggerService, load_triggers, wait_for_signal};
use sig_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "sigtrigger", about = "Event notification trigger engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process JSON Lines event summaries from stdin until SIGINT/SIGTERM
    Run {
        /// Path to sigtrigger.toml
        #[arg(short, long)]
        config: PathBuf,
        /// Trigger definitions (JSON array); overrides `[triggers] file`
        #[arg(short, long)]
        triggers: Option<PathBuf>,
    },
    /// Compile a rule and report errors; with --event, also evaluate it
    CheckRule {
        /// Rule source, e.g. "evt.severity == 'critical'"
        rule: String,
        /// Event summary (JSON) to evaluate the rule against
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, triggers } => run(config, triggers).await,
        Commands::CheckRule { rule, event } => check_rule(&rule, event.as_deref()),
    }
}

async fn run(config: PathBuf, triggers: Option<PathBuf>) -> Result<()> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let signal_config = SignalConfig::load(&config_path)?;
    let base_dir = SignalConfig::base_dir(&config_path);

    let _guard = init_tracing(&signal_config.logging, &base_dir)?;

    let trigger_file = triggers.or_else(|| signal_config.triggers.resolved_file(&base_dir));
    let triggers = match trigger_file {
        Some(path) => load_triggers(&path).map_err(|e| anyhow::anyhow!("{e}"))?,
        None => {
            tracing::warn!(domain = "conf", "no trigger file configured, nothing will match");
            Vec::new()
        }
    };

    let mem = MemoryStores::new(MemoryTriggerStore::from_triggers(triggers));
    let service = Arc::new(
        TriggerService::bootstrap(&signal_config, &base_dir, mem.stores())
            .map_err(|e| anyhow::anyhow!("{e}"))?,
    );

    let cancel = CancellationToken::new();
    let scheduler = service.start(cancel.child_token());
    tracing::info!(domain = "sys", triggers = mem.triggers.len(), "sigtrigger started");

    let ingest = tokio::spawn(ingest_stdin(
        Arc::clone(&service),
        Arc::clone(&mem.events),
        cancel.clone(),
    ));

    wait_for_signal(cancel.clone()).await;
    scheduler.stop().await.map_err(|e| anyhow::anyhow!("{e}"))?;
    let stats = ingest.await?;
    tracing::info!(
        domain = "sys",
        events = stats.events,
        rejected = stats.rejected,
        failed = stats.failed,
        "sigtrigger stopped"
    );
    Ok(())
}

#[derive(Debug, Default)]
struct IngestStats {
    events: u64,
    rejected: u64,
    failed: u64,
}

/// Feed one `EventSummary` per stdin line through the processor.
async fn ingest_stdin(
    service: Arc<TriggerService>,
    events: Arc<MemoryEventStore>,
    cancel: CancellationToken,
) -> IngestStats {
    let mut stats = IngestStats::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(domain = "pipe", "stdin closed, waiting for shutdown signal");
                break;
            }
            Err(e) => {
                tracing::warn!(domain = "pipe", error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let summary: EventSummary = match serde_json::from_str(&line) {
            Ok(s) => s,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(domain = "pipe", error = %e, "malformed event summary skipped");
                continue;
            }
        };
        stats.events += 1;
        events.upsert(summary.clone());
        match service.on_event(&summary) {
            Ok(outcome) => tracing::debug!(
                domain = "pipe",
                event = %summary.uuid,
                matched = outcome.matched,
                dispatched = outcome.dispatched,
                spooled = outcome.spooled,
                cancelled = outcome.cancelled,
                "event processed"
            ),
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(domain = "pipe", event = %summary.uuid, error = %e, "event processing failed");
            }
        }
    }
    stats
}

fn check_rule(rule: &str, event: Option<&Path>) -> Result<()> {
    let compiled = ExprCompiler
        .compile(rule)
        .map_err(|e| anyhow::anyhow!("rule rejected: {e}"))?;
    println!("ok: {}", compiled.source());

    if let Some(path) = event {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let summary: EventSummary = serde_json::from_str(&content)?;
        let ctx = RuleContext::build(&summary);
        match compiled.evaluate(&ctx) {
            Ok(matched) => println!("{}: {matched}", summary.uuid),
            Err(e) => println!("{}: false ({e})", summary.uuid),
        }
    }
    Ok(())
}
