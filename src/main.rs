use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use drift_watcher::config::AppConfig;
use drift_watcher::fetcher::ChromeFetcher;
use drift_watcher::notifier::WebhookNotifier;
use drift_watcher::pipeline::{self, RunContext};
use drift_watcher::run_lock::RunLock;
use drift_watcher::store::Store;

/// One pipeline run per invocation; scheduling lives outside (cron).
#[derive(Parser, Debug)]
#[command(name = "drift-watcher", version, about)]
struct Cli {
    /// Override the configured alert threshold (percent drop / match score)
    #[arg(long)]
    threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drift_watcher=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(threshold) = cli.threshold {
        config.tracker.threshold = threshold.abs();
    }

    info!(
        targets = config.targets.len(),
        threshold = config.tracker.threshold,
        "starting run"
    );

    let _lock = RunLock::acquire(&config.database.lock_path)?;
    let store = Store::open(&config.database.url).await?;
    let fetcher = ChromeFetcher::new(config.fetcher.clone())?;
    let notifier = WebhookNotifier::new(&config.notifications);

    let ctx = RunContext {
        store: &store,
        fetcher: &fetcher,
        notifier: &notifier,
        config: &config,
    };

    let summary = pipeline::run(&ctx).await?;

    if summary.targets_skipped > 0 || summary.store_failed > 0 {
        warn!(
            targets_skipped = summary.targets_skipped,
            store_failed = summary.store_failed,
            "run finished with partial results"
        );
    }
    info!(
        fetched = summary.fetched,
        extracted = summary.extracted,
        new = summary.new,
        updated = summary.updated,
        unchanged = summary.unchanged,
        skipped_malformed = summary.skipped_malformed,
        alerted = summary.alerted,
        alert_suppressed = summary.alert_suppressed,
        notify_failed = summary.notify_failed,
        "run complete"
    );

    Ok(())
}
