// MIDA command line: crawl every task in a JSON task file.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mida::{ChromiumTransport, DefaultSanitizer, FileDispatcher, Pipeline, PipelineConfig};

/// Visit every URL in a task file with an instrumented browser and store the results
#[derive(Parser)]
#[command(name = "mida")]
#[command(version)]
struct Cli {
    /// JSON file holding an array of raw tasks
    tasks: PathBuf,

    /// Number of parallel browsers
    #[arg(long, default_value_t = 1)]
    crawlers: usize,

    /// Number of parallel storage workers
    #[arg(long, default_value_t = 1)]
    storers: usize,

    /// Results directory for tasks that do not name one
    #[arg(long, default_value = mida::task::sanitize::DEFAULT_LOCAL_OUTPUT_PATH)]
    out: PathBuf,

    /// Root for per-task working directories
    #[arg(long)]
    temp_root: Option<PathBuf>,

    /// Minimum milliseconds between two browser launches
    #[arg(long, default_value_t = 0)]
    intake_interval_ms: u64,

    /// Process tasks in file order instead of shuffling them
    #[arg(long)]
    no_shuffle: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut builder = PipelineConfig::builder()
        .crawlers(cli.crawlers)
        .storers(cli.storers)
        .intake_interval(Duration::from_millis(cli.intake_interval_ms));
    if let Some(root) = cli.temp_root {
        let root = std::path::absolute(&root)
            .with_context(|| format!("Invalid temp root {}", root.display()))?;
        builder = builder.temp_root(root);
    }
    let config = builder.build().context("Invalid pipeline configuration")?;

    let dispatcher = FileDispatcher::open(&cli.tasks, !cli.no_shuffle)?;
    let sanitizer = DefaultSanitizer::new(config.temp_root()).local_output(cli.out);

    let pipeline = Pipeline::new(config, Arc::new(ChromiumTransport::new()));

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling pipeline");
            cancel.cancel();
        }
    });

    let report = pipeline.run(dispatcher, sanitizer).await?;
    log::info!(
        "Done: {} admitted, {} invalid, {} stored, {} retried, {} abandoned",
        report.admitted,
        report.invalid,
        report.stored,
        report.retried,
        report.abandoned
    );
    Ok(())
}
