//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "dvch")]
#[command(about = "Concurrent harvester for the national public-service procedure catalog")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of harvest workers
    #[arg(short, long, env = "DVCH_WORKERS")]
    workers: Option<usize>,

    /// Listing URL to harvest
    #[arg(long, env = "DVCH_URL")]
    url: Option<String>,

    /// Output directory for checkpoint files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many listing pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Show per-item progress
    #[arg(short = 'P', long)]
    progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Parse arguments and run the harvest.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(url) = cli.url {
        settings.base_url = url;
    }
    if let Some(output) = cli.output {
        settings.output_dir = output;
    }
    if cli.max_pages.is_some() {
        settings.max_pages = cli.max_pages;
    }
    settings.validate()?;

    run_harvest(settings, cli.progress).await
}

#[cfg(feature = "browser")]
async fn run_harvest(settings: Settings, show_progress: bool) -> anyhow::Result<()> {
    use std::sync::Arc;

    use console::style;
    use tokio::sync::mpsc;

    use crate::extract::DvcExtractor;
    use crate::harvest::HarvestEvent;
    use crate::orchestrator::Harvester;
    use crate::session::chrome::ChromeSessionFactory;

    println!(
        "{} Harvesting {} with {} workers",
        style("→").cyan(),
        settings.base_url,
        settings.workers
    );

    let factory = Arc::new(ChromeSessionFactory::launch(settings.headless).await?);
    let extractor = Arc::new(DvcExtractor::new(settings.wait_policy()));

    let (event_tx, event_rx) = mpsc::channel::<HarvestEvent>(100);
    let progress_handle = tokio::spawn(progress_loop(event_rx, show_progress));

    let output_dir = settings.output_dir.clone();
    let harvester = Harvester::new(settings, factory.clone(), extractor, event_tx);
    let result = harvester.run().await;

    // Dropping the harvester closes the event channel and ends the
    // progress task.
    drop(harvester);
    let _ = progress_handle.await;

    match Arc::try_unwrap(factory) {
        Ok(factory) => factory.shutdown().await,
        Err(_) => tracing::warn!("browser factory still referenced at shutdown"),
    }

    let summary = result?;
    print_summary(&summary, &output_dir);
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn run_harvest(_settings: Settings, _show_progress: bool) -> anyhow::Result<()> {
    anyhow::bail!("Browser support not compiled. Rebuild with: cargo build --features browser")
}

#[cfg(feature = "browser")]
fn print_summary(summary: &crate::orchestrator::HarvestSummary, output_dir: &std::path::Path) {
    use console::style;

    println!(
        "{} Harvest complete: {} records across {} pages ({} items failed, {} listed)",
        style("✓").green(),
        summary.records_harvested,
        summary.pages_processed,
        summary.items_failed,
        summary.total_expected
    );
    println!(
        "  {} Checkpoints in {}",
        style("→").dim(),
        output_dir.display()
    );
}

/// Render harvest events as a per-page progress bar.
#[cfg(feature = "browser")]
async fn progress_loop(
    mut events: tokio::sync::mpsc::Receiver<crate::harvest::HarvestEvent>,
    detailed: bool,
) {
    use console::style;
    use indicatif::{ProgressBar, ProgressStyle};

    use crate::harvest::HarvestEvent;

    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            HarvestEvent::PageStarted { page, items } => {
                let pb = ProgressBar::new(items as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                        .unwrap()
                        .progress_chars("█▓░"),
                );
                pb.set_message(format!("Page {page}"));
                bar = Some(pb);
            }
            HarvestEvent::ItemStarted { .. } => {}
            HarvestEvent::ItemCompleted { worker, title } => {
                if let Some(ref pb) = bar {
                    pb.inc(1);
                    if detailed {
                        pb.println(format!(
                            "  {} [w{}] {}",
                            style("✓").green(),
                            worker,
                            title
                        ));
                    }
                }
            }
            HarvestEvent::ItemFailed {
                worker,
                url,
                reason,
            } => {
                if let Some(ref pb) = bar {
                    pb.inc(1);
                    pb.println(format!(
                        "  {} [w{}] {}: {}",
                        style("✗").red(),
                        worker,
                        url,
                        reason
                    ));
                }
            }
            HarvestEvent::PageCompleted {
                page,
                harvested,
                failed,
            } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                println!(
                    "{} Page {}: {} harvested, {} failed",
                    style("•").cyan(),
                    page,
                    harvested,
                    failed
                );
            }
        }
    }
}
