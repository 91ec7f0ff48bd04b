//! adsync CLI
//!
//! Local execution entry point. For AWS Lambda, use `adsync-lambda`.

use std::path::PathBuf;

use adsync::{
    config,
    error::Result,
    models::{Config, RunSummary},
    pipeline::{self, RunOrchestrator},
};
use clap::{Parser, Subcommand};

/// adsync - weekly ad image synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "adsync",
    version,
    about = "Mirror weekly-ad images from store pages into object storage"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process the next slice of targets and advance the checkpoint
    Run {
        /// Override sync.max_items_per_run
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Repeat runs until the cursor wraps back to 0
    Sweep {
        /// Upper bound on the number of runs
        #[arg(long, default_value_t = 1000)]
        max_runs: usize,
    },

    /// Show the stored checkpoint
    Status,

    /// Overwrite the checkpoint cursor
    Reset {
        #[arg(long, default_value_t = 0)]
        cursor: usize,
    },

    /// List resolved targets and their storage folders
    Targets,

    /// Validate configuration
    Validate,
}

/// Initialize logging from the config level, or debug with `--verbose`.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "Targets [{}, {}) of {}: {} attempted, {} succeeded, {} failed in {} batch(es), {}ms",
        summary.start_cursor,
        summary.start_cursor + summary.attempted,
        summary.target_count,
        summary.attempted,
        summary.succeeded,
        summary.failed.len(),
        summary.batches,
        summary.elapsed_ms()
    );
    log::info!(
        "Objects: {} uploaded, {} deleted, {} unchanged",
        summary.uploaded,
        summary.deleted,
        summary.unchanged
    );
    for failed in &summary.failed {
        log::warn!(
            "Failed: {} [{}] after {} attempt(s): {}",
            failed.target,
            failed.error_kind,
            failed.attempts,
            failed.error
        );
    }
    log::info!(
        "Next cursor: {}{}",
        summary.next_cursor,
        if summary.sweep_complete {
            " (sweep complete)"
        } else {
            ""
        }
    );
}

async fn orchestrator(config: &Config) -> Result<RunOrchestrator> {
    config.validate()?;
    pipeline::build_orchestrator(config).await
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    if !cli.config.exists() {
        log::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Run { max_items } => {
            let mut runner = orchestrator(&config).await?;
            if let Some(n) = max_items {
                runner = runner.with_max_items(n);
            }
            let summary = runner.run().await?;
            log_summary(&summary);
        }

        Command::Sweep { max_runs } => {
            let runner = orchestrator(&config).await?;
            let summaries = runner.sweep(max_runs).await?;
            for summary in &summaries {
                log_summary(summary);
            }
            if !summaries.last().is_some_and(|s| s.sweep_complete) {
                log::warn!("Stopped after {} run(s) before the sweep completed", max_runs);
            }
        }

        Command::Status => {
            let runner = orchestrator(&config).await?;
            let checkpoint = runner.status().await?;
            log::info!("Checkpoint: {}", runner.checkpoints().key());
            log::info!("Cursor: {}", checkpoint.cursor);
            log::info!("Updated: {}", checkpoint.updated_at.to_rfc3339());
        }

        Command::Reset { cursor } => {
            let runner = orchestrator(&config).await?;
            runner.reset(cursor).await?;
            log::info!("Cursor set to {}", cursor);
        }

        Command::Targets => {
            let runner = orchestrator(&config).await?;
            let targets = runner.targets().await?;
            for (index, target) in targets.iter().enumerate() {
                println!(
                    "{}\t{}\t{}",
                    index,
                    target.storage_folder(&config.targets.folder_key_param),
                    target.locator
                );
            }
            log::info!("{} targets", targets.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
