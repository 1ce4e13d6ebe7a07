//! CLI entry point for the article vector index.
//!
//! Provides commands for running index builds, querying the index, and
//! running the periodic scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use artvec::display::{create_hits_table, create_run_table, create_status_table};
use artvec::io::ExitCode;
use artvec::jobs::{IndexPipeline, RunOutcome, Scheduler};
use artvec::{Hit, PipelineContext, PipelineError, RunMode, Settings};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use tracing::{Level, debug, info, warn};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Article vector index
#[derive(Parser)]
#[command(
    name = "artvec",
    version = env!("CARGO_PKG_VERSION"),
    about = "Article vector index",
    long_about = "Keep a dense-vector index of articles in sync and query it for similar articles and recommendations.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ artvec init\n  $ artvec index --full\n  $ artvec search \"transfer window\"\n  $ artvec serve"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    #[command(about = "Set up .artvec directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    #[command(about = "Display active settings from .artvec/settings.toml")]
    Config,

    /// Run one indexing pass
    #[command(
        about = "Run one full or incremental indexing pass",
        after_help = "Examples:\n  artvec index --full\n  artvec index\n  artvec index --json | jq '.written | length'"
    )]
    Index {
        /// Refit the models over every eligible article and rebuild the index
        #[arg(long, conflicts_with = "incremental")]
        full: bool,

        /// Encode only articles not yet indexed (default)
        #[arg(long)]
        incremental: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Free-text similarity search
    #[command(
        about = "Find articles similar to a free-text query",
        after_help = "Examples:\n  artvec search \"derby result\"\n  artvec search \"cup final\" --limit 5 --json"
    )]
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Recommend articles for a user
    #[command(
        about = "Recommend articles from a user's profile vector",
        after_help = "Examples:\n  artvec recommend 42\n  artvec recommend 42 --limit 20 --json"
    )]
    Recommend {
        /// User id whose profile vector is used
        user_id: i64,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run the periodic scheduler
    #[command(
        about = "Run incremental and full indexing on their configured intervals",
        after_help = "Examples:\n  artvec serve\n  artvec serve --ticks 3"
    )]
    Serve {
        /// Stop each worker after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Show model and index status
    #[command(about = "Show the fitted model pair and index entry count")]
    Status,
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<PipelineError>() {
                Some(pipeline_err) => {
                    for suggestion in pipeline_err.recovery_suggestions() {
                        eprintln!("  - {suggestion}");
                    }
                    ExitCode::from_error(pipeline_err)
                }
                None => ExitCode::GeneralError,
            }
        }
    };

    std::process::exit(code.into());
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Commands::Init { force } = cli.command {
        Settings::init_config_file(force)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Could not create configuration file")?;
        println!("Edit this file to customize your settings.");
        return Ok(ExitCode::Success);
    }

    if cli.config.is_none() {
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| PipelineError::Config {
        reason: e.to_string(),
    })?;

    init_logging(cli.verbose || settings.debug);

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.vectorize.parallel_threads)
        .build_global()
    {
        warn!("Could not size the worker pool, using defaults: {e}");
    }

    if let Commands::Config = cli.command {
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(ExitCode::Success);
    }

    let ctx = Arc::new(PipelineContext::from_settings(&settings)?);
    debug!(index = %settings.index.name, "Context built");

    match cli.command {
        Commands::Init { .. } | Commands::Config => Ok(ExitCode::Success),

        Commands::Index { full, json, .. } => {
            let mode = if full {
                RunMode::Full
            } else {
                RunMode::Incremental
            };
            let outcome = IndexPipeline::new(Arc::clone(&ctx)).run(mode);
            match &outcome {
                RunOutcome::Completed(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(report)?);
                    } else {
                        println!("{}", create_run_table(report));
                        for failure in &report.failed {
                            eprintln!("  failed {}: {}", failure.id, failure.reason);
                        }
                    }
                }
                RunOutcome::Skipped => {
                    eprintln!("Another run is in progress, {mode} run skipped");
                }
                RunOutcome::Failed(err) => {
                    eprintln!("Error: {err}");
                    for suggestion in err.recovery_suggestions() {
                        eprintln!("  - {suggestion}");
                    }
                }
            }
            Ok(ExitCode::from_outcome(&outcome))
        }

        Commands::Search { query, limit, json } => {
            let hits = ctx.query_service().search(&query, limit)?;
            print_hits(&hits, json)?;
            Ok(ExitCode::from_hits(&hits))
        }

        Commands::Recommend {
            user_id,
            limit,
            json,
        } => {
            let hits = ctx.query_service().recommend(user_id, limit)?;
            if hits.is_empty() && !json {
                eprintln!("No recommendations for user {user_id}");
            }
            print_hits(&hits, json)?;
            Ok(ExitCode::from_hits(&hits))
        }

        Commands::Serve { ticks } => {
            let mut scheduler = Scheduler::new(IndexPipeline::new(ctx), &settings.scheduler);
            if let Some(ticks) = ticks {
                scheduler = scheduler.with_max_ticks(ticks);
            }
            let handle = scheduler.start();
            for (mode, stats) in handle.join() {
                info!(
                    %mode,
                    ticks = stats.ticks,
                    completed = stats.completed,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Worker finished"
                );
            }
            Ok(ExitCode::Success)
        }

        Commands::Status => {
            let store = ctx.vectorizer.store();
            let metadata = if store.exists() {
                match store.metadata() {
                    Ok(meta) => Some(meta),
                    Err(e) => {
                        warn!("Could not read model metadata: {e}");
                        None
                    }
                }
            } else {
                None
            };
            let entries = match ctx.index.count() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("Could not count index entries: {e}");
                    None
                }
            };
            println!("{}", create_status_table(metadata.as_ref(), entries));
            Ok(ExitCode::Success)
        }
    }
}

fn print_hits(hits: &[Hit], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
    } else if !hits.is_empty() {
        println!("{}", create_hits_table(hits));
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
