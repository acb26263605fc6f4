//! Sales Report - Retail Sales Cleaning, Growth Analysis & Chart Report
//!
//! Cleans a retail sales export, stages it in SQLite and reports yearly,
//! regional and sub-category aggregates as tables, JSON and PNG charts.

mod charts;
mod config;
mod data;
mod pipeline;
mod report;
mod stats;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{AnalysisConfig, Engine, YearRange};
use pipeline::Pipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Retail sales cleaning and growth analysis", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// First year of the analysis window
    #[arg(long, global = true)]
    year_min: Option<i32>,

    /// Last year of the analysis window
    #[arg(long, global = true)]
    year_max: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the raw sheet, clean it and write the pipe-delimited export
    Clean {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Stage a cleaned export into SQLite and create the yearly view
    Stage {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Compute aggregates from a cleaned export, print tables, write report and charts
    Analyze {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        engine: Option<Engine>,
        #[arg(long)]
        skip_charts: bool,
    },
    /// Run every stage end to end from the configuration
    Run {
        #[arg(long)]
        skip_charts: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::Clean { input, output } => {
            let cfg = pipeline.config();
            let input = input.unwrap_or_else(|| cfg.input.path.clone());
            let output = output.unwrap_or_else(|| cfg.export.path.clone());
            let cleaned = pipeline.clean(&input, &output)?;
            cleaned.cleaning.log_summary();
        }
        Command::Stage { input, database } => {
            let cfg = pipeline.config();
            let input = input.unwrap_or_else(|| cfg.export.path.clone());
            let database = database.unwrap_or_else(|| cfg.database.path.clone());
            let cleaned = pipeline.read_cleaned(&input)?;
            pipeline.stage(&cleaned.records, &database)?;
            cleaned.cleaning.log_summary();
        }
        Command::Analyze {
            input,
            engine,
            skip_charts,
        } => {
            let cfg = pipeline.config();
            let input = input.unwrap_or_else(|| cfg.export.path.clone());
            let engine = engine.unwrap_or(cfg.engine);
            let cleaned = pipeline.read_cleaned(&input)?;
            pipeline.analyze(&cleaned.records, engine, &cleaned.cleaning, skip_charts)?;
            cleaned.cleaning.log_summary();
        }
        Command::Run { skip_charts } => {
            pipeline.run(skip_charts)?;
        }
    }

    info!("Done");
    Ok(())
}

/// Load the config file and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::load(cli.config.as_deref()).context("Invalid configuration")?;

    let start = cli.year_min.unwrap_or(config.year_range.start);
    let end = cli.year_max.unwrap_or(config.year_range.end);
    config.year_range = YearRange::new(start, end).context("Invalid --year-min/--year-max")?;

    info!(
        start = config.year_range.start,
        end = config.year_range.end,
        engine = ?config.engine,
        "Configuration resolved"
    );
    Ok(config)
}
