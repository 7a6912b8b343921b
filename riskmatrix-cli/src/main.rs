//! Risk matrix CLI - inspect tenant matrix settings and risk exports offline

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - stdout carries rendered output only; diagnostics go to stderr

use anyhow::Context;
use clap::{Parser, Subcommand};
use riskmatrix_core::aggregates::load_records_file;
use riskmatrix_core::config::{self, RiskMatrix};
use riskmatrix_core::{
    build_aggregated_grid, build_legend, classify, render_distribution_text, render_grid_text,
    render_json, render_legend_text, score, tier_distribution, RiskRecord,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "riskmatrix")]
#[command(about = "Risk matrix scoring and classification for probability/impact heat maps")]
#[command(version = env!("RISKMATRIX_VERSION"))]
struct Cli {
    /// Enable debug diagnostics on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full matrix, optionally placing risk records into cells
    Grid {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON array of risk records to aggregate
        #[arg(long)]
        records: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Score and classify a single cell
    Score {
        /// Probability level (1-based)
        #[arg(long)]
        probability: usize,

        /// Impact level (1-based)
        #[arg(long)]
        impact: usize,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the tier legend
    Legend {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Count risk records per tier
    Distribution {
        /// JSON array of risk records
        #[arg(long)]
        records: PathBuf,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Report configuration hazards; exits non-zero if any are found
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (defaults applied)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Grid {
            config,
            records,
            format,
        } => {
            let matrix = load_matrix(config.as_deref())?;
            let records = match records {
                Some(path) => load_records(&path)?,
                None => Vec::new(),
            };
            let grid = build_aggregated_grid(&matrix, &records);
            match format {
                OutputFormat::Text => print!("{}", render_grid_text(&grid)),
                OutputFormat::Json => println!("{}", render_json(&grid)),
            }
        }
        Commands::Score {
            probability,
            impact,
            config,
        } => {
            let matrix = load_matrix(config.as_deref())?;
            let n = matrix.grid_size.dimension();
            if !(1..=n).contains(&probability) || !(1..=n).contains(&impact) {
                anyhow::bail!(
                    "probability and impact must be between 1 and {} (got {}, {})",
                    n,
                    probability,
                    impact
                );
            }
            let s = score(probability, impact, &matrix);
            let tier = classify(s, &matrix);
            println!("score: {}", s);
            println!("tier:  {} ({})", tier.name, tier.color);
        }
        Commands::Legend { config, format } => {
            let matrix = load_matrix(config.as_deref())?;
            let legend = build_legend(&matrix);
            match format {
                OutputFormat::Text => print!("{}", render_legend_text(&legend)),
                OutputFormat::Json => println!("{}", render_json(&legend)),
            }
        }
        Commands::Distribution {
            records,
            config,
            format,
        } => {
            let matrix = load_matrix(config.as_deref())?;
            let records = load_records(&records)?;
            let grid = build_aggregated_grid(&matrix, &records);
            let distribution = tier_distribution(&grid, &matrix);
            match format {
                OutputFormat::Text => print!("{}", render_distribution_text(&distribution)),
                OutputFormat::Json => println!("{}", render_json(&distribution)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let (raw, source) = config::load_raw(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                let hazards = raw.validate();
                let source = source
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "defaults".to_string());
                if hazards.is_empty() {
                    println!("Config valid: {}", source);
                } else {
                    eprintln!("Config hazards in {}:", source);
                    for hazard in &hazards {
                        eprintln!("  - {}", hazard);
                    }
                    std::process::exit(1);
                }
            }
            ConfigAction::Show { path } => {
                let matrix = load_matrix(path.as_deref())?;
                match &matrix.config_path {
                    Some(p) => println!("Source: {}", p.display()),
                    None => println!("Source: defaults (no config file found)"),
                }
                let size = matrix.grid_size.dimension();
                println!("Grid:   {}x{}", size, size);
                println!("Method: {}", matrix.rule.method().as_str());
                let tiers = if matrix.tiers.is_custom() {
                    "custom"
                } else {
                    "built-in"
                };
                println!("Tiers:  {}", tiers);
                println!("{}", render_json(&matrix));
            }
        },
    }

    Ok(())
}

fn load_matrix(config_path: Option<&Path>) -> anyhow::Result<RiskMatrix> {
    let project_root = std::env::current_dir()?;
    let matrix = config::load_and_resolve(&project_root, config_path)
        .context("failed to load configuration")?;
    if let Some(path) = &matrix.config_path {
        info!(path = %path.display(), "using config");
    }
    Ok(matrix)
}

fn load_records(path: &Path) -> anyhow::Result<Vec<RiskRecord>> {
    let records = load_records_file(path)?;
    info!(count = records.len(), path = %path.display(), "loaded risk records");
    Ok(records)
}
