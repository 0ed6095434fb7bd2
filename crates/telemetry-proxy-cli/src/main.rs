//! tproxy - Command-line sample for the telemetry-proxy engines.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use telemetry_proxy::prelude::ProxyOptions;

mod commands;
mod weather;

/// Telemetry proxy sample runner
#[derive(Parser)]
#[command(name = "tproxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Options file with a [TelemetryProxy] section
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Call the sample weather service through a proxy
    Run(commands::run::RunArgs),
    /// Report whether a call site would be instrumented
    Check(commands::check::CheckArgs),
}

/// Load options from `path`, or the defaults when no file was given.
fn load_options(path: Option<&Path>) -> Result<ProxyOptions> {
    match path {
        Some(path) => ProxyOptions::from_toml_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display())),
        None => Ok(ProxyOptions::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "telemetry_proxy={level},telemetry_proxy_core={level},\
             telemetry_proxy_observe={level},telemetry_proxy_registry={level},tproxy={level}",
            level = log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = load_options(cli.config.as_deref()).and_then(|options| match cli.command {
        Commands::Run(args) => commands::run::execute(args, options, cli.format, cli.quiet),
        Commands::Check(args) => commands::check::execute(args, options, cli.format),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
