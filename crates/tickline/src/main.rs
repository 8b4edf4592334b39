//! Tickline - double-buffered market data ingestion
//!
//! # Usage
//!
//! ```bash
//! # Run the synthetic workload (default)
//! tickline
//! tickline --config configs/tickline.toml run --producers 8
//!
//! # Validate a config file
//! tickline --config configs/tickline.toml check
//! ```

mod cmd;
mod records;
mod store;
mod workload;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tickline_config::{Config, LogConfig, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tickline - double-buffered market data ingestion
#[derive(Parser, Debug)]
#[command(name = "tickline")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the synthetic producer workload
    Run(cmd::run::RunArgs),

    /// Validate configuration and print effective settings
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Run(args)) => {
            let log_level = resolve_log_level(cli.log_level.as_deref(), &loaded.config);
            init_logging(&log_level, &loaded.config.log)?;
            cmd::run::run(args, loaded).await
        }
        Some(Command::Check(args)) => {
            // Check doesn't need logging - just outputs to stdout
            cmd::check::run(args, loaded)
        }
        // No subcommand = run with defaults
        None => {
            let log_level = resolve_log_level(cli.log_level.as_deref(), &loaded.config);
            init_logging(&log_level, &loaded.config.log)?;
            cmd::run::run(cmd::run::RunArgs::default(), loaded).await
        }
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = match &log.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(ansi)
        .with_writer(writer);

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Console => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
    .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}
