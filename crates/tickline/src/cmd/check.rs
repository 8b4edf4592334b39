//! Check command - validate a configuration file and print effective settings

use anyhow::{Context, Result};
use clap::Args;
use tickline_config::Config;

use super::LoadedConfig;
use crate::records::RECORD_TYPES;

/// Check command arguments
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Print only errors, no settings
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the check command
pub fn run(args: CheckArgs, loaded: LoadedConfig) -> Result<()> {
    loaded
        .config
        .check_record_types(&RECORD_TYPES)
        .context("invalid [engine.lines] configuration")?;

    if !args.quiet {
        print!("{}", describe(&loaded));
    }
    Ok(())
}

/// Effective settings, one per line
fn describe(loaded: &LoadedConfig) -> String {
    let Config {
        engine,
        log,
        metrics,
    } = &loaded.config;

    let mut out = format!("config            {} (ok)\n", loaded.source());
    out.push_str(&format!("overflow          {}\n", engine.overflow.as_str()));
    out.push_str(&format!("wait strategy     {}\n", engine.wait_strategy.as_str()));
    out.push_str(&format!(
        "rotation interval {:?}\n",
        engine.min_rotation_interval
    ));
    out.push_str(&format!(
        "flush workers     {}\n",
        if engine.uses_flush_pool() {
            engine.flush_workers.to_string()
        } else {
            "inline".to_string()
        }
    ));
    for record_type in RECORD_TYPES {
        out.push_str(&format!(
            "line {:<12} capacity {}\n",
            record_type,
            engine.capacity_for(record_type)
        ));
    }
    out.push_str(&format!("log level         {}\n", log.level.as_str()));
    if metrics.enabled {
        out.push_str(&format!("metrics           every {:?}\n", metrics.interval));
    } else {
        out.push_str("metrics           disabled\n");
    }
    out
}
