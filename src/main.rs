//! hidlink: open HID devices by path and exchange reports
//!
//! Thin command-line front end over `hidlink-session`.

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use cli::{Cli, Commands, FeatureCommands};
use commands::Runtime;
use config::HidlinkConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(HidlinkConfig::default_path);
    if let Commands::Config { init } = cli.command {
        return commands::config::show(&config_path, init);
    }

    debug!("Loading config from {:?}", config_path);
    let config = HidlinkConfig::load(&config_path)?;
    let runtime = Runtime::new(config)?;

    match cli.command {
        Commands::List { vid } => commands::devices::list(&runtime, vid.as_deref()),
        Commands::Read {
            path,
            count,
            timeout,
        } => commands::reports::read(&runtime, &path, count, timeout),
        Commands::Listen { path } => commands::reports::listen(&runtime, &path),
        Commands::Write { path, bytes } => commands::reports::write(&runtime, &path, &bytes),
        Commands::Feature(FeatureCommands::Get {
            path,
            report_id,
            length,
            kind,
        }) => commands::reports::feature_get(&runtime, &path, &report_id, length, kind.into()),
        Commands::Feature(FeatureCommands::Send { path, bytes }) => {
            commands::reports::feature_send(&runtime, &path, &bytes)
        }
        Commands::Watch => commands::devices::watch(&runtime),
        Commands::Config { .. } => Ok(()),
    }
}
