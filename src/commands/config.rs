//! Config file commands

use std::path::Path;

use crate::config::HidlinkConfig;

use super::CommandResult;

/// Print the effective config, optionally writing defaults first
pub fn show(path: &Path, init: bool) -> CommandResult {
    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            HidlinkConfig::default().save(path)?;
            println!("Wrote default config to {}", path.display());
        }
    }

    let config = HidlinkConfig::load(path)?;
    let source = if path.exists() { "" } else { " (not found, defaults)" };
    println!("# {}{}", path.display(), source);
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
