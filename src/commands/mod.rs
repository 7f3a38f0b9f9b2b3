//! Command handlers for the CLI application.
//!
//! - `devices`: enumeration and hot-plug commands (list, watch)
//! - `reports`: session commands (read, listen, write, feature)
//! - `config`: config file commands

pub mod config;
pub mod devices;
pub mod reports;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use hidlink_session::{HidApiBackend, SessionManager};

use crate::config::HidlinkConfig;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// hidapi backend plus a session manager built from the loaded config
pub struct Runtime {
    pub config: HidlinkConfig,
    pub backend: Arc<HidApiBackend>,
    pub manager: SessionManager,
}

impl Runtime {
    pub fn new(config: HidlinkConfig) -> anyhow::Result<Self> {
        let backend = Arc::new(
            HidApiBackend::new(config.hidapi.clone()).context("Failed to initialize hidapi")?,
        );
        let manager = SessionManager::new(backend.clone(), config.session.clone());
        Ok(Self {
            config,
            backend,
            manager,
        })
    }
}

/// Parse hex bytes given as separate args or one space/comma separated string
pub fn parse_hex_bytes(args: &[String]) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in args
        .iter()
        .flat_map(|arg| arg.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|token| !token.is_empty())
    {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        let byte = u8::from_str_radix(digits, 16)
            .with_context(|| format!("Invalid hex byte: {token}"))?;
        bytes.push(byte);
    }
    if bytes.is_empty() {
        bail!("No report bytes given");
    }
    Ok(bytes)
}

/// Format bytes as space separated hex
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    running
}
