// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hidlink")]
#[command(author, version, about = "Open HID devices and exchange reports")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/hidlink/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List attached HID interfaces and their paths
    #[command(visible_alias = "ls")]
    List {
        /// Only show devices with this vendor ID (hex)
        #[arg(long)]
        vid: Option<String>,
    },

    /// Read input reports from the queue
    #[command(visible_alias = "r")]
    Read {
        /// Device path as printed by `list`
        path: String,
        /// Number of reports to read before exiting
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        /// Timeout per read in ms (-1 blocks, 0 polls)
        #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
        timeout: i32,
    },

    /// Stream input reports through a callback until Ctrl+C or unplug
    Listen {
        /// Device path as printed by `list`
        path: String,
    },

    /// Send an output report (first byte is the report ID)
    #[command(visible_alias = "w")]
    Write {
        /// Device path as printed by `list`
        path: String,
        /// Report bytes in hex, e.g. `00 01 ff`
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
    },

    /// Get or send feature reports
    #[command(subcommand)]
    Feature(FeatureCommands),

    /// Print device arrivals and removals until Ctrl+C
    Watch,

    /// Show or initialize the config file
    Config {
        /// Write the default config if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
pub enum FeatureCommands {
    /// Request a report from the device
    Get {
        /// Device path as printed by `list`
        path: String,
        /// Report ID (hex)
        report_id: String,
        /// Buffer length including the report ID byte
        #[arg(short, long, default_value = "65")]
        length: usize,
        /// Which report type to request
        #[arg(short, long, value_enum, default_value = "feature")]
        kind: ReportKindArg,
    },

    /// Send a feature report (first byte is the report ID)
    Send {
        /// Device path as printed by `list`
        path: String,
        /// Report bytes in hex
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportKindArg {
    Input,
    Feature,
}

impl From<ReportKindArg> for hidlink_session::ReportKind {
    fn from(kind: ReportKindArg) -> Self {
        match kind {
            ReportKindArg::Input => Self::Input,
            ReportKindArg::Feature => Self::Feature,
        }
    }
}
