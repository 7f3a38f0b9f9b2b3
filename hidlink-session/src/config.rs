//! Tunables for sessions, the hidapi backend and the hot-plug watcher
//!
//! All structures deserialize with per-field defaults so a partial TOML
//! section only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound applied to `ready_timeout_ms`
pub const MIN_READY_TIMEOUT_MS: u64 = 100;

/// Session behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Coarse bound on a single notification-thread wait (ms)
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,
    /// How long `open` waits for the notification thread to become ready (ms)
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    /// Initial blocking mode for `read`
    #[serde(default = "default_true")]
    pub blocking: bool,
}

fn default_wait_timeout() -> u64 {
    1000
}
fn default_ready_timeout() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout(),
            ready_timeout_ms: default_ready_timeout(),
            blocking: true,
        }
    }
}

impl SessionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms.max(1))
    }

    /// Never shorter than `MIN_READY_TIMEOUT_MS`; a zero wait would fail every open
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms.max(MIN_READY_TIMEOUT_MS))
    }
}

/// hidapi backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HidApiConfig {
    /// Input report length assumed for every opened device (bytes)
    ///
    /// hidapi does not expose the descriptor's report size, so longer input
    /// reports are truncated to this length.
    #[serde(default = "default_report_length")]
    pub input_report_length: usize,
    /// Length of one `read_timeout` slice; bounds how long the device lock is held (ms)
    #[serde(default = "default_poll_slice")]
    pub poll_slice_ms: u32,
}

fn default_report_length() -> usize {
    64
}
fn default_poll_slice() -> u32 {
    5
}

impl Default for HidApiConfig {
    fn default() -> Self {
        Self {
            input_report_length: default_report_length(),
            poll_slice_ms: default_poll_slice(),
        }
    }
}

/// Hot-plug polling watcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Interval between device list refreshes (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}
