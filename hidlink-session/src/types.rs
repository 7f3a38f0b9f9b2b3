//! Common types for the session layer

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-unique identifier of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next identifier
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// How long a read may wait for an input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// Block until data arrives or the session terminates
    Infinite,
    /// Block for at most this many milliseconds (0 behaves as `NonBlocking`)
    Millis(u32),
    /// Return immediately
    NonBlocking,
}

impl ReadTimeout {
    /// Build from a hidapi-style millisecond value (-1 infinite, 0 non-blocking)
    pub fn from_millis(ms: i32) -> Self {
        match ms {
            ms if ms < 0 => Self::Infinite,
            0 => Self::NonBlocking,
            ms => Self::Millis(ms as u32),
        }
    }

    pub(crate) fn duration(&self) -> Option<Duration> {
        match self {
            Self::Millis(ms) => Some(Duration::from_millis(u64::from(*ms))),
            _ => None,
        }
    }
}

/// Report kind for `get_report`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Input,
    Feature,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Open,
    Disconnected,
    Closing,
    Closed,
}

impl SessionState {
    /// Check if reads can no longer return new data
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Closing | Self::Closed)
    }
}

/// Device attach/detach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    Arrived,
    Removed,
}

/// Hot-plug notification for one device path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    /// Platform-specific device path
    pub path: String,
    pub event: DeviceEvent,
}

impl HotplugEvent {
    pub fn arrived(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            event: DeviceEvent::Arrived,
        }
    }

    pub fn removed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            event: DeviceEvent::Removed,
        }
    }
}
