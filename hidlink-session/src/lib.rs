//! HID device session engine
//!
//! Turns a HID device's asynchronous input stream into a synchronous,
//! thread-safe session:
//!
//! - a per-session notification thread captures input reports
//! - reports are buffered in a bounded FIFO (newest 30 kept) or pushed to a
//!   read callback
//! - blocking, timed and non-blocking reads are served from the buffer
//! - a process-wide disconnect monitor maps device removals onto sessions,
//!   waking blocked readers and firing disconnect callbacks exactly once
//! - `close` tears everything down in a fixed order and never blocks
//!   indefinitely
//!
//! The OS side sits behind [`DeviceBackend`]/[`DeviceHandle`]: hidapi for
//! real devices and an in-memory backend for simulation and tests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hidlink_session::{MemoryBackend, ReadTimeout, SessionConfig, SessionManager};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let device = backend.add_device("/virtual/kbd", 8);
//! let manager = SessionManager::new(backend.clone(), SessionConfig::default());
//!
//! let session = manager.open("/virtual/kbd")?;
//! device.push_input(&[0x01, 0x04]);
//! let mut buf = [0u8; 8];
//! let n = session.read_timeout(&mut buf, ReadTimeout::Millis(500))?;
//! println!("{:02x?}", &buf[..n]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod queue;
pub mod registry;
pub mod session;
pub mod types;

mod notify;

#[cfg(feature = "hidapi")]
pub use backend::hid::{HidApiBackend, HidDeviceSummary, HidPollWatcher};
pub use backend::memory::{MemoryBackend, VirtualDevice};
pub use backend::{DeviceBackend, DeviceHandle, WaitOutcome};
pub use config::{HidApiConfig, SessionConfig, WatcherConfig, MIN_READY_TIMEOUT_MS};
pub use error::{BackendError, IoError, OpenError, ReadError};
pub use manager::SessionManager;
pub use monitor::{DisconnectMonitor, HotplugFeed};
pub use queue::{InputReport, MAX_QUEUED_REPORTS};
pub use registry::SessionRegistry;
pub use session::{DeviceSession, DisconnectReason};
pub use types::{DeviceEvent, HotplugEvent, ReadTimeout, ReportKind, SessionId, SessionState};
