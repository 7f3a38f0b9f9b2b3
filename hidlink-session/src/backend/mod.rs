//! Device backends
//!
//! A backend resolves a path to an open [`DeviceHandle`]. The handle exposes
//! the one platform-specific step the notification thread needs (wait for
//! input or a wake-up) plus the plain report I/O primitives. Session logic
//! never sees anything below this seam.
//!
//! ```text
//! [DeviceSession]  ← queue, callbacks, state machine
//!        |
//! [NotificationThread] ← wait / capture / deliver loop
//!        |
//! [DeviceHandle]   ← HidApiHandle | MemoryHandle
//! ```

#[cfg(feature = "hidapi")]
pub mod hid;
pub mod memory;

use std::time::Duration;

use crate::error::BackendError;
use crate::types::ReportKind;

/// Result of one wait on the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `n` bytes of input were written to the buffer
    Data(usize),
    /// The timeout expired without input
    TimedOut,
    /// `cancel_pending_io` interrupted the wait
    Woken,
}

/// Opens device handles by path
pub trait DeviceBackend: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn DeviceHandle>, BackendError>;
}

/// An exclusively owned OS device handle
///
/// Implementations must tolerate `cancel_pending_io` and `release` being
/// called from a different thread than the one blocked in `wait_input`.
pub trait DeviceHandle: Send + Sync {
    /// Byte length of a single input report; fixed for the handle's lifetime
    fn max_input_report_length(&self) -> usize;

    /// Attach the input source to the calling (notification) thread
    fn prepare(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Wait up to `timeout` for one input report or a wake-up
    fn wait_input(&self, buf: &mut [u8], timeout: Duration) -> Result<WaitOutcome, BackendError>;

    /// Interrupt any in-flight or subsequent `wait_input`
    fn cancel_pending_io(&self);

    /// Send an output report
    fn write_report(&self, data: &[u8]) -> Result<usize, BackendError>;

    /// Request an input or feature report; `buf[0]` holds the report ID
    fn get_report(&self, kind: ReportKind, buf: &mut [u8]) -> Result<usize, BackendError>;

    /// Send a feature report; `data[0]` holds the report ID
    fn send_feature_report(&self, data: &[u8]) -> Result<(), BackendError>;

    /// Release the OS handle; later calls fail with `BackendError::Released`
    fn release(&self);
}
