//! Device session state machine
//!
//! A [`DeviceSession`] owns one open device handle, its notification thread
//! and its report queue. Everything the notification thread, the disconnect
//! monitor and readers share lives in `SessionShared` behind a single mutex
//! paired with a condition variable:
//!
//! ```text
//!   caller threads ── read()/write()/register_*() ──┐
//!                                                   ▼
//!   notification thread ── deliver() ──────▶ [SessionShared: Mutex<SessionInner> + Condvar]
//!                                                   ▲
//!   disconnect monitor ── mark_disconnected() ──────┘   (found via SessionRegistry, weak ref)
//! ```
//!
//! Callbacks are cloned out under the lock and invoked after it is released,
//! so a callback may call back into the session without deadlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::backend::{DeviceBackend, DeviceHandle};
use crate::config::SessionConfig;
use crate::error::{BackendError, IoError, OpenError, ReadError};
use crate::notify::NotificationThread;
use crate::queue::{InputReport, ReportQueue};
use crate::registry::SessionRegistry;
use crate::types::{ReadTimeout, ReportKind, SessionId, SessionState};

pub(crate) type ReadCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;
pub(crate) type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Why a session stopped receiving input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The device was removed (OS removal event or device gone during a wait)
    Removed,
    /// The OS wait primitive failed; treated as a disconnect
    WaitFailed(String),
}

/// What the notification thread did with a captured report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Queued,
    Callback,
    Dropped,
}

struct SessionInner {
    queue: ReportQueue,
    state: SessionState,
    disconnect: Option<DisconnectReason>,
    read_callback: Option<ReadCallback>,
    disconnect_callback: Option<DisconnectCallback>,
    disconnect_notified: bool,
}

impl SessionInner {
    /// Error for a reader that found no queued data
    fn terminal_error(&self) -> Option<ReadError> {
        match &self.disconnect {
            Some(DisconnectReason::Removed) => Some(ReadError::Disconnected),
            Some(DisconnectReason::WaitFailed(msg)) => Some(ReadError::OsWaitFailed(msg.clone())),
            None if matches!(self.state, SessionState::Closing | SessionState::Closed) => {
                Some(ReadError::Disconnected)
            }
            None => None,
        }
    }

    fn accepts_io(&self) -> bool {
        self.disconnect.is_none()
            && matches!(self.state, SessionState::Opening | SessionState::Open)
    }
}

/// State shared between the session, its notification thread and the registry
pub(crate) struct SessionShared {
    id: SessionId,
    path: String,
    handle: Box<dyn DeviceHandle>,
    max_input_report_length: usize,
    blocking: AtomicBool,
    shutdown: AtomicBool,
    inner: Mutex<SessionInner>,
    data_ready: Condvar,
}

impl SessionShared {
    pub(crate) fn new(path: &str, handle: Box<dyn DeviceHandle>, blocking: bool) -> Self {
        let max_input_report_length = handle.max_input_report_length();
        Self {
            id: SessionId::next(),
            path: path.to_string(),
            handle,
            max_input_report_length,
            blocking: AtomicBool::new(blocking),
            shutdown: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                queue: ReportQueue::new(),
                state: SessionState::Opening,
                disconnect: None,
                read_callback: None,
                disconnect_callback: None,
                disconnect_notified: false,
            }),
            data_ready: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn handle(&self) -> &dyn DeviceHandle {
        self.handle.as_ref()
    }

    pub(crate) fn max_input_report_length(&self) -> usize {
        self.max_input_report_length
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.inner.lock().disconnect.is_some()
    }

    /// Leave `Opening`; a disconnect seen during startup wins
    fn mark_open(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Opening {
            inner.state = if inner.disconnect.is_some() {
                SessionState::Disconnected
            } else {
                SessionState::Open
            };
        }
    }

    /// Route a captured report to the read callback or the queue
    pub(crate) fn deliver(&self, report: InputReport) -> Delivery {
        let callback = {
            let mut inner = self.inner.lock();
            if !inner.accepts_io() {
                return Delivery::Dropped;
            }
            match inner.read_callback.clone() {
                Some(callback) => callback,
                None => {
                    inner.queue.push(report);
                    self.data_ready.notify_one();
                    return Delivery::Queued;
                }
            }
        };
        callback(report.data());
        Delivery::Callback
    }

    /// Flag the session disconnected, wake readers and fire the callback once
    ///
    /// Returns `false` if the session was already disconnected.
    pub(crate) fn mark_disconnected(&self, reason: DisconnectReason) -> bool {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.disconnect.is_some() {
                return false;
            }
            inner.disconnect = Some(reason.clone());
            if matches!(inner.state, SessionState::Opening | SessionState::Open) {
                inner.state = SessionState::Disconnected;
            }
            self.data_ready.notify_all();

            if inner.disconnect_notified {
                None
            } else {
                let callback = inner.disconnect_callback.clone();
                inner.disconnect_notified = callback.is_some();
                callback
            }
        };

        info!("{} ({}) disconnected: {:?}", self.id, self.path, reason);
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Wake every blocked reader so it re-checks session state
    pub(crate) fn wake_readers(&self) {
        let _inner = self.inner.lock();
        self.data_ready.notify_all();
    }
}

/// One open HID device
///
/// All methods take `&self`; wrap the session in an `Arc` to read from
/// several threads. Dropping the session closes it.
pub struct DeviceSession {
    shared: Arc<SessionShared>,
    notifier: Mutex<NotificationThread>,
    registry: Arc<SessionRegistry>,
}

impl DeviceSession {
    /// Open `path` on `backend`, start its notification thread and register it
    ///
    /// Returns only once the notification thread is ready; no partially
    /// initialized session is ever handed out.
    pub fn open(
        backend: &dyn DeviceBackend,
        registry: Arc<SessionRegistry>,
        path: &str,
        config: &SessionConfig,
    ) -> Result<Self, OpenError> {
        let handle = backend
            .open(path)
            .map_err(|source| OpenError::HandleUnavailable {
                path: path.to_string(),
                source,
            })?;

        let shared = Arc::new(SessionShared::new(path, handle, config.blocking));
        let notifier = match NotificationThread::start(shared.clone(), config) {
            Ok(notifier) => notifier,
            Err(e) => {
                shared.handle().release();
                return Err(e);
            }
        };

        shared.mark_open();
        registry.insert(&shared);
        info!(
            "Opened {} at {} (input report {} bytes)",
            shared.id(),
            path,
            shared.max_input_report_length()
        );

        Ok(Self {
            shared,
            notifier: Mutex::new(notifier),
            registry,
        })
    }

    pub fn id(&self) -> SessionId {
        self.shared.id()
    }

    pub fn path(&self) -> &str {
        self.shared.path()
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    pub fn is_disconnected(&self) -> bool {
        self.shared.is_disconnected()
    }

    /// Why the session was disconnected, if it was
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.shared.inner.lock().disconnect.clone()
    }

    pub fn max_input_report_length(&self) -> usize {
        self.shared.max_input_report_length()
    }

    /// Reports waiting in the queue
    pub fn pending_reports(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Reports evicted because nobody read them in time
    pub fn dropped_reports(&self) -> u64 {
        self.shared.inner.lock().queue.dropped()
    }

    /// Choose whether `read` blocks (`true`) or returns immediately
    pub fn set_blocking(&self, blocking: bool) {
        self.shared.blocking.store(blocking, Ordering::SeqCst);
    }

    pub fn is_blocking(&self) -> bool {
        self.shared.blocking.load(Ordering::SeqCst)
    }

    /// Read one report using the session's blocking mode
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let timeout = if self.is_blocking() {
            ReadTimeout::Infinite
        } else {
            ReadTimeout::NonBlocking
        };
        self.read_timeout(buf, timeout)
    }

    /// Read one report, waiting according to `timeout`
    ///
    /// Queued data is returned immediately whatever the timeout. Returns
    /// `Ok(0)` when nothing arrived in time or the read is non-blocking.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: ReadTimeout) -> Result<usize, ReadError> {
        let timeout = match timeout {
            ReadTimeout::Millis(0) => ReadTimeout::NonBlocking,
            other => other,
        };
        let deadline = timeout.duration().map(|d| Instant::now() + d);

        let mut inner = self.shared.inner.lock();
        loop {
            if inner.read_callback.is_some() {
                return Err(ReadError::CallbackModeActive);
            }
            if let Some(report) = inner.queue.pop_front() {
                return Ok(report.copy_into(buf));
            }
            if let Some(err) = inner.terminal_error() {
                return Err(err);
            }

            match (timeout, deadline) {
                (ReadTimeout::NonBlocking, _) => return Ok(0),
                (_, Some(deadline)) => {
                    let timed_out = self
                        .shared
                        .data_ready
                        .wait_until(&mut inner, deadline)
                        .timed_out();
                    if timed_out && inner.queue.is_empty() && inner.terminal_error().is_none() {
                        return Ok(0);
                    }
                }
                (_, None) => self.shared.data_ready.wait(&mut inner),
            }
        }
    }

    /// Send an output report; `data[0]` is the report ID
    pub fn write_report(&self, data: &[u8]) -> Result<usize, IoError> {
        if data.is_empty() {
            return Err(IoError::InvalidLength(0));
        }
        self.check_io()?;
        self.shared
            .handle()
            .write_report(data)
            .map_err(map_backend_io_error)
    }

    /// Request an input or feature report into `buf`; `buf[0]` is the report ID
    pub fn get_report(&self, kind: ReportKind, buf: &mut [u8]) -> Result<usize, IoError> {
        if buf.is_empty() {
            return Err(IoError::InvalidLength(0));
        }
        self.check_io()?;
        self.shared
            .handle()
            .get_report(kind, buf)
            .map_err(map_backend_io_error)
    }

    /// Send a feature report; `data[0]` is the report ID
    pub fn send_feature_report(&self, data: &[u8]) -> Result<usize, IoError> {
        if data.is_empty() {
            return Err(IoError::InvalidLength(0));
        }
        self.check_io()?;
        self.shared
            .handle()
            .send_feature_report(data)
            .map_err(map_backend_io_error)?;
        Ok(data.len())
    }

    fn check_io(&self) -> Result<(), IoError> {
        if self.shared.inner.lock().accepts_io() {
            Ok(())
        } else {
            Err(IoError::Disconnected)
        }
    }

    /// Deliver every captured report to `callback` on the notification thread
    ///
    /// Reports already queued stay queued. The callback must not block for
    /// long: it runs on the thread that captures input. Switching modes while
    /// a report is in flight may route that one report to the previous
    /// consumer.
    pub fn register_read_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        {
            let mut inner = self.shared.inner.lock();
            inner.read_callback = Some(Arc::new(callback));
            // Blocked readers must observe the mode switch
            self.shared.data_ready.notify_all();
        }
        debug!("{} switched to callback delivery", self.id());
    }

    /// Return to queue-based delivery
    pub fn unregister_read_callback(&self) {
        self.shared.inner.lock().read_callback = None;
        debug!("{} switched to queued delivery", self.id());
    }

    /// Call `callback` once when the device disconnects
    ///
    /// If the session is already disconnected and no disconnect callback has
    /// fired yet, `callback` runs immediately on the calling thread.
    pub fn register_disconnected_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: DisconnectCallback = Arc::new(callback);
        let fire_now = {
            let mut inner = self.shared.inner.lock();
            inner.disconnect_callback = Some(callback.clone());
            if inner.disconnect.is_some() && !inner.disconnect_notified {
                inner.disconnect_notified = true;
                true
            } else {
                false
            }
        };

        if fire_now {
            debug!("{} already disconnected, firing callback now", self.id());
            callback();
        }
    }

    pub fn unregister_disconnected_callback(&self) {
        self.shared.inner.lock().disconnect_callback = None;
    }

    /// Tear the session down
    ///
    /// Deregisters, cancels in-flight I/O, joins the notification thread,
    /// drains the queue and releases the handle, in that order. Idempotent
    /// and infallible; safe after the device was unplugged.
    pub fn close(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if matches!(inner.state, SessionState::Closing | SessionState::Closed) {
                return;
            }
            inner.state = SessionState::Closing;
            self.shared.data_ready.notify_all();
        }
        debug!("Closing {} ({})", self.id(), self.path());

        self.registry.remove(self.id());
        self.notifier.lock().stop(&self.shared);

        let drained = self.shared.inner.lock().queue.drain();
        if drained > 0 {
            debug!("{} discarded {} unread reports", self.id(), drained);
        }
        self.shared.handle().release();

        {
            let mut inner = self.shared.inner.lock();
            inner.state = SessionState::Closed;
            inner.read_callback = None;
            inner.disconnect_callback = None;
            self.shared.data_ready.notify_all();
        }
        info!("Closed {}", self.id());
    }
}

fn map_backend_io_error(e: BackendError) -> IoError {
    match e {
        BackendError::Disconnected | BackendError::Released => IoError::Disconnected,
        other => {
            warn!("Device I/O failed: {}", other);
            IoError::OsWriteFailed(other)
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id())
            .field("path", &self.path())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn shared_for(backend: &MemoryBackend, path: &str) -> SessionShared {
        backend.add_device(path, 8);
        let handle = backend.open(path).unwrap();
        let shared = SessionShared::new(path, handle, true);
        shared.mark_open();
        shared
    }

    #[test]
    fn test_deliver_queues_without_callback() {
        let backend = MemoryBackend::new();
        let shared = shared_for(&backend, "/virtual/q");
        assert_eq!(shared.deliver(InputReport::new(&[1])), Delivery::Queued);
        assert_eq!(shared.inner.lock().queue.len(), 1);
    }

    #[test]
    fn test_deliver_bypasses_queue_with_callback() {
        let backend = MemoryBackend::new();
        let shared = shared_for(&backend, "/virtual/cb");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        shared.inner.lock().read_callback = Some(Arc::new(move |data: &[u8]| {
            seen_clone.lock().push(data.to_vec());
        }));

        assert_eq!(shared.deliver(InputReport::new(&[7, 8])), Delivery::Callback);
        assert!(shared.inner.lock().queue.is_empty());
        assert_eq!(*seen.lock(), vec![vec![7, 8]]);
    }

    #[test]
    fn test_mark_disconnected_is_one_way() {
        let backend = MemoryBackend::new();
        let shared = shared_for(&backend, "/virtual/d");
        assert!(shared.mark_disconnected(DisconnectReason::Removed));
        assert!(!shared.mark_disconnected(DisconnectReason::WaitFailed("late".into())));

        let inner = shared.inner.lock();
        assert_eq!(inner.state, SessionState::Disconnected);
        assert_eq!(inner.disconnect, Some(DisconnectReason::Removed));
    }

    #[test]
    fn test_deliver_after_disconnect_is_dropped() {
        let backend = MemoryBackend::new();
        let shared = shared_for(&backend, "/virtual/late");
        shared.mark_disconnected(DisconnectReason::Removed);
        assert_eq!(shared.deliver(InputReport::new(&[1])), Delivery::Dropped);
        assert!(shared.inner.lock().queue.is_empty());
    }
}
