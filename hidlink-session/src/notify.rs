//! Per-session notification thread
//!
//! The thread waits on the device handle, captures each input report and
//! hands it to the session. It is the only producer of reports; it stops when
//! the session asks it to, when the device goes away, or when the OS wait
//! fails. On the way out it wakes every blocked reader.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::backend::WaitOutcome;
use crate::config::SessionConfig;
use crate::error::{BackendError, OpenError};
use crate::queue::InputReport;
use crate::session::{Delivery, DisconnectReason, SessionShared};

pub(crate) struct NotificationThread {
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl NotificationThread {
    /// Spawn the thread and wait until it is attached to the input source
    pub(crate) fn start(
        shared: Arc<SessionShared>,
        config: &SessionConfig,
    ) -> Result<Self, OpenError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), BackendError>>(1);
        let wait_timeout = config.wait_timeout();
        let thread_shared = shared.clone();

        let thread = std::thread::Builder::new()
            .name(format!("hid-notify-{}", shared.id().as_u64()))
            .spawn(move || run(thread_shared, wait_timeout, ready_tx))
            .map_err(|e| OpenError::ThreadStartFailed(e.to_string()))?;
        let thread_id = thread.thread().id();

        match ready_rx.recv_timeout(config.ready_timeout()) {
            Ok(Ok(())) => {
                debug!("{} notification thread ready", shared.id());
                Ok(Self {
                    thread: Some(thread),
                    thread_id,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(OpenError::ThreadStartFailed(e.to_string()))
            }
            Err(RecvTimeoutError::Timeout) => {
                // The thread notices the dropped receiver once prepare returns
                shared.request_shutdown();
                shared.handle().cancel_pending_io();
                warn!(
                    "{} notification thread not ready after {:?}, abandoning it",
                    shared.id(),
                    config.ready_timeout()
                );
                Err(OpenError::ThreadStartFailed(format!(
                    "not ready within {:?}",
                    config.ready_timeout()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Err(OpenError::ThreadStartFailed(
                    "notification thread exited during startup".into(),
                ))
            }
        }
    }

    /// Request shutdown, interrupt the wait and join
    ///
    /// Joining is skipped when called from the notification thread itself
    /// (a callback closing its own session); the thread exits on its own
    /// once the callback returns.
    pub(crate) fn stop(&mut self, shared: &SessionShared) {
        shared.request_shutdown();
        shared.handle().cancel_pending_io();

        let Some(thread) = self.thread.take() else {
            return;
        };
        if std::thread::current().id() == self.thread_id {
            debug!("{} closed from its own notification thread", shared.id());
            return;
        }
        if thread.join().is_err() {
            warn!("{} notification thread panicked", shared.id());
        }
    }
}

fn run(
    shared: Arc<SessionShared>,
    wait_timeout: Duration,
    ready_tx: mpsc::SyncSender<Result<(), BackendError>>,
) {
    if let Err(e) = shared.handle().prepare() {
        warn!("{} failed to attach input source: {}", shared.id(), e);
        let _ = ready_tx.send(Err(e));
        return;
    }
    if ready_tx.send(Ok(())).is_err() || shared.shutdown_requested() {
        return;
    }
    drop(ready_tx);

    let mut buf = vec![0u8; shared.max_input_report_length()];
    while !shared.shutdown_requested() {
        match shared.handle().wait_input(&mut buf, wait_timeout) {
            Ok(WaitOutcome::Data(len)) => {
                trace!("{} captured {} bytes", shared.id(), len);
                if shared.deliver(InputReport::new(&buf[..len])) == Delivery::Dropped {
                    trace!("{} dropped report after shutdown", shared.id());
                }
            }
            Ok(WaitOutcome::TimedOut) | Ok(WaitOutcome::Woken) => {}
            Err(BackendError::Disconnected) => {
                shared.mark_disconnected(DisconnectReason::Removed);
            }
            Err(BackendError::Released) => break,
            Err(e) => {
                warn!("{} input wait failed: {}", shared.id(), e);
                shared.mark_disconnected(DisconnectReason::WaitFailed(e.to_string()));
            }
        }
        if shared.is_disconnected() {
            break;
        }
    }

    debug!("{} notification thread exiting", shared.id());
    shared.wake_readers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::DeviceBackend;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            wait_timeout_ms: 20,
            ready_timeout_ms: 500,
            blocking: true,
        }
    }

    #[test]
    fn test_stop_joins_thread() {
        let backend = MemoryBackend::new();
        backend.add_device("/virtual/n", 8);
        let handle = backend.open("/virtual/n").unwrap();
        let shared = Arc::new(SessionShared::new("/virtual/n", handle, true));

        let mut thread = NotificationThread::start(shared.clone(), &quick_config()).unwrap();
        thread.stop(&shared);
        assert!(thread.thread.is_none());
        assert!(shared.shutdown_requested());
    }

    #[test]
    fn test_prepare_failure_reports_thread_start_failed() {
        let backend = MemoryBackend::new();
        let device = backend.add_device("/virtual/p", 8);
        device.fail_prepare("attach refused");
        let handle = backend.open("/virtual/p").unwrap();
        let shared = Arc::new(SessionShared::new("/virtual/p", handle, true));

        match NotificationThread::start(shared, &quick_config()) {
            Err(OpenError::ThreadStartFailed(msg)) => assert!(msg.contains("attach refused")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_slow_prepare_times_out() {
        let backend = MemoryBackend::new();
        let device = backend.add_device("/virtual/slow", 8);
        device.delay_prepare(Duration::from_millis(300));
        let handle = backend.open("/virtual/slow").unwrap();
        let shared = Arc::new(SessionShared::new("/virtual/slow", handle, true));

        let config = SessionConfig {
            ready_timeout_ms: 50,
            ..quick_config()
        };
        assert!(matches!(
            NotificationThread::start(shared.clone(), &config),
            Err(OpenError::ThreadStartFailed(_))
        ));
        assert!(shared.shutdown_requested());
    }
}
