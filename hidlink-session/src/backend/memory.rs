//! In-memory backend with virtual devices
//!
//! Each [`VirtualDevice`] behaves like a HID interface whose input reports
//! are injected by the owner. Waits are condvar-backed, so
//! `cancel_pending_io` wakes them immediately. Unplugging a device fails its
//! pending waits and, when a hot-plug feed is attached, publishes a removal
//! event the way an OS notification would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::{DeviceBackend, DeviceHandle, WaitOutcome};
use crate::error::BackendError;
use crate::monitor::HotplugFeed;
use crate::types::{HotplugEvent, ReportKind};

#[derive(Default)]
struct VirtualState {
    inputs: VecDeque<Vec<u8>>,
    woken: bool,
    unplugged: bool,
    wait_failure: Option<String>,
    prepare_failure: Option<String>,
    prepare_delay: Option<Duration>,
    written: Vec<Vec<u8>>,
    features_sent: Vec<Vec<u8>>,
    feature_report: Vec<u8>,
    input_report: Vec<u8>,
    open_handles: usize,
}

struct VirtualShared {
    path: String,
    report_length: usize,
    state: Mutex<VirtualState>,
    signal: Condvar,
    waits: AtomicUsize,
}

/// Test/simulation handle to a virtual device
#[derive(Clone)]
pub struct VirtualDevice {
    shared: Arc<VirtualShared>,
    feed: Arc<Mutex<Option<HotplugFeed>>>,
}

impl VirtualDevice {
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Queue an input report for the notification thread to capture
    pub fn push_input(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.inputs.push_back(data.to_vec());
        self.shared.signal.notify_all();
    }

    /// Input reports not yet captured
    pub fn pending_input(&self) -> usize {
        self.shared.state.lock().inputs.len()
    }

    /// Make the next wait fail with a HID error
    pub fn fail_next_wait(&self, msg: &str) {
        let mut state = self.shared.state.lock();
        state.wait_failure = Some(msg.to_string());
        self.shared.signal.notify_all();
    }

    /// Make the next `prepare` fail
    pub fn fail_prepare(&self, msg: &str) {
        self.shared.state.lock().prepare_failure = Some(msg.to_string());
    }

    /// Make the next `prepare` stall before reporting ready
    pub fn delay_prepare(&self, delay: Duration) {
        self.shared.state.lock().prepare_delay = Some(delay);
    }

    /// Simulate a physical removal
    pub fn unplug(&self) {
        {
            let mut state = self.shared.state.lock();
            state.unplugged = true;
            self.shared.signal.notify_all();
        }
        debug!("Virtual device {} unplugged", self.shared.path);
        if let Some(feed) = self.feed.lock().as_ref() {
            feed.publish(HotplugEvent::removed(self.shared.path.clone()));
        }
    }

    pub fn is_unplugged(&self) -> bool {
        self.shared.state.lock().unplugged
    }

    /// Output reports written so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().written.clone()
    }

    /// Feature reports sent so far
    pub fn features_sent(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().features_sent.clone()
    }

    /// Contents returned by feature report requests
    pub fn set_feature_report(&self, data: &[u8]) {
        self.shared.state.lock().feature_report = data.to_vec();
    }

    /// Contents returned by input report requests
    pub fn set_input_report(&self, data: &[u8]) {
        self.shared.state.lock().input_report = data.to_vec();
    }

    /// Handles opened and not yet released
    pub fn open_handles(&self) -> usize {
        self.shared.state.lock().open_handles
    }

    /// Number of `wait_input` calls entered so far
    pub fn wait_count(&self) -> usize {
        self.shared.waits.load(Ordering::SeqCst)
    }
}

/// Backend serving [`VirtualDevice`]s by path
#[derive(Default)]
pub struct MemoryBackend {
    devices: Mutex<HashMap<String, VirtualDevice>>,
    feed: Arc<Mutex<Option<HotplugFeed>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a virtual device at `path`
    ///
    /// `report_length` is at least one byte so a captured report is never
    /// mistaken for an expired read.
    pub fn add_device(&self, path: &str, report_length: usize) -> VirtualDevice {
        let device = VirtualDevice {
            shared: Arc::new(VirtualShared {
                path: path.to_string(),
                report_length: report_length.max(1),
                state: Mutex::new(VirtualState::default()),
                signal: Condvar::new(),
                waits: AtomicUsize::new(0),
            }),
            feed: self.feed.clone(),
        };
        self.devices.lock().insert(path.to_string(), device.clone());
        if let Some(feed) = self.feed.lock().as_ref() {
            feed.publish(HotplugEvent::arrived(path));
        }
        device
    }

    /// Publish arrivals and removals into a disconnect monitor
    pub fn attach_feed(&self, feed: HotplugFeed) {
        *self.feed.lock() = Some(feed);
    }
}

impl DeviceBackend for MemoryBackend {
    fn open(&self, path: &str) -> Result<Box<dyn DeviceHandle>, BackendError> {
        let device = self
            .devices
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(path.to_string()))?;

        let mut state = device.shared.state.lock();
        if state.unplugged {
            return Err(BackendError::NotFound(path.to_string()));
        }
        state.open_handles += 1;
        drop(state);

        Ok(Box::new(MemoryHandle {
            shared: device.shared.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

/// Handle to an opened virtual device
pub struct MemoryHandle {
    shared: Arc<VirtualShared>,
    released: AtomicBool,
}

impl MemoryHandle {
    fn check_usable(&self, state: &VirtualState) -> Result<(), BackendError> {
        if self.released.load(Ordering::SeqCst) {
            Err(BackendError::Released)
        } else if state.unplugged {
            Err(BackendError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl DeviceHandle for MemoryHandle {
    fn max_input_report_length(&self) -> usize {
        self.shared.report_length
    }

    fn prepare(&self) -> Result<(), BackendError> {
        let (delay, failure) = {
            let mut state = self.shared.state.lock();
            (state.prepare_delay.take(), state.prepare_failure.take())
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        match failure {
            Some(msg) => Err(BackendError::Hid(msg)),
            None => Ok(()),
        }
    }

    fn wait_input(&self, buf: &mut [u8], timeout: Duration) -> Result<WaitOutcome, BackendError> {
        self.shared.waits.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            self.check_usable(&state)?;
            if let Some(msg) = state.wait_failure.take() {
                return Err(BackendError::Hid(msg));
            }
            if state.woken {
                state.woken = false;
                return Ok(WaitOutcome::Woken);
            }
            if let Some(report) = state.inputs.pop_front() {
                let len = buf.len().min(report.len());
                buf[..len].copy_from_slice(&report[..len]);
                return Ok(WaitOutcome::Data(len));
            }
            if self
                .shared
                .signal
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(WaitOutcome::TimedOut);
            }
        }
    }

    fn cancel_pending_io(&self) {
        let mut state = self.shared.state.lock();
        state.woken = true;
        self.shared.signal.notify_all();
    }

    fn write_report(&self, data: &[u8]) -> Result<usize, BackendError> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.written.push(data.to_vec());
        Ok(data.len())
    }

    fn get_report(&self, kind: ReportKind, buf: &mut [u8]) -> Result<usize, BackendError> {
        let state = self.shared.state.lock();
        self.check_usable(&state)?;
        let source = match kind {
            ReportKind::Input => &state.input_report,
            ReportKind::Feature => &state.feature_report,
        };
        let len = buf.len().min(source.len());
        buf[..len].copy_from_slice(&source[..len]);
        Ok(len)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<(), BackendError> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.features_sent.push(data.to_vec());
        Ok(())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            let mut state = self.shared.state.lock();
            state.open_handles = state.open_handles.saturating_sub(1);
            self.shared.signal.notify_all();
        }
    }
}
