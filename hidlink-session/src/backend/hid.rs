//! hidapi backend and polling hot-plug watcher
//!
//! hidapi offers no wake-able wait, so `wait_input` is a loop of short
//! `read_timeout` slices. Between slices the device lock is released (so
//! writes and report requests interleave with capture) and the cancel flag
//! is checked, which bounds shutdown latency to one slice.

use std::collections::BTreeSet;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{DeviceBackend, DeviceHandle, WaitOutcome};
use crate::config::{HidApiConfig, WatcherConfig};
use crate::error::BackendError;
use crate::monitor::HotplugFeed;
use crate::types::{HotplugEvent, ReportKind};

/// One enumerated HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidDeviceSummary {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
    pub product: Option<String>,
}

/// Backend that opens devices through hidapi
pub struct HidApiBackend {
    api: Mutex<HidApi>,
    config: HidApiConfig,
}

impl HidApiBackend {
    pub fn new(config: HidApiConfig) -> Result<Self, BackendError> {
        let api = HidApi::new()?;
        Ok(Self {
            api: Mutex::new(api),
            config,
        })
    }

    /// Re-enumerate and return the paths of all attached HID interfaces
    pub fn device_paths(&self) -> Result<BTreeSet<String>, BackendError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;
        Ok(api
            .device_list()
            .map(|d| d.path().to_string_lossy().to_string())
            .collect())
    }

    /// Re-enumerate and describe every attached HID interface
    pub fn enumerate(&self) -> Result<Vec<HidDeviceSummary>, BackendError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;
        Ok(api
            .device_list()
            .map(|d| HidDeviceSummary {
                path: d.path().to_string_lossy().to_string(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                usage_page: d.usage_page(),
                usage: d.usage(),
                interface_number: d.interface_number(),
                product: d.product_string().map(str::to_string),
            })
            .collect())
    }
}

impl DeviceBackend for HidApiBackend {
    fn open(&self, path: &str) -> Result<Box<dyn DeviceHandle>, BackendError> {
        let c_path = CString::new(path).map_err(|_| BackendError::InvalidPath(path.into()))?;
        let device = self.api.lock().open_path(&c_path)?;
        let input_report_length = self.config.input_report_length.max(1);
        debug!(
            "hidapi opened {} (input reports truncated to {} bytes)",
            path, input_report_length
        );

        Ok(Box::new(HidApiHandle {
            device: Mutex::new(Some(device)),
            input_report_length,
            poll_slice_ms: self.config.poll_slice_ms.max(1),
            cancelled: AtomicBool::new(false),
        }))
    }
}

/// Open hidapi device
pub struct HidApiHandle {
    device: Mutex<Option<HidDevice>>,
    input_report_length: usize,
    poll_slice_ms: u32,
    cancelled: AtomicBool,
}

impl HidApiHandle {
    fn with_device<T>(
        &self,
        f: impl FnOnce(&HidDevice) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let guard = self.device.lock();
        let device = guard.as_ref().ok_or(BackendError::Released)?;
        f(device)
    }
}

/// hidraw/IOKit/WinAPI report unplugged devices as plain I/O errors
fn classify_read_error(e: hidapi::HidError) -> BackendError {
    let msg = e.to_string();
    if msg.contains("No such device") || msg.contains("ENODEV") || msg.contains("disconnected")
    {
        BackendError::Disconnected
    } else {
        BackendError::from(e)
    }
}

impl DeviceHandle for HidApiHandle {
    fn max_input_report_length(&self) -> usize {
        self.input_report_length
    }

    fn wait_input(&self, buf: &mut [u8], timeout: Duration) -> Result<WaitOutcome, BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.cancelled.swap(false, Ordering::SeqCst) {
                return Ok(WaitOutcome::Woken);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(WaitOutcome::TimedOut);
            }
            let slice = (remaining.as_millis() as u32).clamp(1, self.poll_slice_ms);

            let len = self.with_device(|device| {
                device
                    .read_timeout(buf, slice as i32)
                    .map_err(classify_read_error)
            })?;
            if len > 0 {
                return Ok(WaitOutcome::Data(len));
            }
        }
    }

    fn cancel_pending_io(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn write_report(&self, data: &[u8]) -> Result<usize, BackendError> {
        self.with_device(|device| Ok(device.write(data)?))
    }

    fn get_report(&self, kind: ReportKind, buf: &mut [u8]) -> Result<usize, BackendError> {
        self.with_device(|device| match kind {
            ReportKind::Input => Ok(device.get_input_report(buf)?),
            ReportKind::Feature => Ok(device.get_feature_report(buf)?),
        })
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<(), BackendError> {
        self.with_device(|device| Ok(device.send_feature_report(data)?))
    }

    fn release(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if self.device.lock().take().is_some() {
            debug!("hidapi handle released");
        }
    }
}

/// Compute attach/detach events between two enumerations
///
/// Removals are reported before arrivals so a re-plugged device that reuses
/// its path is seen as gone before it is seen as new.
pub(crate) fn diff_paths(prev: &BTreeSet<String>, next: &BTreeSet<String>) -> Vec<HotplugEvent> {
    prev.difference(next)
        .map(HotplugEvent::removed)
        .chain(next.difference(prev).map(HotplugEvent::arrived))
        .collect()
}

/// Background thread that polls hidapi enumeration and publishes changes
pub struct HidPollWatcher {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HidPollWatcher {
    /// Take an initial snapshot and start polling
    pub fn spawn(
        backend: Arc<HidApiBackend>,
        feed: HotplugFeed,
        config: &WatcherConfig,
    ) -> Result<Self, BackendError> {
        let mut known = backend.device_paths()?;
        let interval = config.poll_interval();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("hid-hotplug-poll".into())
            .spawn(move || {
                debug!("Hot-plug watcher started with {} devices", known.len());
                while !shutdown_clone.load(Ordering::SeqCst) {
                    std::thread::park_timeout(interval);
                    if shutdown_clone.load(Ordering::SeqCst) {
                        break;
                    }

                    let current = match backend.device_paths() {
                        Ok(paths) => paths,
                        Err(e) => {
                            warn!("Hot-plug enumeration failed: {}", e);
                            continue;
                        }
                    };
                    for event in diff_paths(&known, &current) {
                        if !feed.publish(event) {
                            debug!("Disconnect monitor gone, stopping hot-plug watcher");
                            return;
                        }
                    }
                    known = current;
                }
                debug!("Hot-plug watcher exiting");
            })
            .map_err(|e| BackendError::Hid(format!("spawn hot-plug watcher: {e}")))?;

        info!("Hot-plug polling every {:?}", interval);
        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    /// Stop polling and join the thread
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Drop for HidPollWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
