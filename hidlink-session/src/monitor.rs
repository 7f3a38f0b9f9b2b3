//! Disconnect monitor
//!
//! One background thread per process consumes hot-plug events from any
//! number of sources (the hidapi poll watcher, virtual devices, or the
//! embedding application) and turns removals into session disconnects.
//! Arrivals and removals are also forwarded to optional observers.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;
use crate::types::{DeviceEvent, HotplugEvent};

type PathCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Observers {
    arrival: Option<PathCallback>,
    removal: Option<PathCallback>,
}

enum MonitorMessage {
    Event(HotplugEvent),
    Shutdown,
}

/// Sending side of the monitor's event channel
#[derive(Clone)]
pub struct HotplugFeed {
    tx: mpsc::UnboundedSender<MonitorMessage>,
}

impl HotplugFeed {
    /// Hand an event to the monitor; `false` once the monitor has stopped
    pub fn publish(&self, event: HotplugEvent) -> bool {
        self.tx.send(MonitorMessage::Event(event)).is_ok()
    }
}

pub struct DisconnectMonitor {
    tx: mpsc::UnboundedSender<MonitorMessage>,
    observers: Arc<Mutex<Observers>>,
    thread: Option<JoinHandle<()>>,
}

impl DisconnectMonitor {
    /// Start the monitor thread for sessions in `registry`
    pub fn spawn(registry: Arc<SessionRegistry>) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observers = Arc::new(Mutex::new(Observers::default()));
        let observers_clone = observers.clone();

        let thread = std::thread::Builder::new()
            .name("hid-disconnect-monitor".into())
            .spawn(move || {
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        MonitorMessage::Event(event) => {
                            handle_event(&registry, &observers_clone, event)
                        }
                        MonitorMessage::Shutdown => break,
                    }
                }
                debug!("Disconnect monitor exiting");
            })?;

        info!("Disconnect monitor started");
        Ok(Self {
            tx,
            observers,
            thread: Some(thread),
        })
    }

    /// A publisher for this monitor
    pub fn feed(&self) -> HotplugFeed {
        HotplugFeed {
            tx: self.tx.clone(),
        }
    }

    /// Called with the path of each arriving device, on the monitor thread
    pub fn set_arrival_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.observers.lock().arrival = Some(Arc::new(callback));
    }

    pub fn clear_arrival_callback(&self) {
        self.observers.lock().arrival = None;
    }

    /// Called with the path of each removed device after its sessions were
    /// marked disconnected, on the monitor thread
    pub fn set_removal_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.observers.lock().removal = Some(Arc::new(callback));
    }

    /// Process queued events, then stop the thread
    pub fn stop(&mut self) {
        let _ = self.tx.send(MonitorMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Disconnect monitor thread panicked");
            }
        }
    }
}

impl Drop for DisconnectMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_event(
    registry: &SessionRegistry,
    observers: &Mutex<Observers>,
    event: HotplugEvent,
) {
    let callback = match event.event {
        DeviceEvent::Removed => {
            let count = registry.notify_removed(&event.path);
            if count > 0 {
                info!("Device {} removed ({} session(s))", event.path, count);
            }
            observers.lock().removal.clone()
        }
        DeviceEvent::Arrived => {
            debug!("Device {} arrived", event.path);
            observers.lock().arrival.clone()
        }
    };
    if let Some(callback) = callback {
        callback(&event.path);
    }
}
