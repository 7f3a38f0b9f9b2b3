//! Shared fixtures for session integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use hidlink_session::{
    MemoryBackend, SessionConfig, SessionManager, SessionRegistry, VirtualDevice,
};

pub const REPORT_LEN: usize = 16;

/// A manager over an in-memory backend with its own registry
pub struct Rig {
    pub backend: Arc<MemoryBackend>,
    pub manager: SessionManager,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(SessionConfig {
            wait_timeout_ms: 50,
            ..SessionConfig::default()
        })
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let manager = SessionManager::with_registry(
            backend.clone(),
            Arc::new(SessionRegistry::new()),
            config,
        );
        Self { backend, manager }
    }

    pub fn device(&self, path: &str) -> VirtualDevice {
        self.backend.add_device(path, REPORT_LEN)
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
