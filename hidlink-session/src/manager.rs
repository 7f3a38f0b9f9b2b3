//! Entry point tying a backend, a registry and session settings together

use std::sync::Arc;

use crate::backend::DeviceBackend;
use crate::config::SessionConfig;
use crate::error::OpenError;
use crate::monitor::DisconnectMonitor;
use crate::registry::SessionRegistry;
use crate::session::DeviceSession;

/// Opens sessions on one backend and keeps them discoverable by path
pub struct SessionManager {
    backend: Arc<dyn DeviceBackend>,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
}

impl SessionManager {
    /// Manager registering into the process-wide registry
    pub fn new(backend: Arc<dyn DeviceBackend>, config: SessionConfig) -> Self {
        Self::with_registry(backend, SessionRegistry::global(), config)
    }

    pub fn with_registry(
        backend: Arc<dyn DeviceBackend>,
        registry: Arc<SessionRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            config,
        }
    }

    /// Open a session on `path`
    pub fn open(&self, path: &str) -> Result<DeviceSession, OpenError> {
        DeviceSession::open(
            self.backend.as_ref(),
            self.registry.clone(),
            path,
            &self.config,
        )
    }

    /// Start a disconnect monitor bound to this manager's registry
    pub fn spawn_monitor(&self) -> std::io::Result<DisconnectMonitor> {
        DisconnectMonitor::spawn(self.registry.clone())
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
