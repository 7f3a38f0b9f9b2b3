//! Session and backend error types

use thiserror::Error;

/// Errors reported by a device backend (the OS-facing collaborator)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Invalid device path: {0}")]
    InvalidPath(String),

    #[error("Device handle already released")]
    Released,

    // HID-specific errors
    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0}")]
    PermissionDenied(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

#[cfg(feature = "hidapi")]
impl From<hidapi::HidError> for BackendError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            BackendError::PermissionDenied(msg)
        } else {
            BackendError::Hid(msg)
        }
    }
}

/// Errors from opening a device session
#[derive(Error, Debug)]
pub enum OpenError {
    /// The OS handle for the path could not be acquired
    #[error("Cannot open {path}: {source}")]
    HandleUnavailable {
        path: String,
        #[source]
        source: BackendError,
    },

    /// The notification thread could not be started or never became ready
    #[error("Notification thread failed to start: {0}")]
    ThreadStartFailed(String),
}

/// Errors from reading input reports
///
/// A timed read that expires is not an error: it returns `Ok(0)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The device was removed or the session is closing
    #[error("Device disconnected")]
    Disconnected,

    /// A read callback is registered; reports bypass the queue
    #[error("Session is in callback mode; reports are delivered to the read callback")]
    CallbackModeActive,

    /// The notification thread stopped because the OS wait failed
    #[error("OS wait failed: {0}")]
    OsWaitFailed(String),
}

/// Errors from report output and report requests
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Device disconnected")]
    Disconnected,

    /// The OS rejected an output report, a feature report, or a report
    /// request from `get_report`
    #[error("OS write failed: {0}")]
    OsWriteFailed(#[from] BackendError),

    #[error("Invalid report length: {0}")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_path() {
        let err = OpenError::HandleUnavailable {
            path: "/dev/hidraw9".into(),
            source: BackendError::NotFound("/dev/hidraw9".into()),
        };
        assert!(err.to_string().contains("/dev/hidraw9"));
    }

    #[test]
    fn test_backend_error_becomes_write_failure() {
        let err: IoError = BackendError::Hid("pipe".into()).into();
        assert!(matches!(err, IoError::OsWriteFailed(BackendError::Hid(_))));
    }

    #[cfg(feature = "hidapi")]
    #[test]
    fn test_permission_denied_is_classified() {
        let err: BackendError = hidapi::HidError::HidApiError {
            message: "Permission denied".into(),
        }
        .into();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
    }
}
