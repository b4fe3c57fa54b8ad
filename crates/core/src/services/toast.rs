//! Toast notifications.
//!
//! Every failure a user should see ends up here as a single line. The
//! terminal client prints what was recorded after each command.

use std::sync::{Arc, Mutex};

use socialsync_common::AppError;

use super::lock;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// A single shown notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

/// Sink for user-visible notifications.
pub trait Toaster: Send + Sync {
    /// Show a success notification.
    fn success(&self, message: &str);

    /// Show an error notification.
    fn error(&self, message: &str);
}

/// Shared toaster handle.
pub type ToasterService = Arc<dyn Toaster>;

/// Toaster that keeps every notification in memory.
#[derive(Clone, Default)]
pub struct RecordingToaster {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl RecordingToaster {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications shown so far, oldest first.
    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        lock(&self.toasts).clone()
    }

    /// Messages of the error notifications shown so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        lock(&self.toasts)
            .iter()
            .filter(|t| t.level == ToastLevel::Error)
            .map(|t| t.message.clone())
            .collect()
    }

    fn push(&self, level: ToastLevel, message: &str) {
        lock(&self.toasts).push(Toast {
            level,
            message: message.to_string(),
        });
    }
}

impl Toaster for RecordingToaster {
    fn success(&self, message: &str) {
        self.push(ToastLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(ToastLevel::Error, message);
    }
}

/// Log a failed operation and surface it to the user.
///
/// Validation failures are expected input problems and only logged at debug
/// level; everything else is logged as a warning with its error code.
pub fn report(toaster: &dyn Toaster, operation: &str, err: &AppError) {
    if err.is_local() {
        tracing::debug!(operation, error = %err, "Rejected input");
    } else {
        tracing::warn!(operation, code = err.error_code(), error = %err, "Operation failed");
    }
    toaster.error(&err.toast_message());
}

/// Pass a result through, reporting it first if it failed.
pub(crate) fn reported<T>(
    toaster: &dyn Toaster,
    operation: &str,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if let Err(e) = &result {
        report(toaster, operation, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_uses_toast_message() {
        let toaster = RecordingToaster::new();
        report(
            &toaster,
            "save",
            &AppError::RemoteWrite("backend/unavailable: down".to_string()),
        );
        assert_eq!(toaster.errors(), vec!["Could not save your changes"]);
    }

    #[test]
    fn test_reported_passes_ok_through_silently() {
        let toaster = RecordingToaster::new();
        let value = reported(&toaster, "noop", Ok::<_, AppError>(7));
        assert!(matches!(value, Ok(7)));
        assert!(toaster.toasts().is_empty());
    }

    #[test]
    fn test_success_and_error_are_distinguished() {
        let toaster = RecordingToaster::new();
        toaster.success("Post created");
        toaster.error("Nope");
        assert_eq!(toaster.toasts().len(), 2);
        assert_eq!(toaster.errors(), vec!["Nope"]);
    }
}
