//! Live subscription handles.

use std::fmt;

/// Handle for a standing registration with a live data source.
///
/// The registration is released exactly once: either through [`dispose`]
/// or, if the handle is dropped first, on drop. `dispose` consumes the
/// handle, so a released registration can never be released again.
///
/// [`dispose`]: Subscription::dispose
#[must_use = "dropping a subscription immediately unsubscribes it"]
pub struct Subscription {
    label: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a handle that runs `release` when disposed.
    pub fn new(label: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release, for registrations that never started.
    pub fn inert(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            release: None,
        }
    }

    /// What this subscription is listening to.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the registration is still held.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Tear down the registration.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(subscription = %self.label, "Disposing subscription");
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}
