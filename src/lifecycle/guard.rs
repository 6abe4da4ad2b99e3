//! Scoped activation handle.

use std::fmt;
use std::sync::Arc;

use crate::config::ObservabilityConfig;
use crate::instrumentation::session::Session;
use crate::instrumentation::FlushReport;
use crate::lifecycle::controller::ObservabilityController;

/// Keeps observability active. Dropping it deactivates.
///
/// Not `Clone`: one guard per activation, so the end of the active window is
/// always a single well-defined point.
#[must_use = "observability is deactivated as soon as the guard is dropped"]
pub struct ActivationGuard {
    controller: &'static ObservabilityController,
    session: Arc<Session>,
    released: bool,
}

impl ActivationGuard {
    pub(crate) fn new(controller: &'static ObservabilityController, session: Arc<Session>) -> Self {
        Self {
            controller,
            session,
            released: false,
        }
    }

    /// Activation epoch, unique within the process.
    pub fn epoch(&self) -> u64 {
        self.session.epoch()
    }

    pub fn config(&self) -> &ObservabilityConfig {
        self.session.config()
    }

    /// Hands every buffered record to the exporter now.
    pub fn flush(&self) -> FlushReport {
        self.session.flush()
    }

    /// Deactivates explicitly. Same as dropping the guard.
    pub fn deactivate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.controller.release(&self.session);
        }
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ActivationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationGuard")
            .field("epoch", &self.epoch())
            .field("project_id", &self.config().project_id)
            .finish()
    }
}
