//! Activation lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Activate (controller.rs):
//!     try-lock controller → reject if active → resolve config
//!     → new Session(epoch, config, exporter) → install engine as call hooks
//!     → ActivationGuard handed to the caller
//!
//! Deactivate (guard.rs drop or ActivationGuard::deactivate):
//!     stop observing new calls → remove call hooks
//!     → final flush → release exporter → Inactive
//! ```
//!
//! # Design Decisions
//! - Exactly one controller per process, reachable through `global()`
//! - Activation is fail-closed: any error leaves the controller inactive
//! - Deactivation is fail-open: teardown problems are logged, never raised
//! - A second activation fails fast instead of waiting

pub mod controller;
pub mod guard;

pub use controller::{ControllerState, ObservabilityController};
pub use guard::ActivationGuard;

use crate::error::Result;
use crate::exporter::Exporter;

/// Activates observability on the process-wide controller using the process environment.
///
/// ```no_run
/// # async fn run() -> rpc_observability::Result<()> {
/// let exporter = rpc_observability::InMemoryExporter::new();
/// let guard = rpc_observability::activate(exporter.clone())?;
/// // ... make calls ...
/// drop(guard);
/// println!("{} stats records", exporter.stats().len());
/// # Ok(())
/// # }
/// ```
pub fn activate<E: Exporter + 'static>(exporter: E) -> Result<ActivationGuard> {
    ObservabilityController::global().activate(exporter)
}
