//! The process-wide observability controller.
//!
//! # Responsibilities
//! - Enforce at most one live activation per process
//! - Own the active session and the call-hook registration
//! - Tear both down in order when the activation ends
//!
//! # Design Decisions
//! - The state mutex is only held during activate and deactivate, never across
//!   the active region, so nested activation attempts fail instead of deadlocking
//! - Readers (`state`, `active_config`) go through an `ArcSwapOption` snapshot and
//!   never touch the mutex; an exporter may call them while a flush is running

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, TryLockError};

use arc_swap::ArcSwapOption;

use crate::config::{ConfigResolver, ObservabilityConfig};
use crate::error::{ObservabilityError, Result};
use crate::exporter::Exporter;
use crate::instrumentation::session::Session;
use crate::instrumentation::InstrumentationEngine;
use crate::lifecycle::guard::ActivationGuard;
use crate::rpc::hooks::{self, HookRegistration};

static CONTROLLER: OnceLock<ObservabilityController> = OnceLock::new();

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Inactive,
    Active { epoch: u64 },
}

struct Activation {
    session: Arc<Session>,
    registration: HookRegistration,
}

struct Snapshot {
    epoch: u64,
    config: Arc<ObservabilityConfig>,
}

pub struct ObservabilityController {
    slot: Mutex<Option<Activation>>,
    snapshot: ArcSwapOption<Snapshot>,
    epochs: AtomicU64,
}

impl ObservabilityController {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            snapshot: ArcSwapOption::empty(),
            epochs: AtomicU64::new(0),
        }
    }

    /// The single controller of this process.
    pub fn global() -> &'static ObservabilityController {
        CONTROLLER.get_or_init(ObservabilityController::new)
    }

    /// Activates using configuration from the process environment.
    pub fn activate<E: Exporter + 'static>(&'static self, exporter: E) -> Result<ActivationGuard> {
        self.activate_with(&ConfigResolver::from_env(), exporter)
    }

    /// Activates using configuration from `resolver`.
    ///
    /// Fails with `AlreadyActive` while another activation is live or while an
    /// activation or deactivation is in progress on another thread.
    pub fn activate_with<E: Exporter + 'static>(
        &'static self,
        resolver: &ConfigResolver,
        exporter: E,
    ) -> Result<ActivationGuard> {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("Activation rejected: another activation is in progress");
                return Err(ObservabilityError::AlreadyActive);
            }
        };

        if let Some(active) = slot.as_ref() {
            tracing::warn!(epoch = active.session.epoch(), "Activation rejected: already active");
            return Err(ObservabilityError::AlreadyActive);
        }

        let config = match resolver.resolve() {
            Ok(config) => Arc::new(config),
            Err(err) => {
                tracing::error!(error = %err, "Observability activation failed");
                return Err(err);
            }
        };

        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(Session::new(epoch, Arc::clone(&config), Arc::new(exporter)));
        let engine = InstrumentationEngine::new(Arc::clone(&session));

        let registration = match hooks::install(Arc::new(engine)) {
            Ok(registration) => registration,
            Err(err) => {
                session.close();
                tracing::error!(epoch, error = %err, "Observability activation failed");
                return Err(err.into());
            }
        };

        *slot = Some(Activation {
            session: Arc::clone(&session),
            registration,
        });
        self.snapshot.store(Some(Arc::new(Snapshot {
            epoch,
            config: Arc::clone(&config),
        })));

        tracing::info!(
            epoch,
            project_id = %config.project_id,
            tracing = config.tracing_enabled(),
            sampling_rate = config.sampling_rate(),
            stats = config.stats_enabled(),
            export_batch_size = config.export_batch_size,
            "Observability activated"
        );
        Ok(ActivationGuard::new(self, session))
    }

    pub fn state(&self) -> ControllerState {
        match self.snapshot.load_full() {
            Some(snapshot) => ControllerState::Active { epoch: snapshot.epoch },
            None => ControllerState::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Configuration of the live activation.
    pub fn active_config(&self) -> Option<Arc<ObservabilityConfig>> {
        self.snapshot.load_full().map(|s| Arc::clone(&s.config))
    }

    /// Ends the activation owning `session`. Never fails; problems are logged.
    pub(crate) fn release(&self, session: &Session) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let epoch = session.epoch();

        let activation = match slot.take() {
            Some(activation) if activation.session.epoch() == epoch => activation,
            other => {
                *slot = other;
                // Only reachable if a guard outlived its own epoch.
                tracing::warn!(epoch, "Deactivation ignored: epoch is not active");
                session.close();
                return;
            }
        };

        activation.session.mark_closing();
        if let Err(err) = hooks::uninstall(activation.registration) {
            tracing::warn!(epoch, error = %err, "Failed to remove call hooks, continuing teardown");
        }
        let flushed = activation.session.close();
        self.snapshot.store(None);

        tracing::info!(
            epoch,
            flushed_stats = flushed.stats,
            flushed_spans = flushed.spans,
            "Observability deactivated"
        );
    }
}
