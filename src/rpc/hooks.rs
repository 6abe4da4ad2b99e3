//! Global call-hook slot.
//!
//! # Responsibilities
//! - Hold at most one `CallInterceptor` for the whole process
//! - Hand every new call (client or server) to the interceptor
//! - Route per-message and end-of-call events to the call's observer
//!
//! # Design Decisions
//! - Reads are lock-free (`ArcSwapOption`); installs and removals serialize on a mutex
//! - Removal is keyed by registration id so a stale registration cannot evict a newer one
//! - An observer ends exactly once; later end events are ignored

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::rpc::call::{CallId, CallKind, Side};
use crate::rpc::metadata::Metadata;
use crate::rpc::status::Status;

static HOOKS: ArcSwapOption<Installed> = ArcSwapOption::const_empty();
static INSTALL_LOCK: Mutex<()> = Mutex::new(());
static REGISTRATION_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("call hooks are already installed")]
    AlreadyInstalled,

    #[error("call hooks registration {0} is not installed")]
    NotInstalled(u64),
}

/// What an interceptor sees when a call starts.
pub struct CallStart<'a> {
    pub id: CallId,
    pub side: Side,
    pub kind: CallKind,
    pub method: &'a str,
    /// Outbound metadata on the client side (writable), inbound on the server side.
    pub metadata: &'a mut Metadata,
    /// Propagation values of the handler this client call was made from, if any.
    pub parent: Option<&'a Metadata>,
}

/// Receives every call start.
pub trait CallInterceptor: Send + Sync {
    /// Returns `None` to leave the call unobserved.
    fn on_call_start(&self, call: CallStart<'_>) -> Option<Box<dyn CallObserver>>;
}

/// Per-call event sink.
pub trait CallObserver: Send {
    fn on_message_sent(&mut self, len: usize);

    fn on_message_received(&mut self, len: usize);

    /// Values installed as the propagation scope of a server handler.
    fn propagation(&self) -> Option<Metadata> {
        None
    }

    fn on_call_end(self: Box<Self>, status: &Status);
}

struct Installed {
    id: u64,
    interceptor: Arc<dyn CallInterceptor>,
}

/// Proof of a successful install; pass it back to `uninstall`.
#[derive(Debug)]
pub struct HookRegistration {
    id: u64,
}

impl HookRegistration {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Installs the process-wide interceptor.
pub fn install(interceptor: Arc<dyn CallInterceptor>) -> Result<HookRegistration, HookError> {
    let _lock = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if HOOKS.load().is_some() {
        return Err(HookError::AlreadyInstalled);
    }

    let id = REGISTRATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    HOOKS.store(Some(Arc::new(Installed { id, interceptor })));
    tracing::debug!(registration = id, "Call hooks installed");
    Ok(HookRegistration { id })
}

/// Removes the interceptor installed under `registration`.
///
/// Calls that already obtained an observer keep it until they end.
pub fn uninstall(registration: HookRegistration) -> Result<(), HookError> {
    let _lock = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    match HOOKS.load_full() {
        Some(current) if current.id == registration.id => {
            HOOKS.store(None);
            tracing::debug!(registration = registration.id, "Call hooks removed");
            Ok(())
        }
        _ => Err(HookError::NotInstalled(registration.id)),
    }
}

pub fn is_installed() -> bool {
    HOOKS.load().is_some()
}

/// Offers a starting call to the installed interceptor.
pub(crate) fn start_call(call: CallStart<'_>) -> ObserverSlot {
    let Some(installed) = HOOKS.load_full() else {
        return ObserverSlot::default();
    };
    ObserverSlot::new(installed.interceptor.on_call_start(call))
}

/// Shared handle to a call's observer.
///
/// Cloned into every half of the call (request stream, response sink, dispatcher)
/// so message events are reported wherever they happen.
#[derive(Clone, Default)]
pub(crate) struct ObserverSlot {
    inner: Option<Arc<Mutex<Option<Box<dyn CallObserver>>>>>,
}

impl ObserverSlot {
    fn new(observer: Option<Box<dyn CallObserver>>) -> Self {
        Self {
            inner: observer.map(|o| Arc::new(Mutex::new(Some(o)))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Box<dyn CallObserver>) -> R) -> Option<R> {
        let inner = self.inner.as_ref()?;
        let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f)
    }

    pub(crate) fn sent(&self, len: usize) {
        self.with(|o| o.on_message_sent(len));
    }

    pub(crate) fn received(&self, len: usize) {
        self.with(|o| o.on_message_received(len));
    }

    pub(crate) fn propagation(&self) -> Option<Metadata> {
        self.with(|o| o.propagation()).flatten()
    }

    /// Ends the call. Only the first call has any effect.
    pub(crate) fn end(&self, status: &Status) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let observer = inner.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(observer) = observer {
            observer.on_call_end(status);
        }
    }
}
