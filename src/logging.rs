//! Structured logging setup.
//!
//! # Design Decisions
//! - Uses the tracing crate throughout; this module only installs a subscriber
//! - `RUST_LOG` wins over the default filter passed by the host
//! - Installing is optional: a host with its own subscriber never calls this

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rpc_observability=info";

/// Installs a global fmt subscriber. Returns an error if one is already set.
pub fn try_init(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Like `try_init` with [`DEFAULT_FILTER`], ignoring an already-installed subscriber.
pub fn init() {
    if try_init(DEFAULT_FILTER).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
