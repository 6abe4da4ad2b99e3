//! Configuration resolution subsystem.
//!
//! # Data Flow
//! ```text
//! RPC_OBSERVABILITY_CONFIG_FILE ──(set)──→ read file ─┐
//!            │ (unset or empty)                        │
//!            ▼                                         ▼
//! RPC_OBSERVABILITY_CONFIG ─────(set)──→ inline JSON ─→ loader.rs (parse)
//!            │ (unset or empty)                        → validation.rs (semantic checks)
//!            ▼                                         → project id fallback
//!      ConfigMissing                                   → ObservabilityConfig (immutable)
//! ```
//!
//! # Design Decisions
//! - The file variable always wins; the inline value is never parsed when a file is named
//! - An empty variable counts as unset
//! - Unknown keys are ignored so documents written for newer versions still load
//! - Config is resolved once per activation and shared via Arc for the whole epoch

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{
    parse_document, ConfigResolver, EnvSource, ProcessEnv, CONFIG_ENV_VAR, CONFIG_FILE_ENV_VAR,
    PROJECT_ID_ENV_VARS,
};
pub use schema::{ObservabilityConfig, StatsConfig, TracingConfig};
pub use validation::ValidationError;
