//! RPC observability plugin.
//!
//! While activated, every call made or served through the in-process [`rpc`]
//! framework is observed: stats (counts, latency, bytes, messages) and traces
//! (one span per side, parented across nested calls) are batched and handed to a
//! host-supplied [`Exporter`].
//!
//! # Data Flow
//! ```text
//! env (RPC_OBSERVABILITY_CONFIG[_FILE]) → config::ConfigResolver
//!     → lifecycle::ObservabilityController::activate
//!     → instrumentation::InstrumentationEngine installed as rpc call hooks
//!     → telemetry::{StatsRecord, TraceRecord} per completed call
//!     → exporter::Exporter (batched)
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod instrumentation;
pub mod lifecycle;
pub mod logging;
pub mod rpc;
pub mod telemetry;

pub use config::{ConfigResolver, ObservabilityConfig};
pub use error::{ObservabilityError, Result};
pub use exporter::{Exporter, InMemoryExporter, LoggingExporter, MetricsExporter};
pub use lifecycle::{activate, ActivationGuard, ControllerState, ObservabilityController};
pub use telemetry::{MetricName, SpanStatus, StatsRecord, TraceRecord};
