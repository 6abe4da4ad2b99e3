//! Telemetry exporters.
//!
//! # Data Flow
//! ```text
//! completed call
//!     → instrumentation engine builds StatsRecord / TraceRecord
//!     → session buffer (per kind, FIFO)
//!     → batch of export_batch_size, flush() or deactivation
//!     → Exporter::export_stats_data / export_tracing_data
//! ```
//!
//! # Design Decisions
//! - Exporters are plain synchronous sinks; any async shipping is their own business
//! - Batches arrive in production order within a kind
//! - Empty batches are never delivered
//! - A panicking exporter loses its batch, not the process

pub mod logging;
pub mod memory;
pub mod metrics;

pub use self::logging::LoggingExporter;
pub use self::memory::InMemoryExporter;
pub use self::metrics::MetricsExporter;

use crate::telemetry::{StatsRecord, TraceRecord};

/// A telemetry sink supplied by the host application.
///
/// Called from whichever thread completes a batch, possibly several at once.
pub trait Exporter: Send + Sync {
    fn export_stats_data(&self, batch: Vec<StatsRecord>);

    fn export_tracing_data(&self, batch: Vec<TraceRecord>);
}

impl<E: Exporter + ?Sized> Exporter for std::sync::Arc<E> {
    fn export_stats_data(&self, batch: Vec<StatsRecord>) {
        (**self).export_stats_data(batch)
    }

    fn export_tracing_data(&self, batch: Vec<TraceRecord>) {
        (**self).export_tracing_data(batch)
    }
}
