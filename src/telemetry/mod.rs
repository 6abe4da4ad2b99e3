//! Telemetry record types handed to exporters.
//!
//! Records are plain owned data. Once produced they are never mutated; the
//! engine moves them into a batch and the batch into the exporter.

pub mod ids;
pub mod record;

pub use ids::{new_span_id, new_trace_id, SpanId, TraceId};
pub use record::{MetricName, SpanStatus, StatsRecord, TraceRecord};
