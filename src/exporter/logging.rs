//! Exporter that writes each record as a structured log event.

use crate::exporter::Exporter;
use crate::telemetry::{SpanStatus, StatsRecord, TraceRecord};

/// Emits one `tracing` event per record under the `rpc_observability::export` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExporter;

impl Exporter for LoggingExporter {
    fn export_stats_data(&self, batch: Vec<StatsRecord>) {
        for record in batch {
            tracing::info!(
                target: "rpc_observability::export",
                metric = %record.name,
                value = record.value,
                unit = record.name.unit(),
                attributes = ?record.attributes,
                "Stats record"
            );
        }
    }

    fn export_tracing_data(&self, batch: Vec<TraceRecord>) {
        for span in batch {
            let duration_ms = span
                .end_time
                .duration_since(span.start_time)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or_default();
            let error = match &span.status {
                SpanStatus::Ok => None,
                SpanStatus::Error(message) => Some(message.as_str()),
            };
            tracing::info!(
                target: "rpc_observability::export",
                name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent_span_id = ?span.parent_span_id,
                duration_ms,
                error,
                "Trace record"
            );
        }
    }
}
