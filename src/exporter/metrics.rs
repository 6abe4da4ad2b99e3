//! Exporter that forwards stats into the `metrics` facade.
//!
//! # Metrics
//! - `rpc/{client,server}/started_rpcs`, `completed_rpcs` (counter)
//! - latency, bytes and message counts per call (histogram)
//!
//! Labels are the record attributes. Whatever recorder the host installed
//! (Prometheus, statsd, ...) receives the values; without one they are discarded.
//! Spans have no representation in the facade; batches are only counted at debug.

use metrics::Label;

use crate::exporter::Exporter;
use crate::telemetry::{StatsRecord, TraceRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsExporter;

impl Exporter for MetricsExporter {
    fn export_stats_data(&self, batch: Vec<StatsRecord>) {
        for record in batch {
            let labels: Vec<Label> = record
                .attributes
                .into_iter()
                .map(|(key, value)| Label::new(key, value))
                .collect();

            if record.name.is_counter() {
                metrics::counter!(record.name.as_str(), labels).increment(record.value as u64);
            } else {
                metrics::histogram!(record.name.as_str(), labels).record(record.value);
            }
        }
    }

    fn export_tracing_data(&self, batch: Vec<TraceRecord>) {
        tracing::debug!(spans = batch.len(), "Span batch dropped by metrics exporter");
    }
}
