//! In-memory exporter for tests and local inspection.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::exporter::Exporter;
use crate::rpc::Side;
use crate::telemetry::{MetricName, StatsRecord, TraceRecord};

/// Collects every exported record. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExporter {
    stats: Arc<Mutex<Vec<StatsRecord>>>,
    spans: Arc<Mutex<Vec<TraceRecord>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Vec<StatsRecord> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn spans(&self) -> Vec<TraceRecord> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Distinct metric names seen so far.
    pub fn metric_names(&self) -> BTreeSet<MetricName> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|record| record.name)
            .collect()
    }

    pub fn stats_named(&self, name: MetricName) -> Vec<StatsRecord> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect()
    }

    pub fn spans_of(&self, kind: Side) -> Vec<TraceRecord> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|span| span.kind == kind)
            .cloned()
            .collect()
    }

    pub fn reset(&self) {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Exporter for InMemoryExporter {
    fn export_stats_data(&self, batch: Vec<StatsRecord>) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
    }

    fn export_tracing_data(&self, batch: Vec<TraceRecord>) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(name: MetricName) -> StatsRecord {
        StatsRecord {
            name,
            value: 1.0,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_clones_share_storage() {
        let exporter = InMemoryExporter::new();
        let clone = exporter.clone();

        clone.export_stats_data(vec![record(MetricName::ClientStartedRpcs), record(MetricName::ServerLatency)]);
        assert_eq!(exporter.stats().len(), 2);
        assert_eq!(exporter.stats_named(MetricName::ServerLatency).len(), 1);
        assert!(exporter.metric_names().contains(&MetricName::ClientStartedRpcs));

        exporter.reset();
        assert!(clone.stats().is_empty());
    }
}
