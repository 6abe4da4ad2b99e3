//! Per-activation record buffering and exporter handoff.
//!
//! # Responsibilities
//! - Own the exporter reference for one activation epoch
//! - Buffer records per kind and deliver batches of `export_batch_size`
//! - Drain everything on flush and on close
//!
//! # Design Decisions
//! - Deliveries hold the exporter slot's read lock; `close` takes the write lock,
//!   so every in-flight delivery completes before the exporter is released
//! - Records submitted after `close` are dropped, never queued for a later epoch

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::config::ObservabilityConfig;
use crate::exporter::Exporter;
use crate::telemetry::{StatsRecord, TraceRecord};

/// Records handed to the exporter by a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub stats: usize,
    pub spans: usize,
}

pub(crate) struct Session {
    epoch: u64,
    config: Arc<ObservabilityConfig>,
    open: AtomicBool,
    exporter: RwLock<Option<Arc<dyn Exporter>>>,
    stats: Mutex<Vec<StatsRecord>>,
    spans: Mutex<Vec<TraceRecord>>,
}

impl Session {
    pub(crate) fn new(epoch: u64, config: Arc<ObservabilityConfig>, exporter: Arc<dyn Exporter>) -> Self {
        Self {
            epoch,
            config,
            open: AtomicBool::new(true),
            exporter: RwLock::new(Some(exporter)),
            stats: Mutex::new(Vec::new()),
            spans: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    /// False once deactivation has begun. New calls are not instrumented.
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closing(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Buffers the records of one completed call.
    pub(crate) fn submit(&self, stats: Vec<StatsRecord>, spans: Vec<TraceRecord>) {
        if stats.is_empty() && spans.is_empty() {
            return;
        }

        let slot = self.exporter.read().unwrap_or_else(PoisonError::into_inner);
        let Some(exporter) = slot.as_deref() else {
            tracing::debug!(
                epoch = self.epoch,
                stats = stats.len(),
                spans = spans.len(),
                "Session closed, dropping records"
            );
            return;
        };

        if let Some(batch) = self.append(&self.stats, stats) {
            deliver_stats(exporter, batch, self.epoch);
        }
        if let Some(batch) = self.append(&self.spans, spans) {
            deliver_spans(exporter, batch, self.epoch);
        }
    }

    /// Delivers everything buffered so far.
    pub(crate) fn flush(&self) -> FlushReport {
        let slot = self.exporter.read().unwrap_or_else(PoisonError::into_inner);
        match slot.as_deref() {
            Some(exporter) => self.drain_into(exporter),
            None => FlushReport::default(),
        }
    }

    /// Final flush; releases the exporter.
    pub(crate) fn close(&self) -> FlushReport {
        self.mark_closing();
        let exporter = self
            .exporter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match exporter {
            Some(exporter) => self.drain_into(exporter.as_ref()),
            None => FlushReport::default(),
        }
    }

    /// Appends and returns the whole buffer once it reaches the batch size.
    fn append<T>(&self, buffer: &Mutex<Vec<T>>, records: Vec<T>) -> Option<Vec<T>> {
        if records.is_empty() {
            return None;
        }
        let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend(records);
        (buffer.len() >= self.config.export_batch_size).then(|| std::mem::take(&mut *buffer))
    }

    fn drain_into(&self, exporter: &dyn Exporter) -> FlushReport {
        let stats = std::mem::take(&mut *self.stats.lock().unwrap_or_else(PoisonError::into_inner));
        let spans = std::mem::take(&mut *self.spans.lock().unwrap_or_else(PoisonError::into_inner));
        let report = FlushReport {
            stats: stats.len(),
            spans: spans.len(),
        };
        deliver_stats(exporter, stats, self.epoch);
        deliver_spans(exporter, spans, self.epoch);
        report
    }
}

fn deliver_stats(exporter: &dyn Exporter, batch: Vec<StatsRecord>, epoch: u64) {
    if batch.is_empty() {
        return;
    }
    let size = batch.len();
    if panic::catch_unwind(AssertUnwindSafe(|| exporter.export_stats_data(batch))).is_err() {
        tracing::warn!(epoch, batch = size, "Exporter panicked exporting stats, batch dropped");
    }
}

fn deliver_spans(exporter: &dyn Exporter, batch: Vec<TraceRecord>, epoch: u64) {
    if batch.is_empty() {
        return;
    }
    let size = batch.len();
    if panic::catch_unwind(AssertUnwindSafe(|| exporter.export_tracing_data(batch))).is_err() {
        tracing::warn!(epoch, batch = size, "Exporter panicked exporting spans, batch dropped");
    }
}
