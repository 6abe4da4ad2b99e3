//! Per-call observation state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::instrumentation::propagation::{self, SpanContext};
use crate::instrumentation::session::Session;
use crate::rpc::{CallId, CallKind, CallObserver, Metadata, Side, Status};
use crate::telemetry::record::{span_name, ATTR_METHOD, ATTR_STATUS};
use crate::telemetry::{MetricName, SpanId, SpanStatus, StatsRecord, TraceRecord};

/// Span identity of a traced call.
#[derive(Debug, Clone)]
pub struct SpanState {
    pub context: SpanContext,
    pub parent_span_id: Option<SpanId>,
}

/// Message and byte counters for one side of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CallCounters {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Observes one side of one call and emits its records when it ends.
pub struct CallContext {
    session: Arc<Session>,
    id: CallId,
    side: Side,
    kind: CallKind,
    method: String,
    span: Option<SpanState>,
    counters: CallCounters,
    started: Instant,
    start_time: SystemTime,
}

impl CallContext {
    pub(crate) fn new(session: Arc<Session>, id: CallId, side: Side, kind: CallKind, method: &str, span: Option<SpanState>) -> Self {
        Self {
            session,
            id,
            side,
            kind,
            method: method.to_string(),
            span,
            counters: CallCounters::default(),
            started: Instant::now(),
            start_time: SystemTime::now(),
        }
    }

    fn base_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = self.session.config().labels.clone();
        attributes.insert(ATTR_METHOD.to_string(), self.method.clone());
        attributes
    }

    fn stats_records(&self, status: &Status, latency_ms: f64) -> Vec<StatsRecord> {
        let base = self.base_attributes();
        let mut completed = base.clone();
        completed.insert(ATTR_STATUS.to_string(), status.code().as_str().to_string());

        let c = &self.counters;
        MetricName::for_side(self.side)
            .map(|name| {
                let value = match name {
                    MetricName::ClientStartedRpcs
                    | MetricName::ServerStartedRpcs
                    | MetricName::ClientCompletedRpcs
                    | MetricName::ServerCompletedRpcs => 1.0,
                    MetricName::ClientRoundtripLatency | MetricName::ServerLatency => latency_ms,
                    MetricName::ClientSentBytesPerRpc | MetricName::ServerSentBytesPerRpc => c.bytes_sent as f64,
                    MetricName::ClientReceivedBytesPerRpc | MetricName::ServerReceivedBytesPerRpc => {
                        c.bytes_received as f64
                    }
                    MetricName::ClientSentMessagesPerRpc | MetricName::ServerSentMessagesPerRpc => {
                        c.messages_sent as f64
                    }
                    MetricName::ClientReceivedMessagesPerRpc | MetricName::ServerReceivedMessagesPerRpc => {
                        c.messages_received as f64
                    }
                };
                let attributes = match name {
                    MetricName::ClientStartedRpcs | MetricName::ServerStartedRpcs => base.clone(),
                    _ => completed.clone(),
                };
                StatsRecord { name, value, attributes }
            })
            .collect()
    }

    fn trace_record(&self, span: &SpanState, status: &Status) -> TraceRecord {
        let c = &self.counters;
        let mut attributes = self.base_attributes();
        attributes.insert(ATTR_STATUS.to_string(), status.code().as_str().to_string());
        attributes.insert("rpc.kind".to_string(), self.kind.as_str().to_string());
        attributes.insert("messages.sent".to_string(), c.messages_sent.to_string());
        attributes.insert("messages.received".to_string(), c.messages_received.to_string());
        attributes.insert("bytes.sent".to_string(), c.bytes_sent.to_string());
        attributes.insert("bytes.received".to_string(), c.bytes_received.to_string());

        TraceRecord {
            name: span_name(self.side, &self.method),
            kind: self.side,
            trace_id: span.context.trace_id(),
            span_id: span.context.span_id(),
            parent_span_id: span.parent_span_id,
            start_time: self.start_time,
            end_time: self.start_time + self.started.elapsed(),
            status: if status.is_ok() {
                SpanStatus::Ok
            } else {
                SpanStatus::Error(status.to_string())
            },
            attributes,
        }
    }
}

impl CallObserver for CallContext {
    fn on_message_sent(&mut self, len: usize) {
        self.counters.messages_sent += 1;
        self.counters.bytes_sent += len as u64;
    }

    fn on_message_received(&mut self, len: usize) {
        self.counters.messages_received += 1;
        self.counters.bytes_received += len as u64;
    }

    /// Server handlers run with their own span as the propagation parent.
    fn propagation(&self) -> Option<Metadata> {
        match (self.side, &self.span) {
            (Side::Server, Some(span)) => {
                let mut metadata = Metadata::new();
                propagation::inject(&span.context, &mut metadata);
                Some(metadata)
            }
            _ => None,
        }
    }

    fn on_call_end(self: Box<Self>, status: &Status) {
        let latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let config = self.session.config();

        let stats = if config.stats_enabled() {
            self.stats_records(status, latency_ms)
        } else {
            Vec::new()
        };
        let spans = match &self.span {
            Some(span) if span.context.is_sampled() => vec![self.trace_record(span, status)],
            _ => Vec::new(),
        };

        tracing::trace!(
            call = %self.id,
            epoch = self.session.epoch(),
            side = self.side.as_str(),
            method = %self.method,
            status = %status.code(),
            latency_ms,
            "Call observed"
        );
        self.session.submit(stats, spans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ObservabilityConfig, StatsConfig, TracingConfig};
    use crate::exporter::InMemoryExporter;
    use crate::telemetry::{new_span_id, new_trace_id};
    use opentelemetry::trace::{TraceFlags, TraceState};

    fn session(exporter: &InMemoryExporter) -> Arc<Session> {
        let mut labels = BTreeMap::new();
        labels.insert("env".to_string(), "test".to_string());
        let config = ObservabilityConfig {
            project_id: "test".into(),
            tracing: Some(TracingConfig::default()),
            stats: Some(StatsConfig::default()),
            labels,
            export_batch_size: 1,
        };
        Arc::new(Session::new(1, Arc::new(config), Arc::new(exporter.clone())))
    }

    fn span(sampled: bool) -> SpanState {
        let flags = if sampled { TraceFlags::SAMPLED } else { TraceFlags::default() };
        SpanState {
            context: SpanContext::new(new_trace_id(), new_span_id(), flags, false, TraceState::default()),
            parent_span_id: None,
        }
    }

    #[test]
    fn test_records_on_end() {
        let exporter = InMemoryExporter::new();
        let mut call = Box::new(CallContext::new(
            session(&exporter),
            CallId::new(),
            Side::Client,
            CallKind::ClientStreaming,
            "/test/StreamUnary",
            Some(span(true)),
        ));
        for _ in 0..5 {
            call.on_message_sent(3);
        }
        call.on_message_received(3);
        call.on_call_end(&Status::ok());

        let stats = exporter.stats();
        assert_eq!(stats.len(), 7);
        let sent = &exporter.stats_named(MetricName::ClientSentMessagesPerRpc)[0];
        assert_eq!(sent.value, 5.0);
        assert_eq!(sent.attributes.get("rpc.status").map(String::as_str), Some("OK"));
        assert_eq!(sent.attributes.get("env").map(String::as_str), Some("test"));
        assert_eq!(exporter.stats_named(MetricName::ClientSentBytesPerRpc)[0].value, 15.0);

        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "Sent.test.StreamUnary");
        assert_eq!(spans[0].attribute("messages.sent"), Some("5"));
        assert!(spans[0].end_time >= spans[0].start_time);
    }

    #[test]
    fn test_unsampled_span_not_recorded() {
        let exporter = InMemoryExporter::new();
        let call = Box::new(CallContext::new(
            session(&exporter),
            CallId::new(),
            Side::Server,
            CallKind::Unary,
            "/test/UnaryUnary",
            Some(span(false)),
        ));
        // The unsampled flag still propagates to handler-scoped calls.
        let propagated = call.propagation().unwrap();
        assert!(propagated.get("traceparent").unwrap().ends_with("-00"));

        call.on_call_end(&Status::internal("boom"));
        assert!(exporter.spans().is_empty());
        assert_eq!(
            exporter.stats_named(MetricName::ServerCompletedRpcs)[0]
                .attributes
                .get("rpc.status")
                .map(String::as_str),
            Some("INTERNAL")
        );
    }
}
