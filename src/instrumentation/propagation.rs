//! W3C Trace Context propagation through call metadata.
//!
//! Encoding and parsing of `traceparent`/`tracestate` is delegated to the
//! OpenTelemetry `TraceContextPropagator`; this module only adapts `Metadata`
//! to its carrier traits.

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

use crate::rpc::Metadata;

pub use opentelemetry::trace::SpanContext;

/// Metadata key carrying the trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

impl Injector for Metadata {
    fn set(&mut self, key: &str, value: String) {
        Metadata::set(self, key, value);
    }
}

impl Extractor for Metadata {
    fn get(&self, key: &str) -> Option<&str> {
        Metadata::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.iter().map(|(key, _)| key).collect()
    }
}

/// Writes `context` into outbound metadata, replacing any existing value.
pub fn inject(context: &SpanContext, metadata: &mut Metadata) {
    let cx = Context::new().with_remote_span_context(context.clone());
    TraceContextPropagator::new().inject_context(&cx, metadata);
}

/// Reads the trace context from inbound metadata. Malformed values yield `None`.
pub fn extract(metadata: &Metadata) -> Option<SpanContext> {
    let value = Metadata::get(metadata, TRACEPARENT_HEADER)?;
    let cx = TraceContextPropagator::new().extract_with_context(&Context::new(), metadata);
    let span = cx.span();
    let context = span.span_context();
    if context.is_valid() {
        Some(context.clone())
    } else {
        tracing::debug!(value, "Ignoring malformed traceparent");
        None
    }
}
