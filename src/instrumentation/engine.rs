//! The call interceptor installed while observability is active.

use std::sync::Arc;

use crate::instrumentation::call::{CallContext, SpanState};
use crate::instrumentation::propagation::{self, SpanContext};
use crate::instrumentation::sampler::CallSampler;
use crate::instrumentation::session::Session;
use crate::rpc::{CallInterceptor, CallObserver, CallStart, Side};
use crate::telemetry::{new_span_id, new_trace_id};
use opentelemetry::trace::{TraceFlags, TraceState};

/// Turns call starts into `CallContext` observers for one activation epoch.
pub struct InstrumentationEngine {
    session: Arc<Session>,
    sampler: CallSampler,
}

impl InstrumentationEngine {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        let sampler = CallSampler::new(session.config().sampling_rate());
        Self { session, sampler }
    }

    pub fn epoch(&self) -> u64 {
        self.session.epoch()
    }

    /// Child of `parent` when present, otherwise a new root.
    fn open_span(&self, side: Side, method: &str, parent: Option<SpanContext>) -> SpanState {
        let trace_id = parent.as_ref().map_or_else(new_trace_id, |p| p.trace_id());
        let sampled = self.sampler.should_sample(parent.as_ref(), trace_id, method, side);
        let flags = if sampled { TraceFlags::SAMPLED } else { TraceFlags::default() };
        let trace_state = parent
            .as_ref()
            .map_or_else(TraceState::default, |p| p.trace_state().clone());

        SpanState {
            context: SpanContext::new(trace_id, new_span_id(), flags, false, trace_state),
            parent_span_id: parent.map(|p| p.span_id()),
        }
    }
}

impl CallInterceptor for InstrumentationEngine {
    fn on_call_start(&self, call: CallStart<'_>) -> Option<Box<dyn CallObserver>> {
        if !self.session.is_open() {
            tracing::trace!(call = %call.id, epoch = self.epoch(), "Session closing, call not observed");
            return None;
        }
        let config = self.session.config();
        if config.is_noop() {
            return None;
        }

        let span = if config.tracing_enabled() {
            let parent = match call.side {
                // Handler scope first; explicit outbound metadata otherwise.
                Side::Client => call
                    .parent
                    .and_then(propagation::extract)
                    .or_else(|| propagation::extract(&*call.metadata)),
                Side::Server => propagation::extract(&*call.metadata),
            };
            let span = self.open_span(call.side, call.method, parent);
            if call.side == Side::Client {
                propagation::inject(&span.context, call.metadata);
            }
            Some(span)
        } else {
            None
        };

        Some(Box::new(CallContext::new(
            Arc::clone(&self.session),
            call.id,
            call.side,
            call.kind,
            call.method,
            span,
        )))
    }
}
