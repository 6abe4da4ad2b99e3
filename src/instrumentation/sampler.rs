//! Span sampling decisions.

use opentelemetry::trace::{SamplingDecision, SpanKind, TraceContextExt, TraceId};
use opentelemetry::Context;
use opentelemetry_sdk::trace::{Sampler, ShouldSample};

use crate::instrumentation::propagation::SpanContext;
use crate::rpc::Side;

/// Parent-based ratio sampling: children follow their parent's sampled flag,
/// roots are sampled by trace id with probability `rate`.
#[derive(Debug, Clone)]
pub struct CallSampler {
    inner: Sampler,
}

impl CallSampler {
    pub fn new(rate: f64) -> Self {
        Self {
            inner: Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(rate))),
        }
    }

    pub fn should_sample(&self, parent: Option<&SpanContext>, trace_id: TraceId, method: &str, side: Side) -> bool {
        let parent = parent.map(|p| Context::new().with_remote_span_context(p.clone()));
        let kind = match side {
            Side::Client => SpanKind::Client,
            Side::Server => SpanKind::Server,
        };
        let result = self
            .inner
            .should_sample(parent.as_ref(), trace_id, method, &kind, &[], &[]);
        matches!(result.decision, SamplingDecision::RecordAndSample)
    }
}
