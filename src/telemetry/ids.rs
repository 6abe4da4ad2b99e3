//! Trace and span identifiers.
//!
//! The W3C-sized id types come from `opentelemetry`; fresh ids are drawn from the
//! SDK's random generator. The all-zero value is invalid in both and is never
//! handed out. Records serialize ids as lowercase hex.

use std::fmt;

use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};
use serde::Serializer;

pub use opentelemetry::trace::{SpanId, TraceId};

pub fn new_trace_id() -> TraceId {
    let generator = RandomIdGenerator::default();
    loop {
        let id = generator.new_trace_id();
        if id != TraceId::INVALID {
            return id;
        }
    }
}

pub fn new_span_id() -> SpanId {
    let generator = RandomIdGenerator::default();
    loop {
        let id = generator.new_span_id();
        if id != SpanId::INVALID {
            return id;
        }
    }
}

pub(crate) fn serialize_hex<T: fmt::Display, S: Serializer>(id: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

pub(crate) fn serialize_optional_hex<S: Serializer>(id: &Option<SpanId>, serializer: S) -> Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.collect_str(id),
        None => serializer.serialize_none(),
    }
}
