//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sampling rate, batch size)
//! - Reject labels that would collide with per-call attributes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: RawDocument → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::RawDocument;

/// Attribute keys reserved for per-call values.
pub const RESERVED_LABEL_PREFIX: &str = "rpc.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("cloud_trace.sampling_rate must be within [0.0, 1.0], got {0}")]
    SamplingRateOutOfRange(f64),

    #[error("export_batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("label keys must not be empty")]
    EmptyLabelKey,

    #[error("label key {0:?} uses the reserved prefix \"rpc.\"")]
    ReservedLabelKey(String),
}

pub(crate) fn validate_document(doc: &RawDocument) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(trace) = &doc.cloud_trace {
        let rate = trace.sampling_rate;
        if !(0.0..=1.0).contains(&rate) {
            errors.push(ValidationError::SamplingRateOutOfRange(rate));
        }
    }

    if doc.export_batch_size == Some(0) {
        errors.push(ValidationError::ZeroBatchSize);
    }

    for key in doc.labels.keys() {
        if key.is_empty() {
            errors.push(ValidationError::EmptyLabelKey);
        } else if key.starts_with(RESERVED_LABEL_PREFIX) {
            errors.push(ValidationError::ReservedLabelKey(key.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Joins validation errors into one human-readable reason.
pub(crate) fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
