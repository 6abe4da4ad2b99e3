//! Per-call instrumentation.
//!
//! # Data Flow
//! ```text
//! call start (rpc hooks)
//!     → engine.rs: session open? config no-op? → skip
//!     → propagation.rs: parent from handler scope (client) or inbound traceparent (server)
//!     → sampler.rs: root spans by sampling_rate, children inherit the parent flag
//!     → call.rs: CallContext counts messages and bytes
//! call end
//!     → call.rs builds StatsRecord (always, when stats enabled) and TraceRecord (sampled only)
//!     → session.rs buffers per kind and hands full batches to the exporter
//! ```
//!
//! # Design Decisions
//! - One session per activation; its exporter slot is emptied on deactivation
//!   so a late call from a previous epoch can never reach a later exporter
//! - Outbound traceparent is injected on every traced client call, sampled or not
//! - Exporter panics are caught at the session boundary

pub mod call;
pub mod engine;
pub mod propagation;
pub mod sampler;
pub(crate) mod session;

pub use engine::InstrumentationEngine;
pub use propagation::{SpanContext, TRACEPARENT_HEADER};
pub use sampler::CallSampler;
pub use session::FlushReport;
