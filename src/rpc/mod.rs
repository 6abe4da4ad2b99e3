//! In-process RPC framework.
//!
//! A small stand-in for a real RPC stack: servers bind to in-process ports, channels
//! connect to them by port number, and messages are opaque byte buffers. No sockets
//! and no wire codec are involved. What it does provide is the instrumentation
//! surface: a single global hook slot that is consulted at the start of every call
//! on either side.
//!
//! # Data Flow
//! ```text
//! Channel::unary / *_streaming
//!     → hooks::start_call(Client)       (observer may inject outbound metadata)
//!     → transport.rs (endpoint lookup by port)
//!     → server accept loop (semaphore-bounded)
//!     → hooks::start_call(Server)       (observer reads inbound metadata)
//!     → handler runs inside scope.rs propagation scope
//!     → server observer ends, trailers sent
//!     → client observer ends on trailers (or Cancelled on drop)
//! ```
//!
//! # Design Decisions
//! - Hooks are registered once per process; a second install fails
//! - Observers see every message on the task that sends or receives it
//! - A handler panic becomes an `Internal` status, never a dead call

pub mod call;
pub mod channel;
pub mod hooks;
pub mod metadata;
pub mod scope;
pub mod server;
pub mod status;
pub(crate) mod transport;

pub use call::{CallId, CallKind, Side};
pub use channel::{CallOptions, Channel, ResponseStream};
pub use hooks::{CallInterceptor, CallObserver, CallStart, HookError, HookRegistration};
pub use metadata::Metadata;
pub use server::{MethodHandler, RequestContext, RequestStream, ResponseSink, Server, ServerBuilder};
pub use status::{Code, Status};
