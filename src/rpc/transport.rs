//! In-process endpoint registry.
//!
//! Maps port numbers to the accept queue of a running server. Ports are handed
//! out round-robin from `FIRST_PORT..=u16::MAX`; a port is handed out again only
//! after its server unbinds it and the counter has come back around.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::rpc::metadata::Metadata;
use crate::rpc::status::Status;

/// First port handed out.
const FIRST_PORT: u16 = 50051;

/// Pending calls a server can queue before senders wait.
const ACCEPT_QUEUE_DEPTH: usize = 1024;

/// Number of ports in the allocation range.
const PORT_RANGE: u32 = (u16::MAX - FIRST_PORT) as u32 + 1;

static NEXT_PORT: AtomicU32 = AtomicU32::new(0);
static ENDPOINTS: OnceLock<DashMap<u16, mpsc::Sender<IncomingCall>>> = OnceLock::new();

/// One frame from server to client.
#[derive(Debug)]
pub(crate) enum Frame {
    Message(Vec<u8>),
    Trailers(Status),
}

/// A call as handed to a server's accept loop.
pub(crate) struct IncomingCall {
    pub method: String,
    pub metadata: Metadata,
    pub requests: mpsc::UnboundedReceiver<Vec<u8>>,
    pub responses: mpsc::UnboundedSender<Frame>,
}

fn endpoints() -> &'static DashMap<u16, mpsc::Sender<IncomingCall>> {
    ENDPOINTS.get_or_init(DashMap::new)
}

/// Port for the `n`th allocation.
fn port_at(n: u32) -> u16 {
    FIRST_PORT + (n % PORT_RANGE) as u16
}

/// Binds a free port and returns its accept queue. `None` when every port in
/// the range is bound.
pub(crate) fn bind() -> Option<(u16, mpsc::Receiver<IncomingCall>)> {
    let (tx, rx) = mpsc::channel(ACCEPT_QUEUE_DEPTH);
    for _ in 0..PORT_RANGE {
        let port = port_at(NEXT_PORT.fetch_add(1, Ordering::Relaxed));
        if let dashmap::mapref::entry::Entry::Vacant(slot) = endpoints().entry(port) {
            slot.insert(tx);
            return Some((port, rx));
        }
    }
    None
}

pub(crate) fn lookup(port: u16) -> Option<mpsc::Sender<IncomingCall>> {
    endpoints().get(&port).map(|entry| entry.value().clone())
}

pub(crate) fn unbind(port: u16) {
    endpoints().remove(&port);
}
