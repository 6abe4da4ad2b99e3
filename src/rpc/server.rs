//! In-process server with a bounded accept loop.
//!
//! # Responsibilities
//! - Bind an in-process port and accept calls addressed to it
//! - Enforce `max_concurrent_calls` via semaphore
//! - Dispatch each call to its method handler on its own task
//! - Report server-side call events to the installed hooks
//!
//! # Design Decisions
//! - The accept loop acquires a permit before taking the next call (backpressure)
//! - `stop` ends the accept loop; calls already dispatched run to completion
//! - Handler panics are caught and reported as `Internal`

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{broadcast, mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::rpc::call::{CallId, CallKind, Side};
use crate::rpc::hooks::{self, CallStart, ObserverSlot};
use crate::rpc::metadata::Metadata;
use crate::rpc::scope;
use crate::rpc::status::Status;
use crate::rpc::transport::{self, Frame, IncomingCall};

pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 1024;

type HandlerFn =
    Arc<dyn Fn(RequestContext, RequestStream, ResponseSink) -> BoxFuture<'static, Result<(), Status>> + Send + Sync>;

/// A registered method implementation.
#[derive(Clone)]
pub struct MethodHandler {
    kind: CallKind,
    call: HandlerFn,
}

impl MethodHandler {
    /// One request in, one response out.
    pub fn unary<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, Status>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            kind: CallKind::Unary,
            call: Arc::new(move |ctx: RequestContext, mut requests: RequestStream, sink: ResponseSink| {
                let f = Arc::clone(&f);
                async move {
                    let request = requests.single().await?;
                    let response = f(ctx, request).await?;
                    sink.send(response)
                }
                .boxed()
            }),
        }
    }

    /// One request in, responses written to the sink.
    pub fn server_streaming<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext, Vec<u8>, ResponseSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            kind: CallKind::ServerStreaming,
            call: Arc::new(move |ctx: RequestContext, mut requests: RequestStream, sink: ResponseSink| {
                let f = Arc::clone(&f);
                async move {
                    let request = requests.single().await?;
                    f(ctx, request, sink).await
                }
                .boxed()
            }),
        }
    }

    /// Request stream in, one response out.
    pub fn client_streaming<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext, RequestStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, Status>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            kind: CallKind::ClientStreaming,
            call: Arc::new(move |ctx: RequestContext, requests: RequestStream, sink: ResponseSink| {
                let f = Arc::clone(&f);
                async move {
                    let response = f(ctx, requests).await?;
                    sink.send(response)
                }
                .boxed()
            }),
        }
    }

    pub fn bidi_streaming<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext, RequestStream, ResponseSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            kind: CallKind::BidiStreaming,
            call: Arc::new(move |ctx: RequestContext, requests: RequestStream, sink: ResponseSink| {
                f(ctx, requests, sink).boxed()
            }),
        }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }
}

/// Per-call information available to a handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: CallId,
    method: String,
    metadata: Metadata,
}

impl RequestContext {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Invocation metadata sent by the client.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Inbound request messages.
pub struct RequestStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    observer: ObserverSlot,
}

impl RequestStream {
    /// Next request, or `None` once the client has half-closed.
    pub async fn message(&mut self) -> Option<Vec<u8>> {
        let message = self.rx.recv().await?;
        self.observer.received(message.len());
        Some(message)
    }

    async fn single(&mut self) -> Result<Vec<u8>, Status> {
        self.message()
            .await
            .ok_or_else(|| Status::invalid_argument("missing request message"))
    }
}

/// Outbound response messages.
#[derive(Clone)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<Frame>,
    observer: ObserverSlot,
}

impl ResponseSink {
    pub fn send(&self, message: Vec<u8>) -> Result<(), Status> {
        let len = message.len();
        self.tx
            .send(Frame::Message(message))
            .map_err(|_| Status::cancelled("client went away"))?;
        self.observer.sent(len);
        Ok(())
    }
}

pub struct ServerBuilder {
    methods: HashMap<String, MethodHandler>,
    max_concurrent_calls: usize,
}

impl ServerBuilder {
    pub fn add_method(mut self, method: impl Into<String>, handler: MethodHandler) -> Self {
        self.methods.insert(method.into(), handler);
        self
    }

    pub fn max_concurrent_calls(mut self, limit: usize) -> Self {
        self.max_concurrent_calls = limit.max(1);
        self
    }

    /// Binds a fresh in-process port and starts accepting calls.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<Server, Status> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Status::unavailable(format!("server needs a Tokio runtime: {e}")))?;

        let (port, incoming) =
            transport::bind().ok_or_else(|| Status::unavailable("no free in-process port"))?;
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let methods = Arc::new(self.methods);
        let limit = Arc::new(Semaphore::new(self.max_concurrent_calls));

        tracing::info!(
            port,
            methods = methods.len(),
            max_concurrent_calls = self.max_concurrent_calls,
            "Server started"
        );

        let accept_task = runtime.spawn(accept_loop(port, incoming, methods, limit, shutdown_rx));
        Ok(Server {
            port,
            shutdown,
            accept_task: Some(accept_task),
        })
    }
}

/// A running server. Dropping it stops accepting new calls.
pub struct Server {
    port: u16,
    shutdown: broadcast::Sender<()>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            methods: HashMap::new(),
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting calls and waits for the accept loop to exit.
    pub async fn stop(mut self) {
        transport::unbind(self.port);
        let _ = self.shutdown.send(());
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
        tracing::info!(port = self.port, "Server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        transport::unbind(self.port);
        let _ = self.shutdown.send(());
    }
}

async fn accept_loop(
    port: u16,
    mut incoming: mpsc::Receiver<IncomingCall>,
    methods: Arc<HashMap<String, MethodHandler>>,
    limit: Arc<Semaphore>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        // Acquire permit first (backpressure)
        let permit = tokio::select! {
            permit = limit.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.recv() => break,
        };

        let call = tokio::select! {
            call = incoming.recv() => match call {
                Some(call) => call,
                None => break,
            },
            _ = shutdown.recv() => break,
        };

        tracing::trace!(
            port,
            method = %call.method,
            available_permits = limit.available_permits(),
            "Call accepted"
        );
        tokio::spawn(dispatch(call, Arc::clone(&methods), permit));
    }
    tracing::debug!(port, "Accept loop exited");
}

async fn dispatch(call: IncomingCall, methods: Arc<HashMap<String, MethodHandler>>, _permit: OwnedSemaphorePermit) {
    let IncomingCall {
        method,
        mut metadata,
        requests,
        responses,
    } = call;

    let Some(handler) = methods.get(&method).cloned() else {
        tracing::debug!(method = %method, "Unknown method");
        let _ = responses.send(Frame::Trailers(Status::unimplemented(format!(
            "method {method} not found"
        ))));
        return;
    };

    let id = CallId::new();
    let observer = hooks::start_call(CallStart {
        id,
        side: Side::Server,
        kind: handler.kind,
        method: &method,
        metadata: &mut metadata,
        parent: None,
    });
    let propagation = observer.propagation().unwrap_or_default();

    let ctx = RequestContext { id, method, metadata };
    let requests = RequestStream {
        rx: requests,
        observer: observer.clone(),
    };
    let sink = ResponseSink {
        tx: responses.clone(),
        observer: observer.clone(),
    };

    let handling = AssertUnwindSafe((handler.call)(ctx, requests, sink)).catch_unwind();
    let status = match scope::scope(propagation, handling).await {
        Ok(Ok(())) => Status::ok(),
        Ok(Err(status)) => status,
        Err(_) => {
            tracing::error!(call = %id, "Handler panicked");
            Status::internal("handler panicked")
        }
    };

    observer.end(&status);
    let _ = responses.send(Frame::Trailers(status));
}
