//! Client side of the in-process framework.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::rpc::call::{CallId, CallKind, Side};
use crate::rpc::hooks::{self, CallStart, ObserverSlot};
use crate::rpc::metadata::Metadata;
use crate::rpc::scope;
use crate::rpc::status::Status;
use crate::rpc::transport::{self, Frame, IncomingCall};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub metadata: Metadata,
}

impl CallOptions {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }
}

/// A handle to an in-process server port.
///
/// Connecting is lazy: an unknown port only fails when a call is made.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    port: u16,
}

impl Channel {
    pub fn connect(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn unary(&self, method: &str, request: Vec<u8>) -> Result<Vec<u8>, Status> {
        self.unary_with(method, request, CallOptions::default()).await
    }

    pub async fn unary_with(&self, method: &str, request: Vec<u8>, options: CallOptions) -> Result<Vec<u8>, Status> {
        let call = self.start_call(method, CallKind::Unary, options).await?;
        call.send(request);
        call.finish().single().await
    }

    pub async fn server_streaming(&self, method: &str, request: Vec<u8>) -> Result<ResponseStream, Status> {
        self.server_streaming_with(method, request, CallOptions::default()).await
    }

    pub async fn server_streaming_with(
        &self,
        method: &str,
        request: Vec<u8>,
        options: CallOptions,
    ) -> Result<ResponseStream, Status> {
        let call = self.start_call(method, CallKind::ServerStreaming, options).await?;
        call.send(request);
        Ok(call.finish())
    }

    pub async fn client_streaming<I>(&self, method: &str, requests: I) -> Result<Vec<u8>, Status>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.client_streaming_with(method, requests, CallOptions::default()).await
    }

    pub async fn client_streaming_with<I>(&self, method: &str, requests: I, options: CallOptions) -> Result<Vec<u8>, Status>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let call = self.start_call(method, CallKind::ClientStreaming, options).await?;
        for request in requests {
            call.send(request);
        }
        call.finish().single().await
    }

    pub async fn bidi_streaming<I>(&self, method: &str, requests: I) -> Result<ResponseStream, Status>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.bidi_streaming_with(method, requests, CallOptions::default()).await
    }

    /// Sends every request, half-closes, then hands back the response stream.
    pub async fn bidi_streaming_with<I>(&self, method: &str, requests: I, options: CallOptions) -> Result<ResponseStream, Status>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let call = self.start_call(method, CallKind::BidiStreaming, options).await?;
        for request in requests {
            call.send(request);
        }
        Ok(call.finish())
    }

    async fn start_call(&self, method: &str, kind: CallKind, options: CallOptions) -> Result<ClientCall, Status> {
        let CallOptions { mut metadata } = options;
        let parent = scope::current();
        let id = CallId::new();
        let observer = hooks::start_call(CallStart {
            id,
            side: Side::Client,
            kind,
            method,
            metadata: &mut metadata,
            parent: parent.as_ref(),
        });

        // Owns the observer from here on: dropping this future before the
        // server accepts the call ends it as cancelled.
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let mut responses = ResponseStream {
            rx: response_rx,
            observer,
            finished: false,
        };

        let Some(endpoint) = transport::lookup(self.port) else {
            return Err(responses.fail(self.unavailable()));
        };

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let incoming = IncomingCall {
            method: method.to_string(),
            metadata,
            requests: request_rx,
            responses: response_tx,
        };
        if endpoint.send(incoming).await.is_err() {
            return Err(responses.fail(self.unavailable()));
        }

        tracing::trace!(call = %id, method, port = self.port, "Call started");
        Ok(ClientCall {
            requests: request_tx,
            responses,
        })
    }

    fn unavailable(&self) -> Status {
        Status::unavailable(format!("no server listening on port {}", self.port))
    }
}

/// A started client call with its request side still open.
struct ClientCall {
    requests: mpsc::UnboundedSender<Vec<u8>>,
    responses: ResponseStream,
}

impl ClientCall {
    fn send(&self, message: Vec<u8>) {
        let len = message.len();
        // A closed request side means the server already finished; its trailers carry the outcome.
        if self.requests.send(message).is_ok() {
            self.responses.observer.sent(len);
        }
    }

    /// Half-closes the request side.
    fn finish(self) -> ResponseStream {
        drop(self.requests);
        self.responses
    }
}

/// Response messages of a client call.
///
/// The call ends when the trailers arrive. Dropping the stream before that
/// ends it as `Cancelled`.
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<Frame>,
    observer: ObserverSlot,
    finished: bool,
}

impl ResponseStream {
    /// Next response; `Ok(None)` once the call completed with OK.
    pub async fn message(&mut self) -> Result<Option<Vec<u8>>, Status> {
        if self.finished {
            return Ok(None);
        }
        let frame = self.rx.recv().await;
        self.on_frame(frame).transpose()
    }

    /// Drains the stream.
    pub async fn into_messages(mut self) -> Result<Vec<Vec<u8>>, Status> {
        let mut messages = Vec::new();
        while let Some(message) = self.message().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Exactly one response followed by OK trailers.
    async fn single(mut self) -> Result<Vec<u8>, Status> {
        let response = self.message().await?;
        while self.message().await?.is_some() {}
        response.ok_or_else(|| Status::internal("server completed without a response"))
    }

    /// Ends the call with `status` before any frame arrived.
    fn fail(&mut self, status: Status) -> Status {
        self.finished = true;
        self.observer.end(&status);
        status
    }

    fn on_frame(&mut self, frame: Option<Frame>) -> Option<Result<Vec<u8>, Status>> {
        match frame {
            Some(Frame::Message(message)) => {
                self.observer.received(message.len());
                Some(Ok(message))
            }
            Some(Frame::Trailers(status)) => {
                self.finished = true;
                self.observer.end(&status);
                if status.is_ok() {
                    None
                } else {
                    Some(Err(status))
                }
            }
            None => {
                self.finished = true;
                let status = Status::unavailable("server closed the call without status");
                self.observer.end(&status);
                Some(Err(status))
            }
        }
    }
}

impl Stream for ResponseStream {
    type Item = Result<Vec<u8>, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(frame) => Poll::Ready(this.on_frame(frame)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if !self.finished {
            self.observer.end(&Status::cancelled("response stream dropped"));
        }
    }
}
