//! Shared utilities for observability integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;

use rpc_observability::config::{CONFIG_ENV_VAR, CONFIG_FILE_ENV_VAR, PROJECT_ID_ENV_VARS};
use rpc_observability::rpc::{
    CallOptions, Channel, MethodHandler, RequestContext, RequestStream, ResponseSink, Server, Side, Status,
};
use rpc_observability::telemetry::{SpanId, TraceRecord};
use rpc_observability::{InMemoryExporter, MetricName};
use tempfile::NamedTempFile;

pub const UNARY_UNARY: &str = "/test/UnaryUnary";
pub const UNARY_STREAM: &str = "/test/UnaryStream";
pub const STREAM_UNARY: &str = "/test/StreamUnary";
pub const STREAM_STREAM: &str = "/test/StreamStream";

pub const STREAM_LENGTH: usize = 5;
pub const REQUEST: &[u8] = b"\x00\x00\x00";
pub const RESPONSE: &[u8] = b"\x00\x00\x00";

/// Metadata pair that makes the unary handler issue a nested call.
pub const TRIGGER_KEY: &str = "control";
pub const TRIGGER_VALUE: &str = "trigger_rpc";

pub const TRACING_AND_STATS: &str = r#"{
    "project_id": "test-project",
    "cloud_trace": {"sampling_rate": 1.00},
    "cloud_monitoring": {}
}"#;

pub const TRACING_ONLY: &str = r#"{
    "project_id": "test-project",
    "cloud_trace": {"sampling_rate": 1.00}
}"#;

pub const STATS_ONLY: &str = r#"{
    "project_id": "test-project",
    "cloud_monitoring": {}
}"#;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Clears every variable the resolver reads.
pub fn reset_env() {
    std::env::remove_var(CONFIG_ENV_VAR);
    std::env::remove_var(CONFIG_FILE_ENV_VAR);
    for var in PROJECT_ID_ENV_VARS {
        std::env::remove_var(var);
    }
}

pub fn set_inline_config(raw: &str) {
    std::env::set_var(CONFIG_ENV_VAR, raw);
}

/// Writes `raw` to a temp file and points the file variable at it.
/// The file lives as long as the returned handle.
pub fn set_config_file(raw: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(raw.as_bytes()).unwrap();
    file.flush().unwrap();
    std::env::set_var(CONFIG_FILE_ENV_VAR, file.path());
    file
}

// ---------------------------------------------------------------------------
// Test server
// ---------------------------------------------------------------------------

pub fn start_server() -> Server {
    Server::builder()
        .add_method(UNARY_UNARY, MethodHandler::unary(handle_unary_unary))
        .add_method(UNARY_STREAM, MethodHandler::server_streaming(handle_unary_stream))
        .add_method(STREAM_UNARY, MethodHandler::client_streaming(handle_stream_unary))
        .add_method(STREAM_STREAM, MethodHandler::bidi_streaming(handle_stream_stream))
        .start()
        .unwrap()
}

/// Echoes a fixed response. When the trigger pair is present, first makes a
/// nested call: to the port named by a `*port*` key, or to a freshly started
/// server for a `*to_new_server*` key.
async fn handle_unary_unary(ctx: RequestContext, _request: Vec<u8>) -> Result<Vec<u8>, Status> {
    if ctx.metadata().contains(TRIGGER_KEY, TRIGGER_VALUE) {
        let keys: Vec<(String, String)> = ctx
            .metadata()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (key, value) in keys {
            if key.contains("port") {
                let port = value
                    .parse()
                    .map_err(|_| Status::invalid_argument(format!("bad port {value}")))?;
                unary_unary_call(port, CallOptions::default()).await?;
            } else if key.contains("to_new_server") {
                let server = start_server();
                let result = unary_unary_call(server.port(), CallOptions::default()).await;
                server.stop().await;
                result?;
            }
        }
    }
    Ok(RESPONSE.to_vec())
}

async fn handle_unary_stream(_ctx: RequestContext, _request: Vec<u8>, sink: ResponseSink) -> Result<(), Status> {
    for _ in 0..STREAM_LENGTH {
        sink.send(RESPONSE.to_vec())?;
    }
    Ok(())
}

async fn handle_stream_unary(_ctx: RequestContext, mut requests: RequestStream) -> Result<Vec<u8>, Status> {
    while requests.message().await.is_some() {}
    Ok(RESPONSE.to_vec())
}

async fn handle_stream_stream(_ctx: RequestContext, mut requests: RequestStream, sink: ResponseSink) -> Result<(), Status> {
    while requests.message().await.is_some() {
        sink.send(RESPONSE.to_vec())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client calls
// ---------------------------------------------------------------------------

pub async fn unary_unary_call(port: u16, options: CallOptions) -> Result<Vec<u8>, Status> {
    Channel::connect(port)
        .unary_with(UNARY_UNARY, REQUEST.to_vec(), options)
        .await
}

pub async fn unary_stream_call(port: u16) -> Result<Vec<Vec<u8>>, Status> {
    Channel::connect(port)
        .server_streaming(UNARY_STREAM, REQUEST.to_vec())
        .await?
        .into_messages()
        .await
}

pub async fn stream_unary_call(port: u16) -> Result<Vec<u8>, Status> {
    let requests = std::iter::repeat(REQUEST.to_vec()).take(STREAM_LENGTH);
    Channel::connect(port).client_streaming(STREAM_UNARY, requests).await
}

pub async fn stream_stream_call(port: u16) -> Result<Vec<Vec<u8>>, Status> {
    let requests = std::iter::repeat(REQUEST.to_vec()).take(STREAM_LENGTH);
    Channel::connect(port)
        .bidi_streaming(STREAM_STREAM, requests)
        .await?
        .into_messages()
        .await
}

/// Options that make the server's unary handler call `port` before replying.
pub fn trigger_call_to(port: u16) -> CallOptions {
    CallOptions::default()
        .with_metadata(TRIGGER_KEY, TRIGGER_VALUE)
        .with_metadata("port", port.to_string())
}

pub fn trigger_call_to_new_server() -> CallOptions {
    CallOptions::default()
        .with_metadata(TRIGGER_KEY, TRIGGER_VALUE)
        .with_metadata("to_new_server", "")
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// Every metric name appears at least once.
pub fn assert_all_metrics(exporter: &InMemoryExporter) {
    let names = exporter.metric_names();
    for name in MetricName::ALL {
        assert!(names.contains(&name), "metric {name} was not exported");
    }
}

/// One client and one server span for `method`.
pub fn assert_call_spans(exporter: &InMemoryExporter, method: &str) -> (TraceRecord, TraceRecord) {
    let spans = exporter.spans();
    assert_eq!(spans.len(), 2, "expected one span per side, got {spans:#?}");

    let client = exporter.spans_of(Side::Client).remove(0);
    let server = exporter.spans_of(Side::Server).remove(0);
    let path = method.trim_start_matches('/').replace('/', ".");
    assert_eq!(client.name, format!("Sent.{path}"));
    assert_eq!(server.name, format!("Recv.{path}"));
    assert_eq!(client.trace_id, server.trace_id);
    assert_eq!(server.parent_span_id, Some(client.span_id));
    (client, server)
}

/// Depth of `span` below the root of its trace; panics on a dangling parent.
pub fn depth(span: &TraceRecord, spans: &HashMap<SpanId, TraceRecord>) -> usize {
    let mut depth = 0;
    let mut current = span;
    while let Some(parent) = current.parent_span_id {
        current = spans
            .get(&parent)
            .unwrap_or_else(|| panic!("span {} has unknown parent {}", current.span_id, parent));
        depth += 1;
    }
    depth
}

/// Four spans forming one chain: client → server → nested client → nested server.
pub fn assert_nested_chain(spans: &[TraceRecord]) {
    assert_eq!(spans.len(), 4, "expected four spans, got {spans:#?}");

    let trace_id = spans[0].trace_id;
    assert!(spans.iter().all(|s| s.trace_id == trace_id), "spans span several traces");

    let by_id: HashMap<SpanId, TraceRecord> = spans.iter().map(|s| (s.span_id, s.clone())).collect();
    let mut depths: Vec<(usize, Side)> = spans.iter().map(|s| (depth(s, &by_id), s.kind)).collect();
    depths.sort();
    assert_eq!(
        depths,
        vec![(0, Side::Client), (1, Side::Server), (2, Side::Client), (3, Side::Server)]
    );
}
