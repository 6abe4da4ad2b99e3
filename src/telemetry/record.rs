//! Stats and trace records.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use crate::rpc::Side;
use crate::telemetry::ids::{serialize_hex, serialize_optional_hex, SpanId, TraceId};

/// Attribute key for the full method name.
pub const ATTR_METHOD: &str = "rpc.method";
/// Attribute key for the final status code.
pub const ATTR_STATUS: &str = "rpc.status";

/// Every metric the engine can emit.
///
/// One record per name is produced for each completed call on the matching side,
/// so a single successful call observed on both sides yields the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricName {
    ClientStartedRpcs,
    ClientCompletedRpcs,
    ClientRoundtripLatency,
    ClientSentBytesPerRpc,
    ClientReceivedBytesPerRpc,
    ClientSentMessagesPerRpc,
    ClientReceivedMessagesPerRpc,
    ServerStartedRpcs,
    ServerCompletedRpcs,
    ServerLatency,
    ServerSentBytesPerRpc,
    ServerReceivedBytesPerRpc,
    ServerSentMessagesPerRpc,
    ServerReceivedMessagesPerRpc,
}

impl MetricName {
    pub const ALL: [MetricName; 14] = [
        MetricName::ClientStartedRpcs,
        MetricName::ClientCompletedRpcs,
        MetricName::ClientRoundtripLatency,
        MetricName::ClientSentBytesPerRpc,
        MetricName::ClientReceivedBytesPerRpc,
        MetricName::ClientSentMessagesPerRpc,
        MetricName::ClientReceivedMessagesPerRpc,
        MetricName::ServerStartedRpcs,
        MetricName::ServerCompletedRpcs,
        MetricName::ServerLatency,
        MetricName::ServerSentBytesPerRpc,
        MetricName::ServerReceivedBytesPerRpc,
        MetricName::ServerSentMessagesPerRpc,
        MetricName::ServerReceivedMessagesPerRpc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ClientStartedRpcs => "rpc/client/started_rpcs",
            MetricName::ClientCompletedRpcs => "rpc/client/completed_rpcs",
            MetricName::ClientRoundtripLatency => "rpc/client/roundtrip_latency",
            MetricName::ClientSentBytesPerRpc => "rpc/client/sent_bytes_per_rpc",
            MetricName::ClientReceivedBytesPerRpc => "rpc/client/received_bytes_per_rpc",
            MetricName::ClientSentMessagesPerRpc => "rpc/client/sent_messages_per_rpc",
            MetricName::ClientReceivedMessagesPerRpc => "rpc/client/received_messages_per_rpc",
            MetricName::ServerStartedRpcs => "rpc/server/started_rpcs",
            MetricName::ServerCompletedRpcs => "rpc/server/completed_rpcs",
            MetricName::ServerLatency => "rpc/server/server_latency",
            MetricName::ServerSentBytesPerRpc => "rpc/server/sent_bytes_per_rpc",
            MetricName::ServerReceivedBytesPerRpc => "rpc/server/received_bytes_per_rpc",
            MetricName::ServerSentMessagesPerRpc => "rpc/server/sent_messages_per_rpc",
            MetricName::ServerReceivedMessagesPerRpc => "rpc/server/received_messages_per_rpc",
        }
    }

    pub fn side(&self) -> Side {
        if self.as_str().starts_with("rpc/client/") {
            Side::Client
        } else {
            Side::Server
        }
    }

    /// Counters are exported as increments; everything else as a distribution.
    pub fn is_counter(&self) -> bool {
        matches!(
            self,
            MetricName::ClientStartedRpcs
                | MetricName::ClientCompletedRpcs
                | MetricName::ServerStartedRpcs
                | MetricName::ServerCompletedRpcs
        )
    }

    /// Unit of the recorded value.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricName::ClientRoundtripLatency | MetricName::ServerLatency => "ms",
            MetricName::ClientSentBytesPerRpc
            | MetricName::ClientReceivedBytesPerRpc
            | MetricName::ServerSentBytesPerRpc
            | MetricName::ServerReceivedBytesPerRpc => "By",
            _ => "1",
        }
    }

    /// Names emitted for one completed call on `side`.
    pub fn for_side(side: Side) -> impl Iterator<Item = MetricName> {
        MetricName::ALL.into_iter().filter(move |name| name.side() == side)
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    pub name: MetricName,
    pub value: f64,
    pub attributes: BTreeMap<String, String>,
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "message")]
pub enum SpanStatus {
    Ok,
    Error(String),
}

/// One completed span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    /// `Sent.<service>.<method>` on the client, `Recv.<service>.<method>` on the server.
    pub name: String,
    pub kind: Side,
    #[serde(serialize_with = "serialize_hex")]
    pub trace_id: TraceId,
    #[serde(serialize_with = "serialize_hex")]
    pub span_id: SpanId,
    #[serde(serialize_with = "serialize_optional_hex")]
    pub parent_span_id: Option<SpanId>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, String>,
}

impl TraceRecord {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Span name for `method` (`/service/Method`) observed on `side`.
pub fn span_name(side: Side, method: &str) -> String {
    let prefix = match side {
        Side::Client => "Sent",
        Side::Server => "Recv",
    };
    let path = method.trim_start_matches('/').replace('/', ".");
    format!("{prefix}.{path}")
}
