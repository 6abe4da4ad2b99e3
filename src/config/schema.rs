//! Configuration schema definitions.
//!
//! `RawDocument` is the JSON shape operators write. `ObservabilityConfig` is the
//! resolved, validated form the rest of the crate reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLING_RATE: f64 = 1.0;
pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 64;

/// Resolved observability configuration.
///
/// A sub-config that is `None` disables that telemetry kind. Both `None` is a
/// valid configuration that produces no telemetry at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservabilityConfig {
    /// Destination project for exported telemetry.
    pub project_id: String,

    /// Present when tracing is enabled.
    pub tracing: Option<TracingConfig>,

    /// Present when stats are enabled.
    pub stats: Option<StatsConfig>,

    /// Static labels attached to every exported record.
    pub labels: BTreeMap<String, String>,

    /// Records buffered per kind before the exporter is invoked.
    pub export_batch_size: usize,
}

impl ObservabilityConfig {
    pub fn tracing_enabled(&self) -> bool {
        self.tracing.is_some()
    }

    pub fn stats_enabled(&self) -> bool {
        self.stats.is_some()
    }

    /// True when neither tracing nor stats is enabled.
    pub fn is_noop(&self) -> bool {
        !self.tracing_enabled() && !self.stats_enabled()
    }

    /// Root-span sampling probability; zero when tracing is disabled.
    pub fn sampling_rate(&self) -> f64 {
        self.tracing.as_ref().map_or(0.0, |t| t.sampling_rate)
    }
}

/// Tracing settings (`cloud_trace` in the document).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Probability in [0.0, 1.0] that a root span is sampled.
    pub sampling_rate: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
        }
    }
}

/// Stats settings (`cloud_monitoring` in the document). Presence is the switch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StatsConfig {}

/// The configuration document as written.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawDocument {
    pub project_id: Option<String>,
    pub cloud_trace: Option<TracingConfig>,
    pub cloud_monitoring: Option<StatsConfig>,
    pub labels: BTreeMap<String, String>,
    pub export_batch_size: Option<usize>,
}
