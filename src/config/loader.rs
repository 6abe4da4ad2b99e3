//! Configuration loading from the process environment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::config::schema::{ObservabilityConfig, RawDocument, DEFAULT_EXPORT_BATCH_SIZE};
use crate::config::validation::{describe, validate_document};
use crate::error::{ObservabilityError, Result};

/// Inline JSON configuration.
pub const CONFIG_ENV_VAR: &str = "RPC_OBSERVABILITY_CONFIG";

/// Path to a JSON configuration file. Takes precedence over the inline variable.
pub const CONFIG_FILE_ENV_VAR: &str = "RPC_OBSERVABILITY_CONFIG_FILE";

/// Consulted in order when the document has no `project_id`.
pub const PROJECT_ID_ENV_VARS: [&str; 3] = ["GCP_PROJECT", "GCLOUD_PROJECT", "GOOGLE_CLOUD_PROJECT"];

/// Read access to environment variables.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Where the raw document came from.
enum DocumentSource {
    File { path: PathBuf, content: String },
    Inline(String),
}

/// Resolves `ObservabilityConfig` from environment variables.
pub struct ConfigResolver {
    env: Box<dyn EnvSource>,
}

impl ConfigResolver {
    /// Resolver over the real process environment.
    pub fn from_env() -> Self {
        Self::with_source(ProcessEnv)
    }

    pub fn with_source(source: impl EnvSource + 'static) -> Self {
        Self {
            env: Box::new(source),
        }
    }

    /// Reads, parses and validates the configuration.
    ///
    /// Pure with respect to its inputs: no global state is touched.
    pub fn resolve(&self) -> Result<ObservabilityConfig> {
        let fallback = self.fallback_project_id();
        match self.read_source()? {
            DocumentSource::File { path, content } => {
                tracing::debug!(path = %path.display(), "Resolving observability config from file");
                parse_document(&content, fallback)
            }
            DocumentSource::Inline(raw) => {
                tracing::debug!(var = CONFIG_ENV_VAR, "Resolving observability config from environment");
                parse_document(&raw, fallback)
            }
        }
    }

    /// A variable set to the empty string counts as unset.
    fn lookup(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|value| !value.is_empty())
    }

    fn read_source(&self) -> Result<DocumentSource> {
        if let Some(path) = self.lookup(CONFIG_FILE_ENV_VAR) {
            let path = PathBuf::from(path);
            let content = read_config_file(&path)?;
            return Ok(DocumentSource::File { path, content });
        }
        self.lookup(CONFIG_ENV_VAR)
            .map(DocumentSource::Inline)
            .ok_or(ObservabilityError::ConfigMissing)
    }

    fn fallback_project_id(&self) -> Option<String> {
        PROJECT_ID_ENV_VARS.iter().find_map(|key| self.lookup(key))
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ObservabilityError::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses and validates a raw JSON document.
///
/// `fallback_project_id` fills in `project_id` when the document omits it.
pub fn parse_document(raw: &str, fallback_project_id: Option<String>) -> Result<ObservabilityConfig> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ObservabilityError::invalid(raw, e))?;
    if !value.is_object() {
        return Err(ObservabilityError::invalid(raw, "expected a JSON object"));
    }

    let doc = RawDocument::deserialize(value).map_err(|e| ObservabilityError::invalid(raw, e))?;
    validate_document(&doc).map_err(|errors| ObservabilityError::invalid(raw, describe(&errors)))?;

    let project_id = doc
        .project_id
        .filter(|id| !id.is_empty())
        .or(fallback_project_id)
        .ok_or(ObservabilityError::MissingProjectId)?;

    Ok(ObservabilityConfig {
        project_id,
        tracing: doc.cloud_trace,
        stats: doc.cloud_monitoring,
        labels: doc.labels,
        export_batch_size: doc.export_batch_size.unwrap_or(DEFAULT_EXPORT_BATCH_SIZE),
    })
}
