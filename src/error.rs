//! Activation and configuration errors.
//!
//! Activation is fail-closed: every variant here is returned synchronously to the
//! caller of `activate` and leaves the controller inactive. Failures inside the
//! per-call instrumentation path never surface as these errors; they are logged
//! and swallowed so the wrapped call is unaffected.

use std::path::PathBuf;
use thiserror::Error;

use crate::rpc::hooks::HookError;

/// Errors that can occur while resolving configuration or activating observability.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Neither configuration variable is set.
    #[error(
        "observability configuration missing: set RPC_OBSERVABILITY_CONFIG_FILE or RPC_OBSERVABILITY_CONFIG"
    )]
    ConfigMissing,

    /// The configuration document could not be parsed or failed validation.
    #[error("invalid observability configuration ({reason}): {raw}")]
    ConfigInvalid { raw: String, reason: String },

    /// The configuration file named by the file-path variable could not be read.
    #[error("failed to read observability configuration file {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No project id in the document nor in any fallback variable.
    #[error("project id missing: set project_id in the configuration or GCP_PROJECT")]
    MissingProjectId,

    /// Another activation is live in this process.
    #[error("observability is already active in this process")]
    AlreadyActive,

    /// The RPC framework refused the call hooks.
    #[error("failed to install call hooks: {0}")]
    HookInstall(#[from] HookError),
}

impl ObservabilityError {
    pub(crate) fn invalid(raw: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ObservabilityError::ConfigInvalid {
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for activation and configuration.
pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ObservabilityError::invalid("INVALID", "expected value at line 1 column 1");
        let text = err.to_string();
        assert!(text.contains("INVALID"));
        assert!(text.contains("expected value"));

        let err = ObservabilityError::ConfigUnreadable {
            path: PathBuf::from("/nonexistent/o11y.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/nonexistent/o11y.json"));
    }

    #[test]
    fn test_hook_error_converts() {
        let err: ObservabilityError = HookError::AlreadyInstalled.into();
        assert!(matches!(err, ObservabilityError::HookInstall(HookError::AlreadyInstalled)));
    }
}
