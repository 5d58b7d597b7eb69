//! Engine configuration loaded from YAML or JSON.

use anyhow::{Context, Result};
use flowgraph_core::{FlowResult, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "runtime")]
use flowgraph_runtime::{BatchMode, ConcurrencyConfig};

/// Retry defaults applied to nodes built without an explicit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            wait_ms: 0,
        }
    }
}

/// Top-level engine settings.
///
/// ```yaml
/// retry:
///   max_attempts: 3
///   wait_ms: 200
/// batch:
///   max_concurrency: 8
///   fail_fast: false
/// log_filter: "flowgraph=debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    #[cfg(feature = "runtime")]
    pub batch: ConcurrencyConfig,
    pub log_filter: Option<String>,
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .with_context(|| "Failed to parse YAML engine config")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .with_context(|| "Failed to parse JSON engine config")
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| {
            format!("Failed to read engine config: {:?}", path)
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(anyhow::anyhow!(
                "Unsupported engine config extension {:?} for {:?}",
                other,
                path
            )),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .with_context(|| "Failed to serialize engine config to YAML")
    }

    /// The configured retry defaults as a validated policy.
    pub fn retry_policy(&self) -> FlowResult<RetryPolicy> {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.wait_ms),
        )
    }

    /// Concurrent batch mode using the configured limits.
    #[cfg(feature = "runtime")]
    pub fn batch_mode(&self) -> BatchMode {
        BatchMode::Concurrent(self.batch)
    }

    /// Install the tracing subscriber using `log_filter`, falling back to
    /// `RUST_LOG` when unset.
    #[cfg(feature = "logger")]
    pub fn init_logging(&self) -> Result<()> {
        match &self.log_filter {
            Some(filter) => flowgraph_logger::Logger::init_tracing_with(filter)
                .with_context(|| format!("Invalid log filter: {filter}")),
            None => {
                flowgraph_logger::Logger::init_tracing();
                Ok(())
            }
        }
    }
}
