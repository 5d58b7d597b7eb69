use thiserror::Error;

/// Errors that end a run. Compute failures never appear here directly: they
/// are retried and then handed to the node's fallback.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The prepare phase rejected its input. Never retried.
    #[error("node `{node}` failed to prepare: {source}")]
    Prepare {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed graph or invalid engine setting.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every compute attempt failed and the fallback did not recover.
    #[error("node `{node}` failed after {attempts} attempt(s): {source}")]
    Fallback {
        node: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("node `{node}` failed to finalize: {source}")]
    Finalize {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl FlowError {
    pub fn prepare(node: &str, source: anyhow::Error) -> Self {
        Self::Prepare {
            node: node.to_string(),
            source,
        }
    }

    pub fn finalize(node: &str, source: anyhow::Error) -> Self {
        Self::Finalize {
            node: node.to_string(),
            source,
        }
    }

    /// True for errors that retrying the run cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Prepare { .. } | Self::Config(_))
    }

    /// Name of the node the error originated in, when there is one.
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Prepare { node, .. }
            | Self::Fallback { node, .. }
            | Self::Finalize { node, .. } => Some(node),
            Self::Config(_) | Self::Runtime(_) => None,
        }
    }
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
