//! # Flowgraph Logger
//!
//! Tracing setup and run summaries for flowgraph flows

use flowgraph_context::{FlowContext, NodeStatus};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Counts over the node log of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub running: usize,
    pub values: usize,
}

impl RunSummary {
    pub fn of(context: &FlowContext) -> Self {
        let count = |status: NodeStatus| {
            context
                .node_logs
                .iter()
                .filter(|log| log.status == status)
                .count()
        };

        Self {
            total: context.node_logs.len(),
            succeeded: count(NodeStatus::Success),
            failed: count(NodeStatus::Failed),
            running: count(NodeStatus::Running),
            values: context.len(),
        }
    }
}

/// Logger for flowgraph runs
pub struct Logger {
    pub trace_id: String,
}

impl Logger {
    /// Create a new logger
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific trace ID
    pub fn with_trace_id(trace_id: String) -> Self {
        Self { trace_id }
    }

    /// Create a logger bound to a run's trace ID
    pub fn for_context(context: &FlowContext) -> Self {
        Self::with_trace_id(context.trace_id.clone())
    }

    /// Initialize a fmt subscriber filtered by `RUST_LOG`.
    ///
    /// A subscriber that is already installed is left in place.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    /// Initialize a fmt subscriber with explicit filter directives,
    /// e.g. `"info,flowgraph_core=debug"`.
    pub fn init_tracing_with(directives: &str) -> Result<(), ParseError> {
        let filter = EnvFilter::try_new(directives)?;
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        Ok(())
    }

    /// Same as [`Logger::init_tracing_with`] but emits JSON lines.
    pub fn init_json_tracing(directives: &str) -> Result<(), ParseError> {
        let filter = EnvFilter::try_new(directives)?;
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init();
        Ok(())
    }

    pub fn info(&self, message: &str) {
        info!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(trace_id = %self.trace_id, "{}", message);
    }

    /// Log counts for a finished run and return them.
    pub fn log_flow_summary(&self, context: &FlowContext) -> RunSummary {
        let summary = RunSummary::of(context);

        info!(
            trace_id = %context.trace_id,
            total_nodes = summary.total,
            success = summary.succeeded,
            failed = summary.failed,
            running = summary.running,
            values = summary.values,
            "Flow run summary"
        );

        summary
    }

    /// Log one line per node execution, in visit order.
    pub fn log_node_details(&self, context: &FlowContext) {
        for node_log in &context.node_logs {
            let duration_ms =
                node_log.duration().unwrap_or_default().as_millis();

            match node_log.status {
                NodeStatus::Success => {
                    info!(
                        trace_id = %node_log.trace_id,
                        node = %node_log.node_name,
                        action = %node_log.action.as_deref().unwrap_or("default"),
                        duration_ms,
                        "Node completed"
                    );
                }
                NodeStatus::Failed => {
                    error!(
                        trace_id = %node_log.trace_id,
                        node = %node_log.node_name,
                        duration_ms,
                        error = %node_log.error_message.as_deref().unwrap_or("Unknown error"),
                        "Node failed"
                    );
                }
                NodeStatus::Running => {
                    warn!(
                        trace_id = %node_log.trace_id,
                        node = %node_log.node_name,
                        "Node still running"
                    );
                }
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
