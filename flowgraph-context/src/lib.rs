//! # Flowgraph Context
//!
//! Shared per-run state and parameter handling for flowgraph

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

mod params;

pub use params::Params;
pub use serde_json;

/// The mutable store threaded through every node of one run.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub trace_id: String,
    pub node_logs: Vec<NodeLog>,
    values: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct NodeLog {
    pub node_name: String,
    pub start_time: std::time::Instant,
    pub end_time: Option<std::time::Instant>,
    pub status: NodeStatus,
    pub action: Option<String>,
    pub error_message: Option<String>,
    pub trace_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Success,
    Failed,
}

impl NodeLog {
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.end_time.map(|end| end.duration_since(self.start_time))
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new_with_trace_id(Uuid::new_v4().to_string())
    }
}

impl FlowContext {
    pub fn new_with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            node_logs: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Wrap the context for use by a run.
    pub fn shared(self) -> SharedContext {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Deserialize the value stored under `key`; `Ok(None)` when absent.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> serde_json::Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        #[cfg(feature = "logger")]
        tracing::trace!(trace_id = %self.trace_id, key = %key, "set value");
        self.values.insert(key, value.into());
    }

    /// Serialize `value` and store it under `key`.
    pub fn set_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records the start of a node invocation and returns its log index.
    pub fn start_node(&mut self, node_name: &str) -> usize {
        self.start_node_at(
            self.node_logs.len(),
            node_name,
            std::time::Instant::now(),
        )
    }

    /// Records a node invocation that began at `start_time` at log position
    /// `index`, so a unit logged after its inner nodes still precedes them.
    /// Positions past the end are clamped.
    pub fn start_node_at(
        &mut self,
        index: usize,
        node_name: &str,
        start_time: std::time::Instant,
    ) -> usize {
        let index = index.min(self.node_logs.len());
        self.node_logs.insert(
            index,
            NodeLog {
                node_name: node_name.to_string(),
                start_time,
                end_time: None,
                status: NodeStatus::Running,
                action: None,
                error_message: None,
                trace_id: self.trace_id.clone(),
            },
        );

        #[cfg(feature = "logger")]
        tracing::debug!(trace_id = %self.trace_id, node = %node_name, "node logged");

        index
    }

    pub fn end_node_success(&mut self, index: usize, action: &str) {
        if let Some(log) = self.node_logs.get_mut(index) {
            log.end_time = Some(std::time::Instant::now());
            log.status = NodeStatus::Success;
            log.action = Some(action.to_string());

            #[cfg(feature = "logger")]
            tracing::debug!(
                trace_id = %self.trace_id,
                node = %log.node_name,
                action = %action,
                duration_ms = ?log.duration(),
                "node success"
            );
        }
    }

    pub fn end_node_failed(&mut self, index: usize, error: &str) {
        if let Some(log) = self.node_logs.get_mut(index) {
            log.end_time = Some(std::time::Instant::now());
            log.status = NodeStatus::Failed;
            log.error_message = Some(error.to_string());

            #[cfg(feature = "logger")]
            tracing::error!(
                trace_id = %self.trace_id,
                node = %log.node_name,
                duration_ms = ?log.duration(),
                error = %error,
                "node failed"
            );
        }
    }

    /// Names of the nodes invoked so far, in invocation order.
    pub fn visited(&self) -> Vec<&str> {
        self.node_logs
            .iter()
            .map(|log| log.node_name.as_str())
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for FlowContext
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = FlowContext::default();
        for (key, value) in iter {
            context.set(key, value);
        }
        context
    }
}

pub type SharedContext = Arc<RwLock<FlowContext>>;
