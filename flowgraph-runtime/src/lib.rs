//! # Flowgraph Runtime
//!
//! Batch execution for flowgraph: nodes that compute once per item and flows
//! that run once per parameter set, sequentially or concurrently.

mod batch;
mod batch_flow;
mod concurrency;


pub use batch::{BatchNode, BatchNodeRunner};
pub use batch_flow::{BatchFlow, BatchParams};
pub use concurrency::{BatchMode, ConcurrencyConfig};

use flowgraph_core::{FlowBuilder, NodeId, RetryPolicy};

/// Runtime extensions for FlowBuilder
pub trait FlowBuilderExt {
    /// Add a batch node using the builder's default retry policy
    fn batch_node<N: BatchNode>(
        &mut self,
        name: impl Into<String>,
        node: N,
        mode: BatchMode,
    ) -> NodeId;

    /// Add a batch node with a per-item retry policy
    fn batch_node_with_retry<N: BatchNode>(
        &mut self,
        name: impl Into<String>,
        node: N,
        mode: BatchMode,
        retry: RetryPolicy,
    ) -> NodeId;

    /// Add a batch flow under its wrapped flow's name
    fn batch_flow(&mut self, batch: BatchFlow) -> NodeId;
}

impl FlowBuilderExt for FlowBuilder {
    fn batch_node<N: BatchNode>(
        &mut self,
        name: impl Into<String>,
        node: N,
        mode: BatchMode,
    ) -> NodeId {
        let retry = self.default_retry_policy();
        self.batch_node_with_retry(name, node, mode, retry)
    }

    fn batch_node_with_retry<N: BatchNode>(
        &mut self,
        name: impl Into<String>,
        node: N,
        mode: BatchMode,
        retry: RetryPolicy,
    ) -> NodeId {
        self.unit(name, BatchNodeRunner::new(node, retry, mode))
    }

    fn batch_flow(&mut self, batch: BatchFlow) -> NodeId {
        let name = batch.name().to_string();
        self.unit(name, batch)
    }
}

/// Prelude module for runtime functionality
pub mod prelude {
    pub use crate::{
        BatchFlow, BatchMode, BatchNode, BatchParams, ConcurrencyConfig,
        FlowBuilderExt,
    };
}
