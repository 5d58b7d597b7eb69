//! # Flowgraph Core
//!
//! Node lifecycle, bounded retry and action-routed graph orchestration.
//!
//! A [`Flow`] walks a graph of units from its start node. Each unit runs
//! prepare / compute / finalize against one shared context and returns an
//! [`Action`]; the flow follows the successor registered for that action, or
//! for `"default"`, and stops when neither exists.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod action;
mod blocking;
mod error;
mod flow;
mod flow_builder;
mod node;
mod retry;

#[cfg(test)]
mod tests;

pub use action::{Action, DEFAULT_ACTION};
pub use blocking::block_on;
pub use error::{FlowError, FlowResult};
pub use flow::{Flow, FlowHooks};
pub use flow_builder::{FlowBuilder, NodeId};
pub use node::{Lifecycle, Node, NodeRunner};
pub use retry::RetryPolicy;

/// Prelude module for core functionality
pub mod prelude {
    pub use crate::{
        Action, Flow, FlowBuilder, FlowError, FlowHooks, FlowResult, Lifecycle,
        Node, NodeId, RetryPolicy, DEFAULT_ACTION,
    };
    pub use async_trait::async_trait;
    pub use flowgraph_context::{params, FlowContext, Params, SharedContext};
}
