use crate::action::{Action, DEFAULT_ACTION};
use crate::error::{FlowError, FlowResult};
use crate::flow::{Flow, FlowHooks, Slot};
use crate::node::{Lifecycle, Node, NodeRunner};
use crate::retry::RetryPolicy;
use flowgraph_context::Params;
use std::collections::HashMap;
use uuid::Uuid;

/// Handle to a unit added to a [`FlowBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    graph: Uuid,
    index: usize,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Builder for a [`Flow`]: owns the arena of units and their transitions.
///
/// Successor maps may form cycles; nothing here tries to detect them.
pub struct FlowBuilder {
    name: String,
    graph: Uuid,
    slots: Vec<Slot>,
    start: Option<NodeId>,
    params: Params,
    default_retry: RetryPolicy,
    hooks: Option<Box<dyn FlowHooks>>,
    errors: Vec<String>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: Uuid::new_v4(),
            slots: Vec::new(),
            start: None,
            params: Params::new(),
            default_retry: RetryPolicy::once(),
            hooks: None,
            errors: Vec::new(),
        }
    }

    /// Params owned by the flow; they override anything inherited.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Retry policy for nodes added without an explicit one.
    pub fn default_retry(mut self, retry: RetryPolicy) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn hooks<H: FlowHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn start(mut self, id: NodeId) -> Self {
        self.start = Some(id);
        self
    }

    pub fn default_retry_policy(&self) -> RetryPolicy {
        self.default_retry
    }

    /// Adds a node using the builder's default retry policy.
    pub fn node<N: Node>(&mut self, name: impl Into<String>, node: N) -> NodeId {
        let retry = self.default_retry;
        self.node_with_retry(name, node, retry)
    }

    pub fn node_with_retry<N: Node>(
        &mut self,
        name: impl Into<String>,
        node: N,
        retry: RetryPolicy,
    ) -> NodeId {
        self.unit(name, NodeRunner::new(node, retry))
    }

    /// Adds a nested flow under its own name.
    pub fn flow(&mut self, flow: Flow) -> NodeId {
        let name = flow.name().to_string();
        self.unit(name, flow)
    }

    /// Adds any [`Lifecycle`] implementation as a unit.
    pub fn unit<L: Lifecycle + 'static>(
        &mut self,
        name: impl Into<String>,
        unit: L,
    ) -> NodeId {
        self.slots.push(Slot {
            name: name.into(),
            unit: Box::new(unit),
            successors: HashMap::new(),
        });
        NodeId {
            graph: self.graph,
            index: self.slots.len() - 1,
        }
    }

    /// Route `action` from `from` to `to`. Returns `to` for chaining.
    pub fn on(
        &mut self,
        from: NodeId,
        action: impl Into<Action>,
        to: NodeId,
    ) -> NodeId {
        let action = action.into();
        if !self.owns(from) || !self.owns(to) {
            self.errors.push(format!(
                "transition `{action}` references a node from another flow"
            ));
            return to;
        }

        let slot = &mut self.slots[from.index];
        if let Some(previous) =
            slot.successors.insert(action.to_string(), to.index)
        {
            if previous != to.index {
                tracing::warn!(
                    flow = %self.name,
                    node = %slot.name,
                    action = %action,
                    "overwriting successor for action"
                );
            }
        }
        to
    }

    pub fn on_default(&mut self, from: NodeId, to: NodeId) -> NodeId {
        self.on(from, DEFAULT_ACTION, to)
    }

    /// Link consecutive nodes with default transitions.
    pub fn chain(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut previous: Option<NodeId> = None;
        for id in ids {
            if let Some(from) = previous {
                self.on_default(from, id);
            }
            previous = Some(id);
        }
    }

    fn owns(&self, id: NodeId) -> bool {
        id.graph == self.graph && id.index < self.slots.len()
    }

    pub fn build(self) -> FlowResult<Flow> {
        if !self.errors.is_empty() {
            return Err(FlowError::Config(format!(
                "flow `{}`: {}",
                self.name,
                self.errors.join("; ")
            )));
        }

        let start = match self.start {
            Some(id) if self.owns(id) => id.index,
            Some(_) => {
                return Err(FlowError::Config(format!(
                    "flow `{}`: start node belongs to another flow",
                    self.name
                )))
            }
            None => {
                return Err(FlowError::Config(format!(
                    "flow `{}` has no start node",
                    self.name
                )))
            }
        };

        Ok(Flow::new(
            self.name,
            self.slots,
            start,
            self.params,
            self.hooks,
        ))
    }
}
