use crate::action::{Action, DEFAULT_ACTION};
use crate::blocking::block_on;
use crate::error::{FlowError, FlowResult};
use crate::flow_builder::FlowBuilder;
use crate::node::Lifecycle;
use async_trait::async_trait;
use flowgraph_context::{FlowContext, Params, SharedContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Optional prepare / finalize around a flow's orchestration loop.
///
/// Without hooks a flow is pass-through: it prepares nothing and its resulting
/// action is the last action produced inside it.
#[async_trait]
pub trait FlowHooks: Send + Sync {
    async fn prep(
        &self,
        _ctx: &FlowContext,
        _params: &Params,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post(
        &self,
        _ctx: &mut FlowContext,
        _params: &Params,
        last: Action,
    ) -> anyhow::Result<Action> {
        Ok(last)
    }
}

pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) unit: Box<dyn Lifecycle>,
    pub(crate) successors: HashMap<String, usize>,
}

impl Slot {
    fn successor(&self, action: &Action) -> Option<usize> {
        self.successors
            .get(action.as_str())
            .or_else(|| self.successors.get(DEFAULT_ACTION))
            .copied()
    }
}

/// A graph of units walked from a start node by following returned actions.
///
/// A flow is itself a unit and can be added to another flow's builder.
pub struct Flow {
    name: String,
    slots: Vec<Slot>,
    start: usize,
    params: Params,
    hooks: Option<Box<dyn FlowHooks>>,
}

impl Flow {
    pub(crate) fn new(
        name: String,
        slots: Vec<Slot>,
        start: usize,
        params: Params,
        hooks: Option<Box<dyn FlowHooks>>,
    ) -> Self {
        Self {
            name,
            slots,
            start,
            params,
            hooks,
        }
    }

    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The flow's own params, before anything inherited is merged in.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Run the flow as the top-level orchestration over `ctx`.
    pub async fn run(&self, ctx: &SharedContext) -> FlowResult<Action> {
        let trace_id = ctx.read().await.trace_id.clone();
        let span =
            tracing::info_span!("flow", flow = %self.name, trace_id = %trace_id);

        async {
            tracing::info!("flow starting");
            let result = self.run_with_params(ctx, &self.params).await;
            match &result {
                Ok(action) => tracing::info!(action = %action, "flow finished"),
                Err(e) => tracing::error!(error = %e, "flow failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run with an owned context and hand it back with the final action.
    pub async fn run_with_context(
        &self,
        context: FlowContext,
    ) -> FlowResult<(Action, FlowContext)> {
        let shared = context.shared();
        let action = self.run(&shared).await?;

        let context = Arc::try_unwrap(shared)
            .map_err(|_| {
                FlowError::Config(
                    "shared context still referenced after run".to_string(),
                )
            })?
            .into_inner();

        Ok((action, context))
    }

    /// Blocking form of [`Flow::run`]. Must not be called from within an
    /// async runtime.
    pub fn run_blocking(&self, ctx: &SharedContext) -> FlowResult<Action> {
        block_on(self.run(ctx))?
    }

    /// Run hooks and the orchestration loop with already-merged `params`.
    pub async fn run_with_params(
        &self,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        if let Some(hooks) = &self.hooks {
            let guard = ctx.read().await;
            hooks
                .prep(&guard, params)
                .await
                .map_err(|e| FlowError::prepare(&self.name, e))?;
        }

        let last = self.orchestrate(ctx, params).await?;

        match &self.hooks {
            Some(hooks) => {
                let mut guard = ctx.write().await;
                hooks
                    .post(&mut guard, params, last)
                    .await
                    .map_err(|e| FlowError::finalize(&self.name, e))
            }
            None => Ok(last),
        }
    }

    async fn orchestrate(
        &self,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        let mut current = self.start;

        loop {
            let slot = &self.slots[current];
            // 单元运行期间不持锁
            let position = ctx.read().await.node_logs.len();
            let started = Instant::now();

            let result = slot.unit.run(&slot.name, ctx, params).await;

            let action = {
                let mut guard = ctx.write().await;
                let log = guard.start_node_at(position, &slot.name, started);
                match result {
                    Ok(action) => {
                        guard.end_node_success(log, action.as_str());
                        action
                    }
                    Err(e) => {
                        guard.end_node_failed(log, &e.to_string());
                        return Err(e);
                    }
                }
            };

            match slot.successor(&action) {
                Some(next) => {
                    tracing::debug!(
                        from = %slot.name,
                        action = %action,
                        to = %self.slots[next].name,
                        "transition"
                    );
                    current = next;
                }
                None => {
                    if !slot.successors.is_empty() {
                        let known: Vec<&str> =
                            slot.successors.keys().map(String::as_str).collect();
                        tracing::warn!(
                            node = %slot.name,
                            action = %action,
                            known = ?known,
                            "flow ends: no successor for action"
                        );
                    }
                    return Ok(action);
                }
            }
        }
    }
}

#[async_trait]
impl Lifecycle for Flow {
    async fn run(
        &self,
        _name: &str,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        let effective = params.merge(&self.params);
        self.run_with_params(ctx, &effective).await
    }
}
