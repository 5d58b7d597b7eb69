use crate::concurrency::{run_ordered, BatchMode};
use async_trait::async_trait;
use flowgraph_context::{FlowContext, Params, SharedContext};
use flowgraph_core::{block_on, Action, Flow, FlowError, FlowResult, Lifecycle};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::Instrument;

/// Supplies the parameter sets a [`BatchFlow`] iterates over.
#[async_trait]
pub trait BatchParams: Send + Sync + 'static {
    async fn prep(
        &self,
        ctx: &FlowContext,
        params: &Params,
    ) -> anyhow::Result<Vec<Params>>;

    /// Action the batch flow resolves to once every set has run.
    async fn post(
        &self,
        _ctx: &mut FlowContext,
        _params: &Params,
        _sets: Vec<Params>,
    ) -> anyhow::Result<Action> {
        Ok(Action::default())
    }
}

/// Runs a whole flow once per parameter set, all runs sharing one context.
pub struct BatchFlow {
    flow: Flow,
    source: Box<dyn BatchParams>,
    mode: BatchMode,
}

impl BatchFlow {
    pub fn new<P: BatchParams>(flow: Flow, source: P) -> Self {
        Self {
            flow,
            source: Box::new(source),
            mode: BatchMode::Sequential,
        }
    }

    pub fn with_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        self.flow.name()
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub async fn run(&self, ctx: &SharedContext) -> FlowResult<Action> {
        let trace_id = ctx.read().await.trace_id.clone();
        let span = tracing::info_span!(
            "batch_flow",
            flow = %self.name(),
            trace_id = %trace_id
        );

        async {
            tracing::info!(mode = ?self.mode, "batch flow starting");
            let result = self.run_batch(self.name(), ctx, &Params::new()).await;
            match &result {
                Ok(action) => {
                    tracing::info!(action = %action, "batch flow finished")
                }
                Err(e) => tracing::error!(error = %e, "batch flow failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

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

    /// Blocking form of [`BatchFlow::run`].
    pub fn run_blocking(&self, ctx: &SharedContext) -> FlowResult<Action> {
        block_on(self.run(ctx))?
    }

    async fn run_batch(
        &self,
        name: &str,
        ctx: &SharedContext,
        inherited: &Params,
    ) -> FlowResult<Action> {
        let base = inherited.merge(self.flow.params());

        let sets = {
            let guard = ctx.read().await;
            self.source
                .prep(&guard, &base)
                .await
                .map_err(|e| FlowError::prepare(name, e))?
        };

        tracing::debug!(flow = %name, sets = sets.len(), mode = ?self.mode, "running parameter sets");

        let flow = &self.flow;
        let mut runs: Vec<BoxFuture<'_, FlowResult<Action>>> =
            Vec::with_capacity(sets.len());
        for set in &sets {
            let effective = base.merge(set);
            runs.push(Box::pin(async move {
                flow.run_with_params(ctx, &effective).await
            }));
        }
        run_ordered(runs, self.mode).await?;

        let mut guard = ctx.write().await;
        self.source
            .post(&mut guard, &base, sets)
            .await
            .map_err(|e| FlowError::finalize(name, e))
    }
}

#[async_trait]
impl Lifecycle for BatchFlow {
    async fn run(
        &self,
        name: &str,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        self.run_batch(name, ctx, params).await
    }
}
