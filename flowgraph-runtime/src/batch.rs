use crate::concurrency::{run_ordered, BatchMode};
use async_trait::async_trait;
use flowgraph_context::{FlowContext, Params, SharedContext};
use flowgraph_core::{Action, FlowError, FlowResult, Lifecycle, RetryPolicy};
use futures::future::BoxFuture;

/// A node whose compute phase runs once per prepared item.
///
/// `post` receives the items and their outputs in input order. Each item gets
/// a fresh retry budget.
#[async_trait]
pub trait BatchNode: Send + Sync + 'static {
    type Item: Send + Sync + 'static;
    type Output: Send + 'static;

    async fn prep(
        &self,
        ctx: &FlowContext,
        params: &Params,
    ) -> anyhow::Result<Vec<Self::Item>>;

    async fn exec(&self, item: &Self::Item) -> anyhow::Result<Self::Output>;

    async fn exec_fallback(
        &self,
        _item: &Self::Item,
        error: anyhow::Error,
    ) -> anyhow::Result<Self::Output> {
        Err(error)
    }

    async fn post(
        &self,
        _ctx: &mut FlowContext,
        _params: &Params,
        _items: Vec<Self::Item>,
        _outputs: Vec<Self::Output>,
    ) -> anyhow::Result<Action> {
        Ok(Action::default())
    }
}

/// Adapts a [`BatchNode`] to the lifecycle a flow drives.
pub struct BatchNodeRunner<N> {
    node: N,
    retry: RetryPolicy,
    mode: BatchMode,
}

impl<N: BatchNode> BatchNodeRunner<N> {
    pub fn new(node: N, retry: RetryPolicy, mode: BatchMode) -> Self {
        Self { node, retry, mode }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }
}

#[async_trait]
impl<N: BatchNode> Lifecycle for BatchNodeRunner<N> {
    async fn run(
        &self,
        name: &str,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        let items = {
            let guard = ctx.read().await;
            self.node
                .prep(&guard, params)
                .await
                .map_err(|e| FlowError::prepare(name, e))?
        };

        tracing::debug!(node = %name, items = items.len(), mode = ?self.mode, "running batch");

        let node = &self.node;
        let mut runs: Vec<BoxFuture<'_, FlowResult<N::Output>>> =
            Vec::with_capacity(items.len());
        for item in &items {
            runs.push(Box::pin(self.retry.run(
                name,
                item,
                move |i| node.exec(i),
                move |i, e| node.exec_fallback(i, e),
            )));
        }
        let outputs = run_ordered(runs, self.mode).await?;

        let mut guard = ctx.write().await;
        self.node
            .post(&mut guard, params, items, outputs)
            .await
            .map_err(|e| FlowError::finalize(name, e))
    }
}
