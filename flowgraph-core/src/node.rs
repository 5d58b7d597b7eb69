use crate::action::Action;
use crate::error::{FlowError, FlowResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use flowgraph_context::{FlowContext, Params, SharedContext};

/// A unit of work with a prepare / compute / finalize lifecycle.
///
/// `prep` only sees the context by shared reference, `exec` does not see it at
/// all, and `post` is the single place the context is mutated. `exec` may run
/// several times with the same input when a retry policy allows it, so it must
/// be idempotent.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    type Prep: Send + Sync + 'static;
    type Exec: Send + 'static;

    async fn prep(
        &self,
        ctx: &FlowContext,
        params: &Params,
    ) -> anyhow::Result<Self::Prep>;

    async fn exec(&self, prep: &Self::Prep) -> anyhow::Result<Self::Exec>;

    /// Runs once after the last failed attempt. Re-raises by default.
    async fn exec_fallback(
        &self,
        _prep: &Self::Prep,
        error: anyhow::Error,
    ) -> anyhow::Result<Self::Exec> {
        Err(error)
    }

    async fn post(
        &self,
        _ctx: &mut FlowContext,
        _params: &Params,
        _prep: Self::Prep,
        _exec: Self::Exec,
    ) -> anyhow::Result<Action> {
        Ok(Action::default())
    }
}

/// Type-erased lifecycle shared by every kind of unit a flow can hold:
/// plain nodes, nested flows and the batch variants.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Runs the unit once against `ctx` and returns the action to route on.
    async fn run(
        &self,
        name: &str,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action>;
}

/// Adapts a typed [`Node`] to [`Lifecycle`], applying its retry policy.
pub struct NodeRunner<N> {
    node: N,
    retry: RetryPolicy,
}

impl<N: Node> NodeRunner<N> {
    pub fn new(node: N, retry: RetryPolicy) -> Self {
        Self { node, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

#[async_trait]
impl<N: Node> Lifecycle for NodeRunner<N> {
    async fn run(
        &self,
        name: &str,
        ctx: &SharedContext,
        params: &Params,
    ) -> FlowResult<Action> {
        let prep = {
            let guard = ctx.read().await;
            self.node
                .prep(&guard, params)
                .await
                .map_err(|e| FlowError::prepare(name, e))?
        };

        let exec = self
            .retry
            .run(
                name,
                &prep,
                |p| self.node.exec(p),
                |p, e| self.node.exec_fallback(p, e),
            )
            .await?;

        let mut guard = ctx.write().await;
        self.node
            .post(&mut guard, params, prep, exec)
            .await
            .map_err(|e| FlowError::finalize(name, e))
    }
}
