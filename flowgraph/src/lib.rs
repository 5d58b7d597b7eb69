//! # Flowgraph - Action-Routed Task Graphs
//!
//! Flowgraph runs directed graphs of small units of work. Every unit goes
//! through prepare / compute / finalize against one shared context, and the
//! action returned by finalize picks the next unit. Flows nest, compute is
//! retried under a bounded policy, and batch variants fan a unit or a whole
//! flow out over many inputs.
//!
//! ## Features
//!
//! - `runtime` (default): batch nodes and batch flows
//! - `parallel` (default): concurrent batch execution
//! - `logger` (default): tracing subscriber setup and run summaries
//!
//! ## Quick Start
//!
//! ```rust
//! use flowgraph::prelude::*;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Node for Greet {
//!     type Prep = String;
//!     type Exec = String;
//!
//!     async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<String> {
//!         Ok(ctx.get_as::<String>("name")?.unwrap_or_else(|| "world".into()))
//!     }
//!
//!     async fn exec(&self, name: &String) -> anyhow::Result<String> {
//!         Ok(format!("hello, {name}"))
//!     }
//!
//!     async fn post(
//!         &self,
//!         ctx: &mut FlowContext,
//!         _params: &Params,
//!         _prep: String,
//!         greeting: String,
//!     ) -> anyhow::Result<Action> {
//!         ctx.set("greeting", greeting);
//!         Ok(Action::default())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut builder = Flow::builder("greeter");
//!     let greet = builder.node("greet", Greet);
//!     let flow = builder.start(greet).build()?;
//!
//!     let (_, ctx) = flow.run_with_context(FlowContext::default()).await?;
//!     assert_eq!(ctx.get_as::<String>("greeting")?.as_deref(), Some("hello, world"));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;

// Re-export core functionality
pub use flowgraph_context as context;
pub use flowgraph_core::*;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use flowgraph_runtime as runtime;

#[cfg(feature = "logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
pub use flowgraph_logger as logger;

/// Prelude module for easy imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use flowgraph_core::prelude::*;

    #[cfg(feature = "runtime")]
    #[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
    pub use flowgraph_runtime::prelude::*;

    #[cfg(feature = "logger")]
    #[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
    pub use flowgraph_logger::{Logger, RunSummary};
}
