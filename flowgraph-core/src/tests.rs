use crate::*;
use async_trait::async_trait;
use flowgraph_context::{params, FlowContext, NodeStatus, Params};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Answer;

#[async_trait]
impl Node for Answer {
    type Prep = String;
    type Exec = String;

    async fn prep(
        &self,
        ctx: &FlowContext,
        _params: &Params,
    ) -> anyhow::Result<String> {
        ctx.get_as::<String>("question")?
            .ok_or_else(|| anyhow::anyhow!("missing question"))
    }

    async fn exec(&self, question: &String) -> anyhow::Result<String> {
        match question.as_str() {
            "2+2" => Ok("4".to_string()),
            other => anyhow::bail!("cannot answer {other}"),
        }
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _question: String,
        answer: String,
    ) -> anyhow::Result<Action> {
        ctx.set("answer", answer);
        Ok(Action::default())
    }
}

/// Counts its passes in the context; asks to run again until the third.
struct Looper;

#[async_trait]
impl Node for Looper {
    type Prep = u64;
    type Exec = u64;

    async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<u64> {
        Ok(ctx.get_as::<u64>("passes")?.unwrap_or(0))
    }

    async fn exec(&self, passes: &u64) -> anyhow::Result<u64> {
        Ok(passes + 1)
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _prep: u64,
        passes: u64,
    ) -> anyhow::Result<Action> {
        ctx.set("passes", passes);
        Ok(if passes >= 3 { "done" } else { "retry" }.into())
    }
}

/// Returns a fixed action.
struct Emit(&'static str);

#[async_trait]
impl Node for Emit {
    type Prep = ();
    type Exec = ();

    async fn prep(&self, _ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &()) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post(
        &self,
        _ctx: &mut FlowContext,
        _params: &Params,
        _prep: (),
        _exec: (),
    ) -> anyhow::Result<Action> {
        Ok(self.0.into())
    }
}

/// Writes the params it sees under `key`.
struct RecordParams(&'static str);

#[async_trait]
impl Node for RecordParams {
    type Prep = Params;
    type Exec = ();

    async fn prep(&self, _ctx: &FlowContext, params: &Params) -> anyhow::Result<Params> {
        Ok(params.clone())
    }

    async fn exec(&self, _prep: &Params) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        seen: Params,
        _exec: (),
    ) -> anyhow::Result<Action> {
        ctx.set_json(self.0, &seen)?;
        Ok(Action::default())
    }
}

#[derive(Default, Clone)]
struct Counters {
    exec: Arc<AtomicU32>,
    fallback: Arc<AtomicU32>,
}

struct AlwaysFails {
    counters: Counters,
    substitute: Option<&'static str>,
}

#[async_trait]
impl Node for AlwaysFails {
    type Prep = ();
    type Exec = String;

    async fn prep(&self, _ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &()) -> anyhow::Result<String> {
        self.counters.exec.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("service unavailable")
    }

    async fn exec_fallback(
        &self,
        _prep: &(),
        error: anyhow::Error,
    ) -> anyhow::Result<String> {
        self.counters.fallback.fetch_add(1, Ordering::SeqCst);
        match self.substitute {
            Some(value) => Ok(value.to_string()),
            None => Err(error),
        }
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _prep: (),
        exec: String,
    ) -> anyhow::Result<Action> {
        ctx.set("result", exec);
        Ok(Action::default())
    }
}

struct BadPrep {
    counters: Counters,
}

#[async_trait]
impl Node for BadPrep {
    type Prep = ();
    type Exec = ();

    async fn prep(&self, _ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        anyhow::bail!("missing api key")
    }

    async fn exec(&self, _prep: &()) -> anyhow::Result<()> {
        self.counters.exec.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_single_node_writes_answer() {
    let mut builder = Flow::builder("qa");
    let answer = builder.node("answer", Answer);
    let flow = builder.start(answer).build().unwrap();

    let ctx: FlowContext = [("question", "2+2")].into_iter().collect();
    let shared = ctx.shared();
    let action = flow.run(&shared).await.unwrap();

    assert!(action.is_default());
    let guard = shared.read().await;
    assert_eq!(guard.len(), 2);
    assert_eq!(guard.get("question"), Some(&json!("2+2")));
    assert_eq!(guard.get("answer"), Some(&json!("4")));
}

#[tokio::test]
async fn test_self_loop_runs_three_times_then_moves_on() {
    let mut builder = Flow::builder("loop");
    let a = builder.node("a", Looper);
    let b = builder.node("b", Emit("finished"));
    builder.on(a, "retry", a);
    builder.on(a, "done", b);
    let flow = builder.start(a).build().unwrap();

    let (action, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();

    assert_eq!(action, "finished");
    assert_eq!(ctx.get("passes"), Some(&json!(3)));
    assert_eq!(ctx.visited(), vec!["a", "a", "a", "b"]);
}

#[tokio::test]
async fn test_unknown_action_follows_default() {
    let mut builder = Flow::builder("fallback-route");
    let a = builder.node("a", Emit("x"));
    let b = builder.node("b", Emit("end"));
    builder.on_default(a, b);
    let flow = builder.start(a).build().unwrap();

    let (action, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(action, "end");
    assert_eq!(ctx.visited(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_unmatched_action_terminates() {
    let mut builder = Flow::builder("gap");
    let a = builder.node("a", Emit("y"));
    let b = builder.node("b", Emit("never"));
    builder.on(a, "z", b);
    let flow = builder.start(a).build().unwrap();

    let (action, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(action, "y");
    assert_eq!(ctx.visited(), vec!["a"]);
}

#[tokio::test]
async fn test_last_registration_wins() {
    let mut builder = Flow::builder("overwrite");
    let a = builder.node("a", Emit("go"));
    let b = builder.node("b", Emit("b"));
    let c = builder.node("c", Emit("c"));
    builder.on(a, "go", b);
    builder.on(a, "go", c);
    let flow = builder.start(a).build().unwrap();

    let (action, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(action, "c");
    assert_eq!(ctx.visited(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_chain_links_with_default() {
    let mut builder = Flow::builder("chain");
    let a = builder.node("a", Emit("default"));
    let b = builder.node("b", Emit("default"));
    let c = builder.node("c", Emit("last"));
    builder.chain([a, b, c]);
    let flow = builder.start(a).build().unwrap();

    let (action, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(action, "last");
    assert_eq!(ctx.visited(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_retry_then_fallback_failure() {
    let counters = Counters::default();
    let mut builder = Flow::builder("retry");
    let node = builder.node_with_retry(
        "flaky",
        AlwaysFails {
            counters: counters.clone(),
            substitute: None,
        },
        RetryPolicy::new(3, Duration::ZERO).unwrap(),
    );
    let flow = builder.start(node).build().unwrap();

    let shared = FlowContext::default().shared();
    let err = flow.run(&shared).await.unwrap_err();

    assert!(matches!(err, FlowError::Fallback { attempts: 3, .. }));
    assert_eq!(err.node(), Some("flaky"));
    assert!(!err.is_configuration());
    assert_eq!(counters.exec.load(Ordering::SeqCst), 3);
    assert_eq!(counters.fallback.load(Ordering::SeqCst), 1);

    let guard = shared.read().await;
    assert!(!guard.contains_key("result"));
    assert_eq!(guard.node_logs[0].status, NodeStatus::Failed);
}

#[tokio::test]
async fn test_fallback_substitute_reaches_finalize() {
    let counters = Counters::default();
    let mut builder = Flow::builder("recover").default_retry(
        RetryPolicy::new(2, Duration::ZERO).unwrap(),
    );
    let node = builder.node(
        "flaky",
        AlwaysFails {
            counters: counters.clone(),
            substitute: Some("cached"),
        },
    );
    let flow = builder.start(node).build().unwrap();

    let (_, ctx) = flow.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(ctx.get("result"), Some(&json!("cached")));
    assert_eq!(counters.exec.load(Ordering::SeqCst), 2);
    assert_eq!(counters.fallback.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prepare_error_is_not_retried() {
    let counters = Counters::default();
    let mut builder = Flow::builder("bad");
    let node = builder.node_with_retry(
        "bad",
        BadPrep {
            counters: counters.clone(),
        },
        RetryPolicy::new(5, Duration::ZERO).unwrap(),
    );
    let flow = builder.start(node).build().unwrap();

    let err = flow
        .run(&FlowContext::default().shared())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, FlowError::Prepare { .. }));
    assert_eq!(counters.exec.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exec_is_idempotent_for_same_input() {
    let looper = Looper;
    let first = looper.exec(&7).await.unwrap();
    let second = looper.exec(&7).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_nested_params_precedence() {
    let mut inner = Flow::builder("f2").params(params! { "x" => 2, "y" => 3 });
    let record_inner = inner.node("inner", RecordParams("f2_params"));
    let f2 = inner.start(record_inner).build().unwrap();

    let mut outer = Flow::builder("f1").params(params! { "x" => 1 });
    let record_outer = outer.node("outer", RecordParams("f1_params"));
    let nested = outer.flow(f2);
    let after = outer.node("after", RecordParams("after_params"));
    outer.chain([record_outer, nested, after]);
    let f1 = outer.start(record_outer).build().unwrap();

    let (_, ctx) = f1.run_with_context(FlowContext::default()).await.unwrap();

    assert_eq!(ctx.get("f1_params"), Some(&json!({"x": 1})));
    assert_eq!(ctx.get("f2_params"), Some(&json!({"x": 2, "y": 3})));
    // 子流程的覆盖不会泄漏回父流程
    assert_eq!(ctx.get("after_params"), Some(&json!({"x": 1})));
    assert_eq!(ctx.visited(), vec!["outer", "f2", "inner", "after"]);
}

#[tokio::test]
async fn test_nested_flow_routes_on_last_action() {
    let mut inner = Flow::builder("inner");
    let emit = inner.node("emit", Emit("approved"));
    let inner = inner.start(emit).build().unwrap();

    let mut outer = Flow::builder("outer");
    let sub = outer.flow(inner);
    let approved = outer.node("approved", Emit("shipped"));
    let rejected = outer.node("rejected", Emit("dropped"));
    outer.on(sub, "approved", approved);
    outer.on(sub, "rejected", rejected);
    let outer = outer.start(sub).build().unwrap();

    let (action, ctx) = outer.run_with_context(FlowContext::default()).await.unwrap();
    assert_eq!(action, "shipped");
    assert_eq!(ctx.visited(), vec!["inner", "emit", "approved"]);
}

struct Relabel;

#[async_trait]
impl FlowHooks for Relabel {
    async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        if !ctx.contains_key("question") {
            anyhow::bail!("question required");
        }
        Ok(())
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        last: Action,
    ) -> anyhow::Result<Action> {
        ctx.set("inner_last", last.as_str());
        Ok("rejected".into())
    }
}

#[tokio::test]
async fn test_flow_hooks_override_result() {
    let mut inner = Flow::builder("inner").hooks(Relabel);
    let answer = inner.node("answer", Answer);
    let inner = inner.start(answer).build().unwrap();

    let mut outer = Flow::builder("outer");
    let sub = outer.flow(inner);
    let rejected = outer.node("rejected", Emit("dropped"));
    outer.on(sub, "rejected", rejected);
    let outer = outer.start(sub).build().unwrap();

    let ctx: FlowContext = [("question", "2+2")].into_iter().collect();
    let (action, ctx) = outer.run_with_context(ctx).await.unwrap();
    assert_eq!(action, "dropped");
    assert_eq!(ctx.get("inner_last"), Some(&json!("default")));

    let err = outer
        .run(&FlowContext::default().shared())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Prepare { ref node, .. } if node == "inner"));
}

#[tokio::test]
async fn test_errors_propagate_through_nested_flows() {
    let mut inner = Flow::builder("inner");
    let answer = inner.node("answer", Answer);
    let inner = inner.start(answer).build().unwrap();

    let mut outer = Flow::builder("outer");
    let sub = outer.flow(inner);
    let outer = outer.start(sub).build().unwrap();

    let ctx: FlowContext = [("question", "1/0")].into_iter().collect();
    let shared = ctx.shared();
    let err = outer.run(&shared).await.unwrap_err();

    assert_eq!(err.node(), Some("answer"));
    let guard = shared.read().await;
    assert!(guard
        .node_logs
        .iter()
        .all(|log| log.status == NodeStatus::Failed));
}

#[test]
fn test_build_requires_start() {
    let mut builder = Flow::builder("empty");
    builder.node("a", Emit("x"));
    let err = builder.build().err().unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_build_rejects_foreign_nodes() {
    let mut other = Flow::builder("other");
    let foreign = other.node("x", Emit("x"));

    let mut builder = Flow::builder("mine");
    let a = builder.node("a", Emit("x"));
    builder.on_default(a, foreign);
    assert!(matches!(
        builder.start(a).build(),
        Err(FlowError::Config(_))
    ));

    let mut builder = Flow::builder("mine");
    builder.node("a", Emit("x"));
    assert!(builder.start(foreign).build().is_err());
}

#[test]
fn test_run_blocking_matches_async_run() {
    let mut builder = Flow::builder("qa");
    let answer = builder.node("answer", Answer);
    let flow = builder.start(answer).build().unwrap();

    let ctx: FlowContext = [("question", "2+2")].into_iter().collect();
    let shared = ctx.shared();
    let action = flow.run_blocking(&shared).unwrap();

    assert!(action.is_default());
    let guard = shared.blocking_read();
    assert_eq!(guard.get("answer"), Some(&json!("4")));
}

/// Binds an ephemeral local port in compute; needs the I/O driver.
struct BindLocal;

#[async_trait]
impl Node for BindLocal {
    type Prep = ();
    type Exec = u16;

    async fn prep(&self, _ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &()) -> anyhow::Result<u16> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        Ok(listener.local_addr()?.port())
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _prep: (),
        port: u16,
    ) -> anyhow::Result<Action> {
        ctx.set("port", port);
        Ok(Action::default())
    }
}

#[test]
fn test_run_blocking_supports_io_in_compute() {
    let mut builder = Flow::builder("io");
    let bind = builder.node("bind", BindLocal);
    let flow = builder.start(bind).build().unwrap();

    let shared = FlowContext::default().shared();
    flow.run_blocking(&shared).unwrap();

    let port = shared.blocking_read().get_as::<u16>("port").unwrap();
    assert!(matches!(port, Some(p) if p > 0));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_node_never_sleeps() {
    let counters = Counters::default();
    let mut builder = Flow::builder("no-wait");
    let node = builder.node_with_retry(
        "once",
        AlwaysFails {
            counters: counters.clone(),
            substitute: Some("fallback"),
        },
        RetryPolicy::new(1, Duration::from_secs(30)).unwrap(),
    );
    let flow = builder.start(node).build().unwrap();

    let start = tokio::time::Instant::now();
    flow.run(&FlowContext::default().shared()).await.unwrap();

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(counters.exec.load(Ordering::SeqCst), 1);
}
