//! Minimal question / answer flow with a retrying compute phase.

use flowgraph::prelude::*;
use std::time::Duration;

struct GetQuestion;

#[async_trait]
impl Node for GetQuestion {
    type Prep = ();
    type Exec = String;

    async fn prep(&self, _ctx: &FlowContext, _params: &Params) -> anyhow::Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &()) -> anyhow::Result<String> {
        Ok(std::env::args()
            .nth(1)
            .unwrap_or_else(|| "What is a directed graph?".to_string()))
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _prep: (),
        question: String,
    ) -> anyhow::Result<Action> {
        ctx.set("question", question);
        Ok(Action::default())
    }
}

struct AnswerQuestion;

#[async_trait]
impl Node for AnswerQuestion {
    type Prep = String;
    type Exec = String;

    async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<String> {
        ctx.get_as::<String>("question")?
            .ok_or_else(|| anyhow::anyhow!("no question in context"))
    }

    async fn exec(&self, question: &String) -> anyhow::Result<String> {
        // 模拟一次外部模型调用
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(format!("A short answer to: {question}"))
    }

    async fn exec_fallback(&self, _question: &String, error: anyhow::Error) -> anyhow::Result<String> {
        Ok(format!("Sorry, no answer right now ({error})"))
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Logger::init_tracing();

    let mut builder = Flow::builder("question_answer");
    let get = builder.node("get_question", GetQuestion);
    let answer = builder.node_with_retry(
        "answer_question",
        AnswerQuestion,
        RetryPolicy::new(3, Duration::from_millis(100))?,
    );
    builder.on_default(get, answer);
    let flow = builder.start(get).build()?;

    let context = FlowContext::default();
    let logger = Logger::for_context(&context);
    logger.info("asking one question");

    let (_, ctx) = match flow.run_with_context(context).await {
        Ok(done) => done,
        Err(e) => {
            logger.error(&format!("question flow failed: {e}"));
            return Err(e.into());
        }
    };

    println!("Question: {}", ctx.get_as::<String>("question")?.unwrap_or_default());
    println!("Answer:   {}", ctx.get_as::<String>("answer")?.unwrap_or_default());

    logger.log_node_details(&ctx);
    logger.log_flow_summary(&ctx);
    Ok(())
}
