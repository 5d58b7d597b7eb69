//! Writes tutorial chapters for several abstractions.
//!
//! A batch flow runs the per-chapter flow once per chapter, concurrently,
//! and a batch node then joins the drafts in chapter order.

use flowgraph::prelude::*;
use serde_json::json;
use std::time::Duration;

const ABSTRACTIONS: [&str; 3] = ["Node", "Flow", "Shared Context"];

/// Drafts one chapter; reads its number and title from params.
struct WriteChapter;

#[async_trait]
impl Node for WriteChapter {
    type Prep = (u64, String);
    type Exec = String;

    async fn prep(&self, _ctx: &FlowContext, params: &Params) -> anyhow::Result<(u64, String)> {
        let number = params
            .get_as::<u64>("chapter")?
            .ok_or_else(|| anyhow::anyhow!("chapter param missing"))?;
        let title = params
            .get_as::<String>("title")?
            .ok_or_else(|| anyhow::anyhow!("title param missing"))?;
        Ok((number, title))
    }

    async fn exec(&self, chapter: &(u64, String)) -> anyhow::Result<String> {
        let (number, title) = chapter;
        // 章节越短完成越快，完成顺序与章节顺序无关
        tokio::time::sleep(Duration::from_millis(10 * title.len() as u64)).await;
        Ok(format!("# Chapter {number}: {title}\n\n{title} explained in a few lines.\n"))
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        chapter: (u64, String),
        draft: String,
    ) -> anyhow::Result<Action> {
        ctx.set(format!("chapter_{}", chapter.0), draft);
        Ok(Action::default())
    }
}

struct Chapters;

#[async_trait]
impl BatchParams for Chapters {
    async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<Vec<Params>> {
        let titles = ctx.get_as::<Vec<String>>("abstractions")?.unwrap_or_default();
        Ok(titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| params! { "chapter" => i + 1, "title" => title })
            .collect())
    }
}

/// Collects drafts in chapter order into one document.
struct Combine;

#[async_trait]
impl BatchNode for Combine {
    type Item = String;
    type Output = String;

    async fn prep(&self, ctx: &FlowContext, _params: &Params) -> anyhow::Result<Vec<String>> {
        let count = ctx.get_as::<Vec<String>>("abstractions")?.unwrap_or_default().len();
        (1..=count)
            .map(|n| -> anyhow::Result<String> {
                ctx.get_as::<String>(&format!("chapter_{n}"))?
                    .ok_or_else(|| anyhow::anyhow!("chapter {n} was never written"))
            })
            .collect()
    }

    async fn exec(&self, draft: &String) -> anyhow::Result<String> {
        Ok(draft.trim_end().to_string())
    }

    async fn post(
        &self,
        ctx: &mut FlowContext,
        _params: &Params,
        _drafts: Vec<String>,
        chapters: Vec<String>,
    ) -> anyhow::Result<Action> {
        ctx.set("tutorial", chapters.join("\n\n"));
        Ok(Action::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_yaml_str(
        "batch:\n  max_concurrency: 4\nlog_filter: \"info\"\n",
    )?;
    config.init_logging()?;

    let mut chapter = Flow::builder("write_chapter");
    let write = chapter.node("write", WriteChapter);
    let chapter = chapter.start(write).build()?;

    let mut builder = Flow::builder("tutorial").params(params! { "project" => "flowgraph" });
    let chapters = builder.batch_flow(BatchFlow::new(chapter, Chapters).with_mode(config.batch_mode()));
    let combine = builder.batch_node("combine", Combine, BatchMode::Sequential);
    builder.on_default(chapters, combine);
    let flow = builder.start(chapters).build()?;

    let mut ctx = FlowContext::default();
    ctx.set("abstractions", json!(ABSTRACTIONS));

    let logger = Logger::for_context(&ctx);
    logger.debug(&format!("batch mode: {:?}", config.batch_mode()));

    let (_, ctx) = flow.run_with_context(ctx).await?;
    let tutorial = ctx.get_as::<String>("tutorial")?.unwrap_or_default();
    if tutorial.is_empty() {
        logger.warn("no chapters were written");
    }
    println!("{tutorial}");

    logger.log_flow_summary(&ctx);
    Ok(())
}
