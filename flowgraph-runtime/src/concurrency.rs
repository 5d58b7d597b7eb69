#[cfg(feature = "parallel")]
use flowgraph_core::FlowError;
use flowgraph_core::FlowResult;
use futures::future::BoxFuture;
#[cfg(feature = "parallel")]
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Configuration for concurrent batch execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum number of items in flight (None for unlimited)
    pub max_concurrency: Option<usize>,
    /// Stop at the first failure and drop in-flight siblings
    pub fail_fast: bool,
}

impl ConcurrencyConfig {
    /// Create a config with maximum concurrency limit
    pub fn with_max_concurrency(concurrency: usize) -> Self {
        Self {
            max_concurrency: Some(concurrency),
            ..Default::default()
        }
    }

    /// Create a config that fails fast on first error
    pub fn fail_fast() -> Self {
        Self {
            fail_fast: true,
            ..Default::default()
        }
    }

    /// Set maximum concurrency
    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = Some(concurrency);
        self
    }

    /// Enable fail fast mode
    pub fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }
}

/// How a batch walks its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// One item at a time, in order; the first failure stops the batch.
    #[default]
    Sequential,
    /// All items launched together inside the current task.
    Concurrent(ConcurrencyConfig),
}

impl BatchMode {
    pub fn concurrent() -> Self {
        Self::Concurrent(ConcurrencyConfig::default())
    }
}

/// Await every future and return the outputs in input order.
pub(crate) async fn run_ordered<'a, T: Send + 'a>(
    futures: Vec<BoxFuture<'a, FlowResult<T>>>,
    mode: BatchMode,
) -> FlowResult<Vec<T>> {
    match mode {
        BatchMode::Sequential => run_sequential(futures).await,
        BatchMode::Concurrent(config) => run_concurrent(futures, config).await,
    }
}

async fn run_sequential<'a, T>(
    futures: Vec<BoxFuture<'a, FlowResult<T>>>,
) -> FlowResult<Vec<T>> {
    let mut outputs = Vec::with_capacity(futures.len());
    for future in futures {
        outputs.push(future.await?);
    }
    Ok(outputs)
}

#[cfg(feature = "parallel")]
async fn run_concurrent<'a, T: Send + 'a>(
    futures: Vec<BoxFuture<'a, FlowResult<T>>>,
    config: ConcurrencyConfig,
) -> FlowResult<Vec<T>> {
    if futures.is_empty() {
        return Ok(Vec::new());
    }

    let total = futures.len();
    let limit = config.max_concurrency.unwrap_or(total).max(1);

    // 按完成顺序产出 (下标, 结果)，最后按下标归位
    let mut completed = stream::iter(
        futures
            .into_iter()
            .enumerate()
            .map(tag_with_index),
    )
    .buffer_unordered(limit);

    let mut slots: Vec<Option<FlowResult<T>>> =
        std::iter::repeat_with(|| None).take(total).collect();

    while let Some((index, result)) = completed.next().await {
        if config.fail_fast {
            if let Err(e) = result {
                // 丢弃 stream 即取消仍在运行的兄弟项
                return Err(e);
            }
        }
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(FlowError::Config(
                    "batch item finished without a result".to_string(),
                ))
            })
        })
        .collect()
}

#[cfg(feature = "parallel")]
async fn tag_with_index<T>(
    (index, future): (usize, BoxFuture<'_, FlowResult<T>>),
) -> (usize, FlowResult<T>) {
    (index, future.await)
}

#[cfg(not(feature = "parallel"))]
async fn run_concurrent<'a, T: Send + 'a>(
    futures: Vec<BoxFuture<'a, FlowResult<T>>>,
    _config: ConcurrencyConfig,
) -> FlowResult<Vec<T>> {
    // 并行被禁用时退化为顺序
    run_sequential(futures).await
}
