use crate::error::FlowResult;
use std::future::Future;

/// Drive `future` to completion on a fresh current-thread runtime, blocking
/// the caller. Time and I/O drivers are enabled; retry waits block the
/// calling thread.
pub fn block_on<F: Future>(future: F) -> FlowResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
