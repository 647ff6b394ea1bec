//! Cooperative worker pool
//!
//! One current-thread tokio runtime multiplexes M logical tasks over
//! non-blocking I/O. The tasks share the same crawl state as the other
//! backends, but every mutation happens between awaits on the single OS
//! thread; the claim loop waits on a Notify instead of a Condvar. One HTTP
//! client serves all tasks, since the worker here is the thread.

use std::sync::Arc;

use crate::crawler::frontier::SharedState;
use crate::crawler::worker::{apply_visit, visit_item, PageVisit, WorkerConfig};
use crate::crawler::{make_parser, Fetcher, LinkParser};
use crate::{LinkProbeError, Result};

pub fn run(shared: Arc<SharedState>, config: Arc<WorkerConfig>, workers: usize) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let fetcher = Arc::new(Fetcher::new(&config)?);
        let parser: Arc<dyn LinkParser> = Arc::from(make_parser(config.parser));

        let mut tasks = tokio::task::JoinSet::new();
        for id in 0..workers {
            let shared = shared.clone();
            let config = config.clone();
            let fetcher = fetcher.clone();
            let parser = parser.clone();
            tasks.spawn(async move {
                tracing::trace!("green worker {} up", id);
                while let Some(item) = shared.next_item().await {
                    let outcome = visit_item(&item, &config, &fetcher, parser.as_ref()).await;
                    shared.record_with(|state, ctx| {
                        apply_visit(state, PageVisit { item, outcome }, ctx)
                    });
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|_| LinkProbeError::WorkerPanicked)?;
        }

        Ok(())
    })
}
