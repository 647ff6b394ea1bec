//! OS-thread worker pool
//!
//! N threads share the crawl state behind its mutex and block on the
//! Condvar while the queue is empty but peers are busy. Each worker owns
//! its HTTP client (connection reuse is per-worker) and a current-thread
//! tokio runtime that drives the async fetch; the state lock is never held
//! across I/O.

use crate::crawler::frontier::SharedState;
use crate::crawler::worker::{apply_visit, visit_item, PageVisit, WorkerConfig};
use crate::crawler::{make_parser, Fetcher};
use crate::{LinkProbeError, Result};

pub fn run(shared: &SharedState, config: &WorkerConfig, workers: usize) -> Result<()> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|id| scope.spawn(move || worker_loop(shared, config, id)))
            .collect();

        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(LinkProbeError::WorkerPanicked);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

fn worker_loop(shared: &SharedState, config: &WorkerConfig, id: usize) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let fetcher = Fetcher::new(config)?;
    let parser = make_parser(config.parser);

    tracing::debug!("thread worker {} up", id);

    while let Some(item) = shared.next_item_blocking() {
        tracing::trace!("worker {} fetching {}", id, item.url);
        let outcome = runtime.block_on(visit_item(&item, config, &fetcher, parser.as_ref()));
        shared.record_with(|state, ctx| apply_visit(state, PageVisit { item, outcome }, ctx));
    }

    tracing::debug!("thread worker {} done", id);
    Ok(())
}
