//! Work queue, deduplication, and the termination protocol
//!
//! The frontier couples a FIFO queue of [`WorkItem`]s with the site model's
//! page map as the dedup index: a URL is admitted at most once, no matter
//! how many pages reference it or how many workers race on it, because
//! admission runs atomically under the single state lock.
//!
//! Termination is non-trivial since workers produce the work they consume:
//! a busy counter increments when an item is claimed and decrements when
//! its result is recorded, and the crawl is over exactly when the queue is
//! empty and no worker is busy. The blocking (Condvar) and async (Notify)
//! claim loops share one decision function.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::model::{FetchStatus, PageRef, SiteModel, SkipReason};
use crate::progress::ProgressReporter;
use crate::url::{Admission, CanonicalUrl, ScopePolicy};

/// What a worker is allowed to do with an admitted URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitMode {
    /// Fetch, and on HTML parse and admit its references
    CrawlAndFollow,

    /// Fetch once to verify reachability; never parse
    FetchOnly,
}

/// One unit of work, consumed exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: CanonicalUrl,
    pub depth: u32,
    pub mode: VisitMode,

    /// The reference that discovered this URL; `None` for start URLs
    pub origin: Option<PageRef>,
}

impl WorkItem {
    /// True when HEAD suffices: fetch-only admissions, and references from
    /// tags whose targets are known non-HTML
    pub fn head_eligible(&self) -> bool {
        if self.mode == VisitMode::FetchOnly {
            return true;
        }
        self.origin.as_ref().map_or(false, |o| o.tag.head_eligible())
    }
}

/// Immutable per-run inputs to admission
#[derive(Debug, Clone)]
pub struct CrawlContext {
    pub policy: ScopePolicy,
    pub max_depth: Option<u32>,
}

/// Outcome of one claim attempt
enum Claim {
    Item(WorkItem),
    /// Queue empty but workers are busy; new work may still appear
    Wait,
    Finished,
}

/// The single shared mutable structure of a crawl
///
/// Owns the site model, the pending queue, and the busy counter. All
/// mutation happens through methods called under the enclosing lock; the
/// lock is never held across I/O.
#[derive(Debug)]
pub struct CrawlState {
    pub site: SiteModel,
    queue: VecDeque<WorkItem>,
    busy: usize,
    completed: usize,
    done: bool,
}

impl CrawlState {
    pub fn new(site: SiteModel) -> Self {
        Self {
            site,
            queue: VecDeque::new(),
            busy: 0,
            completed: 0,
            done: false,
        }
    }

    /// Admits a URL: dedup, depth check, policy check, then enqueue
    ///
    /// Mirrors the lifecycle contract: the page is created `Pending` on
    /// first sight; a depth or policy rejection makes it terminal without
    /// ever queueing it. Later sightings only add the incoming reference.
    pub fn admit(
        &mut self,
        url: CanonicalUrl,
        depth: u32,
        origin: Option<PageRef>,
        ctx: &CrawlContext,
    ) {
        let was_new = self.site.get_or_create(&url, depth, origin.clone());
        if !was_new {
            return;
        }

        if ctx.max_depth.map_or(false, |max| depth > max) {
            self.site.set_status(
                &url,
                FetchStatus::SkippedByPolicy(SkipReason::DepthExceeded),
                None,
            );
            return;
        }

        match ctx.policy.classify(&url) {
            Admission::Skip(reason) => {
                self.site
                    .set_status(&url, FetchStatus::SkippedByPolicy(reason), None);
            }
            Admission::CrawlAndFollow => self.queue.push_back(WorkItem {
                url,
                depth,
                mode: VisitMode::CrawlAndFollow,
                origin,
            }),
            Admission::FetchOnly => self.queue.push_back(WorkItem {
                url,
                depth,
                mode: VisitMode::FetchOnly,
                origin,
            }),
        }
    }

    fn try_claim(&mut self) -> Claim {
        if self.done {
            return Claim::Finished;
        }
        match self.queue.pop_front() {
            Some(item) => {
                self.busy += 1;
                self.site.set_status(&item.url, FetchStatus::InFlight, None);
                Claim::Item(item)
            }
            None if self.busy == 0 => {
                self.done = true;
                Claim::Finished
            }
            None => Claim::Wait,
        }
    }

    /// Marks one claimed item as finished and re-checks termination
    fn complete(&mut self) {
        debug_assert!(self.busy > 0);
        self.busy = self.busy.saturating_sub(1);
        self.completed += 1;
        if self.busy == 0 && self.queue.is_empty() {
            self.done = true;
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// The frontier as shared between the coordinator and its workers
///
/// Wraps [`CrawlState`] with the two wake-up primitives the backends need:
/// a Condvar for OS-thread workers and a Notify for cooperative tasks.
pub struct SharedState {
    state: Mutex<CrawlState>,
    cv: Condvar,
    notify: Notify,
    ctx: CrawlContext,
    reporter: Arc<dyn ProgressReporter>,
}

impl SharedState {
    pub fn new(site: SiteModel, ctx: CrawlContext, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            state: Mutex::new(CrawlState::new(site)),
            cv: Condvar::new(),
            notify: Notify::new(),
            ctx,
            reporter,
        }
    }

    pub fn ctx(&self) -> &CrawlContext {
        &self.ctx
    }

    pub fn lock(&self) -> MutexGuard<'_, CrawlState> {
        self.state.lock().expect("crawl state lock poisoned")
    }

    /// Blocking claim used by the thread and process backends
    ///
    /// Returns `None` once the crawl has terminated; waits on the Condvar
    /// while the queue is empty but other workers are still busy.
    pub fn next_item_blocking(&self) -> Option<WorkItem> {
        let mut state = self.lock();
        loop {
            match state.try_claim() {
                Claim::Item(item) => return Some(item),
                Claim::Finished => {
                    drop(state);
                    self.wake_all();
                    return None;
                }
                Claim::Wait => {
                    state = self
                        .cv
                        .wait(state)
                        .expect("crawl state lock poisoned");
                }
            }
        }
    }

    /// Cooperative claim used by the green backend
    pub async fn next_item(&self) -> Option<WorkItem> {
        loop {
            // Register interest before checking so a wake between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                match state.try_claim() {
                    Claim::Item(item) => return Some(item),
                    Claim::Finished => {
                        drop(state);
                        self.wake_all();
                        return None;
                    }
                    Claim::Wait => {}
                }
            }

            notified.await;
        }
    }

    /// Records a finished item via `apply`, completes it, and wakes waiters
    ///
    /// `apply` runs under the state lock and is where the visit result is
    /// folded into the site model (including any new admissions).
    pub fn record_with<F>(&self, apply: F)
    where
        F: FnOnce(&mut CrawlState, &CrawlContext),
    {
        let (crawled, queued) = {
            let mut state = self.lock();
            apply(&mut state, &self.ctx);
            state.complete();
            (state.completed, state.queued())
        };

        self.wake_all();
        self.reporter.on_progress(crawled, queued);
    }

    /// Ends the crawl early; used when a backend hits a fatal error
    ///
    /// Workers drain the item they are on and then see `Finished`.
    pub fn abort(&self) {
        self.lock().done = true;
        self.wake_all();
    }

    fn wake_all(&self) {
        self.cv.notify_all();
        self.notify.notify_waiters();
    }

    /// Takes the site model out after all workers have exited
    pub fn take_site(&self) -> SiteModel {
        std::mem::take(&mut self.lock().site)
    }
}
