//! Crawl orchestration and the public API
//!
//! The coordinator owns the run: it validates the options, builds the
//! scope policy from the start URLs, seeds the frontier at depth 0, hands
//! the shared state to the configured backend, and returns the finalized
//! site model once the termination condition (queue empty, no worker busy)
//! has held.

use std::sync::Arc;

use crate::backend;
use crate::config::{self, CrawlOptions, Mode};
use crate::crawler::frontier::{CrawlContext, SharedState};
use crate::crawler::worker::WorkerConfig;
use crate::model::SiteModel;
use crate::progress::{ConsoleProgress, NullProgress, ProgressReporter};
use crate::url::{canonicalize_start_url, CanonicalUrl, ScopePolicy};
use crate::{LinkProbeError, Result};

/// Crawls a single start URL with default options
pub fn crawl(start_url: &str) -> Result<SiteModel> {
    crawl_with_options(&[start_url], CrawlOptions::default())
}

/// Crawls one or more start URLs with explicit options
pub fn crawl_with_options<S: AsRef<str>>(start_urls: &[S], options: CrawlOptions) -> Result<SiteModel> {
    Coordinator::new(options)?.run(start_urls)
}

/// Owns the configuration of one crawl invocation
pub struct Coordinator {
    options: CrawlOptions,
}

impl Coordinator {
    /// Validates the options; contradictions are fatal here, before any
    /// worker exists
    pub fn new(options: CrawlOptions) -> Result<Self> {
        config::validate(&options)?;
        Ok(Self { options })
    }

    /// Runs the crawl to completion and returns the finalized site model
    pub fn run<S: AsRef<str>>(&self, start_urls: &[S]) -> Result<SiteModel> {
        let starts = self.resolve_start_urls(start_urls)?;

        let policy = ScopePolicy::new(
            &starts,
            &self.options.accepted_hosts,
            &self.options.ignored_prefixes,
            self.options.test_outside,
        );

        let ctx = CrawlContext {
            policy: policy.clone(),
            max_depth: self.options.effective_max_depth(),
        };

        let reporter: Arc<dyn ProgressReporter> = if self.options.progress {
            Arc::new(ConsoleProgress)
        } else {
            Arc::new(NullProgress)
        };

        let mut site = SiteModel::new();
        site.mark_started();
        for url in &starts {
            site.push_start_url(url.clone());
        }

        let shared = Arc::new(SharedState::new(site, ctx, reporter.clone()));
        {
            let mut state = shared.lock();
            for url in starts {
                state.admit(url, 0, None, shared.ctx());
            }
        }

        let worker_config = WorkerConfig::from_options(&self.options, policy);
        let workers = self.options.effective_workers();

        tracing::info!(
            "starting crawl: mode={}, workers={}, depth={:?}",
            self.options.mode,
            workers,
            shared.ctx().max_depth,
        );

        match self.options.mode {
            Mode::Thread => backend::thread::run(&shared, &worker_config, workers)?,
            Mode::Process => backend::process::run(&shared, &worker_config, workers)?,
            Mode::Green => {
                backend::green::run(shared.clone(), Arc::new(worker_config.clone()), workers)?
            }
        }

        let mut site = shared.take_site();
        site.mark_finished();

        reporter.on_finished(site.crawled_count(), site.error_count());
        tracing::info!(
            "crawl finished: {} pages, {} errors",
            site.len(),
            site.error_count()
        );

        Ok(site)
    }

    /// Canonicalizes the start URLs; the run is fatal when none survive
    fn resolve_start_urls<S: AsRef<str>>(&self, start_urls: &[S]) -> Result<Vec<CanonicalUrl>> {
        let mut starts: Vec<CanonicalUrl> = Vec::new();
        for raw in start_urls {
            match canonicalize_start_url(raw.as_ref()) {
                Ok(url) => {
                    if !starts.contains(&url) {
                        starts.push(url);
                    }
                }
                Err(e) => tracing::warn!("ignoring start URL {:?}: {}", raw.as_ref(), e),
            }
        }

        if starts.is_empty() {
            return Err(LinkProbeError::NoStartUrl);
        }
        Ok(starts)
    }
}
