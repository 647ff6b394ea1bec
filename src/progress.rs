//! Crawl progress reporting
//!
//! A reporter is a pure sink: the coordinator calls it after every recorded
//! result and it must never influence the crawl. The console implementation
//! writes to stderr because progress is user-facing output, not
//! diagnostics.

/// Observer notified as the crawl advances
pub trait ProgressReporter: Send + Sync {
    /// Called after each page reaches a terminal status
    fn on_progress(&self, crawled: usize, queued: usize);

    /// Called once, after the last worker has exited
    fn on_finished(&self, crawled: usize, errors: usize) {
        let _ = (crawled, errors);
    }
}

/// The default reporter: reports nothing
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn on_progress(&self, _crawled: usize, _queued: usize) {}
}

/// Line-per-page console reporting, enabled by `--progress`
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn on_progress(&self, crawled: usize, queued: usize) {
        eprintln!("progress: {} crawled, {} queued", crawled, queued);
    }

    fn on_finished(&self, crawled: usize, errors: usize) {
        eprintln!("done: {} pages crawled, {} with errors", crawled, errors);
    }
}
