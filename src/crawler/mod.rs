//! The crawl engine
//!
//! The engine is a producer/consumer loop in which workers both consume and
//! produce work: claim a URL, fetch it, record the outcome, and, for
//! in-scope HTML below the depth cap, extract its references and admit the
//! newly seen ones. The per-item work lives in [`worker`], the shared queue
//! and deduplication in [`frontier`], and the orchestration and public API
//! in [`coordinator`].

pub mod coordinator;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod worker;

pub use coordinator::{crawl, crawl_with_options, Coordinator};
pub use extractor::{make_parser, Extraction, LinkParser, RawLink};
pub use fetcher::{FetchOutcome, Fetcher};
pub use frontier::{CrawlContext, CrawlState, SharedState, VisitMode, WorkItem};
pub use worker::{visit_item, apply_visit, PageVisit, VisitOutcome, WorkerConfig};
