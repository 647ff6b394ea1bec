//! Linkprobe: a site-crawling link validator
//!
//! This crate implements a crawler that walks a deployed web site from one
//! or more seed URLs, records the HTTP outcome of every reference it finds,
//! and reports broken or problematic links. The crawl runs with bounded
//! parallelism over one of three interchangeable backends: OS threads,
//! worker processes, or cooperative tasks on a single thread.

pub mod backend;
pub mod config;
pub mod crawler;
pub mod model;
pub mod progress;
pub mod url;

use thiserror::Error;

/// Main error type for linkprobe operations
///
/// Per-page failures (HTTP errors, timeouts, bad links) never surface here;
/// they are recorded as [`model::FetchStatus`] values on the affected pages.
/// This type covers only the conditions that abort a whole run.
#[derive(Debug, Error)]
pub enum LinkProbeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no start URL could be resolved to a crawlable form")]
    NoStartUrl,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("worker I/O error: {0}")]
    WorkerIo(#[from] std::io::Error),

    #[error("worker protocol error: {0}")]
    WorkerProtocol(#[from] serde_json::Error),

    #[error("worker process exited unexpectedly: {0}")]
    WorkerExited(String),

    #[error("crawl worker panicked")]
    WorkerPanicked,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read URL file: {0}")]
    Io(#[from] std::io::Error),

    #[error("this tag type is not supported: {0}")]
    UnknownType(String),

    #[error("unknown worker mode: {0}")]
    UnknownMode(String),

    #[error("unknown HTML parser: {0}")]
    UnknownParser(String),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("at least one worker is required")]
    NoWorkers,

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("at least one tag type must be extracted")]
    NoTypes,

    #[error("malformed header (expected \"Name: Value\"): {0}")]
    BadHeader(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host in URL")]
    MissingHost,

    #[error("malformed tel: URI: {0}")]
    BadTel(String),
}

/// Result type alias for linkprobe operations
pub type Result<T> = std::result::Result<T, LinkProbeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{CrawlOptions, Mode, ParserKind, TagType};
pub use crawler::{crawl, crawl_with_options, Coordinator};
pub use model::{FetchStatus, Page, PageRef, ResponseMeta, SiteModel, SkipReason};
pub use url::{Admission, CanonicalUrl, ScopePolicy};
