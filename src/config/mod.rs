//! Crawl configuration
//!
//! Options are collected once (from the CLI or the programmatic API) into
//! an immutable [`CrawlOptions`] value that is passed explicitly to every
//! component; there is no process-wide mutable configuration.

mod types;
mod validation;

pub use types::{parse_header, CrawlOptions, Mode, ParserKind, TagType, DEFAULT_TIMEOUT_SECS};
pub use validation::validate;
