//! URL handling for linkprobe
//!
//! This module provides URL canonicalization (the deduplication key for the
//! whole crawl) and the admission policy that decides, once per URL, whether
//! it is crawled, fetched once, or skipped.

mod canonical;
mod policy;

pub use canonical::{
    canonicalize, canonicalize_start_url, CanonicalUrl, Canonicalized, CanonicalizeOpts,
};
pub use policy::{Admission, ScopePolicy};
