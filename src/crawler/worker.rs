//! Per-item crawl work
//!
//! Every backend runs the same two halves. [`visit_item`] does the I/O and
//! CPU work with no shared state: fetch, and for in-scope HTML parse and
//! canonicalize the references. Its result is an immutable, serializable
//! [`PageVisit`] (it crosses the pipe in process mode). [`apply_visit`]
//! folds that result into the site model under the state lock: statuses,
//! metadata, the redirect second-page rule, outgoing references, and the
//! admission of every newly discovered URL at `depth + 1`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{CrawlOptions, ParserKind, TagType};
use crate::crawler::extractor::{is_html_content_type, LinkParser};
use crate::crawler::fetcher::{method_for, FetchOutcome, Fetcher};
use crate::crawler::frontier::{CrawlContext, CrawlState, VisitMode, WorkItem};
use crate::model::{FetchStatus, PageRef, ResponseMeta, SkipReason};
use crate::url::{canonicalize, CanonicalUrl, Canonicalized, CanonicalizeOpts, ScopePolicy};

/// Everything a worker needs to do its job, independent of the backend
///
/// Immutable for the lifetime of the run; serialized to child processes in
/// process mode (the original purpose of keeping it plain data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub policy: ScopePolicy,
    pub types: Vec<TagType>,
    pub timeout_secs: u64,
    pub parser: ParserKind,
    pub strict: bool,
    pub ignore_bad_tel_urls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub headers: Vec<(String, String)>,
    pub allow_insecure_content: bool,
}

impl WorkerConfig {
    pub fn from_options(options: &CrawlOptions, policy: ScopePolicy) -> Self {
        Self {
            policy,
            types: options.types.clone(),
            timeout_secs: options.timeout_secs,
            parser: options.parser,
            strict: options.strict,
            ignore_bad_tel_urls: options.ignore_bad_tel_urls,
            username: options.username.clone(),
            password: options.password.clone(),
            headers: options.headers.clone(),
            allow_insecure_content: options.allow_insecure_content,
        }
    }

    fn canonicalize_opts(&self) -> CanonicalizeOpts {
        CanonicalizeOpts {
            strict: self.strict,
            ignore_bad_tel_urls: self.ignore_bad_tel_urls,
        }
    }
}

/// How one raw reference resolved during the visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkResolution {
    /// A crawlable URL, to be admitted
    Crawlable(CanonicalUrl),

    /// Valid but non-crawlable scheme; becomes a policy-skip page
    UnsupportedScheme(CanonicalUrl),

    /// Unparseable; becomes an `InvalidUrl` page
    Invalid { key: CanonicalUrl, detail: String },
}

/// One reference extracted from a fetched document, already canonicalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub raw_href: String,
    pub tag: TagType,
    pub resolution: LinkResolution,
}

/// What happened when a work item was visited
#[derive(Debug, Serialize, Deserialize)]
pub enum VisitOutcome {
    /// A response was obtained (success or HTTP error alike)
    Fetched {
        meta: ResponseMeta,

        /// First redirect status when the chain redirected
        first_redirect: Option<u16>,

        is_html: bool,

        /// References in document order; empty unless parsed
        links: Vec<ExtractedLink>,

        parse_diagnostic: Option<String>,
    },

    Timeout,

    ConnectionFailed { detail: String },

    /// A redirect hop left the crawl scope
    RedirectedOutOfScope,
}

/// A completed work item with its outcome, ready to apply
#[derive(Debug, Serialize, Deserialize)]
pub struct PageVisit {
    pub item: WorkItem,
    pub outcome: VisitOutcome,
}

/// Runs the shared-state-free half of the work: fetch, parse, canonicalize
pub async fn visit_item(
    item: &WorkItem,
    config: &WorkerConfig,
    fetcher: &Fetcher,
    parser: &dyn LinkParser,
) -> VisitOutcome {
    let Some(url) = item.url.parsed() else {
        // Raw-keyed URLs are terminal at insertion and never queued.
        return VisitOutcome::ConnectionFailed {
            detail: format!("unfetchable URL reached the queue: {}", item.url),
        };
    };

    let head = item.head_eligible();
    let want_body = item.mode == VisitMode::CrawlAndFollow && !head;

    match fetcher.fetch(&url, method_for(head), want_body).await {
        FetchOutcome::Timeout => VisitOutcome::Timeout,
        FetchOutcome::Connection { detail } => VisitOutcome::ConnectionFailed { detail },
        FetchOutcome::RedirectedOutOfScope => VisitOutcome::RedirectedOutOfScope,
        FetchOutcome::Response {
            status,
            final_url,
            first_redirect,
            content_type,
            content_length,
            elapsed_ms,
            body,
        } => {
            let is_html = is_html_content_type(content_type.as_deref());
            let meta = ResponseMeta {
                http_status: status,
                final_url: final_url.clone(),
                content_type,
                content_length,
                elapsed_ms,
            };

            let (links, parse_diagnostic) = match body {
                Some(body) => extract_links(&body, &final_url, config, parser),
                None => (Vec::new(), None),
            };

            VisitOutcome::Fetched {
                meta,
                first_redirect,
                is_html,
                links,
                parse_diagnostic,
            }
        }
    }
}

/// Parses a document and canonicalizes every reference it carries
fn extract_links(
    body: &str,
    final_url: &CanonicalUrl,
    config: &WorkerConfig,
    parser: &dyn LinkParser,
) -> (Vec<ExtractedLink>, Option<String>) {
    let Some(response_url) = final_url.parsed() else {
        return (Vec::new(), Some("response URL not parseable".to_string()));
    };

    let extraction = match parser.extract(body, &config.types) {
        Ok(extraction) => extraction,
        Err(diagnostic) => return (Vec::new(), Some(diagnostic)),
    };

    let base = effective_base(extraction.base_href.as_deref(), &response_url, config.strict);
    let opts = config.canonicalize_opts();

    let mut links = Vec::new();
    for raw in extraction.links {
        let reference = if config.strict {
            raw.raw_href.as_str()
        } else {
            raw.raw_href.trim()
        };

        // Empty values and same-page fragments are not links.
        if reference.is_empty() || reference.starts_with('#') {
            continue;
        }

        let resolution = match canonicalize(&raw.raw_href, Some(&base), &opts) {
            Canonicalized::Crawlable(url) => LinkResolution::Crawlable(url),
            Canonicalized::UnsupportedScheme { key, .. } => LinkResolution::UnsupportedScheme(key),
            Canonicalized::Invalid { key, detail } => LinkResolution::Invalid { key, detail },
            Canonicalized::Dropped => continue,
        };

        links.push(ExtractedLink {
            raw_href: raw.raw_href,
            tag: raw.tag,
            resolution,
        });
    }

    (links, None)
}

/// The resolution base: a `<base href>` in the head overrides the
/// response's final URL
fn effective_base(base_href: Option<&str>, response_url: &Url, strict: bool) -> Url {
    let Some(raw) = base_href else {
        return response_url.clone();
    };
    let raw = if strict { raw } else { raw.trim() };
    match response_url.join(raw) {
        Ok(base) if matches!(base.scheme(), "http" | "https") => base,
        _ => {
            tracing::debug!("unusable <base href> {:?}, using response URL", raw);
            response_url.clone()
        }
    }
}

/// Folds a visit result into the site model; runs under the state lock
///
/// Redirects record two pages: the original URL becomes
/// `Redirected(final, code)` and the final URL is admitted as its own page
/// at the same depth, so scope rules keep applying to what actually
/// answered. References are admitted at `depth + 1`; invalid and
/// unsupported-scheme references become terminal pages immediately.
pub fn apply_visit(state: &mut CrawlState, visit: PageVisit, ctx: &CrawlContext) {
    let PageVisit { item, outcome } = visit;

    match outcome {
        VisitOutcome::Timeout => {
            state.site.set_status(&item.url, FetchStatus::Timeout, None);
        }
        VisitOutcome::ConnectionFailed { detail } => {
            state
                .site
                .set_status(&item.url, FetchStatus::ConnectionError(detail), None);
        }
        VisitOutcome::RedirectedOutOfScope => {
            state.site.set_status(
                &item.url,
                FetchStatus::SkippedByPolicy(SkipReason::RedirectedOutOfScope),
                None,
            );
        }
        VisitOutcome::Fetched {
            meta,
            first_redirect,
            is_html,
            links,
            parse_diagnostic,
        } => {
            let target = meta.final_url.clone();
            let redirected = first_redirect.is_some() && target != item.url;

            if redirected {
                let code = first_redirect.unwrap_or_default();

                // Every referrer of the redirecting URL also reaches the
                // destination through it, not just the one the dequeued
                // item happened to carry.
                let origins = state
                    .site
                    .page(&item.url)
                    .map(|p| p.incoming_refs.clone())
                    .unwrap_or_default();

                state.site.set_status(
                    &item.url,
                    FetchStatus::Redirected {
                        final_url: target.clone(),
                        code,
                    },
                    None,
                );

                let was_new = state.site.get_or_create(&target, item.depth, None);
                for origin in origins {
                    state.site.get_or_create(&target, item.depth, Some(origin));
                }
                let already_terminal = !was_new
                    && state
                        .site
                        .page(&target)
                        .map_or(false, |p| p.status.is_terminal());
                if already_terminal {
                    // The destination was crawled on its own; nothing new.
                    return;
                }
            }

            let status = if (200..300).contains(&meta.http_status) {
                FetchStatus::Ok(meta.http_status)
            } else {
                FetchStatus::HttpError(meta.http_status)
            };

            state.site.set_html(&target, is_html);
            if let Some(diagnostic) = parse_diagnostic {
                state.site.set_parse_diagnostic(&target, diagnostic);
            }
            state.site.set_status(&target, status, Some(meta));

            if links.is_empty() {
                return;
            }

            let depth = item.depth;
            let mut refs = Vec::with_capacity(links.len());
            for link in links {
                match link.resolution {
                    LinkResolution::Crawlable(url) => {
                        let page_ref =
                            PageRef::new(url.clone(), target.clone(), link.tag, &link.raw_href, depth);
                        state.admit(url, depth + 1, Some(page_ref.clone()), ctx);
                        refs.push(page_ref);
                    }
                    LinkResolution::UnsupportedScheme(key) => {
                        let page_ref =
                            PageRef::new(key.clone(), target.clone(), link.tag, &link.raw_href, depth);
                        state.site.insert_terminal(
                            &key,
                            depth + 1,
                            Some(page_ref.clone()),
                            FetchStatus::SkippedByPolicy(SkipReason::UnsupportedScheme),
                        );
                        refs.push(page_ref);
                    }
                    LinkResolution::Invalid { key, detail } => {
                        let page_ref =
                            PageRef::new(key.clone(), target.clone(), link.tag, &link.raw_href, depth);
                        state.site.insert_terminal(
                            &key,
                            depth + 1,
                            Some(page_ref.clone()),
                            FetchStatus::InvalidUrl(detail),
                        );
                        refs.push(page_ref);
                    }
                }
            }

            state.site.record_refs(&target, refs);
        }
    }
}
