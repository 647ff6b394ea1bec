use std::collections::HashMap;
use std::time::SystemTime;

use crate::model::page::{Page, PageRef};
use crate::model::status::{FetchStatus, ResponseMeta};
use crate::url::CanonicalUrl;

/// The in-memory record of every URL seen in one crawl
///
/// The site model is the only shared mutable structure of a run; callers
/// serialize access to it (the thread and process backends through the
/// coordinator's lock, the cooperative backend by only touching it between
/// yields). After `run()` returns it is read-only.
#[derive(Debug, Clone, Default)]
pub struct SiteModel {
    pages: HashMap<CanonicalUrl, Page>,
    start_urls: Vec<CanonicalUrl>,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
}

impl SiteModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a page up, inserting it as `Pending` when absent
    ///
    /// When the page already exists its depth is lowered to the minimum of
    /// the known and offered depths. The originating reference, when given,
    /// is appended to `incoming_refs` either way. Returns whether the page
    /// was newly created.
    pub fn get_or_create(&mut self, url: &CanonicalUrl, depth: u32, origin: Option<PageRef>) -> bool {
        match self.pages.get_mut(url) {
            Some(page) => {
                page.depth = page.depth.min(depth);
                if let Some(origin) = origin {
                    page.incoming_refs.push(origin);
                }
                false
            }
            None => {
                let mut page = Page::new(url.clone(), depth);
                if let Some(origin) = origin {
                    page.incoming_refs.push(origin);
                }
                self.pages.insert(url.clone(), page);
                true
            }
        }
    }

    /// Transitions a page's status, attaching response metadata when given
    ///
    /// Allowed transitions are `Pending -> InFlight -> terminal`. A status
    /// update against an already-terminal page is dropped (and logged),
    /// which makes redirect targets and racing admissions idempotent.
    pub fn set_status(&mut self, url: &CanonicalUrl, status: FetchStatus, response: Option<ResponseMeta>) {
        let Some(page) = self.pages.get_mut(url) else {
            tracing::warn!("status update for unknown page {}", url);
            return;
        };

        if page.status.is_terminal() {
            tracing::debug!(
                "ignoring status {} for {}: already {}",
                status,
                url,
                page.status
            );
            return;
        }

        page.status = status;
        if response.is_some() {
            page.response = response;
        }
    }

    /// Marks whether a fetched page turned out to be an HTML document
    pub fn set_html(&mut self, url: &CanonicalUrl, is_html: bool) {
        if let Some(page) = self.pages.get_mut(url) {
            page.is_html = is_html;
        }
    }

    /// Attaches an HTML parse diagnostic to a page
    pub fn set_parse_diagnostic(&mut self, url: &CanonicalUrl, diagnostic: String) {
        if let Some(page) = self.pages.get_mut(url) {
            page.parse_diagnostic = Some(diagnostic);
        }
    }

    /// Records the outgoing references of a page, once
    ///
    /// The order of `refs` is the document order of the extraction and is
    /// preserved. A second call for the same page is dropped.
    pub fn record_refs(&mut self, url: &CanonicalUrl, refs: Vec<PageRef>) {
        let Some(page) = self.pages.get_mut(url) else {
            tracing::warn!("outgoing refs for unknown page {}", url);
            return;
        };

        if !page.outgoing_refs.is_empty() {
            tracing::debug!("outgoing refs for {} already recorded", url);
            return;
        }

        page.outgoing_refs = refs;
    }

    /// Inserts a page that is terminal from the start
    ///
    /// Used for invalid and unsupported-scheme links, whose status is fixed
    /// at insertion time. When the page already exists only the incoming
    /// reference is appended.
    pub fn insert_terminal(
        &mut self,
        url: &CanonicalUrl,
        depth: u32,
        origin: Option<PageRef>,
        status: FetchStatus,
    ) {
        if self.get_or_create(url, depth, origin) {
            self.set_status(url, status, None);
        }
    }

    pub fn page(&self, url: &CanonicalUrl) -> Option<&Page> {
        self.pages.get(url)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of pages whose terminal status counts as an error
    pub fn error_count(&self) -> usize {
        self.pages.values().filter(|p| p.erroneous()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.pages.values().any(|p| p.erroneous())
    }

    /// Number of pages that reached a terminal status
    pub fn crawled_count(&self) -> usize {
        self.pages.values().filter(|p| p.status.is_terminal()).count()
    }

    pub fn push_start_url(&mut self, url: CanonicalUrl) {
        self.start_urls.push(url);
    }

    /// Start URLs in the order they were given
    pub fn start_urls(&self) -> &[CanonicalUrl] {
        &self.start_urls
    }

    pub fn mark_started(&mut self) {
        self.start_time = Some(SystemTime::now());
    }

    pub fn mark_finished(&mut self) {
        self.end_time = Some(SystemTime::now());
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// An immutable copy for reporters running while the crawl is live
    pub fn snapshot(&self) -> SiteModel {
        self.clone()
    }
}
