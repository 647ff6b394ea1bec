use serde::{Deserialize, Serialize};

use crate::config::TagType;
use crate::model::status::{FetchStatus, ResponseMeta};
use crate::url::CanonicalUrl;

/// One reference (edge) in the site graph
///
/// Created when the extractor encounters a link, immutable thereafter.
/// Source line/column are populated only when the parser exposes them;
/// neither supported parser currently does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Canonical form of the referenced URL
    pub url: CanonicalUrl,

    /// Page the reference was found on
    pub source_url: CanonicalUrl,

    /// 1-based line in the source document, when known
    pub source_line: Option<u32>,

    /// 1-based column in the source document, when known
    pub source_col: Option<u32>,

    /// HTML tag the reference came from
    pub tag: TagType,

    /// The attribute value exactly as written in the document
    pub raw_href: String,

    /// Depth of the source page
    pub depth: u32,
}

impl PageRef {
    pub fn new(url: CanonicalUrl, source_url: CanonicalUrl, tag: TagType, raw_href: &str, depth: u32) -> Self {
        Self {
            url,
            source_url,
            source_line: None,
            source_col: None,
            tag,
            raw_href: raw_href.to_string(),
            depth,
        }
    }

    /// Attribute the reference was read from (`href` or `src`)
    pub fn attr(&self) -> &'static str {
        self.tag.source_attr()
    }
}

/// The crawl result for one canonical URL
#[derive(Debug, Clone)]
pub struct Page {
    /// Canonical URL, unique across the site model
    pub url: CanonicalUrl,

    /// Minimum depth at which the URL was discovered
    pub depth: u32,

    pub status: FetchStatus,

    /// Response metadata, once a fetch completed
    pub response: Option<ResponseMeta>,

    /// References found on this page, in document order
    ///
    /// Populated only for HTML pages that were fetched and parsed.
    pub outgoing_refs: Vec<PageRef>,

    /// Every reference that pointed at this page
    pub incoming_refs: Vec<PageRef>,

    /// Whether the response was an HTML document
    pub is_html: bool,

    /// Diagnostic attached when HTML parsing failed; not a link error
    pub parse_diagnostic: Option<String>,
}

impl Page {
    pub fn new(url: CanonicalUrl, depth: u32) -> Self {
        Self {
            url,
            depth,
            status: FetchStatus::Pending,
            response: None,
            outgoing_refs: Vec::new(),
            incoming_refs: Vec::new(),
            is_html: false,
            parse_diagnostic: None,
        }
    }

    /// True when the terminal status is an HTTP or transport failure
    pub fn erroneous(&self) -> bool {
        self.status.is_erroneous()
    }
}
