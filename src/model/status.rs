use std::fmt;

use serde::{Deserialize, Serialize};

use crate::url::CanonicalUrl;

/// Why a URL was skipped instead of fetched
///
/// Policy skips are recorded on the page but are never counted as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Host is neither a start host nor in the accepted set
    OutsideScope,

    /// URL matches an ignored host/path prefix
    Ignored,

    /// Discovered beyond the maximum crawl depth
    DepthExceeded,

    /// Scheme is not crawlable (mailto:, javascript:, data:, tel:, ...)
    UnsupportedScheme,

    /// A redirect hop left the crawl scope
    RedirectedOutOfScope,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OutsideScope => "outside scope",
            Self::Ignored => "ignored prefix",
            Self::DepthExceeded => "depth exceeded",
            Self::UnsupportedScheme => "unsupported scheme",
            Self::RedirectedOutOfScope => "redirected out of scope",
        };
        f.write_str(label)
    }
}

/// The lifecycle status of a page
///
/// `Pending` and `InFlight` are transient; everything else is terminal.
/// `InvalidUrl` is only ever assigned when the page is first inserted,
/// since a URL that parsed once cannot become unparseable later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// Admitted to the queue, not yet claimed by a worker
    Pending,

    /// Claimed by a worker, fetch in progress
    InFlight,

    /// Final response with a 2xx status
    Ok(u16),

    /// The fetch was redirected; the outcome lives on the final URL's page
    Redirected { final_url: CanonicalUrl, code: u16 },

    /// Final response with status >= 400
    HttpError(u16),

    /// The request exceeded the configured timeout
    Timeout,

    /// Transport-level failure (DNS, TCP, TLS)
    ConnectionError(String),

    /// The link never parsed as a URL
    InvalidUrl(String),

    /// Not fetched, by admission policy
    SkippedByPolicy(SkipReason),
}

impl FetchStatus {
    /// Returns true once a page has reached its final status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InFlight)
    }

    /// Returns true if this status counts as a broken link
    ///
    /// Policy skips and redirects are not errors; HTTP and transport
    /// failures and unparseable links are.
    pub fn is_erroneous(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::Timeout | Self::ConnectionError(_) | Self::InvalidUrl(_)
        )
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InFlight => write!(f, "in flight"),
            Self::Ok(code) => write!(f, "ok ({})", code),
            Self::Redirected { final_url, code } => {
                write!(f, "redirected ({}) -> {}", code, final_url)
            }
            Self::HttpError(404) => write!(f, "not found (404)"),
            Self::HttpError(code) => write!(f, "error (status={})", code),
            Self::Timeout => write!(f, "error (timeout)"),
            Self::ConnectionError(detail) => write!(f, "error (connection): {}", detail),
            Self::InvalidUrl(detail) => write!(f, "error (invalid URL): {}", detail),
            Self::SkippedByPolicy(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

/// Metadata of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Final HTTP status code
    pub http_status: u16,

    /// URL that actually answered, after redirects
    pub final_url: CanonicalUrl,

    /// Content-Type header value, when present
    pub content_type: Option<String>,

    /// Content-Length when the server declared one
    pub content_length: Option<u64>,

    /// Wall-clock time of the whole exchange, redirects included
    pub elapsed_ms: u64,
}
