//! HTTP fetching
//!
//! The fetcher wraps a `reqwest` client and owns everything between a work
//! item and its raw HTTP outcome: manual redirect following with loop
//! detection, per-hop scope checks, HEAD/GET selection, error
//! classification, and timing. Redirects are followed by hand
//! (`redirect::Policy::none()`) because every hop must be re-checked
//! against the admission policy before it is requested.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use reqwest::{header, redirect::Policy, Client, Method};
use url::Url;

use crate::crawler::extractor::is_html_content_type;
use crate::crawler::worker::WorkerConfig;
use crate::url::CanonicalUrl;

/// Maximum redirect hops before a chain is abandoned
const MAX_REDIRECTS: usize = 20;

/// Raw result of one fetch, before it is applied to the site model
#[derive(Debug)]
pub enum FetchOutcome {
    /// A non-redirect response was obtained
    Response {
        /// Final HTTP status code
        status: u16,

        /// URL that answered, after redirects
        final_url: CanonicalUrl,

        /// Status of the first redirect hop, when the chain redirected
        first_redirect: Option<u16>,

        content_type: Option<String>,
        content_length: Option<u64>,
        elapsed_ms: u64,

        /// Document body; read only for in-scope HTML that will be parsed
        body: Option<String>,
    },

    /// The request exceeded the configured timeout
    Timeout,

    /// Transport-level failure, redirect loops included
    Connection { detail: String },

    /// A redirect hop left the crawl scope
    RedirectedOutOfScope,
}

/// Tracks a redirect chain for loop detection
struct RedirectTrail {
    visited: HashSet<String>,
}

impl RedirectTrail {
    fn new() -> Self {
        Self {
            visited: HashSet::new(),
        }
    }

    /// Returns false when the URL was already seen (a loop)
    fn add(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    fn is_too_long(&self) -> bool {
        self.visited.len() > MAX_REDIRECTS
    }
}

/// A policy-aware HTTP fetcher; one per worker
pub struct Fetcher {
    client: Client,
    config: WorkerConfig,
}

impl Fetcher {
    /// Builds the fetcher and its HTTP client from the worker configuration
    pub fn new(config: &WorkerConfig) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &config.headers {
            match (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                (Ok(parsed_name), Ok(parsed_value)) => {
                    headers.insert(parsed_name, parsed_value);
                }
                _ => tracing::warn!("skipping unusable header {}", name),
            }
        }

        let client = Client::builder()
            .user_agent(concat!("linkprobe/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.allow_insecure_content)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetches a URL, following redirects, classifying every failure
    ///
    /// `want_body` requests the document body; it is read only when the
    /// final response is a 2xx HTML document on a crawl-and-follow host.
    /// A HEAD that the server refuses (405/501) is retried as GET, since
    /// some servers do not implement HEAD.
    pub async fn fetch(&self, url: &Url, method: Method, want_body: bool) -> FetchOutcome {
        let outcome = self.fetch_chain(url, method.clone(), want_body).await;

        if method == Method::HEAD {
            if let FetchOutcome::Response { status: 405 | 501, .. } = outcome {
                tracing::debug!("HEAD refused for {}, retrying with GET", url);
                return self.fetch_chain(url, Method::GET, want_body).await;
            }
        }

        outcome
    }

    async fn fetch_chain(&self, url: &Url, method: Method, want_body: bool) -> FetchOutcome {
        let started = Instant::now();
        let mut trail = RedirectTrail::new();
        let mut current = url.clone();
        let mut first_redirect: Option<u16> = None;

        loop {
            if !trail.add(&current) {
                return FetchOutcome::Connection {
                    detail: format!("redirect loop at {}", current),
                };
            }
            if trail.is_too_long() {
                return FetchOutcome::Connection {
                    detail: format!("more than {} redirects", MAX_REDIRECTS),
                };
            }

            let mut request = self.client.request(method.clone(), current.clone());
            if let Some(username) = &self.config.username {
                // Credentials only ever go to hosts inside the crawl scope.
                if self.config.policy.is_in_scope(&CanonicalUrl::from_url(current.clone())) {
                    request = request.basic_auth(username, self.config.password.as_deref());
                }
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => return classify_error(&e),
            };

            let status = response.status();

            if status.is_redirection() {
                let Some(next) = redirect_target(&response, &current) else {
                    return FetchOutcome::Connection {
                        detail: format!("redirect ({}) without usable Location", status.as_u16()),
                    };
                };

                first_redirect.get_or_insert(status.as_u16());

                // A hop to an ignored prefix or (without --test-outside)
                // to a foreign host ends the fetch.
                let hop = CanonicalUrl::from_url(next.clone());
                if !self.config.policy.classify(&hop).should_fetch() {
                    tracing::debug!("redirect from {} leaves scope at {}", url, hop);
                    return FetchOutcome::RedirectedOutOfScope;
                }

                tracing::trace!("following redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let content_length = response.content_length();
            let final_url = CanonicalUrl::from_url(current.clone());

            let read_body = want_body
                && status.is_success()
                && is_html_content_type(content_type.as_deref())
                && self.config.policy.classify(&final_url).should_follow();

            let body = if read_body {
                match response.text().await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        return FetchOutcome::Connection {
                            detail: format!("failed to read body: {}", e),
                        }
                    }
                }
            } else {
                None
            };

            return FetchOutcome::Response {
                status: status.as_u16(),
                final_url,
                first_redirect,
                content_type,
                content_length,
                elapsed_ms: started.elapsed().as_millis() as u64,
                body,
            };
        }
    }
}

/// Resolves a redirect's Location header against the current URL
fn redirect_target(response: &reqwest::Response, current: &Url) -> Option<Url> {
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    current.join(location).ok().filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// Maps a transport error onto the fetch taxonomy
fn classify_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        FetchOutcome::Timeout
    } else if e.is_connect() {
        FetchOutcome::Connection {
            detail: connect_detail(e),
        }
    } else {
        FetchOutcome::Connection {
            detail: e.to_string(),
        }
    }
}

/// Names TLS failures explicitly; everything else is a generic connect error
fn connect_detail(e: &reqwest::Error) -> String {
    let text = e.to_string();
    let source = std::error::Error::source(e)
        .map(|s| s.to_string())
        .unwrap_or_default();
    if text.contains("certificate") || source.contains("certificate") || text.contains("TLS") {
        format!("TLS: {}", text)
    } else {
        format!("connection failed: {}", text)
    }
}

/// Picks the request method for a work item
///
/// Fetch-only admissions and references from tags whose targets are known
/// non-HTML (`img`, `link`, `script`) are verified with HEAD; anything that
/// may need body parsing uses GET.
pub fn method_for(head_eligible: bool) -> Method {
    if head_eligible {
        Method::HEAD
    } else {
        Method::GET
    }
}
