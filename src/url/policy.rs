use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::SkipReason;
use crate::url::canonical::CanonicalUrl;

/// The admission decision for one URL, made once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Fetch, and on HTML parse and admit referenced URLs
    CrawlAndFollow,

    /// Issue a single request to verify reachability; never extract
    FetchOnly,

    /// Do not fetch at all
    Skip(SkipReason),
}

impl Admission {
    pub fn should_fetch(&self) -> bool {
        !matches!(self, Self::Skip(_))
    }

    pub fn should_follow(&self) -> bool {
        matches!(self, Self::CrawlAndFollow)
    }
}

/// Which hosts are crawled, fetched, or skipped
///
/// Built once per run from the start URLs and the crawl options, then
/// shared read-only with every worker (it crosses the process boundary in
/// process mode, hence the serde derives).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopePolicy {
    /// Hosts whose pages are crawled and followed: every start host plus
    /// the configured accepted hosts, keyed as `host[:port]`
    crawl_hosts: HashSet<String>,

    /// `host/path` prefixes that are never fetched
    ignored_prefixes: Vec<String>,

    /// When set, out-of-scope hosts are fetched once instead of skipped
    test_outside: bool,
}

impl ScopePolicy {
    pub fn new(
        start_urls: &[CanonicalUrl],
        accepted_hosts: &[String],
        ignored_prefixes: &[String],
        test_outside: bool,
    ) -> Self {
        let mut crawl_hosts: HashSet<String> =
            start_urls.iter().filter_map(CanonicalUrl::host_key).collect();

        for host in accepted_hosts {
            let host = host.trim();
            if host.is_empty() {
                continue;
            }
            // Accept full URLs as well as bare host names.
            crawl_hosts.insert(strip_scheme(host).split('/').next().unwrap_or(host).to_string());
        }

        let ignored_prefixes = ignored_prefixes
            .iter()
            .map(|p| strip_scheme(p.trim()).to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            crawl_hosts,
            ignored_prefixes,
            test_outside,
        }
    }

    /// Classifies a URL against the policy
    ///
    /// The rules apply in order: ignored prefixes first, then the
    /// crawl-and-follow host set, then the test-outside escape hatch.
    pub fn classify(&self, url: &CanonicalUrl) -> Admission {
        let Some(target) = prefix_target(url) else {
            // Raw-keyed values never reach the queue; classify defensively.
            return Admission::Skip(SkipReason::OutsideScope);
        };

        if self.ignored_prefixes.iter().any(|p| target.starts_with(p.as_str())) {
            return Admission::Skip(SkipReason::Ignored);
        }

        if url.host_key().map_or(false, |h| self.crawl_hosts.contains(&h)) {
            return Admission::CrawlAndFollow;
        }

        if self.test_outside {
            Admission::FetchOnly
        } else {
            Admission::Skip(SkipReason::OutsideScope)
        }
    }

    /// True when the URL's host belongs to the crawl-and-follow set
    ///
    /// Basic credentials are only ever sent to in-scope hosts.
    pub fn is_in_scope(&self, url: &CanonicalUrl) -> bool {
        url.host_key().map_or(false, |h| self.crawl_hosts.contains(&h))
    }

    pub fn test_outside(&self) -> bool {
        self.test_outside
    }
}

/// The `host[:port]/path` form ignored prefixes are matched against
fn prefix_target(url: &CanonicalUrl) -> Option<String> {
    let parsed = url.parsed()?;
    let host = url.host_key()?;
    Some(format!("{}{}", host, parsed.path()))
}

/// Tolerates operators writing prefixes or hosts with a scheme
fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"))
        .unwrap_or(s)
}
