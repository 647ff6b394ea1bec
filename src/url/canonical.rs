use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::UrlError;

pub const SCHEME_HTTP: &str = "http";
pub const SCHEME_HTTPS: &str = "https";

/// The normalized, comparable form of a URL, used as the deduplication key
///
/// Two raw strings canonicalize to the same value iff they address the same
/// resource: the scheme and host are lowercased (the host IDNA-normalized),
/// default ports are elided, `.`/`..` path segments are resolved, an empty
/// path becomes `/`, the query is kept verbatim and the fragment is
/// stripped. All of that is delegated to the `url` crate; this type adds the
/// fragment strip and a stable string key.
///
/// A canonical URL can also wrap a raw string that never parsed. Such a
/// value still occupies exactly one slot in the site model (so invalid and
/// unsupported-scheme links are recorded once each) but has no parsed form
/// and is never fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl {
    key: String,
}

impl CanonicalUrl {
    /// Builds the canonical form of an already-parsed http(s) URL
    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self { key: url.into() }
    }

    /// Wraps a raw string that could not be parsed into a URL
    ///
    /// Used to key `InvalidUrl` and unsupported-scheme pages in the model.
    pub fn from_raw(raw: &str) -> Self {
        Self {
            key: raw.to_string(),
        }
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Re-parses the canonical form; `None` for raw-keyed values
    pub fn parsed(&self) -> Option<Url> {
        Url::parse(&self.key).ok().filter(|u| {
            matches!(u.scheme(), SCHEME_HTTP | SCHEME_HTTPS)
        })
    }

    /// The `host[:port]` key used for scope decisions, when parseable
    ///
    /// The port appears only when it is not the scheme default, matching
    /// the canonical string form.
    pub fn host_key(&self) -> Option<String> {
        let url = self.parsed()?;
        let host = url.host_str()?.to_string();
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        })
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Behaviour switches for [`canonicalize`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalizeOpts {
    /// Pass href/src values through unchanged instead of trimming whitespace
    pub strict: bool,

    /// Silently drop malformed `tel:` links instead of recording them as
    /// invalid
    pub ignore_bad_tel_urls: bool,
}

/// Outcome of canonicalizing one raw link string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonicalized {
    /// A crawlable http(s) URL
    Crawlable(CanonicalUrl),

    /// Syntactically valid but not crawlable (mailto:, javascript:, data:,
    /// a well-formed tel:, ...); a policy skip, not an error
    UnsupportedScheme { key: CanonicalUrl, scheme: String },

    /// A syntactically bad link
    Invalid { key: CanonicalUrl, detail: String },

    /// A malformed tel: link dropped under `ignore_bad_tel_urls`
    Dropped,
}

/// Resolves a raw link string against a base URL and normalizes it
///
/// Resolution follows RFC 3986 via the `url` crate. Schemes other than
/// http/https are classified as unsupported rather than invalid; `tel:`
/// URIs are additionally checked against the RFC 3966 shape and malformed
/// ones are invalid (or dropped, see [`CanonicalizeOpts`]). Unless strict
/// mode is on, leading/trailing whitespace is stripped first.
pub fn canonicalize(raw: &str, base: Option<&Url>, opts: &CanonicalizeOpts) -> Canonicalized {
    let trimmed = if opts.strict { raw } else { raw.trim() };

    if let Some(scheme) = leading_scheme(trimmed) {
        if scheme != SCHEME_HTTP && scheme != SCHEME_HTTPS {
            return classify_unsupported(trimmed, &scheme, opts);
        }
    }

    let resolved = match base {
        Some(base) => base.join(trimmed),
        None => Url::parse(trimmed),
    };

    let url = match resolved {
        Ok(url) => url,
        Err(e) => {
            return Canonicalized::Invalid {
                key: CanonicalUrl::from_raw(trimmed),
                detail: e.to_string(),
            }
        }
    };

    // A relative reference can resolve into the base's non-http scheme.
    if !matches!(url.scheme(), SCHEME_HTTP | SCHEME_HTTPS) {
        let scheme = url.scheme().to_string();
        return classify_unsupported(trimmed, &scheme, opts);
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Canonicalized::Invalid {
            key: CanonicalUrl::from_raw(trimmed),
            detail: UrlError::MissingHost.to_string(),
        };
    }

    Canonicalized::Crawlable(CanonicalUrl::from_url(url))
}

/// Canonicalizes a start URL, defaulting the scheme to http when absent
///
/// `example.com/page` is accepted as `http://example.com/page`, matching
/// what operators type on the command line.
pub fn canonicalize_start_url(raw: &str) -> Result<CanonicalUrl, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let candidate = match leading_scheme(trimmed) {
        Some(scheme) if scheme == SCHEME_HTTP || scheme == SCHEME_HTTPS => trimmed.to_string(),
        Some(scheme) => return Err(UrlError::UnsupportedScheme(scheme)),
        None => format!("{}://{}", SCHEME_HTTP, trimmed),
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(CanonicalUrl::from_url(url))
}

/// Returns the scheme of `raw` when it starts with one, lowercased
///
/// Per RFC 3986 a scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
/// followed by `:`. Anything else (including `//host` and relative paths)
/// has no scheme.
fn leading_scheme(raw: &str) -> Option<String> {
    let colon = raw.find(':')?;
    let candidate = &raw[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(candidate.to_ascii_lowercase())
}

fn classify_unsupported(raw: &str, scheme: &str, opts: &CanonicalizeOpts) -> Canonicalized {
    if scheme == "tel" {
        let rest = &raw[raw.find(':').map_or(0, |i| i + 1)..];
        if !is_well_formed_tel(rest) {
            if opts.ignore_bad_tel_urls {
                return Canonicalized::Dropped;
            }
            return Canonicalized::Invalid {
                key: CanonicalUrl::from_raw(raw),
                detail: UrlError::BadTel(rest.to_string()).to_string(),
            };
        }
    }

    Canonicalized::UnsupportedScheme {
        key: CanonicalUrl::from_raw(raw),
        scheme: scheme.to_string(),
    }
}

/// Checks a `tel:` subscriber part against the RFC 3966 shape
///
/// Global numbers start with `+` and contain digits with optional visual
/// separators. Local numbers need a `phone-context` parameter to be
/// meaningful.
fn is_well_formed_tel(rest: &str) -> bool {
    let (subscriber, params) = match rest.split_once(';') {
        Some((s, p)) => (s, Some(p)),
        None => (rest, None),
    };

    let global = subscriber.starts_with('+');
    let digits = if global { &subscriber[1..] } else { subscriber };

    if digits.is_empty() || !digits.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if !digits
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | '(' | ')'))
    {
        return false;
    }

    if global {
        true
    } else {
        params.map_or(false, |p| p.contains("phone-context="))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CanonicalizeOpts {
        CanonicalizeOpts::default()
    }

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    fn crawlable(raw: &str) -> CanonicalUrl {
        match canonicalize(raw, Some(&base()), &opts()) {
            Canonicalized::Crawlable(url) => url,
            other => panic!("expected crawlable, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_resolution() {
        assert_eq!(crawlable("other.html").as_str(), "http://example.com/dir/other.html");
        assert_eq!(crawlable("/root.html").as_str(), "http://example.com/root.html");
        assert_eq!(crawlable("../up.html").as_str(), "http://example.com/up.html");
    }

    #[test]
    fn test_absolute_passthrough() {
        assert_eq!(
            crawlable("https://other.example/a?b=1").as_str(),
            "https://other.example/a?b=1"
        );
    }

    #[test]
    fn test_fragment_stripped() {
        assert_eq!(
            crawlable("http://example.com/page#section").as_str(),
            "http://example.com/page"
        );
    }

    #[test]
    fn test_host_lowercased() {
        assert_eq!(crawlable("http://EXAMPLE.com/Page").as_str(), "http://example.com/Page");
    }

    #[test]
    fn test_default_port_elided() {
        assert_eq!(crawlable("http://example.com:80/x").as_str(), "http://example.com/x");
        assert_eq!(crawlable("https://example.com:443/x").as_str(), "https://example.com/x");
        assert_eq!(
            crawlable("http://example.com:8080/x").as_str(),
            "http://example.com:8080/x"
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(crawlable("http://example.com").as_str(), "http://example.com/");
    }

    #[test]
    fn test_query_kept_verbatim() {
        assert_eq!(
            crawlable("http://example.com/p?b=2&a=1").as_str(),
            "http://example.com/p?b=2&a=1"
        );
    }

    #[test]
    fn test_whitespace_trimmed_unless_strict() {
        assert_eq!(crawlable("  /root.html  ").as_str(), "http://example.com/root.html");
    }

    #[test]
    fn test_idempotence() {
        let first = crawlable("../up.html?q=1#frag");
        let again = canonicalize(first.as_str(), Some(&base()), &opts());
        assert_eq!(again, Canonicalized::Crawlable(first));
    }

    #[test]
    fn test_unsupported_schemes() {
        for raw in ["mailto:someone@example.com", "javascript:void(0)", "data:text/plain,x"] {
            match canonicalize(raw, Some(&base()), &opts()) {
                Canonicalized::UnsupportedScheme { .. } => {}
                other => panic!("expected unsupported for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_well_formed_tel_is_unsupported_not_invalid() {
        match canonicalize("tel:+1-816-555-1212", Some(&base()), &opts()) {
            Canonicalized::UnsupportedScheme { scheme, .. } => assert_eq!(scheme, "tel"),
            other => panic!("expected unsupported, got {:?}", other),
        }
    }

    #[test]
    fn test_local_tel_needs_phone_context() {
        match canonicalize("tel:7042;phone-context=example.com", Some(&base()), &opts()) {
            Canonicalized::UnsupportedScheme { .. } => {}
            other => panic!("expected unsupported, got {:?}", other),
        }
        match canonicalize("tel:7042", Some(&base()), &opts()) {
            Canonicalized::Invalid { .. } => {}
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_tel_dropped_with_option() {
        let opts = CanonicalizeOpts {
            ignore_bad_tel_urls: true,
            ..CanonicalizeOpts::default()
        };
        assert_eq!(
            canonicalize("tel:not a number", Some(&base()), &opts),
            Canonicalized::Dropped
        );
    }

    #[test]
    fn test_invalid_link_keeps_raw_key() {
        match canonicalize("http://exa mple.com/", None, &opts()) {
            Canonicalized::Invalid { key, .. } => {
                assert_eq!(key.as_str(), "http://exa mple.com/");
                assert!(key.parsed().is_none());
            }
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_start_url_scheme_defaulted() {
        let url = canonicalize_start_url("example.com/page").unwrap();
        assert_eq!(url.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_start_url_rejects_other_schemes() {
        assert!(matches!(
            canonicalize_start_url("ftp://example.com/"),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_host_key() {
        assert_eq!(crawlable("http://example.com/x").host_key().as_deref(), Some("example.com"));
        assert_eq!(
            crawlable("http://example.com:8080/x").host_key().as_deref(),
            Some("example.com:8080")
        );
        assert_eq!(CanonicalUrl::from_raw("mailto:x@y").host_key(), None);
    }
}
