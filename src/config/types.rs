use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Per-request timeout applied when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Worker execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Parallel OS threads sharing the site model under a lock
    Thread,

    /// Worker processes exchanging items and results over pipes
    Process,

    /// Cooperative tasks multiplexed on one thread
    Green,
}

impl Mode {
    /// Worker count used when `--workers` is not given
    pub fn default_workers(self) -> usize {
        match self {
            Self::Thread | Self::Process => 1,
            Self::Green => 1000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Process => "process",
            Self::Green => "green",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(Self::Thread),
            "process" => Ok(Self::Process),
            "green" => Ok(Self::Green),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTML parser capability selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// The html5ever tree builder (via `scraper`)
    Html5ever,

    /// The `select` crate's document model
    Select,
}

impl ParserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html5ever => "html5ever",
            Self::Select => "select",
        }
    }
}

impl FromStr for ParserKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html5ever" => Ok(Self::Html5ever),
            "select" => Ok(Self::Select),
            other => Err(ConfigError::UnknownParser(other.to_string())),
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTML tags the extractor reads references from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    A,
    Img,
    Link,
    Script,
}

impl TagType {
    pub const ALL: [TagType; 4] = [TagType::A, TagType::Img, TagType::Link, TagType::Script];

    pub fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::Img => "img",
            Self::Link => "link",
            Self::Script => "script",
        }
    }

    /// Attribute that carries the reference for this tag
    pub fn source_attr(self) -> &'static str {
        match self {
            Self::A | Self::Link => "href",
            Self::Img | Self::Script => "src",
        }
    }

    /// Tags whose targets are known non-HTML and can be verified with HEAD
    pub fn head_eligible(self) -> bool {
        !matches!(self, Self::A)
    }

    /// Parses a comma-separated tag list such as `a,img,link`
    pub fn parse_list(s: &str) -> Result<Vec<TagType>, ConfigError> {
        let mut types = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let tag = part
                .parse::<TagType>()
                .map_err(|_| ConfigError::UnknownType(part.to_string()))?;
            if !types.contains(&tag) {
                types.push(tag);
            }
        }
        Ok(types)
    }
}

impl FromStr for TagType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Self::A),
            "img" => Ok(Self::Img),
            "link" => Ok(Self::Link),
            "script" => Ok(Self::Script),
            other => Err(ConfigError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything that shapes one crawl run
///
/// Constructed once at `run()` entry and handed read-only to the
/// coordinator, policy, and workers.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Fetch resources on other hosts once instead of skipping them
    pub test_outside: bool,

    /// Additional hosts whose pages are crawled and followed
    pub accepted_hosts: Vec<String>,

    /// `host/path` prefixes that are never fetched
    pub ignored_prefixes: Vec<String>,

    /// HTTP Basic credentials, sent only to in-scope hosts
    pub username: Option<String>,
    pub password: Option<String>,

    /// Tags the extractor reads references from
    pub types: Vec<TagType>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Pass href/src values through without whitespace trimming
    pub strict: bool,

    /// Equivalent to `depth = 0`
    pub run_once: bool,

    /// Maximum crawl depth; `None` is unlimited
    pub depth: Option<u32>,

    /// Worker count; `None` uses the mode's default
    pub workers: Option<usize>,

    pub mode: Mode,

    pub parser: ParserKind,

    /// Silently drop malformed `tel:` links instead of flagging them
    pub ignore_bad_tel_urls: bool,

    /// Disable TLS certificate verification
    pub allow_insecure_content: bool,

    /// Extra request headers applied to every fetch
    pub headers: Vec<(String, String)>,

    /// Report progress on the console while crawling
    pub progress: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            test_outside: false,
            accepted_hosts: Vec::new(),
            ignored_prefixes: Vec::new(),
            username: None,
            password: None,
            types: TagType::ALL.to_vec(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict: false,
            run_once: false,
            depth: None,
            workers: None,
            mode: Mode::Thread,
            parser: ParserKind::Html5ever,
            ignore_bad_tel_urls: false,
            allow_insecure_content: false,
            headers: Vec::new(),
            progress: false,
        }
    }
}

impl CrawlOptions {
    /// The configured worker count, or the mode's default
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| self.mode.default_workers())
    }

    /// The depth cap after applying `run_once`
    pub fn effective_max_depth(&self) -> Option<u32> {
        if self.run_once {
            Some(0)
        } else {
            self.depth
        }
    }

    /// Builds options from key/value pairs mirroring the CLI long flags
    ///
    /// Keys accept hyphens or underscores interchangeably
    /// (`accepted-hosts` and `accepted_hosts` are the same option).
    /// Boolean options take `true`/`false`/`1`/`0`.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();

        for (key, value) in pairs {
            let key = key.replace('-', "_");
            let invalid = || ConfigError::InvalidValue {
                key: key.clone(),
                value: value.to_string(),
            };

            match key.as_str() {
                "test_outside" => options.test_outside = parse_bool(value).ok_or_else(invalid)?,
                "accepted_hosts" => {
                    options.accepted_hosts = split_list(value);
                }
                "ignore" | "ignored_prefixes" => {
                    options.ignored_prefixes = split_list(value);
                }
                "username" => options.username = Some(value.to_string()),
                "password" => options.password = Some(value.to_string()),
                "types" => options.types = TagType::parse_list(value)?,
                "timeout" => options.timeout_secs = value.parse().map_err(|_| invalid())?,
                "strict" => options.strict = parse_bool(value).ok_or_else(invalid)?,
                "run_once" => options.run_once = parse_bool(value).ok_or_else(invalid)?,
                "depth" => options.depth = Some(value.parse().map_err(|_| invalid())?),
                "workers" => options.workers = Some(value.parse().map_err(|_| invalid())?),
                "mode" => options.mode = value.parse()?,
                "parser" => options.parser = value.parse()?,
                "ignore_bad_tel_urls" => {
                    options.ignore_bad_tel_urls = parse_bool(value).ok_or_else(invalid)?
                }
                "allow_insecure_content" => {
                    options.allow_insecure_content = parse_bool(value).ok_or_else(invalid)?
                }
                "header" | "headers" => {
                    for header in split_list(value) {
                        options.headers.push(parse_header(&header)?);
                    }
                }
                "progress" => options.progress = parse_bool(value).ok_or_else(invalid)?,
                _ => return Err(ConfigError::UnknownOption(key)),
            }
        }

        Ok(options)
    }
}

/// Splits a `Name: Value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::BadHeader(raw.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
