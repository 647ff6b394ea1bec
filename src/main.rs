//! Linkprobe command-line entry point
//!
//! The CLI collects the crawl options, runs the coordinator, prints a plain
//! summary of the broken links, and maps the result onto the exit code:
//! 0 for a clean crawl, 1 when any page is erroneous, 2 on fatal errors.

use std::path::PathBuf;

use clap::Parser;
use linkprobe::config::{parse_header, CrawlOptions, Mode, ParserKind, TagType, DEFAULT_TIMEOUT_SECS};
use linkprobe::crawler::crawl_with_options;
use linkprobe::model::{Page, SiteModel};
use linkprobe::ConfigError;
use tracing_subscriber::EnvFilter;

/// Crawl a web site and report broken links
#[derive(Parser, Debug)]
#[command(name = "linkprobe")]
#[command(version)]
#[command(about = "A site-crawling link validator", long_about = None)]
struct Cli {
    /// Start URLs, seeded at depth 0
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Fetch resources from other hosts without crawling them
    #[arg(short = 'O', long)]
    test_outside: bool,

    /// Comma-separated list of additional hosts to crawl
    #[arg(short = 'H', long, value_name = "HOSTS")]
    accepted_hosts: Option<String>,

    /// Comma-separated list of host/path prefixes to ignore
    #[arg(short = 'i', long = "ignore", value_name = "PREFIXES")]
    ignore: Option<String>,

    /// Username for basic HTTP authentication
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Password for basic HTTP authentication
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Comma-separated tags to extract (subset of a,img,link,script)
    #[arg(short = 't', long, default_value = "a,img,link,script")]
    types: String,

    /// Seconds to wait before considering that a page timed out
    #[arg(short = 'T', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Do not strip whitespace from href and src attributes
    #[arg(short = 'C', long)]
    strict: bool,

    /// Only crawl the first pages (equivalent to --depth=0)
    #[arg(short = 'N', long)]
    run_once: bool,

    /// Maximum crawl depth (0 = start URLs only)
    #[arg(short = 'd', long)]
    depth: Option<u32>,

    /// Number of workers to spawn (default depends on the mode)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Worker execution model
    #[arg(short = 'm', long, value_enum, default_value_t = Mode::Thread)]
    mode: Mode,

    /// HTML parser to extract links with
    #[arg(short = 'R', long, value_enum, default_value_t = ParserKind::Html5ever)]
    parser: ParserKind,

    /// Silently skip malformed tel: links instead of flagging them
    #[arg(long)]
    ignore_bad_tel_urls: bool,

    /// Disable TLS certificate verification
    #[arg(long)]
    allow_insecure_content: bool,

    /// Custom header of the form "Name: Value" (repeatable)
    #[arg(short = 'D', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Read additional start URLs from a whitespace-separated file
    #[arg(long, value_name = "FILE")]
    url_file_path: Option<PathBuf>,

    /// Print crawl progress on stderr
    #[arg(short = 'P', long)]
    progress: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Internal: run as a worker process fed over stdin
    #[arg(long, hide = true)]
    worker_process: bool,
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    if cli.worker_process {
        return match linkprobe::backend::process::worker_process_main() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("linkprobe worker: {}", e);
                2
            }
        };
    }

    setup_logging(cli.verbose, cli.quiet);

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            return 2;
        }
    };

    let urls = match collect_start_urls(&cli) {
        Ok(urls) => urls,
        Err(e) => {
            tracing::error!("could not collect start URLs: {}", e);
            return 2;
        }
    };

    match crawl_with_options(&urls, options) {
        Ok(site) => {
            print_report(&site);
            if site.has_errors() {
                1
            } else {
                0
            }
        }
        Err(e) => {
            tracing::error!("crawl failed: {}", e);
            2
        }
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkprobe=warn"),
            1 => EnvFilter::new("linkprobe=info,warn"),
            2 => EnvFilter::new("linkprobe=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_options(cli: &Cli) -> Result<CrawlOptions, ConfigError> {
    let mut headers = Vec::new();
    for raw in &cli.headers {
        headers.push(parse_header(raw)?);
    }

    Ok(CrawlOptions {
        test_outside: cli.test_outside,
        accepted_hosts: split_list(cli.accepted_hosts.as_deref()),
        ignored_prefixes: split_list(cli.ignore.as_deref()),
        username: cli.username.clone(),
        password: cli.password.clone(),
        types: TagType::parse_list(&cli.types)?,
        timeout_secs: cli.timeout,
        strict: cli.strict,
        run_once: cli.run_once,
        depth: cli.depth,
        workers: cli.workers,
        mode: cli.mode,
        parser: cli.parser,
        ignore_bad_tel_urls: cli.ignore_bad_tel_urls,
        allow_insecure_content: cli.allow_insecure_content,
        headers,
        progress: cli.progress,
    })
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positional URLs plus, optionally, the contents of --url-file-path
fn collect_start_urls(cli: &Cli) -> Result<Vec<String>, ConfigError> {
    let mut urls = cli.urls.clone();

    if let Some(path) = &cli.url_file_path {
        let contents = std::fs::read_to_string(path)?;
        urls.extend(contents.split_whitespace().map(str::to_string));
    }

    Ok(urls)
}

/// Plain-text summary of the crawl, broken links first
fn print_report(site: &SiteModel) {
    let mut erroneous: Vec<&Page> = site.pages().filter(|p| p.erroneous()).collect();
    erroneous.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

    if erroneous.is_empty() {
        println!("crawled {} pages: everything ok", site.len());
        return;
    }

    println!("crawled {} pages: {} with errors", site.len(), erroneous.len());
    for page in erroneous {
        println!("  {}: {}", page.url, page.status);
        for origin in &page.incoming_refs {
            println!(
                "    from {} (<{} {}=\"{}\">)",
                origin.source_url,
                origin.tag,
                origin.attr(),
                origin.raw_href
            );
        }
    }
}
