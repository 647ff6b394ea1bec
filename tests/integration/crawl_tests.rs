//! Integration tests for the crawl engine
//!
//! These tests run full crawls against wiremock servers and assert on the
//! returned site model: statuses, depths, graph edges, deduplication, and
//! scope handling, across the thread and green backends.

use linkprobe::config::{CrawlOptions, Mode};
use linkprobe::crawler::crawl_with_options;
use linkprobe::model::{FetchStatus, SiteModel, SkipReason};
use linkprobe::url::canonicalize_start_url;
use linkprobe::CanonicalUrl;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Runs the blocking crawl API off the test runtime
async fn run_crawl(urls: Vec<String>, options: CrawlOptions) -> linkprobe::Result<SiteModel> {
    tokio::task::spawn_blocking(move || crawl_with_options(&urls, options))
        .await
        .expect("crawl thread panicked")
}

fn url(s: &str) -> CanonicalUrl {
    canonicalize_start_url(s).unwrap()
}

fn status_of(site: &SiteModel, raw: &str) -> FetchStatus {
    site.page(&url(raw))
        .unwrap_or_else(|| panic!("page {} missing from model", raw))
        .status
        .clone()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mock_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_ok_page() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<html><body><a href="/a">a</a><a href="/b">b</a></body></html>"#)
        .await;
    mock_html(&server, "/a", "").await;
    mock_html(&server, "/b", "").await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(site.len(), 3);
    assert_eq!(site.error_count(), 0);
    for route in ["/", "/a", "/b"] {
        assert_eq!(
            status_of(&site, &format!("{}{}", server.uri(), route)),
            FetchStatus::Ok(200)
        );
    }

    let root = site.page(&url(&format!("{}/", server.uri()))).unwrap();
    assert!(root.is_html);
    assert_eq!(root.depth, 0);
    assert_eq!(root.outgoing_refs.len(), 2);
    // Document order is preserved.
    assert_eq!(root.outgoing_refs[0].url, url(&format!("{}/a", server.uri())));
    assert_eq!(root.outgoing_refs[1].url, url(&format!("{}/b", server.uri())));
}

#[tokio::test]
async fn test_broken_link_is_counted() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/missing">gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/missing", server.uri())),
        FetchStatus::HttpError(404)
    );
    assert_eq!(site.error_count(), 1);
    assert!(site.has_errors());

    let missing = site.page(&url(&format!("{}/missing", server.uri()))).unwrap();
    assert_eq!(missing.incoming_refs.len(), 1);
    assert_eq!(missing.incoming_refs[0].raw_href, "/missing");
}

#[tokio::test]
async fn test_depth_cap() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/1">1</a>"#).await;
    mock_html(&server, "/1", r#"<a href="/2">2</a>"#).await;
    // Beyond the cap: the page must never be requested.
    Mock::given(method("GET"))
        .and(path("/2"))
        .respond_with(html(r#"<a href="/3">3</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        depth: Some(1),
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(status_of(&site, &format!("{}/", server.uri())), FetchStatus::Ok(200));
    assert_eq!(status_of(&site, &format!("{}/1", server.uri())), FetchStatus::Ok(200));
    assert_eq!(
        status_of(&site, &format!("{}/2", server.uri())),
        FetchStatus::SkippedByPolicy(SkipReason::DepthExceeded)
    );
    assert!(site.page(&url(&format!("{}/3", server.uri()))).is_none());

    assert_eq!(site.page(&url(&format!("{}/1", server.uri()))).unwrap().depth, 1);
    assert_eq!(site.page(&url(&format!("{}/2", server.uri()))).unwrap().depth, 2);
    assert_eq!(site.error_count(), 0);
    server.verify().await;
}

#[tokio::test]
async fn test_dedup_under_concurrency() {
    let server = MockServer::start().await;

    let hub: String = (1..=4)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    mock_html(&server, "/", &hub).await;
    for i in 1..=4 {
        mock_html(&server, &format!("/p{}", i), r#"<a href="/shared">shared</a>"#).await;
    }
    // Exactly one fetch, no matter how many workers race on it.
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html(""))
        .expect(1)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        mode: Mode::Thread,
        workers: Some(8),
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    let shared = site.page(&url(&format!("{}/shared", server.uri()))).unwrap();
    assert_eq!(shared.status, FetchStatus::Ok(200));
    assert_eq!(shared.incoming_refs.len(), 4);
    assert_eq!(shared.depth, 2);
    assert_eq!(site.len(), 6);

    server.verify().await;
}

#[tokio::test]
async fn test_outside_host_skipped_without_flag() {
    let server = MockServer::start().await;
    let outside = MockServer::start().await;

    mock_html(&server, "/", &format!(r#"<a href="{}/x">out</a>"#, outside.uri())).await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/x", outside.uri())),
        FetchStatus::SkippedByPolicy(SkipReason::OutsideScope)
    );
    // The outside server never saw a request.
    assert!(outside.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_outside_host_fetch_only_with_flag() {
    let server = MockServer::start().await;
    let outside = MockServer::start().await;

    mock_html(&server, "/", &format!(r#"<a href="{}/x">out</a>"#, outside.uri())).await;
    // Fetch-only targets are probed with HEAD; their links are never
    // followed.
    Mock::given(method("HEAD"))
        .and(path("/x"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&outside)
        .await;

    let options = CrawlOptions {
        test_outside: true,
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    let page = site.page(&url(&format!("{}/x", outside.uri()))).unwrap();
    assert_eq!(page.status, FetchStatus::Ok(200));
    assert!(page.outgoing_refs.is_empty());
    assert_eq!(outside.received_requests().await.unwrap().len(), 1);
    assert_eq!(site.error_count(), 0);
}

#[tokio::test]
async fn test_redirect_out_of_scope() {
    let server = MockServer::start().await;
    let outside = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/leave">leave</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/leave"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/landing", outside.uri()).as_str()),
        )
        .mount(&server)
        .await;
    mock_html(&outside, "/landing", "").await;

    // Without --test-outside the chain stops before the foreign host.
    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();
    assert_eq!(
        status_of(&site, &format!("{}/leave", server.uri())),
        FetchStatus::SkippedByPolicy(SkipReason::RedirectedOutOfScope)
    );
    assert!(site.page(&url(&format!("{}/landing", outside.uri()))).is_none());
    assert!(outside.received_requests().await.unwrap().is_empty());

    // With it, the original records the redirect and the destination gets
    // its own page.
    let options = CrawlOptions {
        test_outside: true,
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/leave", server.uri())),
        FetchStatus::Redirected {
            final_url: url(&format!("{}/landing", outside.uri())),
            code: 302
        }
    );
    assert_eq!(
        status_of(&site, &format!("{}/landing", outside.uri())),
        FetchStatus::Ok(200)
    );
}

#[tokio::test]
async fn test_run_once_fetches_only_start_urls() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/a">a</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        run_once: true,
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(status_of(&site, &format!("{}/", server.uri())), FetchStatus::Ok(200));
    assert_eq!(
        status_of(&site, &format!("{}/a", server.uri())),
        FetchStatus::SkippedByPolicy(SkipReason::DepthExceeded)
    );
    server.verify().await;
}

#[tokio::test]
async fn test_image_links_verified_with_head() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<img src="/logo.png">"#).await;
    Mock::given(method("HEAD"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    let logo = site.page(&url(&format!("{}/logo.png", server.uri()))).unwrap();
    assert_eq!(logo.status, FetchStatus::Ok(200));
    assert!(!logo.is_html);
    server.verify().await;
}

#[tokio::test]
async fn test_non_html_anchor_target_is_not_parsed() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/report.pdf">report</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("%PDF-1.4 fake")
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    let pdf = site.page(&url(&format!("{}/report.pdf", server.uri()))).unwrap();
    assert_eq!(pdf.status, FetchStatus::Ok(200));
    assert!(!pdf.is_html);
    assert!(pdf.outgoing_refs.is_empty());
}

#[tokio::test]
async fn test_unsupported_and_invalid_links() {
    let server = MockServer::start().await;

    mock_html(
        &server,
        "/",
        r#"<a href="mailto:someone@example.com">mail</a>
           <a href="tel:12345">call</a>
           <a href="/fine">fine</a>"#,
    )
    .await;
    mock_html(&server, "/fine", "").await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(
        site.page(&CanonicalUrl::from_raw("mailto:someone@example.com"))
            .unwrap()
            .status,
        FetchStatus::SkippedByPolicy(SkipReason::UnsupportedScheme)
    );
    // A local tel: number without phone-context is malformed.
    assert!(matches!(
        site.page(&CanonicalUrl::from_raw("tel:12345")).unwrap().status,
        FetchStatus::InvalidUrl(_)
    ));
    assert_eq!(site.error_count(), 1);

    // Every recorded reference has a page (the model is closed).
    let root = site.page(&url(&format!("{}/", server.uri()))).unwrap();
    assert_eq!(root.outgoing_refs.len(), 3);
    for r in &root.outgoing_refs {
        assert!(site.page(&r.url).is_some());
    }

    // With the option the bad tel: link vanishes entirely.
    let options = CrawlOptions {
        ignore_bad_tel_urls: true,
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();
    assert!(site.page(&CanonicalUrl::from_raw("tel:12345")).is_none());
    assert_eq!(site.error_count(), 0);
}

#[tokio::test]
async fn test_ignored_prefix() {
    let server = MockServer::start().await;
    let host = url(&server.uri()).host_key().unwrap();

    mock_html(&server, "/", r#"<a href="/private/secret">s</a><a href="/open">o</a>"#).await;
    mock_html(&server, "/open", "").await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        ignored_prefixes: vec![format!("{}/private/", host)],
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/private/secret", server.uri())),
        FetchStatus::SkippedByPolicy(SkipReason::Ignored)
    );
    assert_eq!(status_of(&site, &format!("{}/open", server.uri())), FetchStatus::Ok(200));
    server.verify().await;
}

#[tokio::test]
async fn test_timeout_is_recorded_not_fatal() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/slow">slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("").set_delay(std::time::Duration::from_secs(5)))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        timeout_secs: 1,
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/slow", server.uri())),
        FetchStatus::Timeout
    );
    assert_eq!(site.error_count(), 1);
}

#[tokio::test]
async fn test_green_backend_full_crawl() {
    let server = MockServer::start().await;

    mock_html(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mock_html(&server, "/a", r#"<a href="/b">b</a>"#).await;
    mock_html(&server, "/b", "").await;

    let options = CrawlOptions {
        mode: Mode::Green,
        workers: Some(16),
        ..CrawlOptions::default()
    };
    let site = run_crawl(vec![format!("{}/", server.uri())], options)
        .await
        .unwrap();

    assert_eq!(site.len(), 3);
    assert_eq!(site.error_count(), 0);
    // /b is referenced twice but has one page with two incoming edges.
    let b = site.page(&url(&format!("{}/b", server.uri()))).unwrap();
    assert_eq!(b.incoming_refs.len(), 2);
    assert_eq!(b.depth, 1);
}

#[tokio::test]
async fn test_depth_is_minimum_over_discoveries() {
    let server = MockServer::start().await;

    // / links deep -> /mid links /target, and / also links /target
    // directly; the direct discovery must win.
    mock_html(&server, "/", r#"<a href="/mid">m</a><a href="/target">t</a>"#).await;
    mock_html(&server, "/mid", r#"<a href="/target">t</a>"#).await;
    mock_html(&server, "/target", "").await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(site.page(&url(&format!("{}/target", server.uri()))).unwrap().depth, 1);
}

#[tokio::test]
async fn test_base_href_overrides_resolution() {
    let server = MockServer::start().await;

    mock_html(
        &server,
        "/",
        r#"<html><head><base href="/deep/dir/"></head>
           <body><a href="page.html">p</a></body></html>"#,
    )
    .await;
    mock_html(&server, "/deep/dir/page.html", "").await;

    let site = run_crawl(vec![format!("{}/", server.uri())], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(
        status_of(&site, &format!("{}/deep/dir/page.html", server.uri())),
        FetchStatus::Ok(200)
    );
}
