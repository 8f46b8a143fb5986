//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use linksentry::config::{CrawlConfig, CrawlOptions};
use linksentry::crawler::{crawl, run_crawl};
use linksentry::{SitePage, UrlSplit, WorkerMode};
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: impl Into<String>) -> ResponseTemplate {
    // `set_body_string` pins the content-type to text/plain and a later
    // `insert_header` cannot override it; the mime-aware body setter is
    // the only way to serve text/html from wiremock.
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "text/html")
}

fn options(start_urls: Vec<String>) -> CrawlOptions {
    CrawlOptions {
        start_urls,
        mode: WorkerMode::Task,
        workers: Some(2),
        ..CrawlOptions::default()
    }
}

fn page<'a>(pages: &'a BTreeMap<UrlSplit, SitePage>, url: &str) -> &'a SitePage {
    let key = UrlSplit::normalize(url).unwrap();
    pages
        .get(&key)
        .unwrap_or_else(|| panic!("page {url} missing from crawl results"))
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <img src="/logo.png">
            </body></html>"#
        ),
    )
    .await;
    mount_page(&server, "/page1", "<html><body>Content 1</body></html>".to_string()).await;
    mount_page(&server, "/page2", "<html><body>Content 2</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let config = CrawlConfig::from_options(options(vec![base.clone()])).unwrap();
    let pages = run_crawl(config).await.unwrap();

    assert_eq!(pages.len(), 4);
    assert!(page(&pages, &base).is_ok());
    assert!(page(&pages, &format!("{base}/page1")).is_ok());
    assert!(page(&pages, &format!("{base}/page2")).is_ok());

    let logo = page(&pages, &format!("{base}/logo.png"));
    assert!(logo.is_ok());
    assert!(!logo.is_html);
}

#[tokio::test]
async fn test_broken_link_is_reported_with_its_source() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/missing">gone</a></body></html>"#.to_string(),
    )
    .await;

    let config = CrawlConfig::from_options(options(vec![base.clone()])).unwrap();
    let pages = run_crawl(config).await.unwrap();

    let missing = page(&pages, &format!("{base}/missing"));
    assert!(!missing.is_ok());
    assert_eq!(missing.status, Some(404));
    assert_eq!(missing.status_message(), "not found (404)");
    assert_eq!(missing.sources.len(), 1);
    assert_eq!(
        missing.sources[0].origin,
        UrlSplit::normalize(&base).unwrap()
    );
    assert!(missing.sources[0].origin_str.contains("href=\"/missing\""));
}

#[tokio::test]
async fn test_duplicate_links_are_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><body>
        <a href="/shared">one</a>
        <a href="/other">two</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        &server,
        "/other",
        r#"<html><body><a href="/shared">again</a></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html("<html><body>shared</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = CrawlConfig::from_options(options(vec![base.clone()])).unwrap();
    let pages = run_crawl(config).await.unwrap();

    // Fetched once, but both referring pages show up as sources.
    let shared = page(&pages, &format!("{base}/shared"));
    assert_eq!(shared.sources.len(), 2);
}

#[tokio::test]
async fn test_outside_hosts_are_ignored_by_default() {
    let server = MockServer::start().await;
    let outside = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(r#"<html><body><a href="{}/external">out</a></body></html>"#, outside.uri()),
    )
    .await;

    let config = CrawlConfig::from_options(options(vec![base.clone()])).unwrap();
    let pages = run_crawl(config).await.unwrap();

    // No trace of the foreign host in the results.
    assert_eq!(pages.len(), 1);
    assert_eq!(outside.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_test_outside_fetches_but_does_not_crawl() {
    let server = MockServer::start().await;
    let outside = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(r#"<html><body><a href="{}/external">out</a></body></html>"#, outside.uri()),
    )
    .await;
    mount_page(
        &outside,
        "/external",
        r#"<html><body><a href="/deeper">deeper</a></body></html>"#.to_string(),
    )
    .await;

    let config = CrawlConfig::from_options(CrawlOptions {
        test_outside: true,
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    // The external page is validated but its links are not followed.
    let external = page(&pages, &format!("{}/external", outside.uri()));
    assert!(external.is_ok());
    assert!(!external.is_local);
    assert_eq!(pages.len(), 2);
}

#[tokio::test]
async fn test_accepted_hosts_extend_the_site() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(r#"<html><body><a href="{}/mirror">mirror</a></body></html>"#, other.uri()),
    )
    .await;
    mount_page(
        &other,
        "/mirror",
        r#"<html><body><a href="/deep">deep</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(&other, "/deep", "<html><body>deep</body></html>".to_string()).await;

    let other_host = UrlSplit::normalize(&other.uri()).unwrap().netloc();
    let config = CrawlConfig::from_options(CrawlOptions {
        accepted_hosts: vec![other_host],
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    // Accepted hosts are crawled, not just fetched.
    assert!(page(&pages, &format!("{}/deep", other.uri())).is_ok());
    assert_eq!(pages.len(), 3);
}

#[tokio::test]
async fn test_depth_limit_stops_crawling_not_fetching() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<html><body><a href="/a">a</a></body></html>"#.to_string()).await;
    mount_page(&server, "/a", r#"<html><body><a href="/b">b</a></body></html>"#.to_string()).await;
    mount_page(&server, "/b", r#"<html><body><a href="/c">c</a></body></html>"#.to_string()).await;

    let config = CrawlConfig::from_options(CrawlOptions {
        depth: Some(1),
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    // /b sits one past the limit: it is still validated, but its links
    // are not followed.
    assert!(page(&pages, &format!("{base}/b")).is_ok());
    assert!(!pages.contains_key(&UrlSplit::normalize(&format!("{base}/c")).unwrap()));
}

#[tokio::test]
async fn test_run_once_checks_only_start_page_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<html><body><a href="/a">a</a></body></html>"#.to_string()).await;
    mount_page(&server, "/a", r#"<html><body><a href="/b">b</a></body></html>"#.to_string()).await;

    let config = CrawlConfig::from_options(CrawlOptions {
        run_once: true,
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    assert!(page(&pages, &format!("{base}/a")).is_ok());
    assert!(!pages.contains_key(&UrlSplit::normalize(&format!("{base}/b")).unwrap()));
}

#[tokio::test]
async fn test_timeout_is_an_error_not_a_crash() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/slow">slow</a></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<html></html>").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = CrawlConfig::from_options(CrawlOptions {
        timeout_secs: 1,
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    let slow = page(&pages, &format!("{base}/slow"));
    assert!(slow.is_timeout);
    assert!(!slow.is_ok());
    assert_eq!(slow.status_message(), "error (timeout)");
}

#[tokio::test]
async fn test_redirects_are_followed_and_flagged() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/moved">moved</a></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/target"))
        .mount(&server)
        .await;
    mount_page(&server, "/target", "<html><body>target</body></html>".to_string()).await;

    let config = CrawlConfig::from_options(options(vec![base.clone()])).unwrap();
    let pages = run_crawl(config).await.unwrap();

    let moved = page(&pages, &format!("{base}/moved"));
    assert!(moved.is_ok());
    assert!(moved.is_redirect);
    assert_eq!(moved.status, Some(200));
}

#[tokio::test]
async fn test_content_presence_and_absence_checks() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><body><p>Lorem ipsum</p><a href="/about">about</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(
        &server,
        "/about",
        "<html><body>Welcome to the about page</body></html>".to_string(),
    )
    .await;

    let config = CrawlConfig::from_options(CrawlOptions {
        check_presence: vec!["Welcome".to_string()],
        check_absence: vec!["Lorem".to_string()],
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    let index = page(&pages, &base);
    assert!(!index.is_ok());
    assert_eq!(index.missing_content, vec!["Welcome".to_string()]);
    assert_eq!(index.erroneous_content, vec!["Lorem".to_string()]);

    assert!(page(&pages, &format!("{base}/about")).is_ok());
}

#[tokio::test]
async fn test_html_presence_rule_fails_on_empty_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", String::new()).await;

    let config = CrawlConfig::from_options(CrawlOptions {
        check_presence: vec!["<h1>Welcome</h1>".to_string()],
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    let index = page(&pages, &base);
    assert!(!index.is_ok());
    assert_eq!(index.missing_content, vec!["<h1>Welcome</h1>".to_string()]);
}

#[tokio::test]
async fn test_single_page_check_promotes_its_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "<html><body>index</body></html>".to_string()).await;
    mount_page(&server, "/legal", "<html><body>Terms of Service</body></html>".to_string()).await;

    // /legal is not linked anywhere; the scoped rule pulls it in.
    let config = CrawlConfig::from_options(CrawlOptions {
        check_presence_once: vec![format!("{base}/legal,Terms of Service")],
        ..options(vec![base.clone()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    assert!(page(&pages, &format!("{base}/legal")).is_ok());
    assert!(page(&pages, &base).is_ok());
}

#[tokio::test]
async fn test_multi_keeps_sites_separate() {
    let site_a = MockServer::start().await;
    let site_b = MockServer::start().await;

    mount_page(
        &site_a,
        "/",
        format!(r#"<html><body><a href="{}/">cross</a></body></html>"#, site_b.uri()),
    )
    .await;
    mount_page(&site_b, "/", "<html><body>site b</body></html>".to_string()).await;

    let config = CrawlConfig::from_options(CrawlOptions {
        multi: true,
        ..options(vec![site_a.uri(), site_b.uri()])
    })
    .unwrap();
    let pages = run_crawl(config).await.unwrap();

    // Both seeds crawled; the cross-site link adds a source to B's page
    // but B is validated under its own site, not A's.
    assert_eq!(pages.len(), 2);
    let b = page(&pages, &site_b.uri());
    assert!(b.is_ok());
    assert_eq!(b.sources.len(), 1);
    assert_eq!(
        b.site_origin.as_deref(),
        Some(UrlSplit::normalize(&site_b.uri()).unwrap().netloc().as_str())
    );
}

#[test]
fn test_thread_mode_crawl() {
    // The mock server needs a runtime that keeps polling while crawl()
    // blocks on its own runtime, so use a multi-threaded one.
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let (base, _server) = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><a href="/page1">p1</a></body></html>"#.to_string(),
        )
        .await;
        mount_page(&server, "/page1", "<html><body>one</body></html>".to_string()).await;
        (server.uri(), server)
    });

    let config = CrawlConfig::from_options(CrawlOptions {
        mode: WorkerMode::Thread,
        workers: Some(2),
        ..options(vec![base.clone()])
    })
    .unwrap();

    let pages = crawl(config).unwrap();
    assert_eq!(pages.len(), 2);
    assert!(page(&pages, &format!("{base}/page1")).is_ok());
}
