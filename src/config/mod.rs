//! Configuration building and crawl policy
//!
//! [`CrawlConfig::from_options`] validates the raw [`CrawlOptions`] once at
//! start-up: start URLs are normalized, element types and content check
//! rules are parsed (malformed input is fatal here, never mid-crawl), and
//! the accepted-host sets are assembled.
//!
//! The crawl policy lives here too: [`CrawlConfig::in_scope`] and
//! [`CrawlConfig::fetchable`] are the only gate between "a link was
//! discovered" and "a fetch task is created".

mod types;

pub use types::{
    AcceptedHosts, CrawlOptions, ElementKind, ReportType, WorkerConfig, WorkerMode,
    DEFAULT_TIMEOUT_SECS,
};

use crate::check::{parse_rule, split_scoped_rule, ContentCheck, ContentCheckSet, ParsedRule};
use crate::url::UrlSplit;
use crate::{CrawlError, Result};
use std::collections::{HashMap, HashSet};

/// Validated crawl configuration, constructed once and shared by reference.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_urls: Vec<UrlSplit>,
    pub accepted_hosts: AcceptedHosts,
    pub ignored_prefixes: Vec<String>,
    pub test_outside: bool,
    pub multi: bool,
    /// Maximum crawl depth; `None` is unbounded.
    pub max_depth: Option<u32>,
    pub worker_count: usize,
    pub mode: WorkerMode,
    pub worker: WorkerConfig,
    pub checks: ContentCheckSet,
}

impl CrawlConfig {
    /// Builds and validates the configuration.
    ///
    /// Fails fast on empty or malformed start URLs, unsupported element
    /// types, malformed headers, and malformed content check rules. URLs
    /// named by single-page check rules are promoted into the start URL
    /// list so they are always visited.
    pub fn from_options(options: CrawlOptions) -> Result<Self> {
        if options.start_urls.is_empty() {
            return Err(CrawlError::NoStartUrls);
        }

        let mut start_urls = options
            .start_urls
            .iter()
            .map(|raw| UrlSplit::normalize(raw))
            .collect::<Result<Vec<_>>>()?;

        let element_kinds = options
            .types
            .iter()
            .map(|name| ElementKind::parse(name))
            .collect::<Result<Vec<_>>>()?;

        let extra_headers = options
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<Vec<_>>>()?;

        let accepted_hosts =
            build_accepted_hosts(options.multi, &options.accepted_hosts, &start_urls)?;

        let checks = build_checks(&options, &mut start_urls)?;

        let max_depth = if options.run_once {
            Some(0)
        } else {
            options.depth
        };

        Ok(Self {
            start_urls,
            accepted_hosts,
            ignored_prefixes: options.ignored_prefixes.clone(),
            test_outside: options.test_outside,
            multi: options.multi,
            max_depth,
            worker_count: options
                .workers
                .unwrap_or_else(|| options.mode.default_workers())
                .max(1),
            mode: options.mode,
            worker: WorkerConfig {
                username: options.username,
                password: options.password,
                element_kinds,
                timeout_secs: options.timeout_secs,
                strict_mode: options.strict_mode,
                prefer_server_encoding: options.prefer_server_encoding,
                extra_headers,
            },
            checks,
        })
    }

    /// True if `url` belongs to the site being crawled.
    ///
    /// `origin` must be the site-origin netloc in multi-site mode.
    pub fn is_local(&self, url: &UrlSplit, origin: Option<&str>) -> bool {
        self.accepted_hosts.contains(&url.netloc(), origin)
    }

    /// True if a link discovered on a page at `depth` should itself be
    /// crawled: the depth budget allows it and the target host is local.
    pub fn in_scope(&self, url: &UrlSplit, depth: u32, origin: Option<&str>) -> bool {
        self.max_depth.map_or(true, |max| depth < max) && self.is_local(url, origin)
    }

    /// True if `url` should be fetched at all: local (or cross-domain
    /// fetching enabled) and not under any ignored prefix.
    pub fn fetchable(&self, url: &UrlSplit, origin: Option<&str>) -> bool {
        if !self.test_outside && !self.is_local(url, origin) {
            return false;
        }
        !self
            .ignored_prefixes
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix.as_str()))
    }

    /// The site-origin identifier a start URL seeds tasks with.
    pub fn origin_for(&self, start_url: &UrlSplit) -> Option<String> {
        self.multi.then(|| start_url.netloc())
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CrawlError::InvalidHeader(raw.to_string())),
    }
}

fn build_accepted_hosts(
    multi: bool,
    extra: &[String],
    start_urls: &[UrlSplit],
) -> Result<AcceptedHosts> {
    let extra_hosts = extra
        .iter()
        .map(|raw| UrlSplit::normalize(raw).map(|split| split.netloc()))
        .collect::<Result<HashSet<_>>>()?;

    if multi {
        let mut by_origin = HashMap::new();
        for start in start_urls {
            let mut hosts = extra_hosts.clone();
            hosts.insert(start.netloc());
            by_origin.insert(start.netloc(), hosts);
        }
        Ok(AcceptedHosts::Multi(by_origin))
    } else {
        let mut hosts = extra_hosts;
        hosts.extend(start_urls.iter().map(UrlSplit::netloc));
        Ok(AcceptedHosts::Single(hosts))
    }
}

fn build_checks(options: &CrawlOptions, start_urls: &mut Vec<UrlSplit>) -> Result<ContentCheckSet> {
    let mut set = ContentCheckSet::default();

    for raw in &options.check_presence {
        let rule = parse_rule(raw)?;
        push_rule(&mut set.all_pages, rule, true);
    }
    for raw in &options.check_absence {
        let rule = parse_rule(raw)?;
        push_rule(&mut set.all_pages, rule, false);
    }

    // Snapshot: relative rule paths resolve against the original starts,
    // not against URLs other rules promoted.
    let resolve_bases = start_urls.clone();

    for (raw, presence) in options
        .check_presence_once
        .iter()
        .map(|raw| (raw, true))
        .chain(options.check_absence_once.iter().map(|raw| (raw, false)))
    {
        let (path, body) = split_scoped_rule(raw)?;
        let rule = parse_rule(body)?;

        for url in scope_urls(path, &resolve_bases)? {
            if !start_urls.contains(&url) {
                start_urls.push(url.clone());
            }
            push_rule(
                set.by_url.entry(url).or_default(),
                rule.clone(),
                presence,
            );
        }
    }

    Ok(set)
}

/// Resolves a single-page rule path to the canonical URLs it scopes.
///
/// Only a path with an explicit scheme and host names exactly that URL;
/// anything else (including a bare `/about`) resolves against every start
/// URL. Scheme-prefixing `normalize` must not be used here: it would turn
/// `/about` into `http:///about`, which parses with host `about`.
fn scope_urls(path: &str, start_urls: &[UrlSplit]) -> Result<Vec<UrlSplit>> {
    if let Ok(url) = url::Url::parse(path.trim()) {
        if url.has_host() {
            return Ok(vec![UrlSplit::from(url)]);
        }
    }
    start_urls.iter().map(|base| base.resolve(path)).collect()
}

fn push_rule(check: &mut ContentCheck, rule: ParsedRule, presence: bool) {
    match (rule, presence) {
        (ParsedRule::Html(rule), true) => check.html_presence.push(rule),
        (ParsedRule::Html(rule), false) => check.html_absence.push(rule),
        (ParsedRule::Text(matcher), true) => check.text_presence.push(matcher),
        (ParsedRule::Text(matcher), false) => check.text_absence.push(matcher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(start_urls: &[&str]) -> CrawlOptions {
        CrawlOptions {
            start_urls: start_urls.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn url(raw: &str) -> UrlSplit {
        UrlSplit::normalize(raw).unwrap()
    }

    #[test]
    fn test_requires_start_urls() {
        assert!(matches!(
            CrawlConfig::from_options(CrawlOptions::default()),
            Err(CrawlError::NoStartUrls)
        ));
    }

    #[test]
    fn test_start_url_host_is_local() {
        let config = CrawlConfig::from_options(options(&["http://example.com/"])).unwrap();
        assert!(config.is_local(&url("http://example.com/deep/page"), None));
        assert!(!config.is_local(&url("http://other.com/"), None));
    }

    #[test]
    fn test_scheme_ignored_for_locality() {
        let config = CrawlConfig::from_options(options(&["http://example.com/"])).unwrap();
        assert!(config.is_local(&url("https://example.com/secure"), None));
    }

    #[test]
    fn test_extra_accepted_hosts() {
        let mut opts = options(&["http://example.com/"]);
        opts.accepted_hosts = vec!["static.example.com".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();
        assert!(config.is_local(&url("http://static.example.com/app.js"), None));
    }

    #[test]
    fn test_multi_mode_scopes_hosts_per_origin() {
        let mut opts = options(&["http://a.com/", "http://b.com/"]);
        opts.multi = true;
        opts.accepted_hosts = vec!["shared.com".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();

        assert!(config.is_local(&url("http://a.com/x"), Some("a.com")));
        assert!(!config.is_local(&url("http://b.com/x"), Some("a.com")));
        assert!(config.is_local(&url("http://shared.com/x"), Some("a.com")));
        assert!(config.is_local(&url("http://shared.com/x"), Some("b.com")));
    }

    #[test]
    fn test_in_scope_depth_budget() {
        let mut opts = options(&["http://example.com/"]);
        opts.depth = Some(1);
        let config = CrawlConfig::from_options(opts).unwrap();
        let page = url("http://example.com/page");
        assert!(config.in_scope(&page, 0, None));
        assert!(!config.in_scope(&page, 1, None));
    }

    #[test]
    fn test_run_once_means_depth_zero() {
        let mut opts = options(&["http://example.com/"]);
        opts.run_once = true;
        let config = CrawlConfig::from_options(opts).unwrap();
        assert_eq!(config.max_depth, Some(0));
    }

    #[test]
    fn test_unbounded_depth() {
        let config = CrawlConfig::from_options(options(&["http://example.com/"])).unwrap();
        assert!(config.in_scope(&url("http://example.com/page"), 10_000, None));
    }

    #[test]
    fn test_fetchable_outside_host() {
        let mut opts = options(&["http://example.com/"]);
        let config = CrawlConfig::from_options(opts.clone()).unwrap();
        assert!(!config.fetchable(&url("http://other.com/img.png"), None));

        opts.test_outside = true;
        let config = CrawlConfig::from_options(opts).unwrap();
        assert!(config.fetchable(&url("http://other.com/img.png"), None));
    }

    #[test]
    fn test_ignored_prefix_blocks_fetch() {
        let mut opts = options(&["http://example.com/"]);
        opts.ignored_prefixes = vec!["http://example.com/private/".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();
        assert!(!config.fetchable(&url("http://example.com/private/page"), None));
        assert!(config.fetchable(&url("http://example.com/public"), None));
    }

    #[test]
    fn test_unsupported_type_is_fatal() {
        let mut opts = options(&["http://example.com/"]);
        opts.types = vec!["a".to_string(), "iframe".to_string()];
        assert!(matches!(
            CrawlConfig::from_options(opts),
            Err(CrawlError::UnsupportedElementType(_))
        ));
    }

    #[test]
    fn test_header_parsing() {
        let mut opts = options(&["http://example.com/"]);
        opts.headers = vec!["X-Token: secret".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();
        assert_eq!(
            config.worker.extra_headers,
            vec![("X-Token".to_string(), "secret".to_string())]
        );
    }

    #[test]
    fn test_malformed_header_is_fatal() {
        let mut opts = options(&["http://example.com/"]);
        opts.headers = vec!["not-a-header".to_string()];
        assert!(matches!(
            CrawlConfig::from_options(opts),
            Err(CrawlError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_all_pages_rules() {
        let mut opts = options(&["http://example.com/"]);
        opts.check_presence = vec!["Welcome".to_string()];
        opts.check_absence = vec!["regex:[Ee]rror".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();
        assert_eq!(config.checks.all_pages.text_presence.len(), 1);
        assert_eq!(config.checks.all_pages.text_absence.len(), 1);
    }

    #[test]
    fn test_scoped_rule_resolves_relative_path_and_promotes_start_url() {
        let mut opts = options(&["http://example.com/"]);
        opts.check_presence_once = vec!["/about,<h1>About us</h1>".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();

        let about = url("http://example.com/about");
        assert!(config.start_urls.contains(&about));
        assert_eq!(config.checks.rules_for(&about).html_presence.len(), 1);
        // The path must never be mistaken for a host
        assert!(!config.start_urls.contains(&url("http://about/")));
        // Other pages only see the (empty) all-pages pool
        assert!(config.checks.rules_for(&url("http://example.com/")).is_empty());
    }

    #[test]
    fn test_scoped_rule_with_absolute_url() {
        let mut opts = options(&["http://example.com/"]);
        opts.check_absence_once = vec!["http://example.com/legal,Confidential".to_string()];
        let config = CrawlConfig::from_options(opts).unwrap();

        let legal = url("http://example.com/legal");
        assert!(config.start_urls.contains(&legal));
        assert_eq!(config.checks.rules_for(&legal).text_absence.len(), 1);
    }

    #[test]
    fn test_worker_count_defaults_per_mode() {
        let config = CrawlConfig::from_options(options(&["http://example.com/"])).unwrap();
        assert_eq!(config.worker_count, 1);

        let mut opts = options(&["http://example.com/"]);
        opts.mode = WorkerMode::Task;
        let config = CrawlConfig::from_options(opts).unwrap();
        assert_eq!(config.worker_count, 1000);
    }
}
