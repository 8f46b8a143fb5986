//! Per-page crawl state
//!
//! [`SitePage`] is the mutable aggregate the orchestrator keeps per
//! canonical URL: the accumulated list of sources linking to it, plus the
//! fields filled in once when its fetch result arrives. It is owned
//! exclusively by the orchestrator; workers never see it.

use crate::crawler::{ExceptionRecord, FetchResult};
use crate::url::UrlSplit;
use std::fmt;

/// Frontier status of a canonical URL. Absence from the status map means
/// the URL is unseen; transitions are monotonic (unseen → queued → crawled)
/// and a URL is queued at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStatus {
    /// A fetch task was dispatched; the result is pending.
    Queued,
    /// The fetch result arrived; terminal.
    Crawled,
}

/// One discovered reference to a page: where it was linked from and the
/// serialized source element, used only for reporting.
#[derive(Debug, Clone)]
pub struct PageSource {
    pub origin: UrlSplit,
    pub origin_str: String,
}

/// The crawl result for one page, accumulated as the crawl progresses.
#[derive(Debug, Clone)]
pub struct SitePage {
    pub url_split: UrlSplit,
    /// Every source that linked here, in discovery order.
    pub sources: Vec<PageSource>,
    /// HTTP status; `None` when the fetch never produced a response.
    pub status: Option<u16>,
    pub is_timeout: bool,
    pub is_redirect: bool,
    pub exception: Option<ExceptionRecord>,
    pub is_html: bool,
    pub is_local: bool,
    /// Seconds spent waiting on the network.
    pub response_time: Option<f64>,
    /// Seconds spent parsing and checking.
    pub process_time: Option<f64>,
    pub site_origin: Option<String>,
    pub missing_content: Vec<String>,
    pub erroneous_content: Vec<String>,
}

impl SitePage {
    /// A freshly discovered page with no result yet.
    pub fn new(url_split: UrlSplit) -> Self {
        Self {
            url_split,
            sources: Vec::new(),
            status: None,
            is_timeout: false,
            is_redirect: false,
            exception: None,
            is_html: false,
            is_local: true,
            response_time: None,
            process_time: None,
            site_origin: None,
            missing_content: Vec::new(),
            erroneous_content: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: PageSource) {
        self.sources.push(source);
    }

    /// Fills in the result-derived fields; called exactly once per page,
    /// when its fetch result arrives.
    pub fn record_result(&mut self, result: &FetchResult, is_local: bool) {
        self.status = result.status;
        self.is_timeout = result.is_timeout;
        self.is_redirect = result.is_redirect;
        self.exception = result.exception.clone();
        self.is_html = result.is_html;
        self.is_local = is_local;
        self.response_time = result.response_time;
        self.process_time = result.process_time;
        self.site_origin = result.site_origin.clone();
        self.missing_content = result.missing_content.clone();
        self.erroneous_content = result.erroneous_content.clone();
    }

    /// A page is ok iff it produced a non-error status and passed every
    /// content check.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(status) if status < 400)
            && self.missing_content.is_empty()
            && self.erroneous_content.is_empty()
    }

    /// Human-readable status, distinguishing HTTP errors, timeouts,
    /// transport exceptions, and content check failures.
    pub fn status_message(&self) -> String {
        match self.status {
            Some(status) if status < 400 => self.ok_status_message(status),
            Some(404) => "not found (404)".to_string(),
            Some(status) => format!("error (status={status})"),
            None if self.is_timeout => "error (timeout)".to_string(),
            None => match &self.exception {
                Some(exception) => {
                    format!("error ({}): {}", exception.kind, exception.message)
                }
                None => "error".to_string(),
            },
        }
    }

    fn ok_status_message(&self, status: u16) -> String {
        let missing = !self.missing_content.is_empty();
        let erroneous = !self.erroneous_content.is_empty();
        match (missing, erroneous) {
            (true, false) => format!("error ({status}) missing content"),
            (false, true) => format!("error ({status}) erroneous content"),
            (true, true) => format!("error ({status}) missing and erroneous content"),
            (false, false) => format!("ok ({status})"),
        }
    }

    /// One line per content check violation.
    pub fn content_messages(&self) -> Vec<String> {
        self.missing_content
            .iter()
            .map(|content| format!("missing content: {content}"))
            .chain(
                self.erroneous_content
                    .iter()
                    .map(|content| format!("erroneous content: {content}")),
            )
            .collect()
    }
}

impl fmt::Display for SitePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.url_split, self.status_message())
    }
}
