//! Configuration types
//!
//! [`CrawlOptions`] is the raw option set the CLI (or an API caller) fills
//! in; [`crate::config::CrawlConfig`] is the validated form built from it
//! once at start-up and passed by reference into the orchestrator and the
//! crawl policy. There is no process-wide mutable configuration state.

use crate::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Default fetch timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Element kinds the link extractor understands, with their link attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    A,
    Img,
    Script,
    Link,
}

impl ElementKind {
    pub const ALL: [ElementKind; 4] = [
        ElementKind::A,
        ElementKind::Img,
        ElementKind::Script,
        ElementKind::Link,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::A => "a",
            ElementKind::Img => "img",
            ElementKind::Script => "script",
            ElementKind::Link => "link",
        }
    }

    /// The attribute holding this element's link target.
    pub fn attribute(self) -> &'static str {
        match self {
            ElementKind::A | ElementKind::Link => "href",
            ElementKind::Img | ElementKind::Script => "src",
        }
    }

    /// Parses a tag name; unknown names are a fatal configuration error.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            "a" => Ok(ElementKind::A),
            "img" => Ok(ElementKind::Img),
            "script" => Ok(ElementKind::Script),
            "link" => Ok(ElementKind::Link),
            other => Err(CrawlError::UnsupportedElementType(other.to_string())),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Execution strategy for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// A fixed pool of OS threads, each with its own HTTP client.
    #[default]
    Thread,
    /// A fixed pool of child processes fed over JSON pipes.
    Process,
    /// A large pool of cooperatively scheduled tasks sharing one thread.
    Task,
}

impl WorkerMode {
    /// Default pool size when `--workers` is not given.
    ///
    /// Task workers are cheap, so that mode defaults to a large pool.
    pub fn default_workers(self) -> usize {
        match self {
            WorkerMode::Thread | WorkerMode::Process => 1,
            WorkerMode::Task => 1000,
        }
    }
}

impl std::str::FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "thread" => Ok(WorkerMode::Thread),
            "process" => Ok(WorkerMode::Process),
            "task" => Ok(WorkerMode::Task),
            other => Err(format!(
                "unknown worker mode '{other}' (expected thread, process, or task)"
            )),
        }
    }
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerMode::Thread => "thread",
            WorkerMode::Process => "process",
            WorkerMode::Task => "task",
        })
    }
}

/// Which pages the report lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportType {
    /// Summary plus erroneous links only.
    #[default]
    Errors,
    /// Summary only.
    Summary,
    /// Summary plus every visited link.
    All,
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "errors" => Ok(ReportType::Errors),
            "summary" => Ok(ReportType::Summary),
            "all" => Ok(ReportType::All),
            other => Err(format!(
                "unknown report type '{other}' (expected errors, summary, or all)"
            )),
        }
    }
}

/// Per-worker configuration, fully self-contained so it can cross the
/// process boundary as the first message on a worker pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Element kinds to extract links from while crawling.
    pub element_kinds: Vec<ElementKind>,
    /// Seconds to wait before a fetch is abandoned and reported as timeout.
    pub timeout_secs: u64,
    /// Do not trim whitespace around href/src attribute values.
    pub strict_mode: bool,
    /// Trust the server-declared charset instead of assuming UTF-8.
    pub prefer_server_encoding: bool,
    /// Extra request headers as (name, value) pairs.
    pub extra_headers: Vec<(String, String)>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            element_kinds: ElementKind::ALL.to_vec(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_mode: false,
            prefer_server_encoding: false,
            extra_headers: Vec::new(),
        }
    }
}

/// Hosts considered part of the site being crawled.
///
/// Single-site mode uses one global set (every start URL host plus any
/// `--accepted-hosts` extras). Multi-site mode keys a set per site origin:
/// that origin's own host plus the globally declared extras.
#[derive(Debug, Clone)]
pub enum AcceptedHosts {
    Single(HashSet<String>),
    Multi(HashMap<String, HashSet<String>>),
}

impl AcceptedHosts {
    /// True if `netloc` belongs to the site identified by `origin`.
    ///
    /// Comparison is by host:port only; scheme is deliberately ignored, so
    /// http and https variants of a host count as the same site.
    pub fn contains(&self, netloc: &str, origin: Option<&str>) -> bool {
        match self {
            AcceptedHosts::Single(hosts) => hosts.contains(netloc),
            AcceptedHosts::Multi(by_origin) => match origin {
                Some(origin) => by_origin
                    .get(origin)
                    .map_or(false, |hosts| hosts.contains(netloc)),
                None => by_origin.contains_key(netloc),
            },
        }
    }
}

/// Raw, unvalidated options; the CLI layer fills this in.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub start_urls: Vec<String>,
    /// Additional hosts considered local.
    pub accepted_hosts: Vec<String>,
    /// URL prefixes that are never fetched.
    pub ignored_prefixes: Vec<String>,
    /// Fetch (but never crawl) resources on non-local hosts.
    pub test_outside: bool,
    /// Treat every start URL as a separate site.
    pub multi: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Tag names to extract links from (default: a, img, script, link).
    pub types: Vec<String>,
    pub timeout_secs: u64,
    pub strict_mode: bool,
    pub prefer_server_encoding: bool,
    /// Raw `Name: value` header lines.
    pub headers: Vec<String>,
    /// Maximum crawl depth; `None` is unbounded.
    pub depth: Option<u32>,
    /// Only crawl the start pages (equivalent to depth 0).
    pub run_once: bool,
    pub workers: Option<usize>,
    pub mode: WorkerMode,
    pub check_presence: Vec<String>,
    pub check_absence: Vec<String>,
    pub check_presence_once: Vec<String>,
    pub check_absence_once: Vec<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            accepted_hosts: Vec::new(),
            ignored_prefixes: Vec::new(),
            test_outside: false,
            multi: false,
            username: None,
            password: None,
            types: ElementKind::ALL.iter().map(ToString::to_string).collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_mode: false,
            prefer_server_encoding: false,
            headers: Vec::new(),
            depth: None,
            run_once: false,
            workers: None,
            mode: WorkerMode::default(),
            check_presence: Vec::new(),
            check_absence: Vec::new(),
            check_presence_once: Vec::new(),
            check_absence_once: Vec::new(),
        }
    }
}
