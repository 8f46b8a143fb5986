//! linksentry: a concurrent broken-link and content checker
//!
//! This crate crawls one or more websites, validates every discovered link
//! (anchors, images, scripts, stylesheets), runs optional content checks
//! against fetched pages, and reports broken links, timeouts, and content
//! violations. Fetch workers can run as lightweight tasks, OS threads, or
//! OS processes; the choice changes throughput and isolation, never results.

pub mod check;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for linksentry operations
///
/// Only start-time validation failures are surfaced through this type.
/// Anything that goes wrong inside a worker (transport errors, timeouts,
/// parse failures) is captured into the corresponding `FetchResult` and the
/// crawl continues.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("No start URL provided")]
    NoStartUrls,

    #[error("Unsupported element type: {0} (supported: a, img, script, link)")]
    UnsupportedElementType(String),

    #[error("Invalid content check rule '{rule}': {message}")]
    ContentCheckParse { rule: String, message: String },

    #[error("Invalid header '{0}' (expected 'Name: value')")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Result channel closed before the crawl finished")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for linksentry operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::{CrawlConfig, CrawlOptions, WorkerConfig, WorkerMode};
pub use crawler::{crawl, run_crawl, FetchResult, FetchTask, Link};
pub use state::{SitePage, UrlStatus};
pub use url::UrlSplit;
