//! Crawl engine: orchestrator, workers, fetcher, and link extraction
//!
//! Data flows orchestrator → input queue → worker → output queue →
//! orchestrator; newly accepted links close the loop by re-entering the
//! input queue. Everything that crosses a queue is a plain, owned,
//! serializable value — workers may run out of process, so no record may
//! carry shared references or live error objects.

pub mod coordinator;
pub mod fetcher;
pub mod parser;
pub mod worker;

pub use coordinator::{crawl, run_crawl, Coordinator};
pub use fetcher::{build_http_client, fetch_url, FetchOutcome};
pub use worker::{run_stdio_worker, run_task, WorkerPool};

use crate::check::ContentCheck;
use crate::config::ElementKind;
use crate::url::UrlSplit;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A captured failure, flattened to plain data so it can cross an
/// isolation boundary. Live error objects never leave a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// Short failure class: "timeout", "connect", "decode", ...
    pub kind: String,
    pub message: String,
}

/// A discovered reference from one page to another resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// The element the link came from.
    pub kind: ElementKind,
    /// Resolved absolute target.
    pub url_split: UrlSplit,
    /// The target before resolution, as written in the attribute.
    pub original_url_split: UrlSplit,
    /// Serialized source element, used only for reporting.
    pub source_str: String,
}

/// Worker input: one URL to fetch, fully self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTask {
    pub url_split: UrlSplit,
    /// Crawl (extract links) or only verify existence.
    pub should_crawl: bool,
    /// Link hops from the start URL that discovered this page.
    pub depth: u32,
    /// Site-origin netloc in multi-site mode.
    pub site_origin: Option<String>,
    /// The content check rules applicable to exactly this URL.
    pub content_check: ContentCheck,
}

/// Worker output: everything the orchestrator needs to update crawl state.
/// All failure is encoded in fields; a worker never raises past this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub original_url_split: UrlSplit,
    /// URL after redirects; `None` when no response was obtained.
    pub final_url_split: Option<UrlSplit>,
    pub status: Option<u16>,
    pub is_timeout: bool,
    pub is_redirect: bool,
    /// Extracted links, in document order. Empty unless the task asked to
    /// crawl and the body was HTML.
    pub links: Vec<Link>,
    pub exception: Option<ExceptionRecord>,
    pub is_html: bool,
    pub depth: u32,
    /// Network wait in seconds.
    pub response_time: Option<f64>,
    /// Parse + check time in seconds.
    pub process_time: Option<f64>,
    pub site_origin: Option<String>,
    pub missing_content: Vec<String>,
    pub erroneous_content: Vec<String>,
}

impl FetchResult {
    /// A result for a fetch that produced no response at all.
    pub fn failure(task: &FetchTask, is_timeout: bool, exception: Option<ExceptionRecord>) -> Self {
        Self {
            original_url_split: task.url_split.clone(),
            final_url_split: None,
            status: None,
            is_timeout,
            is_redirect: false,
            links: Vec::new(),
            exception,
            is_html: false,
            depth: task.depth,
            response_time: None,
            process_time: None,
            site_origin: task.site_origin.clone(),
            missing_content: Vec::new(),
            erroneous_content: Vec::new(),
        }
    }
}

/// Message on the task queue; one `Stop` is sent per worker at drain time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerMessage {
    Task(FetchTask),
    Stop,
}

pub type TaskSender = mpsc::UnboundedSender<WorkerMessage>;
/// The input queue receiver, shared by all workers in the pool.
pub type SharedTaskReceiver = Arc<Mutex<mpsc::UnboundedReceiver<WorkerMessage>>>;
pub type ResultSender = mpsc::UnboundedSender<FetchResult>;
pub type ResultReceiver = mpsc::UnboundedReceiver<FetchResult>;

/// Creates the two crawl queues: task (orchestrator → workers) and result
/// (workers → orchestrator).
pub fn crawl_queues() -> (TaskSender, SharedTaskReceiver, ResultSender, ResultReceiver) {
    let (task_tx, task_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    (task_tx, Arc::new(Mutex::new(task_rx)), result_tx, result_rx)
}
