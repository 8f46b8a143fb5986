//! Crawl orchestration
//!
//! The coordinator owns the frontier (which URLs have been seen, queued,
//! and crawled), the page map, and the outstanding-task counter that
//! decides when the crawl is over. Workers never touch shared state; all
//! bookkeeping happens here, on one thread, as results arrive.

use crate::config::CrawlConfig;
use crate::crawler::{
    crawl_queues, FetchResult, FetchTask, Link, ResultReceiver, TaskSender, WorkerMessage,
    WorkerPool,
};
use crate::state::{PageSource, SitePage, UrlStatus};
use crate::url::UrlSplit;
use crate::{CrawlError, Result};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

const PROGRESS_INTERVAL: usize = 10;

pub struct Coordinator {
    config: CrawlConfig,
    task_tx: TaskSender,
    result_rx: ResultReceiver,
    pool: WorkerPool,
    pages: BTreeMap<UrlSplit, SitePage>,
    status: HashMap<UrlSplit, UrlStatus>,
    outstanding: usize,
    pages_crawled: usize,
}

impl Coordinator {
    /// Builds the queues and spawns the worker pool. Must run inside a
    /// tokio runtime so task-mode workers have something to spawn onto.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let (task_tx, task_rx, result_tx, result_rx) = crawl_queues();
        let pool = WorkerPool::spawn(&config, task_rx, result_tx)?;
        Ok(Self {
            config,
            task_tx,
            result_rx,
            pool,
            pages: BTreeMap::new(),
            status: HashMap::new(),
            outstanding: 0,
            pages_crawled: 0,
        })
    }

    /// Drives the crawl to completion and returns the page map.
    pub async fn run(mut self) -> Result<BTreeMap<UrlSplit, SitePage>> {
        let started = Instant::now();
        self.seed();

        while self.outstanding > 0 {
            let result = self
                .result_rx
                .recv()
                .await
                .ok_or(CrawlError::ChannelClosed)?;
            self.outstanding -= 1;
            self.process_result(result);

            if self.pages_crawled % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Crawled {} page(s), {} outstanding",
                    self.pages_crawled,
                    self.outstanding
                );
            }
        }

        tracing::info!(
            "Crawl finished: {} page(s) in {:.2}s",
            self.pages_crawled,
            started.elapsed().as_secs_f64()
        );

        // Drain: one stop message per worker, then join the pool.
        for _ in 0..self.config.worker_count {
            let _ = self.task_tx.send(WorkerMessage::Stop);
        }
        let Self { pool, pages, .. } = self;
        pool.shutdown().await;
        Ok(pages)
    }

    /// Queues every start URL at depth zero. Start URLs always get
    /// crawled, whatever the depth limit says.
    fn seed(&mut self) {
        for start in self.config.start_urls.clone() {
            if self.status.contains_key(&start) {
                continue;
            }
            let origin = self.config.origin_for(&start);
            self.push_task(start, true, 0, origin);
        }
    }

    fn push_task(
        &mut self,
        url: UrlSplit,
        should_crawl: bool,
        depth: u32,
        site_origin: Option<String>,
    ) {
        let task = FetchTask {
            content_check: self.config.checks.rules_for(&url),
            url_split: url.clone(),
            should_crawl,
            depth,
            site_origin,
        };
        self.status.insert(url.clone(), UrlStatus::Queued);
        match self.task_tx.send(WorkerMessage::Task(task)) {
            Ok(()) => self.outstanding += 1,
            Err(_) => tracing::error!("All workers gone; dropping task for {url}"),
        }
    }

    /// One crawl step: mark the URL crawled, fold the result into its
    /// page, then walk the extracted links.
    fn process_result(&mut self, result: FetchResult) {
        self.status
            .insert(result.original_url_split.clone(), UrlStatus::Crawled);
        self.pages_crawled += 1;

        let origin = result.site_origin.as_deref();
        let is_local = self.config.is_local(&result.original_url_split, origin);
        let page = self
            .pages
            .entry(result.original_url_split.clone())
            .or_insert_with(|| SitePage::new(result.original_url_split.clone()));
        page.record_result(&result, is_local);
        tracing::debug!("{}: {}", page.url_split, page.status_message());

        for link in &result.links {
            self.process_link(link, &result);
        }
    }

    fn process_link(&mut self, link: &Link, result: &FetchResult) {
        let target = &link.url_split;
        let origin = result.site_origin.as_deref();
        let known = self.status.contains_key(target);

        // URLs the policy rejects outright leave no trace in the page map.
        if !known && !self.config.fetchable(target, origin) {
            return;
        }

        let source = PageSource {
            origin: result.original_url_split.clone(),
            origin_str: link.source_str.clone(),
        };
        self.pages
            .entry(target.clone())
            .or_insert_with(|| SitePage::new(target.clone()))
            .add_source(source);

        if !known {
            // Scope is judged on the source page's depth: a page at the
            // depth limit is still fetched, just not crawled for links.
            let should_crawl = self.config.in_scope(target, result.depth, origin);
            self.push_task(
                target.clone(),
                should_crawl,
                result.depth + 1,
                result.site_origin.clone(),
            );
        }
    }
}

/// Runs a crawl to completion on the current runtime.
pub async fn run_crawl(config: CrawlConfig) -> Result<BTreeMap<UrlSplit, SitePage>> {
    Coordinator::new(config)?.run().await
}

/// Synchronous crawl entry point
///
/// Builds a current-thread runtime and blocks on [`run_crawl`].
///
/// # Arguments
///
/// * `config` - The validated crawl configuration
///
/// # Returns
///
/// * `Ok(BTreeMap<UrlSplit, SitePage>)` - The final page map, one entry
///   per canonical URL that was fetched, keyed in sorted order
/// * `Err(CrawlError)` - Start-up failure (runtime or worker spawn); a
///   failing page never produces an error, only an erroneous entry
pub fn crawl(config: CrawlConfig) -> Result<BTreeMap<UrlSplit, SitePage>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_crawl(config))
}
