//! Worker execution strategies
//!
//! A worker is one execution unit looping "receive task, fetch, parse,
//! check, send result" until it receives a stop message. Three strategies
//! share that contract and are picked at start-up:
//!
//! - [`WorkerMode::Task`]: tokio tasks on the orchestrator's
//!   current-thread runtime, cooperatively interleaved on one OS thread.
//! - [`WorkerMode::Thread`]: OS threads, each driving the same async loop
//!   on its own current-thread runtime with its own HTTP client.
//! - [`WorkerMode::Process`]: child `linksentry --worker` processes fed
//!   JSON lines over stdin/stdout, bridged to the queues by one pump
//!   thread per child.
//!
//! The strategy changes throughput and isolation, never crawl results.

use crate::check::check_content;
use crate::config::{CrawlConfig, WorkerConfig, WorkerMode};
use crate::crawler::parser::extract_links;
use crate::crawler::{
    build_http_client, fetch_url, ExceptionRecord, FetchOutcome, FetchResult, FetchTask,
    ResultSender, SharedTaskReceiver, WorkerMessage,
};
use crate::{CrawlError, Result};
use reqwest::Client;
use scraper::Html;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, Command, Stdio};
use std::time::Instant;

/// Runs one fetch task to completion
///
/// This is the whole worker contract: it never panics on bad input and
/// never returns an error; every failure mode is folded into the result.
///
/// # Arguments
///
/// * `client` - The HTTP client owned by this worker
/// * `config` - The worker configuration (auth, headers, timeout, kinds)
/// * `task` - The URL to fetch, with its depth and content check rules
///
/// # Returns
///
/// * `FetchResult` - Status, links, and violations on success; timeout or
///   exception fields set when no response was obtained
pub async fn run_task(client: &Client, config: &WorkerConfig, task: &FetchTask) -> FetchResult {
    let started = Instant::now();
    let outcome = fetch_url(client, config, &task.url_split).await;
    let response_time = started.elapsed().as_secs_f64();

    let (status, final_url, body, is_html) = match outcome {
        FetchOutcome::Timeout => {
            tracing::debug!("Timeout fetching {}", task.url_split);
            return FetchResult::failure(task, true, None);
        }
        FetchOutcome::Failed(record) => {
            tracing::debug!("Fetch of {} failed: {}", task.url_split, record.message);
            return FetchResult::failure(task, false, Some(record));
        }
        FetchOutcome::Response {
            status,
            final_url,
            body,
            is_html,
        } => (status, final_url, body, is_html),
    };

    let processing = Instant::now();
    let mut links = Vec::new();
    let mut missing_content = Vec::new();
    let mut erroneous_content = Vec::new();
    let wants_checks = !task.content_check.is_empty();

    // An empty HTML body still gets a document: a structural presence
    // rule must report missing, not silently pass.
    if is_html {
        let document = Html::parse_document(&body);
        if task.should_crawl {
            links = extract_links(&document, &final_url, config);
        }
        if wants_checks {
            let outcome = check_content(&body, Some(&document), &task.content_check);
            missing_content = outcome.missing_content;
            erroneous_content = outcome.erroneous_content;
        }
    } else if wants_checks {
        let outcome = check_content(&body, None, &task.content_check);
        missing_content = outcome.missing_content;
        erroneous_content = outcome.erroneous_content;
    }

    FetchResult {
        original_url_split: task.url_split.clone(),
        is_redirect: final_url != task.url_split,
        final_url_split: Some(final_url),
        status: Some(status),
        is_timeout: false,
        links,
        exception: None,
        is_html,
        depth: task.depth,
        response_time: Some(response_time),
        process_time: Some(processing.elapsed().as_secs_f64()),
        site_origin: task.site_origin.clone(),
        missing_content,
        erroneous_content,
    }
}

/// The shared worker loop: pull a message, run it, send the result back.
///
/// Exits on the stop message or when either queue closes. A worker that
/// cannot build its HTTP client still consumes tasks (answering each with
/// an error result) so the outstanding-task counter always reaches zero.
pub async fn worker_loop(rx: SharedTaskReceiver, tx: ResultSender, config: WorkerConfig) {
    let client = match build_http_client(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!("Worker failed to build HTTP client: {e}");
            None
        }
    };

    loop {
        let message = { rx.lock().await.recv().await };
        match message {
            Some(WorkerMessage::Task(task)) => {
                let result = match &client {
                    Some(client) => run_task(client, &config, &task).await,
                    None => FetchResult::failure(
                        &task,
                        false,
                        Some(ExceptionRecord {
                            kind: "client".to_string(),
                            message: "HTTP client unavailable".to_string(),
                        }),
                    ),
                };
                if tx.send(result).is_err() {
                    break;
                }
            }
            Some(WorkerMessage::Stop) | None => break,
        }
    }
}

/// A running worker pool; holds the handles needed to join it at drain.
pub struct WorkerPool {
    inner: PoolInner,
}

enum PoolInner {
    Tasks(Vec<tokio::task::JoinHandle<()>>),
    Threads(Vec<std::thread::JoinHandle<()>>),
}

impl WorkerPool {
    /// Spawns the pool for the configured execution mode.
    pub fn spawn(config: &CrawlConfig, rx: SharedTaskReceiver, tx: ResultSender) -> Result<Self> {
        let count = config.worker_count;
        tracing::info!("Starting {count} {} worker(s)", config.mode);

        let inner = match config.mode {
            WorkerMode::Task => {
                let handles = (0..count)
                    .map(|_| {
                        tokio::spawn(worker_loop(rx.clone(), tx.clone(), config.worker.clone()))
                    })
                    .collect();
                PoolInner::Tasks(handles)
            }

            WorkerMode::Thread => {
                let mut handles = Vec::with_capacity(count);
                for index in 0..count {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()?;
                    let rx = rx.clone();
                    let tx = tx.clone();
                    let worker_config = config.worker.clone();
                    let handle = std::thread::Builder::new()
                        .name(format!("fetch-worker-{index}"))
                        .spawn(move || runtime.block_on(worker_loop(rx, tx, worker_config)))
                        .map_err(CrawlError::WorkerSpawn)?;
                    handles.push(handle);
                }
                PoolInner::Threads(handles)
            }

            WorkerMode::Process => {
                let exe = std::env::current_exe().map_err(CrawlError::WorkerSpawn)?;
                let mut handles = Vec::with_capacity(count);
                for index in 0..count {
                    let child = spawn_worker_process(&exe, &config.worker)?;
                    let rx = rx.clone();
                    let tx = tx.clone();
                    let handle = std::thread::Builder::new()
                        .name(format!("worker-pump-{index}"))
                        .spawn(move || process_pump(child, rx, tx))
                        .map_err(CrawlError::WorkerSpawn)?;
                    handles.push(handle);
                }
                PoolInner::Threads(handles)
            }
        };

        Ok(Self { inner })
    }

    /// Waits for every worker to exit. Call after sending one stop message
    /// per worker.
    pub async fn shutdown(self) {
        match self.inner {
            PoolInner::Tasks(handles) => {
                for handle in handles {
                    let _ = handle.await;
                }
            }
            PoolInner::Threads(handles) => {
                for handle in handles {
                    let _ = handle.join();
                }
            }
        }
    }
}

fn spawn_worker_process(exe: &std::path::Path, config: &WorkerConfig) -> Result<Child> {
    let mut child = Command::new(exe)
        .arg("--worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(CrawlError::WorkerSpawn)?;

    // First line on the pipe is the worker configuration.
    if let Some(stdin) = child.stdin.as_mut() {
        let line = serde_json::to_string(config)
            .map_err(|e| CrawlError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
    }

    Ok(child)
}

/// Bridges the crawl queues to one child process, one task at a time.
///
/// If the child dies mid-task, a synthesized error result is sent so the
/// orchestrator's outstanding counter still reaches zero.
fn process_pump(mut child: Child, rx: SharedTaskReceiver, tx: ResultSender) {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
        tracing::error!("Worker process pipes missing");
        return;
    };
    let mut writer = BufWriter::new(stdin);
    let mut reader = BufReader::new(stdout);

    loop {
        let message = { rx.blocking_lock().blocking_recv() };
        match message {
            Some(WorkerMessage::Task(task)) => {
                let result = exchange_with_child(&mut writer, &mut reader, &task)
                    .unwrap_or_else(|e| {
                        FetchResult::failure(
                            &task,
                            false,
                            Some(ExceptionRecord {
                                kind: "worker".to_string(),
                                message: format!("worker process failed: {e}"),
                            }),
                        )
                    });
                if tx.send(result).is_err() {
                    break;
                }
            }
            Some(WorkerMessage::Stop) | None => break,
        }
    }

    // Closing stdin lets the child exit its read loop.
    drop(writer);
    let _ = child.wait();
}

fn exchange_with_child(
    writer: &mut impl Write,
    reader: &mut impl BufRead,
    task: &FetchTask,
) -> std::io::Result<FetchResult> {
    let line = serde_json::to_string(task)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{line}")?;
    writer.flush()?;

    let mut response = String::new();
    if reader.read_line(&mut response)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "worker process exited",
        ));
    }
    serde_json::from_str(&response)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Entry point for a `--worker` child process: read the configuration
/// line, then answer one result line per task line until stdin closes.
pub fn run_stdio_worker() -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let config_line = lines.next().ok_or(CrawlError::ChannelClosed)??;
    let config: WorkerConfig = serde_json::from_str(&config_line)
        .map_err(|e| CrawlError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let client = build_http_client(&config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let stdout = std::io::stdout();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let task: FetchTask = serde_json::from_str(&line)
            .map_err(|e| CrawlError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let result = runtime.block_on(run_task(&client, &config, &task));

        let mut out = stdout.lock();
        let response = serde_json::to_string(&result)
            .map_err(|e| CrawlError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        writeln!(out, "{response}")?;
        out.flush()?;
    }

    Ok(())
}
