//! linksentry main entry point
//!
//! This is the command-line interface for the linksentry link checker.

use clap::Parser;
use linksentry::config::{CrawlConfig, CrawlOptions, ReportType, DEFAULT_TIMEOUT_SECS};
use linksentry::crawler::{crawl, run_stdio_worker};
use linksentry::output::{write_report, ReportOptions};
use linksentry::WorkerMode;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// linksentry: a concurrent broken-link and content checker
///
/// Crawls one or more websites, validates every discovered link, and
/// reports broken links, timeouts, and content check violations.
#[derive(Parser, Debug)]
#[command(name = "linksentry")]
#[command(version)]
#[command(about = "Crawl a site and report broken links", long_about = None)]
struct Cli {
    /// URLs where the crawl starts
    #[arg(value_name = "URL", required_unless_present = "worker")]
    urls: Vec<String>,

    /// Fetch resources on other hosts without crawling them
    #[arg(short = 'O', long)]
    test_outside: bool,

    /// Additional hosts considered part of the site
    #[arg(short = 'H', long, value_name = "HOST", value_delimiter = ',')]
    accepted_hosts: Vec<String>,

    /// URL prefix to skip entirely (repeatable)
    #[arg(short, long, value_name = "PREFIX")]
    ignore: Vec<String>,

    /// Username for basic authentication
    #[arg(short, long)]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(short, long)]
    password: Option<String>,

    /// Treat each start URL as an independent site
    #[arg(short = 'M', long)]
    multi: bool,

    /// Extra request header as 'Name: value' (repeatable)
    #[arg(short = 'D', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Element types to extract links from
    #[arg(
        short = 't',
        long,
        value_name = "TYPE",
        value_delimiter = ',',
        default_value = "a,img,script,link"
    )]
    types: Vec<String>,

    /// Request timeout in seconds
    #[arg(short = 'T', long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Do not trim whitespace around extracted URLs
    #[arg(short = 'C', long)]
    strict: bool,

    /// Only crawl the start pages
    #[arg(short = 'N', long)]
    run_once: bool,

    /// Maximum crawl depth (unbounded by default)
    #[arg(short, long, value_name = "DEPTH")]
    depth: Option<u32>,

    /// Trust the server-declared encoding when decoding bodies
    #[arg(short = 'e', long)]
    prefer_server_encoding: bool,

    /// Require this text or element on every crawled page (repeatable)
    #[arg(long, value_name = "RULE")]
    check_presence: Vec<String>,

    /// Forbid this text or element on every crawled page (repeatable)
    #[arg(long, value_name = "RULE")]
    check_absence: Vec<String>,

    /// Require content on one page, as 'URL,RULE' (repeatable)
    #[arg(long, value_name = "URL,RULE")]
    check_presence_once: Vec<String>,

    /// Forbid content on one page, as 'URL,RULE' (repeatable)
    #[arg(long, value_name = "URL,RULE")]
    check_absence_once: Vec<String>,

    /// Number of workers (default depends on the mode)
    #[arg(short, long, value_name = "COUNT")]
    workers: Option<usize>,

    /// Worker execution model
    #[arg(short, long, value_name = "MODE", default_value = "thread")]
    mode: WorkerMode,

    /// Report format
    #[arg(short = 'f', long, value_name = "FORMAT", default_value = "plain")]
    format: String,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Which pages to list in the report
    #[arg(long, value_name = "TYPE", default_value = "errors")]
    report_type: ReportType,

    /// Show the sources linking to each reported page
    #[arg(short = 'S', long)]
    show_source: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run as a fetch worker child process (internal, used by process mode)
    #[arg(long, hide = true)]
    worker: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.worker {
        // Stdout belongs to the worker protocol; leave logging off.
        run_stdio_worker()?;
        return Ok(());
    }

    setup_logging(cli.verbose);

    if cli.format != "plain" {
        anyhow::bail!("unknown report format '{}' (expected plain)", cli.format);
    }

    let options = CrawlOptions {
        start_urls: cli.urls,
        accepted_hosts: cli.accepted_hosts,
        ignored_prefixes: cli.ignore,
        test_outside: cli.test_outside,
        multi: cli.multi,
        username: cli.username,
        password: cli.password,
        types: cli.types,
        timeout_secs: cli.timeout,
        strict_mode: cli.strict,
        prefer_server_encoding: cli.prefer_server_encoding,
        headers: cli.headers,
        depth: cli.depth,
        run_once: cli.run_once,
        workers: cli.workers,
        mode: cli.mode,
        check_presence: cli.check_presence,
        check_absence: cli.check_absence,
        check_presence_once: cli.check_presence_once,
        check_absence_once: cli.check_absence_once,
    };
    let config = CrawlConfig::from_options(options)?;

    let started = Instant::now();
    let pages = crawl(config)?;
    let report_options = ReportOptions {
        report_type: cli.report_type,
        show_source: cli.show_source,
        elapsed: Some(started.elapsed().as_secs_f64()),
    };

    match &cli.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            write_report(&mut file, &pages, &report_options)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => write_report(&mut std::io::stdout(), &pages, &report_options)?,
    }

    if pages.values().any(|page| !page.is_ok()) {
        std::process::exit(1);
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("linksentry=warn"),
        1 => EnvFilter::new("linksentry=info,warn"),
        2 => EnvFilter::new("linksentry=debug,info"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
