//! Crawl state owned by the orchestrator

mod page;

pub use page::{PageSource, SitePage, UrlStatus};
