//! Report rendering for finished crawls.

pub mod plain;

pub use plain::{render_report, write_report, ReportOptions};
