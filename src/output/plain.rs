//! Plain-text crawl report
//!
//! Renders the final page map: a one-line summary, then the pages the
//! report type selects, each with its status message, any content check
//! violations, and optionally the sources that linked to it.

use crate::config::ReportType;
use crate::state::SitePage;
use crate::url::UrlSplit;
use crate::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub report_type: ReportType,
    pub show_source: bool,
    /// Wall-clock crawl duration in seconds, if known.
    pub elapsed: Option<f64>,
}

/// Renders the report to a string.
pub fn render_report(pages: &BTreeMap<UrlSplit, SitePage>, options: &ReportOptions) -> String {
    let total = pages.len();
    let error_count = pages.values().filter(|page| !page.is_ok()).count();

    let mut out = String::new();
    let _ = write!(
        out,
        "Crawled {total} url(s), {} ok, {error_count} with error(s)",
        total - error_count
    );
    if let Some(elapsed) = options.elapsed {
        let _ = write!(out, " in {elapsed:.2} second(s)");
    }
    out.push('\n');

    let selected: Vec<&SitePage> = match options.report_type {
        ReportType::Summary => Vec::new(),
        ReportType::Errors => pages.values().filter(|page| !page.is_ok()).collect(),
        ReportType::All => pages.values().collect(),
    };

    if !selected.is_empty() {
        out.push('\n');
        if options.report_type == ReportType::Errors {
            out.push_str("Error summary:\n\n");
        }
        for page in selected {
            render_page(&mut out, page, options.show_source);
        }
    }

    out
}

fn render_page(out: &mut String, page: &SitePage, show_source: bool) {
    let _ = writeln!(out, "  {}: {}", page.url_split, page.status_message());
    for message in page.content_messages() {
        let _ = writeln!(out, "    {message}");
    }
    if show_source {
        for source in &page.sources {
            let _ = writeln!(out, "    from {}", source.origin);
            if !source.origin_str.is_empty() {
                let _ = writeln!(out, "      {}", source.origin_str);
            }
        }
    }
}

/// Renders the report and writes it to `writer`.
pub fn write_report<W: Write>(
    writer: &mut W,
    pages: &BTreeMap<UrlSplit, SitePage>,
    options: &ReportOptions,
) -> Result<()> {
    writer.write_all(render_report(pages, options).as_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> BTreeMap<UrlSplit, SitePage> {
        let mut pages = BTreeMap::new();
        for (path, status) in [("/", 200), ("/missing", 404)] {
            let url = UrlSplit::normalize(&format!("http://example.com{path}")).unwrap();
            let mut page = SitePage::new(url.clone());
            page.status = Some(status);
            pages.insert(url, page);
        }
        pages
    }

    #[test]
    fn test_summary_line() {
        let report = render_report(&pages(), &ReportOptions::default());
        assert!(report.starts_with("Crawled 2 url(s), 1 ok, 1 with error(s)"));
    }

    #[test]
    fn test_errors_report_lists_only_broken_pages() {
        let report = render_report(&pages(), &ReportOptions::default());
        assert!(report.contains("http://example.com/missing: not found (404)"));
        assert!(!report.contains("http://example.com/: ok"));
    }

    #[test]
    fn test_summary_report_has_no_page_lines() {
        let options = ReportOptions {
            report_type: ReportType::Summary,
            ..Default::default()
        };
        let report = render_report(&pages(), &options);
        assert!(!report.contains("/missing"));
    }

    #[test]
    fn test_all_report_includes_ok_pages() {
        let options = ReportOptions {
            report_type: ReportType::All,
            ..Default::default()
        };
        let report = render_report(&pages(), &options);
        assert!(report.contains("http://example.com/: ok (200)"));
        assert!(report.contains("http://example.com/missing: not found (404)"));
    }

    #[test]
    fn test_show_source() {
        let mut pages = pages();
        let missing = UrlSplit::normalize("http://example.com/missing").unwrap();
        pages.get_mut(&missing).unwrap().add_source(crate::state::PageSource {
            origin: UrlSplit::normalize("http://example.com/").unwrap(),
            origin_str: "<a href=\"/missing\">gone</a>".to_string(),
        });

        let options = ReportOptions {
            show_source: true,
            ..Default::default()
        };
        let report = render_report(&pages, &options);
        assert!(report.contains("from http://example.com/"));
        assert!(report.contains("<a href=\"/missing\">gone</a>"));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        write_report(&mut file, &pages(), &ReportOptions::default()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Crawled 2 url(s)"));
    }

    #[test]
    fn test_elapsed_in_summary() {
        let options = ReportOptions {
            elapsed: Some(1.25),
            ..Default::default()
        };
        let report = render_report(&pages(), &options);
        assert!(report.contains("in 1.25 second(s)"));
    }
}
