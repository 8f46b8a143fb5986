//! Link extraction from HTML pages
//!
//! Walks the configured element kinds (`a`, `img`, `script`, `link`),
//! reads each one's link attribute (`href` or `src`), and resolves it
//! against the page's final URL. Fragment references, embedded data, and
//! malformed URLs are skipped silently: a page full of broken markup must
//! never fail the crawl.

use crate::config::WorkerConfig;
use crate::crawler::Link;
use crate::url::{is_link, UrlSplit};
use scraper::{Html, Selector};

/// Extracts every candidate link from a parsed page.
///
/// `base` must be the page's final (post-redirect) URL so relative targets
/// resolve to where the server actually serves them from.
pub fn extract_links(document: &Html, base: &UrlSplit, config: &WorkerConfig) -> Vec<Link> {
    let mut links = Vec::new();

    for kind in &config.element_kinds {
        let selector = match Selector::parse(&format!("{}[{}]", kind.tag(), kind.attribute())) {
            Ok(selector) => selector,
            Err(_) => continue,
        };

        for element in document.select(&selector) {
            let Some(raw) = element.value().attr(kind.attribute()) else {
                continue;
            };
            let raw = if config.strict_mode { raw } else { raw.trim() };

            if raw.is_empty() || !is_link(raw) {
                continue;
            }

            let target = match base.resolve(raw) {
                Ok(target) => target,
                Err(_) => {
                    tracing::debug!("Skipping malformed URL {:?} on {}", raw, base);
                    continue;
                }
            };

            // The pre-resolution form, when it is itself a valid URL;
            // relative targets fall back to the resolved one.
            let original = UrlSplit::normalize(raw).unwrap_or_else(|_| target.clone());

            links.push(Link {
                kind: *kind,
                url_split: target,
                original_url_split: original,
                source_str: element.html(),
            });
        }
    }

    links
}
