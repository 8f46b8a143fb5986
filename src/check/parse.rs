//! Configuration-time parsing of content check rules
//!
//! A rule is either raw text (`Welcome`, `regex:W.lcome`) or an HTML
//! fragment (`<div class="hero">regex:Welcome</div>`). Single-page rules
//! carry a `path,rule` prefix that scopes them to one URL. Malformed rules
//! are fatal before the run starts.

use super::{compile_pattern, HtmlRule, Matcher, REGEX_PREFIX};
use crate::{CrawlError, Result};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;

/// A parsed rule, ready to evaluate.
#[derive(Debug, Clone)]
pub enum ParsedRule {
    Html(HtmlRule),
    Text(Matcher),
}

/// Splits a single-page rule of the form `path,rule` into its URL scope
/// and rule body. The path may be relative or absolute with a host.
pub fn split_scoped_rule(raw: &str) -> Result<(&str, &str)> {
    match raw.find(',') {
        Some(index) if index > 0 => Ok((&raw[..index], &raw[index + 1..])),
        _ => Err(CrawlError::ContentCheckParse {
            rule: raw.to_string(),
            message: "expected 'path,content'".to_string(),
        }),
    }
}

/// Parses one rule body into a [`ParsedRule`].
///
/// Bodies starting with `<` are parsed as an HTML fragment whose first
/// element provides the tag name, required attributes, and text
/// expectation; anything else is a raw text matcher. The `regex:` sentinel
/// is honored in both forms and resolved here, once.
pub fn parse_rule(raw: &str) -> Result<ParsedRule> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(CrawlError::ContentCheckParse {
            rule: raw.to_string(),
            message: "empty rule".to_string(),
        });
    }

    if body.starts_with('<') {
        parse_html_rule(body).map(ParsedRule::Html)
    } else {
        parse_matcher(body).map(ParsedRule::Text)
    }
}

fn parse_matcher(body: &str) -> Result<Matcher> {
    match body.strip_prefix(REGEX_PREFIX) {
        Some(pattern) => compile_pattern(pattern)
            .map(Matcher::Pattern)
            .map_err(|e| CrawlError::ContentCheckParse {
                rule: body.to_string(),
                message: e.to_string(),
            }),
        None => Ok(Matcher::Literal(body.to_string())),
    }
}

fn parse_html_rule(body: &str) -> Result<HtmlRule> {
    let fragment = Html::parse_fragment(body);
    let element = fragment
        .root_element()
        .children()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| CrawlError::ContentCheckParse {
            rule: body.to_string(),
            message: "no element found in HTML rule".to_string(),
        })?;

    let tag = element.value().name().to_string();
    let attrs: BTreeMap<String, String> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let text: String = element.text().collect();
    let content = if text.trim().is_empty() {
        None
    } else {
        Some(parse_matcher(text.trim())?)
    };

    Ok(HtmlRule { tag, attrs, content })
}
