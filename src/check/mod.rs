//! Content verification engine
//!
//! Pages can be checked for the presence or absence of content: either a
//! raw match against the body text (literal substring or regex) or an
//! HTML-structural match (tag name, required attributes, required text).
//! Unsatisfied presence rules and satisfied absence rules come back as
//! human-readable violation descriptions attached to the page result.
//!
//! Rules are parsed once at configuration time; the literal-vs-regex
//! decision is encoded in [`Matcher`] and never re-sniffed per match.

mod parse;

pub use parse::{parse_rule, split_scoped_rule, ParsedRule};

use crate::url::UrlSplit;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Sentinel prefix marking a rule body as a regular expression.
pub const REGEX_PREFIX: &str = "regex:";

/// A literal-or-regex text expectation, decided at rule parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Matcher {
    Literal(String),
    Pattern(
        #[serde(
            serialize_with = "serialize_regex",
            deserialize_with = "deserialize_regex"
        )]
        Regex,
    ),
}

impl Matcher {
    /// True if the expectation matches anywhere in a raw body.
    pub fn matches_body(&self, body: &str) -> bool {
        match self {
            Matcher::Literal(text) => body.contains(text),
            Matcher::Pattern(regex) => regex.is_match(body),
        }
    }

    /// True if the expectation matches an element's text content.
    ///
    /// Literals compare against the whitespace-trimmed text; patterns are
    /// searched within it.
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Matcher::Literal(expected) => text.trim() == expected,
            Matcher::Pattern(regex) => regex.is_match(text),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(text) => f.write_str(text),
            Matcher::Pattern(regex) => write!(f, "{REGEX_PREFIX}{}", regex.as_str()),
        }
    }
}

fn serialize_regex<S>(regex: &Regex, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(regex.as_str())
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Regex, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let pattern = String::deserialize(deserializer)?;
    compile_pattern(&pattern).map_err(serde::de::Error::custom)
}

/// Compiles a rule pattern with multi-line semantics, so `^`/`$` anchor on
/// lines of the fetched body rather than the whole document.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    regex::RegexBuilder::new(pattern).multi_line(true).build()
}

/// An HTML-structural rule: an element with this tag name, carrying at
/// least these attributes, whose text content satisfies the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlRule {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub content: Option<Matcher>,
}

impl HtmlRule {
    /// True if any element of the document satisfies this rule.
    pub fn matches(&self, document: &Html) -> bool {
        let selector = match Selector::parse(&self.tag) {
            Ok(selector) => selector,
            Err(_) => return false,
        };

        document.select(&selector).any(|element| {
            let attrs_ok = self
                .attrs
                .iter()
                .all(|(name, value)| element.value().attr(name) == Some(value.as_str()));
            if !attrs_ok {
                return false;
            }

            match &self.content {
                Some(matcher) => {
                    let text: String = element.text().collect();
                    matcher.matches_text(&text)
                }
                None => true,
            }
        })
    }
}

impl fmt::Display for HtmlRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (name, value) in &self.attrs {
            write!(f, " {name}=\"{value}\"")?;
        }
        write!(f, ">")?;
        if let Some(content) = &self.content {
            write!(f, "{content}")?;
        }
        write!(f, "</{}>", self.tag)
    }
}

/// The rules applicable to one fetched page.
///
/// This is the resolved union of the all-pages pool and the single-page
/// pool for the page's URL, carried inside the fetch task so any worker
/// strategy (including out-of-process) can evaluate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentCheck {
    pub html_presence: Vec<HtmlRule>,
    pub html_absence: Vec<HtmlRule>,
    pub text_presence: Vec<Matcher>,
    pub text_absence: Vec<Matcher>,
}

impl ContentCheck {
    pub fn is_empty(&self) -> bool {
        self.html_presence.is_empty()
            && self.html_absence.is_empty()
            && self.text_presence.is_empty()
            && self.text_absence.is_empty()
    }

    fn extend(&mut self, other: &ContentCheck) {
        self.html_presence.extend_from_slice(&other.html_presence);
        self.html_absence.extend_from_slice(&other.html_absence);
        self.text_presence.extend_from_slice(&other.text_presence);
        self.text_absence.extend_from_slice(&other.text_absence);
    }
}

/// All configured rules, partitioned at configuration time into the
/// all-pages pool (`*`) and per-URL pools keyed by canonical URL.
#[derive(Debug, Clone, Default)]
pub struct ContentCheckSet {
    pub all_pages: ContentCheck,
    pub by_url: HashMap<UrlSplit, ContentCheck>,
}

impl ContentCheckSet {
    pub fn is_empty(&self) -> bool {
        self.all_pages.is_empty() && self.by_url.is_empty()
    }

    /// The union of rule pools applicable to one URL.
    pub fn rules_for(&self, url: &UrlSplit) -> ContentCheck {
        let mut rules = self.all_pages.clone();
        if let Some(single) = self.by_url.get(url) {
            rules.extend(single);
        }
        rules
    }
}

/// Outcome of evaluating a rule set against a fetched page.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    /// Presence rules that found no match.
    pub missing_content: Vec<String>,
    /// Absence rules that found a match.
    pub erroneous_content: Vec<String>,
}

/// Evaluates every rule against a fetched body
///
/// HTML-structural rules are only evaluated when a parsed document is
/// available (the page was HTML); raw rules always run against the body.
///
/// # Arguments
///
/// * `body` - The decoded response body
/// * `document` - The parsed document, when the response was HTML
/// * `rules` - The rule set applicable to this page
///
/// # Returns
///
/// * `CheckOutcome` - Descriptions of unsatisfied presence rules
///   (`missing_content`) and satisfied absence rules (`erroneous_content`)
pub fn check_content(body: &str, document: Option<&Html>, rules: &ContentCheck) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();

    for matcher in &rules.text_presence {
        if !matcher.matches_body(body) {
            outcome.missing_content.push(matcher.to_string());
        }
    }
    for matcher in &rules.text_absence {
        if matcher.matches_body(body) {
            outcome.erroneous_content.push(matcher.to_string());
        }
    }

    if let Some(document) = document {
        for rule in &rules.html_presence {
            if !rule.matches(document) {
                outcome.missing_content.push(rule.to_string());
            }
        }
        for rule in &rules.html_absence {
            if rule.matches(document) {
                outcome.erroneous_content.push(rule.to_string());
            }
        }
    }

    outcome
}
