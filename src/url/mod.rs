//! URL normalization and resolution
//!
//! Every URL that enters the crawl is first turned into a [`UrlSplit`]: a
//! canonical structural form (scheme, host:port, path, query, fragment)
//! used as the dedup/equality key everywhere else in the crate.

use crate::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Attribute values that are never links: inline data and same-page anchors.
const NOT_LINK_PREFIXES: &[&str] = &["data", "#"];

/// A canonical structural split of a URL.
///
/// Wraps a parsed [`url::Url`]; the canonical form always carries a scheme.
/// Two splits are equal iff their serialized canonical forms match, which
/// makes this usable directly as a map key. The fragment is preserved and
/// participates in equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlSplit(Url);

impl UrlSplit {
    /// Normalizes a raw URL string into its canonical split.
    ///
    /// Rejects empty input with [`CrawlError::InvalidUrl`]. When the input
    /// has no scheme, `http://` is prefixed (`http:` if a network location
    /// is already present, as in `//example.com/page`). Idempotent:
    /// normalizing the serialized form of a split yields the same split.
    pub fn normalize(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CrawlError::InvalidUrl(String::new()));
        }

        match Url::parse(raw) {
            Ok(url) => Ok(Self(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let prefixed = if raw.starts_with("//") {
                    format!("http:{raw}")
                } else {
                    format!("http://{raw}")
                };
                Url::parse(&prefixed)
                    .map(Self)
                    .map_err(|_| CrawlError::InvalidUrl(raw.to_string()))
            }
            Err(_) => Err(CrawlError::InvalidUrl(raw.to_string())),
        }
    }

    /// Resolves a possibly-relative URL against this split's canonical form.
    ///
    /// Used to turn `href`/`src` attribute values into absolute targets.
    pub fn resolve(&self, raw: &str) -> Result<Self> {
        self.0
            .join(raw)
            .map(Self)
            .map_err(|_| CrawlError::InvalidUrl(raw.to_string()))
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Host and port (`host` or `host:port`); empty for URLs without a host.
    ///
    /// Default ports are dropped by the parser, so `example.com:80` under
    /// http compares equal to `example.com`.
    pub fn netloc(&self) -> String {
        match (self.0.host_str(), self.0.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.0.query()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.fragment()
    }

    /// The canonical serialized form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl From<Url> for UrlSplit {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for UrlSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Returns true if an attribute value is an actual link target, as opposed
/// to an embedded data URI or a same-page anchor.
pub fn is_link(value: &str) -> bool {
    !NOT_LINK_PREFIXES
        .iter()
        .any(|prefix| value.starts_with(prefix))
}
