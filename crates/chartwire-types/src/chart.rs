//! Chart references and the placeholder token.

use std::fmt;

use serde::{Deserialize, Serialize};

const PLACEHOLDER_PREFIX: &str = "[CHART_";
const PLACEHOLDER_SUFFIX: &str = "]";

/// An opaque pointer to a chart image produced upstream.
///
/// Supplied by the caller and consumed by value when fetched; the pipeline
/// never mutates a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartReference {
    /// Unique within a request. See [`is_valid_chart_id`] for the accepted form.
    #[serde(alias = "chartId")]
    pub id: String,

    /// Human-readable title, used in markers and captions.
    #[serde(default, alias = "titleText", alias = "title_text")]
    pub title: String,

    /// Storage locator (`s3://`, `https://`, `file://`).
    pub locator: String,

    /// Upstream section key such as `_01_00_Sales Overview_header`. Used
    /// to derive a page when no explicit assignment is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl ChartReference {
    /// Build a reference with no section key.
    pub fn new(id: impl Into<String>, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locator: locator.into(),
            section: None,
        }
    }

    /// Title for display, falling back to the id when the title is blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// Derive a page name from an upstream section key.
///
/// Section keys look like `_<major>_<minor>_<page>_<suffix>`; the page is the
/// fourth `_`-separated field. Returns `None` for keys that do not follow
/// the layout.
pub fn page_from_section_key(key: &str) -> Option<&str> {
    let page = key.split('_').nth(3)?;
    if page.trim().is_empty() {
        None
    } else {
        Some(page)
    }
}

/// The textual token `[CHART_<id>]` standing in for a chart in the template.
///
/// Generated exactly once per artifact and copied verbatim into every view
/// that refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placeholder(String);

impl Placeholder {
    /// Build the placeholder for a chart id.
    pub fn for_chart(chart_id: &str) -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{chart_id}{PLACEHOLDER_SUFFIX}"))
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Placeholder {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Characters that would end a placeholder or narrative anchor early, or
/// turn an id into a path.
const FORBIDDEN_ID_CHARS: &[char] = &['[', ']', '{', '}', '/', '\\'];

/// Whether a chart id can be embedded in a placeholder and an anchor
/// unambiguously and used as a file stem.
///
/// The accepted set matches the anchor pattern `{{chart:<id>}}`: no
/// brackets, braces or whitespace. Path separators and `..` are refused too.
pub fn is_valid_chart_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains("..")
        && !id
            .chars()
            .any(|c| FORBIDDEN_ID_CHARS.contains(&c) || c.is_whitespace() || c.is_control())
}
