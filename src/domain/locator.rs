//! Declarative locator model for drift-tolerant field extraction.
//!
//! The portal ships obfuscated utility classes that change between deploys,
//! so no field is tied to a single selector. Each field carries an ordered
//! cascade of [`LocatorStrategy`] entries; the resolver walks the cascade and
//! the first plausible hit wins. Visible labels ("Revenda", "Ver mais
//! produtos") are far more stable than class names, which is why label-text
//! queries are first-class here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How candidate elements are located within the current search scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorQuery {
    /// Standard CSS selector.
    Css(String),
    /// Elements whose direct text content contains the given literal.
    LabelText(String),
}

impl LocatorQuery {
    pub fn css(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }

    pub fn label(text: &str) -> Self {
        Self::LabelText(text.to_string())
    }
}

impl fmt::Display for LocatorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css:{selector}"),
            Self::LabelText(text) => write!(f, "label:{text}"),
        }
    }
}

/// What to read, or which element to derive, from a matched candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractMode {
    /// Trimmed text content of the matched element.
    Text,
    /// A named attribute of the matched element.
    Attribute(String),
    /// Text of the element immediately following the match. Covers the
    /// portal's label/value pairs ("Revenda" label, price paragraph next).
    FollowingText,
    /// The nearest enclosing element with the given tag name. Climbs from a
    /// label paragraph to the control that actually receives the click.
    AncestorTag(String),
}

/// One attempt at locating a field: a query, an extraction mode, and the
/// plausibility checks a hit must pass before it is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub query: LocatorQuery,
    pub mode: ExtractMode,
    /// Minimum character count for a value to count as plausible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Values containing this substring are placeholders and are skipped
    /// (inline `data:image` sources, for example).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_contains: Option<String>,
    /// Only all-digit values are plausible. Used for SKU codes, which share
    /// their container with promotional text.
    #[serde(default)]
    pub digits_only: bool,
}

impl LocatorStrategy {
    pub fn new(query: LocatorQuery, mode: ExtractMode) -> Self {
        Self {
            query,
            mode,
            min_length: None,
            reject_contains: None,
            digits_only: false,
        }
    }

    /// CSS selector, text content.
    pub fn css(selector: &str) -> Self {
        Self::new(LocatorQuery::css(selector), ExtractMode::Text)
    }

    /// CSS selector, named attribute.
    pub fn css_attr(selector: &str, attribute: &str) -> Self {
        Self::new(
            LocatorQuery::css(selector),
            ExtractMode::Attribute(attribute.to_string()),
        )
    }

    /// Label text, the labelled element itself.
    pub fn label(text: &str) -> Self {
        Self::new(LocatorQuery::label(text), ExtractMode::Text)
    }

    /// Label text, value read from the element following the label.
    pub fn label_following(text: &str) -> Self {
        Self::new(LocatorQuery::label(text), ExtractMode::FollowingText)
    }

    /// Label text, resolving to the nearest enclosing `tag` element.
    pub fn label_ancestor(text: &str, tag: &str) -> Self {
        Self::new(
            LocatorQuery::label(text),
            ExtractMode::AncestorTag(tag.to_string()),
        )
    }

    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    #[must_use]
    pub fn rejecting(mut self, needle: &str) -> Self {
        self.reject_contains = Some(needle.to_string());
        self
    }

    #[must_use]
    pub fn digits_only(mut self) -> Self {
        self.digits_only = true;
        self
    }

    /// Whether a candidate value satisfies this strategy's plausibility
    /// checks. The resolver skips implausible hits and keeps walking the
    /// cascade.
    pub fn is_plausible(&self, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        if let Some(min_length) = self.min_length {
            if trimmed.chars().count() < min_length {
                return false;
            }
        }
        if let Some(needle) = &self.reject_contains {
            if trimmed.contains(needle.as_str()) {
                return false;
            }
        }
        if self.digits_only && !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        true
    }
}

/// Ordered strategy cascade for a single field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, used in logs only.
    pub name: String,
    pub strategies: Vec<LocatorStrategy>,
}

impl FieldSpec {
    pub fn new(name: &str, strategies: Vec<LocatorStrategy>) -> Self {
        Self {
            name: name.to_string(),
            strategies,
        }
    }

    /// A field the current profile cannot locate at all. The resolver
    /// reports it as unresolved without touching the session.
    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::new())
    }
}
