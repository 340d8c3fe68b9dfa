//! Assertion variants and their evaluation against observed page state

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::page::Element;

/// Longest observed text quoted verbatim in a failure message
const MAX_QUOTED_TEXT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// Element is rendered
    Visible,

    /// Attribute exists and equals `value` exactly
    AttributeEquals { name: String, value: String },

    /// Attribute exists, any value
    AttributePresent { name: String },

    /// Raw text content contains `text` as-is
    TextContains { text: String },

    /// Raw text content equals `text` exactly
    TextEquals { text: String },

    /// At least one element matches
    NonEmpty,

    /// More than `length` elements match
    LengthGreaterThan { length: usize },

    /// Computed CSS `property` is anything but `value`
    CssNotEqual { property: String, value: String },
}

/// The value an assertion is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Observed<'a> {
    Element(&'a Element),
    Count(usize),
    Text(&'a str),
}

impl Assertion {
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Assertion::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attribute_present(name: impl Into<String>) -> Self {
        Assertion::AttributePresent { name: name.into() }
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Assertion::TextContains { text: text.into() }
    }

    pub fn text_equals(text: impl Into<String>) -> Self {
        Assertion::TextEquals { text: text.into() }
    }

    pub fn length_greater_than(length: usize) -> Self {
        Assertion::LengthGreaterThan { length }
    }

    pub fn css_not_equal(property: impl Into<String>, value: impl Into<String>) -> Self {
        Assertion::CssNotEqual {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Whether this assertion looks at the match set rather than one element
    pub fn is_collection(&self) -> bool {
        matches!(self, Assertion::NonEmpty | Assertion::LengthGreaterThan { .. })
    }

    /// CSS property the driver has to resolve for this assertion, if any
    pub fn css_property(&self) -> Option<&str> {
        match self {
            Assertion::CssNotEqual { property, .. } => Some(property),
            _ => None,
        }
    }

    pub fn evaluate(&self, observed: Observed<'_>) -> bool {
        match (self, observed) {
            (Assertion::Visible, Observed::Element(el)) => el.visible,
            (Assertion::AttributeEquals { name, value }, Observed::Element(el)) => {
                el.attribute(name) == Some(value.as_str())
            }
            (Assertion::AttributePresent { name }, Observed::Element(el)) => {
                el.attribute(name).is_some()
            }
            (Assertion::TextContains { text }, Observed::Element(el)) => el.text.contains(text.as_str()),
            (Assertion::TextContains { text }, Observed::Text(actual)) => actual.contains(text.as_str()),
            (Assertion::TextEquals { text }, Observed::Element(el)) => el.text == *text,
            (Assertion::TextEquals { text }, Observed::Text(actual)) => actual == text.as_str(),
            (Assertion::NonEmpty, Observed::Count(n)) => n > 0,
            (Assertion::LengthGreaterThan { length }, Observed::Count(n)) => n > *length,
            (Assertion::CssNotEqual { property, value }, Observed::Element(el)) => {
                el.style(property)
                    .map(|actual| !actual.trim().eq_ignore_ascii_case(value.trim()))
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Human-readable form of what the assertion expects
    pub fn expected(&self) -> String {
        match self {
            Assertion::Visible => "visible".to_string(),
            Assertion::AttributeEquals { name, value } => format!("{}=\"{}\"", name, value),
            Assertion::AttributePresent { name } => format!("attribute {} present", name),
            Assertion::TextContains { text } => format!("text containing \"{}\"", text),
            Assertion::TextEquals { text } => format!("text \"{}\"", text),
            Assertion::NonEmpty => "at least 1 element".to_string(),
            Assertion::LengthGreaterThan { length } => format!("more than {} elements", length),
            Assertion::CssNotEqual { property, value } => format!("{} not {}", property, value),
        }
    }

    /// Render the part of `observed` this assertion looks at
    pub fn observed(&self, observed: Observed<'_>) -> String {
        match (self, observed) {
            (_, Observed::Count(n)) => format!("{} element{}", n, if n == 1 { "" } else { "s" }),
            (_, Observed::Text(text)) => format!("text \"{}\"", quote(text)),
            (Assertion::Visible, Observed::Element(el)) => {
                (if el.visible { "visible" } else { "hidden" }).to_string()
            }
            (
                Assertion::AttributeEquals { name, .. } | Assertion::AttributePresent { name },
                Observed::Element(el),
            ) => match el.attribute(name) {
                Some(value) => format!("{}=\"{}\"", name, value),
                None => format!("attribute {} absent", name),
            },
            (Assertion::CssNotEqual { property, .. }, Observed::Element(el)) => {
                format!("{} {}", property, el.style(property).unwrap_or("unset"))
            }
            (_, Observed::Element(el)) => format!("text \"{}\"", quote(&el.text)),
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expected())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn quote(text: &str) -> String {
    let text = normalize_whitespace(text);
    if text.chars().count() > MAX_QUOTED_TEXT {
        let cut: String = text.chars().take(MAX_QUOTED_TEXT).collect();
        format!("{}…", cut)
    } else {
        text
    }
}
