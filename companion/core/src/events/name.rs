//! Event names and subscription patterns

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dot-delimited event name such as `festival.newyear`
///
/// The category is everything before the first dot; it selects the handler
/// that answers the event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventName(String);

impl EventName {
    /// Wrap a raw event name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Category part (before the first dot, or the whole name if there is none)
    #[must_use]
    pub fn category(&self) -> &str {
        category_of(&self.0)
    }

    /// Specific part (after the first dot), if any
    #[must_use]
    pub fn specific(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, rest)| rest)
    }

    /// The full name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Category of a raw event name
pub(crate) fn category_of(name: &str) -> &str {
    name.split_once('.').map_or(name, |(category, _)| category)
}

/// A subscription pattern
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// `*` - every event
    Any,
    /// `prefix.*` - every event whose name starts with `prefix.`
    Prefix(String),
    /// A literal event name
    Exact(String),
}

impl Pattern {
    /// Parse a pattern string
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::Any
        } else if let Some(prefix) = pattern.strip_suffix(".*") {
            Self::Prefix(prefix.to_string())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    /// Pattern that matches every event of a category
    pub fn category(category: impl Into<String>) -> Self {
        Self::Prefix(category.into())
    }

    /// Whether `event` is matched by this pattern
    #[must_use]
    pub fn matches(&self, event: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(name) => name == event,
            Self::Prefix(prefix) => event
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.')),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}.*"),
            Self::Exact(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}
