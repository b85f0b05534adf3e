//! Fact triples and their relevance tier

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker appended to truncated attribute values
const TRUNCATION_MARKER: &str = "...";

/// How close a fact is to the queried entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// The queried entity is the subject
    Direct,
    /// The queried entity is one hop away from being the subject
    Indirect,
}

/// A (subject, predicate, object) statement pulled from the graph
///
/// Equality and hashing only consider the triple; the tier is metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub tier: Tier,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        tier: Tier,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            tier,
        }
    }

    pub fn direct(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, predicate, object, Tier::Direct)
    }

    pub fn indirect(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, predicate, object, Tier::Indirect)
    }

    pub fn is_direct(&self) -> bool {
        self.tier == Tier::Direct
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.predicate == other.predicate
            && self.object == other.object
    }
}

impl Eq for Fact {}

impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
        self.predicate.hash(state);
        self.object.hash(state);
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{},{}>", self.subject, self.predicate, self.object)
    }
}

/// Cut `value` to at most `max_chars` characters, marking the cut
pub fn truncate_value(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &value[..byte_idx], TRUNCATION_MARKER),
        None => value.to_string(),
    }
}
