//! Knowledge retrieval engine
//!
//! Turns linked entities into a bounded evidence set:
//! - Field selection per entity type
//! - Graph fact extraction with relevance tiers
//! - Deduplication, topical filtering and capping
//! - Prompt assembly

mod extractor;
mod fact;
mod fields;
mod prompt;
mod ranker;

pub use extractor::GraphFactExtractor;
pub use fact::{truncate_value, Fact, Tier};
pub use fields::{FieldSelector, FieldSet};
pub use prompt::{PromptAssembler, NO_FACTS_PLACEHOLDER};
pub use ranker::{FactRanker, RankLimits};

use serde::{Deserialize, Serialize};

/// Extraction/ranking profile
///
/// `Rich` collects attribute and relationship facts and filters them to the
/// priority predicates; `Simplified` keeps attributes only, truncates less
/// aggressively and never filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalProfile {
    #[default]
    Rich,
    Simplified,
}

impl RetrievalProfile {
    /// Maximum characters of an attribute value embedded in a fact
    pub fn max_value_chars(&self) -> usize {
        match self {
            RetrievalProfile::Rich => 120,
            RetrievalProfile::Simplified => 200,
        }
    }

    pub fn priority_filter(&self) -> bool {
        matches!(self, RetrievalProfile::Rich)
    }

    pub fn collect_relations(&self) -> bool {
        matches!(self, RetrievalProfile::Rich)
    }
}
