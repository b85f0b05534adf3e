//! Fact ranking - deduplicate, tier, filter, cap
//!
//! Direct facts always precede indirect ones. Indirect facts widen coverage
//! but drift off topic easily, so they only fill space the direct tier leaves.

use super::fact::{Fact, Tier};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Caps applied to the pooled candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankLimits {
    /// Maximum facts in the ranked output
    pub max_total: usize,
    /// Direct-fact count at which indirect facts are dropped entirely
    pub max_per_batch: usize,
}

impl Default for RankLimits {
    fn default() -> Self {
        Self {
            max_total: 50,
            max_per_batch: 30,
        }
    }
}

/// Ranks pooled candidate facts into bounded evidence
pub struct FactRanker {
    priority_predicates: BTreeSet<String>,
    limits: RankLimits,
}

impl FactRanker {
    /// An empty `priority_predicates` set disables topical filtering
    pub fn new(priority_predicates: BTreeSet<String>, limits: RankLimits) -> Self {
        Self {
            priority_predicates,
            limits,
        }
    }

    pub fn rank(&self, facts: Vec<Fact>) -> Vec<Fact> {
        let candidates = facts.len();

        // Direct facts claim a triple first so a triple seen in both tiers
        // survives only as direct.
        let mut seen: HashSet<&Fact> = HashSet::with_capacity(candidates);
        let mut direct: Vec<&Fact> = Vec::new();
        let mut indirect: Vec<&Fact> = Vec::new();
        for fact in facts.iter().filter(|f| f.tier == Tier::Direct) {
            if seen.insert(fact) {
                direct.push(fact);
            }
        }
        for fact in facts.iter().filter(|f| f.tier == Tier::Indirect) {
            if seen.insert(fact) {
                indirect.push(fact);
            }
        }

        if !self.priority_predicates.is_empty() {
            let on_topic = |f: &&Fact| self.priority_predicates.contains(&f.predicate);
            let direct_on_topic: Vec<&Fact> = direct.iter().copied().filter(on_topic).collect();
            let indirect_on_topic: Vec<&Fact> = indirect.iter().copied().filter(on_topic).collect();
            if !direct_on_topic.is_empty() || !indirect_on_topic.is_empty() {
                direct = direct_on_topic;
                indirect = indirect_on_topic;
            }
        }

        let per_batch = self.limits.max_per_batch.min(self.limits.max_total);
        if direct.len() >= per_batch {
            direct.truncate(per_batch);
            indirect.clear();
        } else {
            indirect.truncate(self.limits.max_total - direct.len());
        }

        let ranked: Vec<Fact> = direct.into_iter().chain(indirect).cloned().collect();
        debug!(candidates, kept = ranked.len(), "Ranked facts");
        ranked
    }
}
