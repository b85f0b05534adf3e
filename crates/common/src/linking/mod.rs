//! Entity linking
//!
//! Finds knowledge-base entities mentioned in a question. The orchestrator
//! only sees the `EntityLinker` trait; `DictionaryLinker` is the vocabulary
//! based implementation the binaries use.

use crate::errors::{AppError, Result};
use aho_corasick::{AhoCorasick, MatchKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// One entity mentioned in a question with every type it may denote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub types: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Linked entities in order of first mention
pub type LinkedEntities = Vec<Entity>;

/// Trait for recognizing entities in a question
#[async_trait]
pub trait EntityLinker: Send + Sync {
    async fn link(&self, question: &str) -> Result<LinkedEntities>;
}

/// Vocabulary matcher over per-type term lists
pub struct DictionaryLinker {
    matcher: Option<AhoCorasick>,
    /// Terms indexed by automaton pattern id
    terms: Vec<String>,
    /// Types per term, in vocabulary load order
    types: HashMap<String, Vec<String>>,
}

impl DictionaryLinker {
    /// Load every `<entity type>.txt` file in `dir`
    ///
    /// One term per line; blank lines are ignored.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| AppError::Configuration {
            message: format!("Failed to read dictionary directory {}: {}", dir.display(), e),
        })?;

        let mut vocabularies = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(entity_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            let terms: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();

            debug!(entity_type = %entity_type, terms = terms.len(), "Loaded vocabulary");
            vocabularies.insert(entity_type.to_string(), terms);
        }

        if vocabularies.is_empty() {
            warn!(dir = %dir.display(), "No vocabulary files found; every question will link to nothing");
        }

        Self::from_vocabularies(vocabularies)
    }

    /// Build from in-memory vocabularies keyed by entity type
    pub fn from_vocabularies<I, T>(vocabularies: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, T)>,
        T: IntoIterator<Item = String>,
    {
        let mut terms: Vec<String> = Vec::new();
        let mut types: HashMap<String, Vec<String>> = HashMap::new();

        for (entity_type, vocabulary) in vocabularies {
            for term in vocabulary {
                let term = term.trim().to_string();
                if term.is_empty() {
                    continue;
                }
                let term_types = types.entry(term.clone()).or_insert_with(|| {
                    terms.push(term.clone());
                    Vec::new()
                });
                if !term_types.contains(&entity_type) {
                    term_types.push(entity_type.clone());
                }
            }
        }

        let matcher = if terms.is_empty() {
            None
        } else {
            let automaton = AhoCorasick::builder()
                .match_kind(MatchKind::LeftmostLongest)
                .build(&terms)
                .map_err(|e| AppError::Configuration {
                    message: format!("Failed to build entity matcher: {}", e),
                })?;
            Some(automaton)
        };

        info!(terms = terms.len(), "Entity dictionary ready");

        Ok(Self { matcher, terms, types })
    }

    fn find(&self, question: &str) -> LinkedEntities {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };

        let mut linked: LinkedEntities = Vec::new();
        for found in matcher.find_iter(question) {
            let term = &self.terms[found.pattern().as_usize()];
            if linked.iter().any(|e| &e.name == term) {
                continue;
            }
            let types = self.types.get(term).cloned().unwrap_or_default();
            linked.push(Entity {
                name: term.clone(),
                types,
            });
        }
        linked
    }
}

#[async_trait]
impl EntityLinker for DictionaryLinker {
    async fn link(&self, question: &str) -> Result<LinkedEntities> {
        let linked = self.find(question);
        debug!(entities = linked.len(), "Linked question");
        Ok(linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(entries: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        entries
            .iter()
            .map(|(t, terms)| (t.to_string(), terms.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn linker() -> DictionaryLinker {
        DictionaryLinker::from_vocabularies(vocab(&[
            ("disease", &["感冒", "偏头痛", "头痛"]),
            ("symptom", &["头痛", "发烧", "咳嗽"]),
            ("drug", &["布洛芬"]),
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn test_term_with_several_types() {
        let linked = linker().link("我头痛怎么办").await.unwrap();
        assert_eq!(linked, vec![Entity::new("头痛", ["disease", "symptom"])]);
    }

    #[tokio::test]
    async fn test_longest_match_wins() {
        let linked = linker().link("偏头痛能吃布洛芬吗").await.unwrap();
        assert_eq!(
            linked,
            vec![Entity::new("偏头痛", ["disease"]), Entity::new("布洛芬", ["drug"])]
        );
    }

    #[tokio::test]
    async fn test_first_occurrence_order_without_repeats() {
        let linked = linker().link("发烧和咳嗽，还在发烧").await.unwrap();
        let names: Vec<&str> = linked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["发烧", "咳嗽"]);
    }

    #[tokio::test]
    async fn test_no_match() {
        assert!(linker().link("今天天气怎么样").await.unwrap().is_empty());

        let empty = DictionaryLinker::from_vocabularies(Vec::<(String, Vec<String>)>::new()).unwrap();
        assert!(empty.terms.is_empty());
        assert!(empty.link("头痛").await.unwrap().is_empty());
    }

    #[test]
    fn test_blank_terms_ignored() {
        let linker = DictionaryLinker::from_vocabularies(vocab(&[("disease", &["", "  ", "感冒"])])).unwrap();
        assert_eq!(linker.terms.len(), 1);
    }

    #[test]
    fn test_from_dir() {
        let dir = std::env::temp_dir().join(format!("kgrag-dict-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("disease.txt"), "感冒\n\n肺炎\n").unwrap();
        std::fs::write(dir.join("symptom.txt"), "咳嗽\n").unwrap();
        std::fs::write(dir.join("README.md"), "not a vocabulary").unwrap();

        let linker = DictionaryLinker::from_dir(&dir).unwrap();
        assert_eq!(linker.terms.len(), 3);
        assert_eq!(linker.find("肺炎咳嗽"), vec![
            Entity::new("肺炎", ["disease"]),
            Entity::new("咳嗽", ["symptom"]),
        ]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_dir_is_configuration_error() {
        let err = DictionaryLinker::from_dir("/nonexistent/kgrag/dict").err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
