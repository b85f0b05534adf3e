//! Graph fact extraction
//!
//! Issues one bounded-depth path query per (entity, type) pair and converts
//! the returned paths into tiered fact triples. Deduplication and capping are
//! left to the ranker.

use super::fact::{truncate_value, Fact};
use super::fields::FieldSet;
use super::RetrievalProfile;
use crate::errors::{AppError, Result};
use crate::graph::{GraphPath, GraphStore};
use crate::metrics;
use crate::schema::KnowledgeSchema;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Converts graph neighborhoods into candidate facts
pub struct GraphFactExtractor {
    store: Arc<dyn GraphStore>,
    schema: Arc<KnowledgeSchema>,
    profile: RetrievalProfile,
}

impl GraphFactExtractor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        schema: Arc<KnowledgeSchema>,
        profile: RetrievalProfile,
    ) -> Self {
        Self {
            store,
            schema,
            profile,
        }
    }

    /// Candidate facts around `entity_name`, restricted to `allowed` labels
    ///
    /// Types without a graph label yield no facts and issue no query. Any
    /// store failure is reported as `GraphQueryFailed` for this pair only.
    #[instrument(skip(self, allowed), fields(entity = %entity_name, entity_type = %entity_type))]
    pub async fn extract(
        &self,
        entity_name: &str,
        entity_type: &str,
        allowed: &FieldSet,
        depth: u32,
    ) -> Result<Vec<Fact>> {
        let Some(label) = self.schema.graph_label(entity_type) else {
            debug!("No graph label for entity type");
            return Ok(Vec::new());
        };

        let start = Instant::now();
        let result = self.store.paths(label, entity_name, depth).await;
        metrics::record_graph_query(start.elapsed().as_secs_f64(), entity_type, result.is_ok());

        let paths = result.map_err(|e| AppError::GraphQueryFailed {
            entity: entity_name.to_string(),
            entity_type: entity_type.to_string(),
            message: e.to_string(),
        })?;

        let facts = self.facts_from_paths(entity_name, allowed, &paths);
        debug!(paths = paths.len(), facts = facts.len(), "Extracted facts");
        Ok(facts)
    }

    /// Walk the returned paths and collect every qualifying triple
    fn facts_from_paths(&self, entity_name: &str, allowed: &FieldSet, paths: &[GraphPath]) -> Vec<Fact> {
        let max_chars = self.profile.max_value_chars();
        let mut facts = Vec::new();

        for path in paths {
            for node in path.nodes.iter().filter(|n| n.name == entity_name) {
                for (key, value) in &node.attributes {
                    if value.is_empty() || value == entity_name {
                        continue;
                    }
                    let Some(label) = self.schema.field_label(key) else {
                        continue;
                    };
                    if !allowed.contains(label) {
                        continue;
                    }
                    facts.push(Fact::direct(
                        entity_name,
                        label,
                        truncate_value(value, max_chars),
                    ));
                }
            }

            if !self.profile.collect_relations() {
                continue;
            }

            for edge in &path.edges {
                if edge.start == edge.end {
                    continue;
                }
                let label = self
                    .schema
                    .field_label(&edge.relation)
                    .unwrap_or(edge.relation.as_str());
                if !allowed.contains(label) {
                    continue;
                }
                if edge.start == entity_name {
                    facts.push(Fact::direct(&edge.start, label, &edge.end));
                } else if edge.end == entity_name {
                    facts.push(Fact::indirect(&edge.start, label, &edge.end));
                }
            }
        }

        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};
    use crate::knowledge::{FieldSelector, Tier};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStore {
        paths: Vec<GraphPath>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedStore {
        fn new(paths: Vec<GraphPath>) -> Self {
            Self { paths, calls: AtomicUsize::new(0), fail: false }
        }

        fn failing() -> Self {
            Self { paths: Vec::new(), calls: AtomicUsize::new(0), fail: true }
        }
    }

    #[async_trait]
    impl GraphStore for FixedStore {
        async fn paths(&self, _label: &str, _name: &str, _depth: u32) -> Result<Vec<GraphPath>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Internal { message: "connection refused".into() });
            }
            Ok(self.paths.clone())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn extractor(store: Arc<FixedStore>, profile: RetrievalProfile) -> GraphFactExtractor {
        GraphFactExtractor::new(store, Arc::new(KnowledgeSchema::medical()), profile)
    }

    fn disease_fields() -> FieldSet {
        FieldSelector::new(Arc::new(KnowledgeSchema::medical())).select_fields("disease")
    }

    fn cold_path() -> GraphPath {
        GraphPath {
            nodes: vec![
                GraphNode::new("感冒")
                    .with_attribute("name", "感冒")
                    .with_attribute("cure_way", "药物治疗")
                    .with_attribute("cause", "")
                    .with_attribute("cured_prob", "感冒")
                    .with_attribute("internal_id", "42"),
                GraphNode::new("发热").with_attribute("cure_way", "物理降温"),
            ],
            edges: vec![
                GraphEdge::new("感冒", "has_symptom", "发热"),
                GraphEdge::new("肺炎", "并发症", "感冒"),
                GraphEdge::new("感冒", "症状", "感冒"),
                GraphEdge::new("发热", "症状", "乏力"),
            ],
        }
    }

    #[tokio::test]
    async fn test_attribute_and_relation_facts() {
        let store = Arc::new(FixedStore::new(vec![cold_path()]));
        let facts = extractor(store, RetrievalProfile::Rich)
            .extract("感冒", "disease", &disease_fields(), 1)
            .await
            .unwrap();

        assert_eq!(
            facts,
            vec![
                Fact::direct("感冒", "治疗方式", "药物治疗"),
                Fact::direct("感冒", "症状", "发热"),
                Fact::indirect("肺炎", "并发症", "感冒"),
            ]
        );
        assert_eq!(facts[1].tier, Tier::Direct);
        assert_eq!(facts[2].tier, Tier::Indirect);
    }

    #[tokio::test]
    async fn test_disallowed_labels_are_skipped() {
        let store = Arc::new(FixedStore::new(vec![cold_path()]));
        let allowed: FieldSet = ["症状".to_string()].into_iter().collect();
        let facts = extractor(store, RetrievalProfile::Rich)
            .extract("感冒", "disease", &allowed, 1)
            .await
            .unwrap();

        assert_eq!(facts, vec![Fact::direct("感冒", "症状", "发热")]);
    }

    #[tokio::test]
    async fn test_long_values_are_truncated() {
        let long = "因".repeat(150);
        let path = GraphPath {
            nodes: vec![GraphNode::new("感冒").with_attribute("cause", long)],
            edges: Vec::new(),
        };

        let rich = extractor(Arc::new(FixedStore::new(vec![path.clone()])), RetrievalProfile::Rich)
            .extract("感冒", "disease", &disease_fields(), 1)
            .await
            .unwrap();
        assert_eq!(rich[0].object.chars().count(), 123);

        let simplified = extractor(Arc::new(FixedStore::new(vec![path])), RetrievalProfile::Simplified)
            .extract("感冒", "disease", &disease_fields(), 1)
            .await
            .unwrap();
        assert_eq!(simplified[0].object.chars().count(), 150);
    }

    #[tokio::test]
    async fn test_simplified_profile_ignores_relations() {
        let store = Arc::new(FixedStore::new(vec![cold_path()]));
        let facts = extractor(store, RetrievalProfile::Simplified)
            .extract("感冒", "disease", &disease_fields(), 1)
            .await
            .unwrap();

        assert!(facts.iter().all(|f| f.subject == "感冒" && f.is_direct()));
        assert_eq!(facts.len(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_type_skips_query() {
        let store = Arc::new(FixedStore::new(vec![cold_path()]));
        let facts = extractor(store.clone(), RetrievalProfile::Rich)
            .extract("感冒", "gene", &disease_fields(), 1)
            .await
            .unwrap();

        assert!(facts.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_graph_query_failed() {
        let store = Arc::new(FixedStore::failing());
        let err = extractor(store, RetrievalProfile::Rich)
            .extract("感冒", "disease", &disease_fields(), 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::GraphQueryFailed { ref entity, ref entity_type, .. }
                if entity == "感冒" && entity_type == "disease"
        ));
        assert_eq!(err.to_string().matches("Graph query failed").count(), 1);
    }
}
