//! Graph store abstraction
//!
//! The retrieval engine only needs one primitive from the graph database:
//! "all paths of length 1..depth starting at the node with this label and
//! name". Paths come back already flattened into names and string attributes.

mod neo4j;

pub use neo4j::Neo4jHttpStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node on a returned path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    /// Attribute key → flattened value (nulls already removed)
    pub attributes: BTreeMap<String, String>,
}

/// A relationship on a returned path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Name of the start node
    pub start: String,
    /// Name of the end node
    pub end: String,
    /// Relationship label: a display label or a field key
    pub relation: String,
}

/// One path returned by a bounded-depth query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl GraphEdge {
    pub fn new(start: impl Into<String>, relation: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            relation: relation.into(),
        }
    }
}

/// Trait for graph stores answering bounded-depth path queries
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All paths of length `1..=depth` from the node `(label {name})`
    async fn paths(&self, label: &str, name: &str, depth: u32) -> Result<Vec<GraphPath>>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}
