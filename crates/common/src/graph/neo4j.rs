//! Neo4j graph store over the transactional HTTP API
//!
//! Paths are projected server-side into plain node property maps and
//! `{start, end, label}` edge maps, so the client never has to understand
//! Neo4j's graph result format.

use super::{GraphEdge, GraphNode, GraphPath, GraphStore};
use crate::config::GraphConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Separator used when a property holds a list of values
const LIST_SEPARATOR: &str = "、";

/// Graph store backed by a Neo4j HTTP endpoint
pub struct Neo4jHttpStore {
    client: reqwest::Client,
    commit_url: String,
    user: String,
    password: Option<String>,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    row: Value,
}

/// `nodes` and `edges` columns of a path query row
type PathRow = (Vec<Map<String, Value>>, Vec<EdgeRow>);

#[derive(Deserialize)]
struct EdgeRow {
    start: Option<String>,
    end: Option<String>,
    label: Option<String>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl Neo4jHttpStore {
    /// Create a store from configuration
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create graph HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            commit_url: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn run(&self, statement: &str, parameters: Value) -> Result<TxResponse> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let response = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.user, self.password.as_ref())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal {
                message: format!("Neo4j HTTP error {}: {}", status, body),
            });
        }

        let text = response.text().await?;
        let parsed: TxResponse = serde_json::from_str(&text)?;

        if let Some(err) = parsed.errors.first() {
            return Err(AppError::Internal {
                message: format!("{}: {}", err.code, err.message),
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn paths(&self, label: &str, name: &str, depth: u32) -> Result<Vec<GraphPath>> {
        let statement = path_statement(label, depth);
        debug!(statement = %statement, name = %name, "Running path query");

        let response = self.run(&statement, json!({ "name": name })).await?;
        Ok(into_paths(response))
    }

    async fn ping(&self) -> Result<()> {
        self.run("RETURN 1", json!({})).await.map(|_| ())
    }
}

/// Build the bounded-depth path statement
///
/// Only the entity name is a parameter: Cypher cannot parameterize labels or
/// variable-length bounds, so the label is quoted and the depth is an integer.
fn path_statement(label: &str, depth: u32) -> String {
    format!(
        "MATCH p=(m:`{label}`)-[*1..{depth}]-(n) WHERE m.name = $name \
         RETURN [x IN nodes(p) | properties(x)] AS nodes, \
         [r IN relationships(p) | {{start: startNode(r).name, end: endNode(r).name, label: coalesce(r.name, type(r))}}] AS edges",
        label = label.replace('`', "``"),
        depth = depth.max(1),
    )
}

fn into_paths(response: TxResponse) -> Vec<GraphPath> {
    response
        .results
        .into_iter()
        .flat_map(|result| result.data)
        .filter_map(|TxRow { row }| serde_json::from_value::<PathRow>(row).ok())
        .map(|(nodes, edges)| GraphPath {
            nodes: nodes.into_iter().map(into_node).collect(),
            edges: edges
                .into_iter()
                .filter_map(|edge| {
                    Some(GraphEdge {
                        start: edge.start?,
                        end: edge.end?,
                        relation: edge.label?,
                    })
                })
                .collect(),
        })
        .collect()
}

fn into_node(properties: Map<String, Value>) -> GraphNode {
    let attributes: BTreeMap<String, String> = properties
        .into_iter()
        .filter_map(|(key, value)| flatten(value).map(|v| (key, v)))
        .collect();

    GraphNode {
        name: attributes.get("name").cloned().unwrap_or_default(),
        attributes,
    }
}

fn flatten(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(flatten).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(LIST_SEPARATOR))
            }
        }
        other @ Value::Object(_) => Some(other.to_string()),
    }
}
