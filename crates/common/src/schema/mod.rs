//! Knowledge schema - the static vocabulary of the medical graph
//!
//! Holds the mappings every retrieval component consults:
//! - field key → display label
//! - entity type → relevant field keys
//! - entity type → graph node label
//! - topical priority predicates
//!
//! Built once per process and shared read-only behind an `Arc`.

use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::errors::Result;

/// Static mappings describing the graph vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSchema {
    /// Internal field key → display label
    pub field_labels: HashMap<String, String>,

    /// Entity type → ordered field keys worth retrieving
    pub type_fields: HashMap<String, Vec<String>>,

    /// Entity type → graph node label
    pub graph_labels: HashMap<String, String>,

    /// Display labels that keep a fact on topic
    #[serde(default)]
    pub priority_predicates: BTreeSet<String>,
}

impl KnowledgeSchema {
    /// Load a schema from a TOML/JSON/YAML file
    ///
    /// The loader lowercases map keys, so file-based field keys must be lowercase.
    pub fn from_file(path: &str) -> Result<Self> {
        let schema = Config::builder()
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()?;
        Ok(schema)
    }

    /// Display label for a field key
    pub fn field_label(&self, key: &str) -> Option<&str> {
        self.field_labels.get(key).map(String::as_str)
    }

    /// Field keys profiled for an entity type
    pub fn fields_for(&self, entity_type: &str) -> Option<&[String]> {
        self.type_fields.get(entity_type).map(Vec::as_slice)
    }

    /// Graph node label for an entity type
    pub fn graph_label(&self, entity_type: &str) -> Option<&str> {
        self.graph_labels.get(entity_type).map(String::as_str)
    }

    /// The built-in medical knowledge graph schema
    pub fn medical() -> Self {
        let field_labels = [
            ("name", "名称"),
            ("desc", "疾病简介"),
            ("cause", "疾病病因"),
            ("prevent", "预防措施"),
            ("cure_department", "治疗科室"),
            ("cure_lasttime", "治疗周期"),
            ("cure_way", "治疗方式"),
            ("cured_prob", "治愈概率"),
            ("easy_get", "易感人群"),
            ("belongs_to", "所属科室"),
            ("common_drug", "常用药品"),
            ("do_eat", "宜吃"),
            ("drugs_of", "生产药品"),
            ("need_check", "诊断检查"),
            ("no_eat", "忌吃"),
            ("recommand_drug", "好评药品"),
            ("recommand_eat", "推荐食谱"),
            ("has_symptom", "症状"),
            ("acompany_with", "并发症"),
            ("Check", "诊断检查项目"),
            ("Department", "医疗科目"),
            ("Disease", "疾病"),
            ("Drug", "药品"),
            ("Food", "食物"),
            ("Producer", "在售药品"),
            ("Symptom", "疾病症状"),
        ];

        let type_fields: [(&str, &[&str]); 7] = [
            ("check", &["name", "need_check"]),
            ("department", &["name", "belongs_to"]),
            (
                "disease",
                &[
                    "prevent",
                    "cure_way",
                    "name",
                    "cure_lasttime",
                    "cured_prob",
                    "cause",
                    "cure_department",
                    "desc",
                    "easy_get",
                    "recommand_eat",
                    "no_eat",
                    "do_eat",
                    "common_drug",
                    "drugs_of",
                    "recommand_drug",
                    "need_check",
                    "has_symptom",
                    "acompany_with",
                    "belongs_to",
                ],
            ),
            ("drug", &["name", "common_drug", "drugs_of", "recommand_drug"]),
            ("food", &["name"]),
            ("producer", &["name"]),
            ("symptom", &["name", "has_symptom"]),
        ];

        let graph_labels = [
            ("check", "Check"),
            ("department", "Department"),
            ("disease", "Disease"),
            ("drug", "Drug"),
            ("food", "Food"),
            ("producer", "Producer"),
            ("symptom", "Symptom"),
        ];

        let priority_predicates = [
            "治疗方式", "常用药品", "好评药品", "治疗科室", "诊断检查", "治疗周期", "治愈概率",
            "预防措施", "疾病病因", "症状", "易感人群", "推荐食谱", "宜吃", "忌吃",
        ];

        Self {
            field_labels: field_labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            type_fields: type_fields
                .iter()
                .map(|(t, keys)| (t.to_string(), keys.iter().map(|k| k.to_string()).collect()))
                .collect(),
            graph_labels: graph_labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            priority_predicates: priority_predicates.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for KnowledgeSchema {
    fn default() -> Self {
        Self::medical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medical_lookups() {
        let schema = KnowledgeSchema::medical();
        assert_eq!(schema.field_label("cure_way"), Some("治疗方式"));
        assert_eq!(schema.graph_label("symptom"), Some("Symptom"));
        assert_eq!(schema.fields_for("disease").map(<[String]>::len), Some(19));
        assert!(schema.priority_predicates.contains("症状"));
        assert!(!schema.priority_predicates.contains("所属科室"));
    }

    #[test]
    fn test_absent_entries_are_none() {
        let schema = KnowledgeSchema::medical();
        assert!(schema.field_label("unknown_field").is_none());
        assert!(schema.fields_for("gene").is_none());
        assert!(schema.graph_label("gene").is_none());
    }

    #[test]
    fn test_every_profiled_field_has_a_label() {
        let schema = KnowledgeSchema::medical();
        for keys in schema.type_fields.values() {
            for key in keys {
                assert!(schema.field_label(key).is_some(), "missing label for {}", key);
            }
        }
    }
}
