//! Field selection per entity type

use crate::schema::KnowledgeSchema;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Display labels worth retrieving for one entity type
pub type FieldSet = BTreeSet<String>;

/// Maps entity types to the display labels relevant to them
pub struct FieldSelector {
    schema: Arc<KnowledgeSchema>,
}

impl FieldSelector {
    pub fn new(schema: Arc<KnowledgeSchema>) -> Self {
        Self { schema }
    }

    /// Display labels profiled for `entity_type`
    ///
    /// Unknown types yield an empty set; profiled keys without a display
    /// label are skipped.
    pub fn select_fields(&self, entity_type: &str) -> FieldSet {
        let fields: FieldSet = self
            .schema
            .fields_for(entity_type)
            .unwrap_or_default()
            .iter()
            .filter_map(|key| self.schema.field_label(key))
            .map(str::to_string)
            .collect();

        debug!(entity_type = %entity_type, fields = fields.len(), "Selected fields");
        fields
    }
}
