use crate::models::{FieldDefaults, ResourceRecord};
use serde_json::{Map, Value};

/// Side fields a restricted resource must always carry
const RESTRICTED_SIDE_FIELDS: &[&str] = &["restricted_allowed_users", "restricted_allowed_orgs"];

/// Operator-configured field values forced onto every finalized resource
#[derive(Debug, Clone, Default)]
pub struct ResourceDefaults {
    fields: Map<String, Value>,
}

impl ResourceDefaults {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Configured values win over anything computed for the record.
    pub fn apply(&self, record: &mut ResourceRecord) {
        for (key, value) in &self.fields {
            record.fields.insert(key.clone(), value.clone());
        }
    }

    /// Merges schema defaults into a record that already went through [`apply`](Self::apply).
    ///
    /// Schema values only fill fields that are still unset. When the schema
    /// names the resource type, the name becomes `"<label>: <filename>"` unless
    /// the operator forces a name.
    pub fn apply_schema(&self, record: &mut ResourceRecord, schema: &FieldDefaults) {
        for (key, value) in &schema.fields {
            if !record.fields.contains_key(key) {
                record.fields.insert(key.clone(), value.clone());
            }
        }

        if record.fields.contains_key("restricted") {
            for side in RESTRICTED_SIDE_FIELDS {
                record
                    .fields
                    .entry(side.to_string())
                    .or_insert_with(|| Value::from(""));
            }
        }

        if let Some(label) = schema.name.as_deref().filter(|l| !l.is_empty()) {
            if !self.fields.contains_key("name") {
                let name = format!("{}: {}", label, record.filename);
                record.fields.insert("name".to_string(), Value::from(name));
            }
        }
    }
}
