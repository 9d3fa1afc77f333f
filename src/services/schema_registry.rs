use crate::models::FieldDefaults;
use crate::services::platform::{PlatformError, SchemaRegistry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Schema defaults read from a JSON document shaped as
/// `{"<dataset_type>": {"<resource_type>": {"name": "...", "fields": {...}}}}`.
#[derive(Debug, Default)]
pub struct FileSchemaRegistry {
    schemas: HashMap<String, HashMap<String, FieldDefaults>>,
}

impl FileSchemaRegistry {
    pub fn from_json(raw: &str) -> Result<Self> {
        let schemas = serde_json::from_str(raw).context("Invalid schema defaults document")?;
        Ok(Self { schemas })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read schema defaults from {:?}", path))?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.schemas.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SchemaRegistry for FileSchemaRegistry {
    async fn resource_defaults(
        &self,
        dataset_type: &str,
        resource_type: &str,
    ) -> Result<Option<FieldDefaults>, PlatformError> {
        Ok(self
            .schemas
            .get(dataset_type)
            .and_then(|types| types.get(resource_type))
            .cloned())
    }
}
