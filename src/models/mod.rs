use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Dataset as reported by the host platform's lookup action
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatasetRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub dataset_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A resource about to be created or updated from a staged file.
///
/// `fields` holds every metadata field sent to the platform (`package_id`,
/// `name`, `last_modified`, configured defaults...). The staged bytes travel
/// separately as the upload part named after `filename`.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub filename: String,
    pub fields: Map<String, Value>,
}

impl ResourceRecord {
    pub fn new(dataset_id: &str, filename: &str, last_modified: DateTime<Utc>) -> Self {
        let mut fields = Map::new();
        fields.insert("package_id".to_string(), Value::from(dataset_id));
        fields.insert("name".to_string(), Value::from(filename));
        fields.insert(
            "last_modified".to_string(),
            Value::from(last_modified.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        );
        Self {
            filename: filename.to_string(),
            fields,
        }
    }

    /// Resource name the platform will store, falling back to the staged filename
    pub fn name(&self) -> &str {
        self.fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.filename)
    }
}

/// Defaults a schema declares for one dataset/resource type pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDefaults {
    /// Label prefixed to every resource name of this type
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Size of a staged file right after a chunk landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StagedFileInfo {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailedFile {
    pub name: String,
    pub reason: String,
}

/// Summary of one finalize run. Order follows staging enumeration and carries no meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FinalizeOutcome {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<FailedFile>,
    /// Whether the dataset was flipped back to active after the run
    pub activated: bool,
}

impl FinalizeOutcome {
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty() || !self.updated.is_empty()
    }

    /// Human readable notice shown to the uploader
    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if !self.created.is_empty() {
            parts.push(format!(
                "The following resources were created: {}",
                self.created.join(", ")
            ));
        }
        if !self.updated.is_empty() {
            parts.push(format!(
                "The following resources were updated: {}",
                self.updated.join(", ")
            ));
        }
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
            parts.push(format!(
                "The following files could not be processed: {}",
                names.join(", ")
            ));
        }
        if self.has_changes() && !self.activated {
            parts.push("The dataset could not be activated".to_string());
        }
        if parts.is_empty() {
            return "No staged files were found".to_string();
        }
        parts.join(". ")
    }
}
