use crate::config::AmbiguousMatchPolicy;
use crate::models::{
    DatasetRecord, FailedFile, FieldDefaults, FinalizeOutcome, ResourceRecord, ResourceSummary,
};
use crate::services::defaults::ResourceDefaults;
use crate::services::error::{UploadError, UploadResult};
use crate::services::platform::{HostPlatform, SchemaRegistry};
use crate::services::staging::{StagedContent, StagingKey, StagingStore};
use crate::utils::auth::Caller;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use std::sync::Arc;

/// Dataset and resource type used to look up schema defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSelector {
    pub dataset_type: String,
    pub resource_type: String,
}

enum Conversion {
    Created,
    Updated,
}

/// Turns staged files into dataset resources
pub struct Finalizer {
    store: Arc<dyn StagingStore>,
    platform: Arc<dyn HostPlatform>,
    schemas: Option<Arc<dyn SchemaRegistry>>,
    defaults: ResourceDefaults,
    policy: AmbiguousMatchPolicy,
    locks: KeyedMutex<StagingKey>,
}

impl Finalizer {
    pub fn new(
        store: Arc<dyn StagingStore>,
        platform: Arc<dyn HostPlatform>,
        schemas: Option<Arc<dyn SchemaRegistry>>,
        defaults: ResourceDefaults,
        policy: AmbiguousMatchPolicy,
        locks: KeyedMutex<StagingKey>,
    ) -> Self {
        Self {
            store,
            platform,
            schemas,
            defaults,
            policy,
            locks,
        }
    }

    /// Converts every file staged for the dataset, then reactivates the dataset
    /// if anything changed.
    ///
    /// Files are handled independently: a file the platform refuses stays
    /// staged and lands in `failed`, so calling finalize again retries it.
    pub async fn finalize(
        &self,
        caller: &Caller,
        dataset_id: &str,
        schema: Option<&SchemaSelector>,
    ) -> UploadResult<(DatasetRecord, FinalizeOutcome)> {
        let dataset = self.platform.show_dataset(caller, dataset_id).await?;
        let schema_defaults = self.schema_defaults(schema).await?;

        let filenames = self.store.list(&dataset.id).await?;
        tracing::info!(
            "Finalizing {} staged file(s) for dataset {}",
            filenames.len(),
            dataset.id
        );

        let mut resources = dataset.resources.clone();
        let mut outcome = FinalizeOutcome::default();

        for filename in filenames {
            let result = self
                .convert(
                    caller,
                    &dataset.id,
                    &filename,
                    &mut resources,
                    schema_defaults.as_ref(),
                )
                .await;

            match result {
                Ok(Conversion::Created) => outcome.created.push(filename),
                Ok(Conversion::Updated) => outcome.updated.push(filename),
                Err(e) => {
                    tracing::warn!(
                        "Could not finalize '{}' for dataset {}: {}",
                        filename,
                        dataset.id,
                        e
                    );
                    outcome.failed.push(FailedFile {
                        name: filename,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.locks.cleanup();

        if outcome.has_changes() {
            match self.platform.activate_dataset(caller, &dataset.id).await {
                Ok(()) => outcome.activated = true,
                // Reported through `activated`; add_resources can retry it
                Err(e) => tracing::error!("Failed to activate dataset {}: {}", dataset.id, e),
            }
        }

        tracing::info!(
            "Dataset {} finalized: {} created, {} updated, {} failed",
            dataset.id,
            outcome.created.len(),
            outcome.updated.len(),
            outcome.failed.len()
        );
        Ok((dataset, outcome))
    }

    /// Flips the dataset back to active without touching the staging area.
    pub async fn activate(&self, caller: &Caller, dataset_id: &str) -> UploadResult<DatasetRecord> {
        let dataset = self.platform.show_dataset(caller, dataset_id).await?;
        self.platform.activate_dataset(caller, &dataset.id).await?;
        tracing::info!("Dataset {} marked active", dataset.id);
        Ok(dataset)
    }

    async fn schema_defaults(
        &self,
        schema: Option<&SchemaSelector>,
    ) -> UploadResult<Option<FieldDefaults>> {
        let (Some(selector), Some(registry)) = (schema, &self.schemas) else {
            return Ok(None);
        };
        let defaults = registry
            .resource_defaults(&selector.dataset_type, &selector.resource_type)
            .await?;
        if defaults.is_none() {
            tracing::debug!(
                "No schema defaults for {}/{}",
                selector.dataset_type,
                selector.resource_type
            );
        }
        Ok(defaults)
    }

    async fn convert(
        &self,
        caller: &Caller,
        dataset_id: &str,
        filename: &str,
        resources: &mut Vec<ResourceSummary>,
        schema_defaults: Option<&FieldDefaults>,
    ) -> UploadResult<Conversion> {
        let key = StagingKey::new(dataset_id, filename)?;
        let _guard = self.locks.lock(&key).await;

        let content = self.store.open(&key).await?;
        let mut record = ResourceRecord::new(dataset_id, filename, Utc::now());
        self.defaults.apply(&mut record);
        if let Some(schema) = schema_defaults {
            self.defaults.apply_schema(&mut record, schema);
        }

        let matching_ids: Vec<String> = resources
            .iter()
            .filter(|r| r.name.as_deref() == Some(record.name()))
            .map(|r| r.id.clone())
            .collect();

        let conversion = match matching_ids.as_slice() {
            [resource_id] => {
                self.platform
                    .update_resource(caller, resource_id, &record, content)
                    .await?;
                tracing::info!("Updated resource {} from '{}'", resource_id, filename);
                Conversion::Updated
            }
            [] => self.create(caller, &record, content, resources).await?,
            many => match self.policy {
                AmbiguousMatchPolicy::Reject => {
                    return Err(UploadError::AmbiguousMatch {
                        name: record.name().to_string(),
                        count: many.len(),
                    });
                }
                AmbiguousMatchPolicy::Create => {
                    tracing::warn!(
                        "{} resources named '{}' already exist, creating another",
                        many.len(),
                        record.name()
                    );
                    self.create(caller, &record, content, resources).await?
                }
            },
        };

        if let Err(e) = self.store.delete(&key).await {
            tracing::error!(
                "Resource for '{}' saved but the staged copy could not be removed: {}",
                filename,
                e
            );
        }
        Ok(conversion)
    }

    async fn create(
        &self,
        caller: &Caller,
        record: &ResourceRecord,
        content: StagedContent,
        resources: &mut Vec<ResourceSummary>,
    ) -> UploadResult<Conversion> {
        let resource_id = self.platform.create_resource(caller, record, content).await?;
        tracing::info!("Created resource {} from '{}'", resource_id, record.filename);
        // Later files in the same run must see this one when matching names
        resources.push(ResourceSummary {
            id: resource_id,
            name: Some(record.name().to_string()),
        });
        Ok(Conversion::Created)
    }
}
