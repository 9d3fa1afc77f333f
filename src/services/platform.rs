use crate::models::{DatasetRecord, FieldDefaults, ResourceRecord};
use crate::services::staging::StagedContent;
use crate::utils::auth::Caller;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotAuthorized(String),

    /// The platform understood the request and refused it (validation, conflict...)
    #[error("{0}")]
    Rejected(String),

    #[error("Platform unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected platform response: {0}")]
    InvalidResponse(String),
}

/// Dataset and resource actions of the host platform.
///
/// Every call carries the caller so the platform applies its own authorization.
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Looks up a dataset by id or name. Doubles as the authorization check.
    async fn show_dataset(
        &self,
        caller: &Caller,
        dataset_id: &str,
    ) -> Result<DatasetRecord, PlatformError>;

    /// Creates a resource from a staged file and returns its id
    async fn create_resource(
        &self,
        caller: &Caller,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<String, PlatformError>;

    /// Replaces the content and metadata of an existing resource
    async fn update_resource(
        &self,
        caller: &Caller,
        resource_id: &str,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<(), PlatformError>;

    /// Moves the dataset to the `active` state
    async fn activate_dataset(
        &self,
        caller: &Caller,
        dataset_id: &str,
    ) -> Result<(), PlatformError>;
}

/// Field defaults declared per dataset type and resource type
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn resource_defaults(
        &self,
        dataset_type: &str,
        resource_type: &str,
    ) -> Result<Option<FieldDefaults>, PlatformError>;
}
