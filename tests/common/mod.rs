#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use staging_uploader::config::UploaderConfig;
use staging_uploader::models::{DatasetRecord, ResourceRecord, ResourceSummary};
use staging_uploader::services::platform::{HostPlatform, PlatformError, SchemaRegistry};
use staging_uploader::services::staging::{LocalStagingStore, StagedContent};
use staging_uploader::utils::auth::Caller;
use staging_uploader::{AppState, create_app};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

#[derive(Debug, Clone)]
pub struct StoredResource {
    pub id: String,
    pub dataset_id: String,
    pub name: String,
    pub fields: Map<String, Value>,
    pub content: Vec<u8>,
}

/// Host platform double keeping datasets and resources in memory
#[derive(Default)]
pub struct InMemoryPlatform {
    datasets: Mutex<HashMap<String, DatasetRecord>>,
    resources: Mutex<HashMap<String, StoredResource>>,
    failing: Mutex<HashSet<String>>,
    denied: Mutex<HashSet<String>>,
    activations: Mutex<Vec<String>>,
    next_id: Mutex<u32>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dataset(&self, id: &str, name: &str) {
        self.datasets.lock().unwrap().insert(
            id.to_string(),
            DatasetRecord {
                id: id.to_string(),
                name: Some(name.to_string()),
                dataset_type: Some("dataset".to_string()),
                state: Some("draft".to_string()),
                resources: Vec::new(),
            },
        );
    }

    /// Registers an existing resource and returns its id
    pub fn add_resource(&self, dataset_id: &str, name: &str, content: &[u8]) -> String {
        let id = self.mint_id();
        self.store_resource(StoredResource {
            id: id.clone(),
            dataset_id: dataset_id.to_string(),
            name: name.to_string(),
            fields: Map::new(),
            content: content.to_vec(),
        });
        id
    }

    /// Makes create/update fail for resources built from this staged filename
    pub fn fail_on(&self, filename: &str) {
        self.failing.lock().unwrap().insert(filename.to_string());
    }

    pub fn stop_failing(&self, filename: &str) {
        self.failing.lock().unwrap().remove(filename);
    }

    pub fn deny(&self, dataset_id: &str) {
        self.denied.lock().unwrap().insert(dataset_id.to_string());
    }

    pub fn resources_of(&self, dataset_id: &str) -> Vec<StoredResource> {
        self.resources
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.dataset_id == dataset_id)
            .cloned()
            .collect()
    }

    pub fn resource_named(&self, dataset_id: &str, name: &str) -> Option<StoredResource> {
        self.resources_of(dataset_id)
            .into_iter()
            .find(|r| r.name == name)
    }

    /// Dataset ids passed to `activate_dataset`, in call order
    pub fn activations(&self) -> Vec<String> {
        self.activations.lock().unwrap().clone()
    }

    pub fn dataset_state(&self, dataset_id: &str) -> Option<String> {
        self.datasets
            .lock()
            .unwrap()
            .get(dataset_id)
            .and_then(|d| d.state.clone())
    }

    fn mint_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("res-{}", *next)
    }

    fn store_resource(&self, resource: StoredResource) {
        if let Some(dataset) = self.datasets.lock().unwrap().get_mut(&resource.dataset_id) {
            dataset.resources.push(ResourceSummary {
                id: resource.id.clone(),
                name: Some(resource.name.clone()),
            });
        }
        self.resources
            .lock()
            .unwrap()
            .insert(resource.id.clone(), resource);
    }

    async fn read_content(content: StagedContent) -> Vec<u8> {
        let mut reader = content.reader;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.len() as u64, content.size);
        buf
    }

    fn check_failing(&self, record: &ResourceRecord) -> Result<(), PlatformError> {
        if self.failing.lock().unwrap().contains(&record.filename) {
            return Err(PlatformError::Rejected(format!(
                "Validation Error: {} was refused",
                record.filename
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl HostPlatform for InMemoryPlatform {
    async fn show_dataset(
        &self,
        _caller: &Caller,
        dataset_id: &str,
    ) -> Result<DatasetRecord, PlatformError> {
        let datasets = self.datasets.lock().unwrap();
        let dataset = datasets
            .values()
            .find(|d| d.id == dataset_id || d.name.as_deref() == Some(dataset_id))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound("Dataset not found".to_string()))?;

        if self.denied.lock().unwrap().contains(&dataset.id) {
            return Err(PlatformError::NotAuthorized(format!(
                "User not authorized to read package {}",
                dataset.id
            )));
        }
        Ok(dataset)
    }

    async fn create_resource(
        &self,
        _caller: &Caller,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<String, PlatformError> {
        self.check_failing(record)?;
        let content = Self::read_content(content).await;

        let dataset_id = record
            .fields
            .get("package_id")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Rejected("package_id missing".to_string()))?
            .to_string();
        let id = self.mint_id();
        self.store_resource(StoredResource {
            id: id.clone(),
            dataset_id,
            name: record.name().to_string(),
            fields: record.fields.clone(),
            content,
        });
        Ok(id)
    }

    async fn update_resource(
        &self,
        _caller: &Caller,
        resource_id: &str,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<(), PlatformError> {
        self.check_failing(record)?;
        let content = Self::read_content(content).await;

        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .get_mut(resource_id)
            .ok_or_else(|| PlatformError::NotFound("Resource not found".to_string()))?;
        resource.fields = record.fields.clone();
        resource.content = content;
        Ok(())
    }

    async fn activate_dataset(
        &self,
        _caller: &Caller,
        dataset_id: &str,
    ) -> Result<(), PlatformError> {
        if let Some(dataset) = self.datasets.lock().unwrap().get_mut(dataset_id) {
            dataset.state = Some("active".to_string());
        }
        self.activations
            .lock()
            .unwrap()
            .push(dataset_id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub platform: Arc<InMemoryPlatform>,
    pub config: UploaderConfig,
    _storage: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut UploaderConfig)) -> Self {
        Self::build(customize, None)
    }

    pub fn build(
        customize: impl FnOnce(&mut UploaderConfig),
        schemas: Option<Arc<dyn SchemaRegistry>>,
    ) -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let storage = tempfile::tempdir().unwrap();
        let mut config = UploaderConfig::development(storage.path());
        customize(&mut config);

        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_dataset("ds-1", "first-dataset");
        platform.add_dataset("ds-2", "second-dataset");

        let store = Arc::new(LocalStagingStore::new(config.staging_root()));
        let state = AppState::new(config.clone(), store, platform.clone(), schemas);

        Self {
            app: create_app(state),
            platform,
            config,
            _storage: storage,
        }
    }

    pub fn staged_path(&self, dataset_id: &str, filename: &str) -> PathBuf {
        self.config.staging_root().join(dataset_id).join(filename)
    }

    pub fn staged_content(&self, dataset_id: &str, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.staged_path(dataset_id, filename)).ok()
    }

    pub fn staged_names(&self, dataset_id: &str) -> Vec<String> {
        let dir = self.config.staging_root().join(dataset_id);
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Sends one request and returns the status with the parsed JSON body
    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn upload(
        &self,
        dataset_id: &str,
        filename: &str,
        data: &[u8],
        content_range: Option<&str>,
    ) -> (axum::http::StatusCode, Value) {
        self.send(upload_request(dataset_id, filename, data, content_range))
            .await
    }

    /// Uploads `data[start..stop]` with a matching Content-Range header
    pub async fn upload_range(
        &self,
        dataset_id: &str,
        filename: &str,
        data: &[u8],
        start: usize,
        stop: usize,
    ) -> (axum::http::StatusCode, Value) {
        let range = format!("bytes {}-{}/{}", start, stop - 1, data.len());
        self.upload(dataset_id, filename, &data[start..stop], Some(&range))
            .await
    }

    pub async fn finish(&self, path: &str) -> (axum::http::StatusCode, Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(format!("/file_uploader_ui/finish/{}", path))
                .header("Authorization", "test-api-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

/// Multipart body with a dataset field and one file part; binary safe
pub fn multipart_body(dataset_id: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
            Content-Disposition: form-data; name=\"package_id\"\r\n\r\n\
            {dataset_id}\r\n\
            --{BOUNDARY}\r\n\
            Content-Disposition: form-data; name=\"files[]\"; filename=\"{filename}\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(
    dataset_id: &str,
    filename: &str,
    data: &[u8],
    content_range: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/file_uploader_ui/upload")
        .header("Authorization", "test-api-key")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(range) = content_range {
        builder = builder.header("Content-Range", range);
    }
    builder
        .body(Body::from(multipart_body(dataset_id, filename, data)))
        .unwrap()
}

/// Deterministic payload that includes zero bytes
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
