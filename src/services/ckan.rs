use crate::models::{DatasetRecord, ResourceRecord, ResourceSummary};
use crate::services::platform::{HostPlatform, PlatformError};
use crate::services::staging::StagedContent;
use crate::utils::auth::Caller;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio_util::io::ReaderStream;
use url::Url;

/// Envelope every action API response is wrapped in
#[derive(Deserialize)]
struct ActionResponse<T> {
    success: bool,
    result: Option<T>,
    error: Option<ActionError>,
}

#[derive(Deserialize, Debug)]
struct ActionError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
    /// Validation errors list offending fields next to `__type`
    #[serde(flatten)]
    details: Map<String, Value>,
}

impl ActionError {
    fn into_platform_error(self) -> PlatformError {
        let message = self.message.clone().unwrap_or_else(|| {
            if self.details.is_empty() {
                "no details".to_string()
            } else {
                Value::Object(self.details.clone()).to_string()
            }
        });

        match self.kind.as_deref() {
            Some("Not Found Error") => PlatformError::NotFound(message),
            Some("Authorization Error") => PlatformError::NotAuthorized(message),
            Some(kind) => PlatformError::Rejected(format!("{}: {}", kind, message)),
            None => PlatformError::Rejected(message),
        }
    }
}

/// Client for the host platform's action API (`/api/3/action/<name>`)
pub struct CkanClient {
    http: reqwest::Client,
    base_url: Url,
    service_key: Option<String>,
}

impl CkanClient {
    pub fn new(base_url: &str, service_key: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid platform URL: {}", base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("staging-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            service_key,
        })
    }

    fn action_url(&self, action: &str) -> Result<Url, PlatformError> {
        self.base_url
            .join(&format!("api/3/action/{}", action))
            .map_err(|e| PlatformError::InvalidResponse(format!("Bad action URL: {}", e)))
    }

    fn authorize(&self, request: RequestBuilder, caller: &Caller) -> RequestBuilder {
        let caller = caller.clone().or_service_key(self.service_key.as_deref());
        match caller.api_key {
            Some(key) => request.header("Authorization", key),
            None => request,
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PlatformError> {
        let response = request.send().await?;
        let status = response.status();
        let body: ActionResponse<T> = response.json().await.map_err(|e| {
            PlatformError::InvalidResponse(format!("HTTP {}: {}", status, e))
        })?;

        if body.success {
            return body
                .result
                .ok_or_else(|| PlatformError::InvalidResponse("Missing result".to_string()));
        }

        Err(match body.error {
            Some(error) => error.into_platform_error(),
            None => PlatformError::Rejected(format!("Action failed with HTTP {}", status)),
        })
    }

    /// Multipart body carrying every record field plus the staged file, streamed from disk
    fn resource_form(
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<Form, PlatformError> {
        let mut form = Form::new();
        for (key, value) in &record.fields {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }

        let body = reqwest::Body::wrap_stream(ReaderStream::new(content.reader));
        let upload = Part::stream_with_length(body, content.size)
            .file_name(record.filename.clone())
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())?;
        Ok(form.part("upload", upload))
    }
}

#[async_trait]
impl HostPlatform for CkanClient {
    async fn show_dataset(
        &self,
        caller: &Caller,
        dataset_id: &str,
    ) -> Result<DatasetRecord, PlatformError> {
        let url = self.action_url("package_show")?;
        let request = self.http.get(url).query(&[("id", dataset_id)]);
        self.call(self.authorize(request, caller)).await
    }

    async fn create_resource(
        &self,
        caller: &Caller,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<String, PlatformError> {
        let url = self.action_url("resource_create")?;
        let request = self
            .http
            .post(url)
            .multipart(Self::resource_form(record, content)?);
        let created: ResourceSummary = self.call(self.authorize(request, caller)).await?;
        Ok(created.id)
    }

    async fn update_resource(
        &self,
        caller: &Caller,
        resource_id: &str,
        record: &ResourceRecord,
        content: StagedContent,
    ) -> Result<(), PlatformError> {
        let url = self.action_url("resource_update")?;
        let form = Self::resource_form(record, content)?.text("id", resource_id.to_string());
        let request = self.http.post(url).multipart(form);
        let _: Value = self.call(self.authorize(request, caller)).await?;
        Ok(())
    }

    async fn activate_dataset(
        &self,
        caller: &Caller,
        dataset_id: &str,
    ) -> Result<(), PlatformError> {
        let url = self.action_url("package_patch")?;
        let request = self
            .http
            .post(url)
            .json(&json!({ "id": dataset_id, "state": "active" }));
        let _: Value = self.call(self.authorize(request, caller)).await?;
        Ok(())
    }
}
