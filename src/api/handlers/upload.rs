use crate::api::error::AppError;
use crate::models::StagedFileInfo;
use crate::services::receiver::ChunkUpload;
use crate::utils::auth::Caller;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub files: Vec<StagedFileInfo>,
}

#[derive(Debug, Default, Validate)]
struct UploadForm {
    #[validate(length(min = 1, message = "package_id is required"))]
    dataset_id: String,
    file: Option<(String, Bytes)>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Chunk exceeds the maximum allowed size".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[utoipa::path(
    post,
    path = "/file_uploader_ui/upload",
    request_body(content = Multipart, description = "package_id (or dataset_id) plus exactly one file part"),
    params(
        ("Content-Range" = Option<String>, Header, description = "bytes start-stop/length of this chunk")
    ),
    responses(
        (status = 200, description = "Chunk staged", body = UploadResponse),
        (status = 400, description = "Malformed upload"),
        (status = 403, description = "Caller may not edit the dataset"),
        (status = 404, description = "Dataset not found")
    ),
    tag = "uploads"
)]
pub async fn upload_chunk(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut form = UploadForm::default();

    // Fields may arrive in any order, so the chunk is buffered until the form is complete
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(filename) = field.file_name().map(str::to_string) {
            if form.file.is_some() {
                return Err(AppError::BadRequest(
                    "Exactly one file may be uploaded per request".to_string(),
                ));
            }
            let data = field.bytes().await.map_err(multipart_error)?;
            form.file = Some((filename, data));
        } else if name == "package_id" || name == "dataset_id" {
            form.dataset_id = field.text().await.map_err(multipart_error)?.trim().to_string();
        }
    }

    form.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let (filename, data) = form
        .file
        .ok_or(AppError::BadRequest("No file provided".to_string()))?;

    let content_range = headers
        .get(header::CONTENT_RANGE)
        .map(|v| v.to_str().map(str::to_string))
        .transpose()
        .map_err(|_| AppError::BadRequest("Content-Range is not valid ASCII".to_string()))?;

    let staged = state
        .receiver
        .receive(
            &caller,
            ChunkUpload {
                dataset_id: form.dataset_id,
                filename,
                content_range,
                data,
            },
        )
        .await?;

    Ok(Json(UploadResponse {
        files: vec![staged],
    }))
}
