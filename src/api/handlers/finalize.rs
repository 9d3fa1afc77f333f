use crate::api::error::AppError;
use crate::models::{DatasetRecord, FailedFile, FinalizeOutcome};
use crate::services::finalizer::SchemaSelector;
use crate::utils::auth::Caller;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct FinalizeResponse {
    pub dataset_id: String,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub activated: bool,
    pub message: String,
    /// Resource listing of the dataset in the host UI
    pub redirect: String,
}

#[derive(Serialize, ToSchema)]
pub struct ActivateResponse {
    pub dataset_id: String,
    pub state: String,
    pub redirect: String,
}

fn resources_url(dataset: &DatasetRecord) -> String {
    format!("/dataset/resources/{}", dataset.id)
}

fn finalize_response(dataset: DatasetRecord, outcome: FinalizeOutcome) -> FinalizeResponse {
    FinalizeResponse {
        redirect: resources_url(&dataset),
        message: outcome.message(),
        dataset_id: dataset.id,
        created: outcome.created,
        updated: outcome.updated,
        failed: outcome.failed,
        activated: outcome.activated,
    }
}

#[utoipa::path(
    get,
    path = "/file_uploader_ui/finish/{dataset_id}",
    params(
        ("dataset_id" = String, Path, description = "Dataset id or name")
    ),
    responses(
        (status = 200, description = "Staged files converted", body = FinalizeResponse),
        (status = 403, description = "Caller may not edit the dataset"),
        (status = 404, description = "Dataset not found")
    ),
    tag = "uploads"
)]
pub async fn finish(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<Caller>,
    Path(dataset_id): Path<String>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (dataset, outcome) = state.finalizer.finalize(&caller, &dataset_id, None).await?;
    Ok(Json(finalize_response(dataset, outcome)))
}

#[utoipa::path(
    get,
    path = "/file_uploader_ui/finish/{dataset_id}/{dataset_type}/{resource_type}",
    params(
        ("dataset_id" = String, Path, description = "Dataset id or name"),
        ("dataset_type" = String, Path, description = "Dataset schema type"),
        ("resource_type" = String, Path, description = "Resource type within that schema")
    ),
    responses(
        (status = 200, description = "Staged files converted with schema defaults", body = FinalizeResponse),
        (status = 403, description = "Caller may not edit the dataset"),
        (status = 404, description = "Dataset not found")
    ),
    tag = "uploads"
)]
pub async fn finish_typed(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<Caller>,
    Path((dataset_id, dataset_type, resource_type)): Path<(String, String, String)>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let selector = SchemaSelector {
        dataset_type,
        resource_type,
    };
    let (dataset, outcome) = state
        .finalizer
        .finalize(&caller, &dataset_id, Some(&selector))
        .await?;
    Ok(Json(finalize_response(dataset, outcome)))
}

#[utoipa::path(
    get,
    path = "/file_uploader_ui/add_resources/{dataset_id}",
    params(
        ("dataset_id" = String, Path, description = "Dataset id or name")
    ),
    responses(
        (status = 200, description = "Dataset marked active", body = ActivateResponse),
        (status = 403, description = "Caller may not edit the dataset"),
        (status = 404, description = "Dataset not found")
    ),
    tag = "uploads"
)]
pub async fn add_resources(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<Caller>,
    Path(dataset_id): Path<String>,
) -> Result<Json<ActivateResponse>, AppError> {
    let dataset = state.finalizer.activate(&caller, &dataset_id).await?;
    Ok(Json(ActivateResponse {
        redirect: resources_url(&dataset),
        dataset_id: dataset.id,
        state: "active".to_string(),
    }))
}
