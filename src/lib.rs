pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploaderConfig;
use crate::services::defaults::ResourceDefaults;
use crate::services::finalizer::Finalizer;
use crate::services::platform::{HostPlatform, SchemaRegistry};
use crate::services::receiver::ChunkReceiver;
use crate::services::staging::StagingStore;
use crate::utils::keyed_mutex::KeyedMutex;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_chunk,
        api::handlers::finalize::finish,
        api::handlers::finalize::finish_typed,
        api::handlers::finalize::add_resources,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadResponse,
            api::handlers::finalize::FinalizeResponse,
            api::handlers::finalize::ActivateResponse,
            api::handlers::health::HealthResponse,
            models::StagedFileInfo,
            models::FailedFile,
        )
    ),
    tags(
        (name = "uploads", description = "Chunked staging and finalization"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: UploaderConfig,
    pub store: Arc<dyn StagingStore>,
    pub receiver: Arc<ChunkReceiver>,
    pub finalizer: Arc<Finalizer>,
}

impl AppState {
    /// Wires both staging components around one store and one lock table
    pub fn new(
        config: UploaderConfig,
        store: Arc<dyn StagingStore>,
        platform: Arc<dyn HostPlatform>,
        schemas: Option<Arc<dyn SchemaRegistry>>,
    ) -> Self {
        let locks = KeyedMutex::new();

        let receiver = Arc::new(ChunkReceiver::new(
            store.clone(),
            platform.clone(),
            locks.clone(),
        ));

        let finalizer = Arc::new(Finalizer::new(
            store.clone(),
            platform,
            schemas,
            ResourceDefaults::new(config.resource_defaults.clone()),
            config.ambiguous_match_policy,
            locks,
        ));

        Self {
            config,
            store,
            receiver,
            finalizer,
        }
    }
}

fn cors_layer(config: &UploaderConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/file_uploader_ui/upload",
            post(api::handlers::upload::upload_chunk),
        )
        .route(
            "/file_uploader_ui/finish/:dataset_id",
            get(api::handlers::finalize::finish),
        )
        .route(
            "/file_uploader_ui/finish/:dataset_id/:dataset_type/:resource_type",
            get(api::handlers::finalize::finish_typed),
        )
        .route(
            "/file_uploader_ui/add_resources/:dataset_id",
            get(api::handlers::finalize::add_resources),
        )
        .layer(from_fn(api::middleware::auth::caller_middleware))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_chunk_size + 1024 * 1024, // 1MB buffer for multipart overhead
        ))
        .with_state(state)
}
