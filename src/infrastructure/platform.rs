use crate::config::UploaderConfig;
use crate::services::ckan::CkanClient;
use crate::services::platform::{HostPlatform, SchemaRegistry};
use crate::services::schema_registry::FileSchemaRegistry;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub fn setup_platform(config: &UploaderConfig) -> Result<Arc<dyn HostPlatform>> {
    let client = CkanClient::new(&config.platform_url, config.platform_api_key.clone())?;

    info!(
        "🌐 Host platform: {} (service key: {})",
        config.platform_url,
        if config.platform_api_key.is_some() { "set" } else { "none" }
    );

    Ok(Arc::new(client))
}

pub async fn setup_schema_registry(
    config: &UploaderConfig,
) -> Result<Option<Arc<dyn SchemaRegistry>>> {
    let Some(path) = &config.schema_defaults_path else {
        info!("📋 No schema defaults configured");
        return Ok(None);
    };

    let registry = FileSchemaRegistry::load(path).await?;
    info!(
        "📋 Loaded {} resource schema(s) from {:?}",
        registry.len(),
        path
    );
    Ok(Some(Arc::new(registry)))
}
