use crate::config::UploaderConfig;
use crate::services::staging::LocalStagingStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn setup_staging(config: &UploaderConfig) -> Result<Arc<LocalStagingStore>> {
    let root = config.staging_root();

    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("Failed to create staging root {:?}", root))?;

    info!("📂 Staging area: {:?}", root);
    Ok(Arc::new(LocalStagingStore::new(root)))
}
