use crate::models::StagedFileInfo;
use crate::services::error::UploadResult;
use crate::services::platform::HostPlatform;
use crate::services::staging::{StagingKey, StagingStore};
use crate::utils::auth::Caller;
use crate::utils::content_range::UploadRange;
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::staged_filename;
use bytes::Bytes;
use std::sync::Arc;

/// One byte range delivered by a client
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    /// Dataset id or name, as sent by the client
    pub dataset_id: String,
    pub filename: String,
    /// Raw `Content-Range` header; absent when the whole file comes in one call
    pub content_range: Option<String>,
    pub data: Bytes,
}

/// Writes uploaded chunks into the per-dataset staging area
pub struct ChunkReceiver {
    store: Arc<dyn StagingStore>,
    platform: Arc<dyn HostPlatform>,
    locks: KeyedMutex<StagingKey>,
}

impl ChunkReceiver {
    pub fn new(
        store: Arc<dyn StagingStore>,
        platform: Arc<dyn HostPlatform>,
        locks: KeyedMutex<StagingKey>,
    ) -> Self {
        Self {
            store,
            platform,
            locks,
        }
    }

    pub async fn receive(&self, caller: &Caller, upload: ChunkUpload) -> UploadResult<StagedFileInfo> {
        // The lookup is the authorization check and must precede any staging I/O
        let dataset = self
            .platform
            .show_dataset(caller, &upload.dataset_id)
            .await?;

        let filename = staged_filename(&upload.filename)?;
        let range = upload
            .content_range
            .as_deref()
            .map(str::parse::<UploadRange>)
            .transpose()?;
        if let Some(range) = &range {
            range.check_payload(upload.data.len())?;
        }

        let key = StagingKey::new(dataset.id, filename)?;
        let offset = range.map_or(0, |r| r.start);

        tracing::info!(
            "Staging {} bytes of '{}' for dataset {} at offset {}",
            upload.data.len(),
            key.filename,
            key.dataset_id,
            offset
        );

        let size = {
            let _guard = self.locks.lock(&key).await;
            self.store.put(&key, offset, &upload.data).await
        };
        self.locks.cleanup();
        let size = size.inspect_err(|e| {
            tracing::error!(
                "Failed to stage '{}' for dataset {}: {}",
                key.filename,
                key.dataset_id,
                e
            )
        })?;

        if let Some(total) = range.and_then(|r| r.length) {
            if size >= total {
                tracing::info!(
                    "'{}' for dataset {} fully staged ({} bytes)",
                    key.filename,
                    key.dataset_id,
                    size
                );
            }
        }

        Ok(StagedFileInfo {
            name: key.filename,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasetRecord, ResourceRecord};
    use crate::services::platform::PlatformError;
    use crate::services::staging::{LocalStagingStore, StagedContent};
    use async_trait::async_trait;

    struct SingleDataset;

    #[async_trait]
    impl HostPlatform for SingleDataset {
        async fn show_dataset(
            &self,
            _caller: &Caller,
            dataset_id: &str,
        ) -> Result<DatasetRecord, PlatformError> {
            if dataset_id != "ds-1" {
                return Err(PlatformError::NotFound(dataset_id.to_string()));
            }
            Ok(DatasetRecord {
                id: "ds-1".to_string(),
                name: None,
                dataset_type: None,
                state: None,
                resources: Vec::new(),
            })
        }

        async fn create_resource(
            &self,
            _caller: &Caller,
            _record: &ResourceRecord,
            _content: StagedContent,
        ) -> Result<String, PlatformError> {
            unreachable!("receiver never creates resources")
        }

        async fn update_resource(
            &self,
            _caller: &Caller,
            _resource_id: &str,
            _record: &ResourceRecord,
            _content: StagedContent,
        ) -> Result<(), PlatformError> {
            unreachable!("receiver never updates resources")
        }

        async fn activate_dataset(
            &self,
            _caller: &Caller,
            _dataset_id: &str,
        ) -> Result<(), PlatformError> {
            unreachable!("receiver never activates datasets")
        }
    }

    fn chunk(filename: &str, range: Option<&str>, data: &'static [u8]) -> ChunkUpload {
        ChunkUpload {
            dataset_id: "ds-1".to_string(),
            filename: filename.to_string(),
            content_range: range.map(str::to_string),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn test_lock_entries_are_released_after_each_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let locks = KeyedMutex::new();
        let receiver = ChunkReceiver::new(
            Arc::new(LocalStagingStore::new(dir.path())),
            Arc::new(SingleDataset),
            locks.clone(),
        );
        let caller = Caller::anonymous();

        for name in ["a.bin", "b.bin", "c.bin"] {
            let staged = receiver
                .receive(&caller, chunk(name, Some("bytes 0-2/6"), b"abc"))
                .await
                .unwrap();
            assert_eq!(staged.size, 3);
        }
        assert!(locks.is_empty());

        let staged = receiver
            .receive(&caller, chunk("a.bin", Some("bytes 3-5/6"), b"def"))
            .await
            .unwrap();
        assert_eq!(staged.size, 6);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_also_releases_lock_entry() {
        let dir = tempfile::tempdir().unwrap();
        let locks = KeyedMutex::new();
        let receiver = ChunkReceiver::new(
            Arc::new(LocalStagingStore::new(dir.path())),
            Arc::new(SingleDataset),
            locks.clone(),
        );

        let result = receiver
            .receive(
                &Caller::anonymous(),
                chunk(
                    "ghost.bin",
                    Some("bytes 9300000000000000000-9300000000000000002/*"),
                    b"abc",
                ),
            )
            .await;

        assert!(result.is_err());
        assert!(locks.is_empty());
    }
}
