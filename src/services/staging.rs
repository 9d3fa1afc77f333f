use crate::services::error::UploadResult;
use crate::utils::validation::validate_segment;
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};

/// Identifies one staged file: at most one exists per dataset and filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingKey {
    pub dataset_id: String,
    pub filename: String,
}

impl StagingKey {
    /// Both parts must be single path segments.
    pub fn new(dataset_id: impl Into<String>, filename: impl Into<String>) -> UploadResult<Self> {
        let key = Self {
            dataset_id: dataset_id.into(),
            filename: filename.into(),
        };
        validate_segment("dataset id", &key.dataset_id)?;
        validate_segment("filename", &key.filename)?;
        Ok(key)
    }
}

/// Open staged file, read front to back when handed to the platform
pub struct StagedContent {
    pub size: u64,
    pub reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
}

impl std::fmt::Debug for StagedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedContent")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Content store behind the staging area.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Writes `data` at `offset` and returns the staged file's size afterwards.
    /// Offset zero replaces any previous content; other offsets overwrite in
    /// place and extend the file when needed. A failed write leaves no file
    /// behind that this call created or truncated.
    async fn put(&self, key: &StagingKey, offset: u64, data: &[u8]) -> UploadResult<u64>;

    /// Filenames currently staged for a dataset, in no particular order
    async fn list(&self, dataset_id: &str) -> UploadResult<Vec<String>>;

    async fn open(&self, key: &StagingKey) -> UploadResult<StagedContent>;

    /// Removes a staged file. Removing a missing file is not an error.
    async fn delete(&self, key: &StagingKey) -> UploadResult<()>;

    async fn health_check(&self) -> bool;
}

/// Staging area on local disk: `<root>/<dataset_id>/<filename>`
pub struct LocalStagingStore {
    root: PathBuf,
}

impl LocalStagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_dir(&self, dataset_id: &str) -> PathBuf {
        self.root.join(dataset_id)
    }

    fn file_path(&self, key: &StagingKey) -> PathBuf {
        self.dataset_dir(&key.dataset_id).join(&key.filename)
    }
}

async fn write_at(path: &Path, offset: u64, data: &[u8]) -> std::io::Result<u64> {
    let mut file = if offset == 0 {
        fs::File::create(path).await?
    } else {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file
    };

    file.write_all(data).await?;
    file.flush().await?;
    file.sync_data().await?;

    Ok(file.metadata().await?.len())
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn put(&self, key: &StagingKey, offset: u64, data: &[u8]) -> UploadResult<u64> {
        fs::create_dir_all(self.dataset_dir(&key.dataset_id)).await?;

        let path = self.file_path(key);
        let existed = fs::try_exists(&path).await?;

        let size = match write_at(&path, offset, data).await {
            Ok(size) => size,
            Err(e) => {
                // Offset zero already truncated, so the old content is gone either way
                if offset == 0 || !existed {
                    if let Err(cleanup) = fs::remove_file(&path).await {
                        if cleanup.kind() != ErrorKind::NotFound {
                            tracing::error!(
                                "Failed to remove {:?} after a failed write: {}",
                                path,
                                cleanup
                            );
                        }
                    }
                }
                return Err(e.into());
            }
        };

        tracing::debug!(
            "Staged {} bytes at offset {} into {:?} (now {} bytes)",
            data.len(),
            offset,
            path,
            size
        );
        Ok(size)
    }

    async fn list(&self, dataset_id: &str) -> UploadResult<Vec<String>> {
        validate_segment("dataset id", dataset_id)?;

        let mut entries = match fs::read_dir(self.dataset_dir(dataset_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!("Skipping staged file with non UTF-8 name: {:?}", raw),
            }
        }
        Ok(names)
    }

    async fn open(&self, key: &StagingKey) -> UploadResult<StagedContent> {
        let file = fs::File::open(self.file_path(key)).await?;
        let size = file.metadata().await?.len();
        Ok(StagedContent {
            size,
            reader: Box::new(file),
        })
    }

    async fn delete(&self, key: &StagingKey) -> UploadResult<()> {
        match fs::remove_file(self.file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> bool {
        fs::create_dir_all(&self.root).await.is_ok()
    }
}
