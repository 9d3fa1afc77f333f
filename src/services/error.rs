use crate::services::platform::PlatformError;
use thiserror::Error;

pub type UploadResult<T> = Result<T, UploadError>;

/// Failures of the staging protocol, shared by the chunk receiver and the finalizer
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Staging storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Platform rejected the change: {0}")]
    Persistence(String),

    #[error("{count} existing resources are named '{name}'")]
    AmbiguousMatch { name: String, count: usize },
}

impl UploadError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedRequest(message.into())
    }
}

impl From<PlatformError> for UploadError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(msg) => Self::NotFound(msg),
            PlatformError::NotAuthorized(msg) => Self::NotAuthorized(msg),
            PlatformError::Rejected(msg) => Self::Persistence(msg),
            PlatformError::Transport(e) => Self::Persistence(e.to_string()),
            PlatformError::InvalidResponse(msg) => Self::Persistence(msg),
        }
    }
}
