//! Storage error types.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Missing or unusable `R2_*` settings.
    #[error("Blob store is not configured: {0}")]
    Config(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Blob upload failed: {0}")]
    Upload(String),

    #[error("Could not sign a download URL: {0}")]
    Presign(String),

    /// Public path outside the asset directory or not under its prefix.
    #[error("Invalid asset path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn presign_failed(msg: impl Into<String>) -> Self {
        Self::Presign(msg.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }
}
