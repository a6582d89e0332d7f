//! Storage preflight port

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Storage probe errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Failed to stat filesystem: {0}")]
    StatFailed(String),

    #[error("Disk space checks are not supported on this platform")]
    Unsupported,
}

/// Port reporting available space on the output medium.
#[async_trait]
pub trait StorageProbe: Send + Sync {
    /// Bytes available to unprivileged writers on the filesystem
    /// containing `path`.
    async fn available_bytes(&self, path: &Path) -> Result<u64, StorageError>;
}
