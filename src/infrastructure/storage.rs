//! Disk space probe
//!
//! Backs the coordinator's storage preflight with statvfs. The check
//! runs on the blocking pool; statvfs is synchronous.

use std::path::Path;

use async_trait::async_trait;

use crate::application::ports::{StorageError, StorageProbe};

/// statvfs-backed storage probe.
pub struct DiskSpaceProbe;

#[cfg(unix)]
#[async_trait]
impl StorageProbe for DiskSpaceProbe {
    async fn available_bytes(&self, path: &Path) -> Result<u64, StorageError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let stat = nix::sys::statvfs::statvfs(&path)
                .map_err(|e| StorageError::StatFailed(e.to_string()))?;
            Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
        })
        .await
        .map_err(|e| StorageError::StatFailed(e.to_string()))?
    }
}

#[cfg(not(unix))]
#[async_trait]
impl StorageProbe for DiskSpaceProbe {
    async fn available_bytes(&self, _path: &Path) -> Result<u64, StorageError> {
        Err(StorageError::Unsupported)
    }
}
