//! Per-stream HLS output layout
//!
//! Each stream owns one directory under the HLS root holding its
//! playlist and numbered segments. The engine only creates, checks,
//! measures, and deletes these; the playlist format itself belongs to
//! the encoder.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::HLS_PLAYLIST_NAME;

/// Aggregate disk usage under the HLS root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HlsUsage {
    pub streams: Vec<(String, u64)>,
    pub total_bytes: u64,
}

/// Path layout for HLS output under a single base directory.
pub struct HlsLayout {
    root: PathBuf,
}

impl HlsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stream_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    pub fn playlist_path(&self, session_id: &str) -> PathBuf {
        self.stream_dir(session_id).join(HLS_PLAYLIST_NAME)
    }

    /// Public manifest URL, relative to the server root.
    pub fn hls_url(&self, session_id: &str) -> String {
        format!("/hls/{}/{}", session_id, HLS_PLAYLIST_NAME)
    }

    /// Create the stream's output directory (and the root, if needed).
    pub async fn ensure_stream_dir(&self, session_id: &str) -> io::Result<PathBuf> {
        let dir = self.stream_dir(session_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn playlist_exists(&self, session_id: &str) -> bool {
        fs::try_exists(self.playlist_path(session_id))
            .await
            .unwrap_or(false)
    }

    /// Delete a stream's entire output directory. Missing directories
    /// are not an error.
    pub async fn delete_stream_files(&self, session_id: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.stream_dir(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Total size of a stream's output files.
    pub async fn stream_size(&self, session_id: &str) -> u64 {
        let dir = self.stream_dir(session_id);
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            return 0;
        };

        let mut total = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(metadata) = entry.metadata().await {
                if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }
        total
    }

    /// Disk usage for every stream directory under the root.
    pub async fn disk_usage(&self) -> HlsUsage {
        let mut usage = HlsUsage::default();
        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return usage;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let size = self.stream_size(&name).await;
            if size > 0 {
                usage.total_bytes += size;
                usage.streams.push((name, size));
            }
        }
        usage
    }

    /// Remove stream directories whose session id is not in `tracked`.
    /// Returns how many directories were deleted.
    pub async fn sweep_orphans(&self, tracked: &HashSet<String>) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir && !tracked.contains(&name) && self.delete_stream_files(&name).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
