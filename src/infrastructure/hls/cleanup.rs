//! Deferred output cleanup
//!
//! Stopped streams keep their files for a grace period so in-flight
//! consumers can finish reading recently fetched segments. Deletion
//! runs off a scheduled-task queue driven by time, which makes it
//! deterministic under test and lets failed deletions be retried.
//! Deletion failures are logged, never propagated.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::layout::HlsLayout;

struct PendingDelete {
    session_id: String,
    due_at: Instant,
}

/// In-memory scheduled deletion queue for stream output directories.
pub struct CleanupQueue {
    layout: Arc<HlsLayout>,
    retry_delay: Duration,
    pending: Mutex<Vec<PendingDelete>>,
}

impl CleanupQueue {
    pub fn new(layout: Arc<HlsLayout>, retry_delay: Duration) -> Self {
        Self {
            layout,
            retry_delay,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingDelete>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a stream's files for deletion after `grace`.
    /// Re-scheduling an already queued stream replaces its due time.
    pub fn schedule(&self, session_id: &str, grace: Duration) {
        let due_at = Instant::now() + grace;
        let mut pending = self.lock();
        if let Some(task) = pending.iter_mut().find(|t| t.session_id == session_id) {
            task.due_at = due_at;
        } else {
            pending.push(PendingDelete {
                session_id: session_id.to_string(),
                due_at,
            });
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Delete every task due at `now`. Failed deletions are logged and
    /// re-queued after the retry delay. Returns how many directories
    /// were deleted.
    pub async fn run_due(&self, now: Instant) -> usize {
        let due: Vec<PendingDelete> = {
            let mut pending = self.lock();
            let mut due = Vec::new();
            let mut i = 0;
            while i < pending.len() {
                if pending[i].due_at <= now {
                    due.push(pending.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            due
        };

        let mut deleted = 0;
        for task in due {
            match self.layout.delete_stream_files(&task.session_id).await {
                Ok(()) => {
                    debug!(stream = %task.session_id, "cleaned up stream files");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(
                        stream = %task.session_id,
                        error = %e,
                        "failed to clean up stream files; will retry"
                    );
                    self.lock().push(PendingDelete {
                        session_id: task.session_id,
                        due_at: now + self.retry_delay,
                    });
                }
            }
        }
        deleted
    }

    /// Drive the queue until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_due(Instant::now()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn queue() -> (tempfile::TempDir, Arc<HlsLayout>, CleanupQueue) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Arc::new(HlsLayout::new(dir.path()));
        let queue = CleanupQueue::new(Arc::clone(&layout), Duration::from_secs(30));
        (dir, layout, queue)
    }

    #[tokio::test]
    async fn nothing_deleted_before_due_time() {
        let (_guard, layout, queue) = queue();
        layout.ensure_stream_dir("s1").await.unwrap();

        queue.schedule("s1", Duration::from_secs(30));
        assert_eq!(queue.run_due(Instant::now()).await, 0);
        assert!(layout.stream_dir("s1").exists());
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn due_tasks_delete_the_directory() {
        let (_guard, layout, queue) = queue();
        layout.ensure_stream_dir("s1").await.unwrap();
        fs::write(layout.playlist_path("s1"), "#EXTM3U\n").await.unwrap();

        queue.schedule("s1", Duration::ZERO);
        let deleted = queue.run_due(Instant::now() + Duration::from_millis(1)).await;

        assert_eq!(deleted, 1);
        assert!(!layout.stream_dir("s1").exists());
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn missing_directory_counts_as_deleted() {
        let (_guard, _layout, queue) = queue();

        queue.schedule("never-existed", Duration::ZERO);
        let deleted = queue.run_due(Instant::now() + Duration::from_millis(1)).await;

        assert_eq!(deleted, 1);
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_due_time() {
        let (_guard, layout, queue) = queue();
        layout.ensure_stream_dir("s1").await.unwrap();

        queue.schedule("s1", Duration::ZERO);
        queue.schedule("s1", Duration::from_secs(60));
        assert_eq!(queue.pending_count(), 1);

        // the earlier due time no longer applies
        assert_eq!(queue.run_due(Instant::now() + Duration::from_secs(1)).await, 0);
        assert!(layout.stream_dir("s1").exists());
    }

    #[tokio::test]
    async fn only_due_tasks_run() {
        let (_guard, layout, queue) = queue();
        layout.ensure_stream_dir("soon").await.unwrap();
        layout.ensure_stream_dir("later").await.unwrap();

        queue.schedule("soon", Duration::ZERO);
        queue.schedule("later", Duration::from_secs(300));

        let deleted = queue.run_due(Instant::now() + Duration::from_millis(1)).await;
        assert_eq!(deleted, 1);
        assert!(!layout.stream_dir("soon").exists());
        assert!(layout.stream_dir("later").exists());
        assert_eq!(queue.pending_count(), 1);
    }
}
