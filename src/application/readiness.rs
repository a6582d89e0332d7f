//! Output readiness monitor
//!
//! A stream is ready once the encoder has written its playlist file.
//! The wait is bounded, sleeps between checks, and resolves early when
//! the stream is stopped mid-wait.

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// How a readiness wait resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The playlist appeared within the timeout
    Ready,
    /// The timeout elapsed first
    TimedOut,
    /// The wait was cancelled by a concurrent stop
    Cancelled,
}

/// Poll for the playlist file until it exists, the timeout elapses, or
/// the token is cancelled.
pub async fn wait_for_playlist(
    playlist: &Path,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> ReadinessOutcome {
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return ReadinessOutcome::Cancelled;
        }
        if tokio::fs::try_exists(playlist).await.unwrap_or(false) {
            return ReadinessOutcome::Ready;
        }
        if Instant::now() >= deadline {
            return ReadinessOutcome::TimedOut;
        }

        tokio::select! {
            _ = cancel.cancelled() => return ReadinessOutcome::Cancelled,
            _ = sleep(poll_interval) => {}
        }
    }
}
