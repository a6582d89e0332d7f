//! Stream session entity
//!
//! Status transitions are monotonic:
//!
//!   STARTING -> RUNNING  (first output observed)
//!   STARTING -> STOPPED | ERROR
//!   RUNNING  -> STOPPING -> STOPPED
//!   RUNNING  -> STOPPED | ERROR
//!
//! `Stopped` and `Error` are terminal; a record in either state only
//! ever leaves the registry by deletion.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::options::StreamOptions;

/// Stream lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl StreamStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Starting and running streams hold resources.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One live capture-to-HLS publishing instance bound to a camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub id: String,
    pub camera_id: String,
    pub status: StreamStatus,
    /// HLS manifest URL, populated once running
    pub hls_url: Option<String>,
    pub resolution: String,
    pub framerate: u32,
    pub video_bitrate: Option<String>,
    pub audio_bitrate: Option<String>,
    /// Populated on the first transition to running
    pub started_at: Option<DateTime<Utc>>,
    /// Last error message, populated when status is `Error`
    pub error: Option<String>,
}

impl StreamSession {
    /// Create a session record in `Starting` state, before any
    /// subprocess exists.
    pub fn new(id: impl Into<String>, camera_id: impl Into<String>, options: &StreamOptions) -> Self {
        Self {
            id: id.into(),
            camera_id: camera_id.into(),
            status: StreamStatus::Starting,
            hls_url: None,
            resolution: options.resolution_or_default(),
            framerate: options.framerate_or_default(),
            video_bitrate: options.video_bitrate.clone(),
            audio_bitrate: options.audio_bitrate.clone(),
            started_at: None,
            error: None,
        }
    }

    /// Publish the session as running. Only legal from `Starting`.
    pub fn mark_running(&mut self, hls_url: impl Into<String>) -> bool {
        if self.status != StreamStatus::Starting {
            return false;
        }
        self.status = StreamStatus::Running;
        self.hls_url = Some(hls_url.into());
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        true
    }

    /// Mark the session stopped. A no-op on terminal records.
    pub fn mark_stopped(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = StreamStatus::Stopped;
        true
    }

    /// Record a failure. A no-op on terminal records.
    pub fn mark_error(&mut self, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = StreamStatus::Error;
        self.error = Some(message.into());
        true
    }
}
