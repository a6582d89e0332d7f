//! Domain error types

use thiserror::Error;

use crate::domain::camera::CameraStatus;
use crate::domain::encoder::InvalidStateTransition;

/// Errors surfaced by the stream orchestration engine.
///
/// Failures that happen after a stream is already running (encoder
/// crashes) have no synchronous caller; they are recorded on the
/// session instead of being returned from a call.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Stream not found: {0}")]
    SessionNotFound(String),

    #[error("Camera is not available: {id} (status: {status})")]
    Unavailable { id: String, status: CameraStatus },

    #[error(
        "Insufficient disk space: {} available, {} required",
        format_bytes(*.available),
        format_bytes(*.required)
    )]
    InsufficientStorage { available: u64, required: u64 },

    #[error("Stream failed to start: timeout waiting for first segment")]
    StartTimeout,

    #[error("Stream start aborted: stopped before the first segment appeared")]
    StartAborted,

    #[error("Failed to launch encoder: {0}")]
    ProcessSpawn(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),

    #[error("Invalid stream options: {0}")]
    InvalidOptions(String),

    #[error("Storage check failed: {0}")]
    Storage(String),
}

/// Format a byte count as a human readable string (e.g. "1.5 GB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let exp = ((bytes as f64).log2() / 10.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    if exp == 0 {
        return format!("{} B", bytes);
    }

    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_zero() {
        assert_eq!(format_bytes(0), "0 B");
    }

    #[test]
    fn format_bytes_small() {
        assert_eq!(format_bytes(512), "512 B");
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn insufficient_storage_message_reports_both_sides() {
        let err = StreamError::InsufficientStorage {
            available: 100 * 1024 * 1024,
            required: 500 * 1024 * 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("100 MB"), "unexpected message: {}", msg);
        assert!(msg.contains("500 MB"), "unexpected message: {}", msg);
    }

    #[test]
    fn unavailable_message_includes_status() {
        let err = StreamError::Unavailable {
            id: "cam-1".to_string(),
            status: CameraStatus::InUse,
        };
        let msg = err.to_string();
        assert!(msg.contains("cam-1"));
        assert!(msg.contains("in-use"));
    }
}
