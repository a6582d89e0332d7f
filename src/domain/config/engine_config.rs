//! Engine configuration
//!
//! The configuration surface is environment-style: a fixed set of
//! recognized options with documented defaults, no dynamic schema.

use std::path::PathBuf;
use std::time::Duration;

/// Default listening port advertised to the HTTP layer.
pub const DEFAULT_PORT: u16 = 3001;

/// Default base directory for HLS output.
pub const DEFAULT_HLS_DIR: &str = "./public/hls";

/// Default encoder executable.
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Minimum free disk space required to start a stream (500 MB).
const MIN_FREE_BYTES: u64 = 500 * 1024 * 1024;

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Encoder executable path
    pub ffmpeg_path: PathBuf,
    /// Base directory for per-stream HLS output
    pub hls_root: PathBuf,
    /// Listening port, recorded for the HTTP layer
    pub port: u16,
    pub timeouts: EngineTimeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            hls_root: PathBuf::from(DEFAULT_HLS_DIR),
            port: DEFAULT_PORT,
            timeouts: EngineTimeouts::default(),
        }
    }
}

/// Every bounded wait in the engine, each independent.
///
/// None of these may block the coordinator indefinitely; tests shrink
/// them to keep scenarios fast.
#[derive(Debug, Clone, Copy)]
pub struct EngineTimeouts {
    /// How long a freshly spawned encoder may sit in `starting` before
    /// it is optimistically treated as running. Encoders that never
    /// print a start marker would otherwise be stuck forever; set this
    /// high and treat the promotion as a policy decision, not a
    /// heuristic.
    pub process_start_grace: Duration,
    /// Grace period between the quit signal and a forced kill
    pub stop_grace: Duration,
    /// Additional wait after a forced kill before giving up on the
    /// exit notification
    pub kill_wait: Duration,
    /// Maximum time to wait for the first playlist output
    pub readiness_timeout: Duration,
    /// Poll interval for the readiness check
    pub readiness_poll: Duration,
    /// Delay before a stopped stream's files are deleted, allowing
    /// in-flight consumers to finish reading
    pub cleanup_grace: Duration,
    /// Re-schedule delay after a failed deletion
    pub cleanup_retry: Duration,
    /// How long stopped/errored session records are retained
    pub retention: Duration,
    /// Interval between orphan/eviction maintenance sweeps
    pub sweep_interval: Duration,
    /// Free bytes required on the output medium before a start
    pub min_free_bytes: u64,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            process_start_grace: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
            kill_wait: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(15),
            readiness_poll: Duration::from_millis(500),
            cleanup_grace: Duration::from_secs(30),
            cleanup_retry: Duration::from_secs(30),
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            min_free_bytes: MIN_FREE_BYTES,
        }
    }
}
