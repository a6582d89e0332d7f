//! ffmpeg-based camera enumeration
//!
//! The listing invocations print devices to stderr and exit nonzero by
//! design; the scanner captures stderr, parses it with the pure
//! functions below, and never treats the exit code as an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::application::ports::{DeviceEnumerator, EnumerationError};
use crate::domain::camera::{infer_camera_kind, CameraDevice, CameraKind};

use super::platform::Platform;

/// Bound on any discovery subprocess run.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Highest /dev/videoN node probed on Linux.
const MAX_VIDEO_NODES: u32 = 10;

/// Enumerates cameras by running the platform's ffmpeg listing
/// invocation (or scanning /dev/video* on Linux).
pub struct FfmpegDeviceScanner {
    ffmpeg_path: PathBuf,
    platform: Platform,
}

impl FfmpegDeviceScanner {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            platform: Platform::current(),
        }
    }

    async fn run_listing(&self) -> Result<String, EnumerationError> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(self.platform.list_devices_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EnumerationError::DiscoveryFailed(e.to_string()))?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            EnumerationError::DiscoveryFailed("no stderr from device listing".to_string())
        })?;

        let mut output = String::new();
        let read = async {
            let _ = stderr.read_to_string(&mut output).await;
            let _ = child.wait().await;
        };
        if tokio::time::timeout(DISCOVERY_TIMEOUT, read).await.is_err() {
            let _ = child.start_kill();
            debug!("device listing timed out; using partial output");
        }

        Ok(output)
    }
}

#[async_trait]
impl DeviceEnumerator for FfmpegDeviceScanner {
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, EnumerationError> {
        match self.platform {
            Platform::Windows => Ok(parse_dshow_listing(&self.run_listing().await?)),
            Platform::Macos => Ok(parse_avfoundation_listing(&self.run_listing().await?)),
            Platform::Linux => Ok(scan_video_nodes().await),
        }
    }
}

/// Parse a DirectShow device listing.
///
/// Newer ffmpeg builds tag each line with the device class:
///
///   [dshow @ ...] "Integrated Camera" (video)
///   [dshow @ ...] "OBS Virtual Camera" (none)
///
/// Older builds group devices under section headers instead; when the
/// tagged form yields nothing we fall back to section parsing.
pub fn parse_dshow_listing(output: &str) -> Vec<CameraDevice> {
    let mut cameras = Vec::new();

    for line in output.lines() {
        if !line.contains("[dshow") {
            continue;
        }
        let Some(name) = quoted(line) else { continue };

        if line.contains("(video)") {
            cameras.push(CameraDevice::new(name, name, infer_camera_kind(name)));
        } else if line.contains("(none)") {
            cameras.push(CameraDevice::new(name, name, CameraKind::Virtual));
        }
    }

    if !cameras.is_empty() {
        return cameras;
    }

    // legacy format with section headers
    let mut in_video_section = false;
    for line in output.lines() {
        if line.contains("DirectShow video devices") {
            in_video_section = true;
            continue;
        }
        if line.contains("DirectShow audio devices") {
            in_video_section = false;
            continue;
        }
        if !in_video_section {
            continue;
        }
        if let Some(name) = quoted(line) {
            // skip alternative names
            if !name.starts_with("@device") {
                cameras.push(CameraDevice::new(name, name, infer_camera_kind(name)));
            }
        }
    }

    cameras
}

/// Parse an AVFoundation device listing:
///
///   [AVFoundation indev @ ...] AVFoundation video devices:
///   [AVFoundation indev @ ...] [0] FaceTime HD Camera
///   [AVFoundation indev @ ...] AVFoundation audio devices:
pub fn parse_avfoundation_listing(output: &str) -> Vec<CameraDevice> {
    let mut cameras = Vec::new();
    let mut in_video_section = false;

    for line in output.lines() {
        if line.contains("AVFoundation video devices:") {
            in_video_section = true;
            continue;
        }
        if line.contains("AVFoundation audio devices:") {
            in_video_section = false;
            continue;
        }
        if !in_video_section {
            continue;
        }

        if let Some((index, name)) = bracketed_index(line) {
            cameras.push(CameraDevice::new(
                index.to_string(),
                name,
                infer_camera_kind(name),
            ));
        }
    }

    cameras
}

/// Scan /dev/video* nodes. V4L2 has no useful ffmpeg listing, so
/// device files are probed directly.
async fn scan_video_nodes() -> Vec<CameraDevice> {
    let mut cameras = Vec::new();
    for index in 0..MAX_VIDEO_NODES {
        let path = format!("/dev/video{}", index);
        if tokio::fs::metadata(&path).await.is_ok() {
            cameras.push(CameraDevice::new(
                path,
                format!("Video Device {}", index),
                CameraKind::Unknown,
            ));
        }
    }
    cameras
}

/// First double-quoted substring in a line.
fn quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    Some(&line[start..end])
}

/// Trailing `[N] Name` pair in an AVFoundation listing line.
fn bracketed_index(line: &str) -> Option<(u32, &str)> {
    // the line prefix is itself bracketed ("[AVFoundation indev @ ...]"),
    // so take the last bracket pair that holds a number
    let open = line.rfind('[')?;
    let close = open + line[open..].find(']')?;
    let index: u32 = line[open + 1..close].trim().parse().ok()?;
    let name = line[close + 1..].trim();
    if name.is_empty() {
        return None;
    }
    Some((index, name))
}

/// Check that ffmpeg is runnable and report its version string.
pub async fn probe_ffmpeg(ffmpeg_path: &Path) -> Result<String, EnumerationError> {
    let run = Command::new(ffmpeg_path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(DISCOVERY_TIMEOUT, run)
        .await
        .map_err(|_| EnumerationError::DiscoveryFailed("ffmpeg version check timed out".into()))?
        .map_err(|e| EnumerationError::DiscoveryFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(EnumerationError::DiscoveryFailed(format!(
            "ffmpeg exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version(&stdout)
        .map(str::to_string)
        .ok_or_else(|| EnumerationError::DiscoveryFailed("unrecognized version output".into()))
}

/// Extract the version token from `ffmpeg -version` output.
pub fn parse_version(output: &str) -> Option<&str> {
    const PREFIX: &str = "ffmpeg version ";
    let start = output.find(PREFIX)? + PREFIX.len();
    let rest = &output[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::camera::CameraStatus;

    const DSHOW_TAGGED: &str = r#"[dshow @ 000001f4] "Integrated Camera" (video)
[dshow @ 000001f4] "OBS Virtual Camera" (none)
[dshow @ 000001f4] "Microphone (Realtek)" (audio)
"#;

    const DSHOW_LEGACY: &str = r#"[dshow @ 000001f4] DirectShow video devices
[dshow @ 000001f4]  "Logitech HD Webcam"
[dshow @ 000001f4]  "@device_pnp_\\?\usb#vid"
[dshow @ 000001f4] DirectShow audio devices
[dshow @ 000001f4]  "Microphone (Realtek)"
"#;

    const AVFOUNDATION: &str = r#"[AVFoundation indev @ 0x7f8] AVFoundation video devices:
[AVFoundation indev @ 0x7f8] [0] FaceTime HD Camera
[AVFoundation indev @ 0x7f8] [1] OBS Virtual Camera
[AVFoundation indev @ 0x7f8] AVFoundation audio devices:
[AVFoundation indev @ 0x7f8] [0] MacBook Pro Microphone
"#;

    #[test]
    fn dshow_tagged_format() {
        let cameras = parse_dshow_listing(DSHOW_TAGGED);
        assert_eq!(cameras.len(), 2);

        assert_eq!(cameras[0].id, "Integrated Camera");
        assert_eq!(cameras[0].kind, CameraKind::Builtin);
        assert_eq!(cameras[0].status, CameraStatus::Available);

        assert_eq!(cameras[1].id, "OBS Virtual Camera");
        assert_eq!(cameras[1].kind, CameraKind::Virtual);
    }

    #[test]
    fn dshow_legacy_format_skips_alternative_names_and_audio() {
        let cameras = parse_dshow_listing(DSHOW_LEGACY);
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].id, "Logitech HD Webcam");
        assert_eq!(cameras[0].kind, CameraKind::Usb);
    }

    #[test]
    fn dshow_empty_output() {
        assert!(parse_dshow_listing("").is_empty());
    }

    #[test]
    fn avfoundation_video_section_only() {
        let cameras = parse_avfoundation_listing(AVFOUNDATION);
        assert_eq!(cameras.len(), 2);

        assert_eq!(cameras[0].id, "0");
        assert_eq!(cameras[0].name, "FaceTime HD Camera");
        assert_eq!(cameras[0].kind, CameraKind::Builtin);

        assert_eq!(cameras[1].id, "1");
        assert_eq!(cameras[1].name, "OBS Virtual Camera");
        assert_eq!(cameras[1].kind, CameraKind::Virtual);
    }

    #[test]
    fn version_token_parses() {
        let output = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023";
        assert_eq!(parse_version(output), Some("6.1.1-3ubuntu5"));
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn quoted_extracts_first_pair() {
        assert_eq!(quoted(r#"x "Camera Name" (video)"#), Some("Camera Name"));
        assert_eq!(quoted("no quotes"), None);
    }
}
