//! Camera device value objects

use std::fmt;

use serde::{Deserialize, Serialize};

/// Camera device status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraStatus {
    Available,
    InUse,
    Disconnected,
    Error,
}

impl CameraStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    Builtin,
    Usb,
    Virtual,
    Unknown,
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Builtin => "builtin",
            Self::Usb => "usb",
            Self::Virtual => "virtual",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Capability metadata reported by some devices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraCapabilities {
    pub resolutions: Vec<String>,
    pub frame_rates: Vec<u32>,
    pub auto_focus: bool,
}

/// A capture device known to the engine.
///
/// The `id` is platform-stable (a DirectShow device name, an
/// AVFoundation index, or a `/dev/videoN` path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: String,
    pub name: String,
    pub kind: CameraKind,
    pub status: CameraStatus,
    pub capabilities: Option<CameraCapabilities>,
}

impl CameraDevice {
    /// Create a freshly enumerated device, available and without
    /// capability metadata.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CameraKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            status: CameraStatus::Available,
            capabilities: None,
        }
    }
}

/// Guess the device category from its display name.
pub fn infer_camera_kind(name: &str) -> CameraKind {
    let lower = name.to_lowercase();

    if lower.contains("facetime") || lower.contains("isight") || lower.contains("integrated") {
        return CameraKind::Builtin;
    }
    if lower.contains("usb") || lower.contains("webcam") || lower.contains("logitech") {
        return CameraKind::Usb;
    }
    if lower.contains("virtual") || lower.contains("obs") || lower.contains("screen") {
        return CameraKind::Virtual;
    }

    CameraKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_is_available() {
        let device = CameraDevice::new("/dev/video0", "Video Device 0", CameraKind::Unknown);
        assert_eq!(device.status, CameraStatus::Available);
        assert!(device.capabilities.is_none());
    }

    #[test]
    fn status_display() {
        assert_eq!(CameraStatus::Available.to_string(), "available");
        assert_eq!(CameraStatus::InUse.to_string(), "in-use");
        assert_eq!(CameraStatus::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn kind_inference() {
        assert_eq!(infer_camera_kind("FaceTime HD Camera"), CameraKind::Builtin);
        assert_eq!(infer_camera_kind("Integrated Camera"), CameraKind::Builtin);
        assert_eq!(infer_camera_kind("Logitech C920"), CameraKind::Usb);
        assert_eq!(infer_camera_kind("USB2.0 Webcam"), CameraKind::Usb);
        assert_eq!(infer_camera_kind("OBS Virtual Camera"), CameraKind::Virtual);
        assert_eq!(infer_camera_kind("Mystery Device"), CameraKind::Unknown);
    }

    #[test]
    fn serializes_with_kebab_case_status() {
        let device = CameraDevice::new("cam-1", "Cam", CameraKind::Usb);
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["kind"], "usb");
    }
}
