//! Platform-specific capture input selection
//!
//! ffmpeg reaches cameras through a different input device on each
//! platform: DirectShow on Windows, AVFoundation on macOS, V4L2 on
//! Linux. Everything here is pure so the per-platform argument shapes
//! can be tested anywhere.

/// Supported host platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

impl Platform {
    /// Platform of the running host. Unknown unixes fall back to the
    /// V4L2 path.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Linux
        }
    }

    /// ffmpeg input format flag value for this platform.
    pub const fn input_format(&self) -> &'static str {
        match self {
            Self::Windows => "dshow",
            Self::Macos => "avfoundation",
            Self::Linux => "v4l2",
        }
    }

    /// Arguments that make ffmpeg print its device listing.
    pub fn list_devices_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Windows => &["-f", "dshow", "-list_devices", "true", "-i", "dummy"],
            Self::Macos => &["-f", "avfoundation", "-list_devices", "true", "-i", ""],
            Self::Linux => &["-f", "v4l2", "-list_formats", "all", "-i", "/dev/video0"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// ffmpeg `-i` value addressing one camera.
    pub fn device_input(&self, device_id: &str) -> String {
        match self {
            Self::Windows => format!("video={}", device_id),
            Self::Macos => device_id.to_string(),
            Self::Linux => {
                if device_id.starts_with("/dev/") {
                    device_id.to_string()
                } else {
                    format!("/dev/{}", device_id)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_formats() {
        assert_eq!(Platform::Windows.input_format(), "dshow");
        assert_eq!(Platform::Macos.input_format(), "avfoundation");
        assert_eq!(Platform::Linux.input_format(), "v4l2");
    }

    #[test]
    fn device_input_windows_uses_name() {
        assert_eq!(
            Platform::Windows.device_input("Integrated Camera"),
            "video=Integrated Camera"
        );
    }

    #[test]
    fn device_input_macos_uses_index() {
        assert_eq!(Platform::Macos.device_input("0"), "0");
    }

    #[test]
    fn device_input_linux_normalizes_path() {
        assert_eq!(Platform::Linux.device_input("/dev/video0"), "/dev/video0");
        assert_eq!(Platform::Linux.device_input("video1"), "/dev/video1");
    }
}
