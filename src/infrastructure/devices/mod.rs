//! Capture device discovery adapters

pub mod platform;
pub mod scanner;

pub use platform::Platform;
pub use scanner::{probe_ffmpeg, FfmpegDeviceScanner};
