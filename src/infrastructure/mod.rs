//! Adapter implementations (encoder processes, device discovery,
//! filesystem layout, disk probing)

pub mod devices;
pub mod encoder;
pub mod hls;
pub mod storage;

// Re-export common adapters
pub use devices::{probe_ffmpeg, FfmpegDeviceScanner, Platform};
pub use encoder::{EncoderSupervisor, EncoderWorker, TranscodePlanner};
pub use hls::{CleanupQueue, HlsLayout};
pub use storage::DiskSpaceProbe;
