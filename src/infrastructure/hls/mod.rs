//! HLS output layout and deferred cleanup

pub mod cleanup;
pub mod layout;

pub use cleanup::CleanupQueue;
pub use layout::{HlsLayout, HlsUsage};

/// Playlist filename within each stream directory.
pub const HLS_PLAYLIST_NAME: &str = "stream.m3u8";

/// Segment filename pattern within each stream directory.
pub const HLS_SEGMENT_PATTERN: &str = "segment_%03d.ts";
