//! Engine configuration value objects

pub mod engine_config;

pub use engine_config::{
    EngineConfig, EngineTimeouts, DEFAULT_FFMPEG_PATH, DEFAULT_HLS_DIR, DEFAULT_PORT,
};
