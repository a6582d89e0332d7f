//! HLS transcode invocation planning
//!
//! Maps a transcode spec to a concrete ffmpeg command line. Pure and
//! deterministic given the spec and platform, so every platform's
//! argument shape is testable anywhere.

use std::path::PathBuf;

use crate::application::ports::{Invocation, InvocationPlanner, TranscodeSpec};
use crate::infrastructure::devices::Platform;
use crate::infrastructure::hls::{HLS_PLAYLIST_NAME, HLS_SEGMENT_PATTERN};

/// HLS segment duration in seconds.
pub const HLS_SEGMENT_DURATION: u32 = 4;

/// Number of segments kept in the live playlist.
pub const HLS_LIST_SIZE: u32 = 5;

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";
const VIDEO_PRESET: &str = "ultrafast";
const VIDEO_TUNE: &str = "zerolatency";
const VIDEO_CRF: u32 = 23;
const AUDIO_SAMPLE_RATE: u32 = 44100;
const AUDIO_CHANNELS: u32 = 2;
const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Builds ffmpeg HLS transcode invocations.
pub struct TranscodePlanner {
    ffmpeg_path: PathBuf,
    platform: Platform,
}

impl TranscodePlanner {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self::for_platform(ffmpeg_path, Platform::current())
    }

    pub fn for_platform(ffmpeg_path: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            platform,
        }
    }
}

impl InvocationPlanner for TranscodePlanner {
    fn plan(&self, spec: &TranscodeSpec) -> Invocation {
        let mut args: Vec<String> = Vec::new();
        let framerate = spec.framerate.to_string();

        // capture input
        args.push("-f".into());
        args.push(self.platform.input_format().into());
        match self.platform {
            Platform::Windows => {
                args.push("-framerate".into());
                args.push(framerate.clone());
                args.push("-video_size".into());
                args.push(spec.resolution.clone());
            }
            Platform::Macos => {
                args.push("-framerate".into());
                args.push(framerate.clone());
                args.push("-pixel_format".into());
                args.push("uyvy422".into());
            }
            Platform::Linux => {
                args.push("-input_format".into());
                args.push("mjpeg".into());
                args.push("-framerate".into());
                args.push(framerate.clone());
                args.push("-video_size".into());
                args.push(spec.resolution.clone());
            }
        }
        args.push("-i".into());
        args.push(self.platform.device_input(&spec.camera_id));

        // separate audio input, when a capture device is configured
        if spec.include_audio {
            if let Some(audio_device) = &spec.audio_device_id {
                match self.platform {
                    Platform::Windows => {
                        args.push("-f".into());
                        args.push("dshow".into());
                        args.push("-i".into());
                        args.push(format!("audio={}", audio_device));
                    }
                    Platform::Macos => {
                        args.push("-f".into());
                        args.push("avfoundation".into());
                        args.push("-i".into());
                        args.push(format!(":{}", audio_device));
                    }
                    Platform::Linux => {
                        args.push("-f".into());
                        args.push("alsa".into());
                        args.push("-i".into());
                        args.push(audio_device.clone());
                    }
                }
            }
        }

        // video encoding
        args.push("-c:v".into());
        args.push(VIDEO_CODEC.into());
        args.push("-preset".into());
        args.push(VIDEO_PRESET.into());
        args.push("-tune".into());
        args.push(VIDEO_TUNE.into());
        args.push("-crf".into());
        args.push(VIDEO_CRF.to_string());
        args.push("-vf".into());
        args.push(format!("scale={}", spec.resolution.replace('x', ":")));

        if let Some(bitrate) = &spec.video_bitrate {
            args.push("-b:v".into());
            args.push(bitrate.clone());
            args.push("-maxrate".into());
            args.push(bitrate.clone());
            args.push("-bufsize".into());
            args.push("2M".into());
        }

        // keyframes aligned to segment boundaries
        let gop = (spec.framerate * HLS_SEGMENT_DURATION).to_string();
        args.push("-g".into());
        args.push(gop.clone());
        args.push("-keyint_min".into());
        args.push(gop);

        // audio encoding
        if spec.include_audio {
            args.push("-c:a".into());
            args.push(AUDIO_CODEC.into());
            args.push("-b:a".into());
            args.push(
                spec.audio_bitrate
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AUDIO_BITRATE.into()),
            );
            args.push("-ar".into());
            args.push(AUDIO_SAMPLE_RATE.to_string());
            args.push("-ac".into());
            args.push(AUDIO_CHANNELS.to_string());
        } else {
            args.push("-an".into());
        }

        // segmented HLS output
        args.push("-f".into());
        args.push("hls".into());
        args.push("-hls_time".into());
        args.push(HLS_SEGMENT_DURATION.to_string());
        args.push("-hls_list_size".into());
        args.push(HLS_LIST_SIZE.to_string());
        args.push("-hls_flags".into());
        args.push("delete_segments".into());
        args.push("-hls_segment_filename".into());
        args.push(
            spec.output_dir
                .join(HLS_SEGMENT_PATTERN)
                .to_string_lossy()
                .into_owned(),
        );
        args.push(
            spec.output_dir
                .join(HLS_PLAYLIST_NAME)
                .to_string_lossy()
                .into_owned(),
        );

        Invocation {
            program: self.ffmpeg_path.clone(),
            args,
        }
    }
}
