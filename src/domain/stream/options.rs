//! Stream quality options and validation

use serde::{Deserialize, Serialize};

use crate::domain::error::StreamError;

pub const DEFAULT_RESOLUTION: &str = "1280x720";
pub const DEFAULT_FRAMERATE: u32 = 30;

/// Requested quality parameters for a stream.
/// All fields are optional; unset fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Target resolution, e.g. "1280x720"
    pub resolution: Option<String>,
    /// Target frame rate
    pub framerate: Option<u32>,
    /// Target video bitrate, e.g. "2500k"
    pub video_bitrate: Option<String>,
    /// Target audio bitrate, e.g. "128k"
    pub audio_bitrate: Option<String>,
}

impl StreamOptions {
    pub fn resolution_or_default(&self) -> String {
        self.resolution
            .clone()
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string())
    }

    pub fn framerate_or_default(&self) -> u32 {
        self.framerate.unwrap_or(DEFAULT_FRAMERATE)
    }

    /// Validate every set field against its accepted range.
    pub fn validate(&self) -> Result<(), StreamError> {
        if let Some(resolution) = &self.resolution {
            if !is_valid_resolution(resolution) {
                return Err(StreamError::InvalidOptions(format!(
                    "unsupported resolution: {}",
                    resolution
                )));
            }
        }
        if let Some(framerate) = self.framerate {
            if !is_valid_framerate(framerate) {
                return Err(StreamError::InvalidOptions(format!(
                    "unsupported framerate: {}",
                    framerate
                )));
            }
        }
        for (label, bitrate) in [
            ("video bitrate", &self.video_bitrate),
            ("audio bitrate", &self.audio_bitrate),
        ] {
            if let Some(bitrate) = bitrate {
                if !is_valid_bitrate(bitrate) {
                    return Err(StreamError::InvalidOptions(format!(
                        "malformed {}: {}",
                        label, bitrate
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse a "WIDTHxHEIGHT" resolution string.
pub fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (width, height) = resolution.split_once('x')?;
    let width: u32 = width.parse().ok()?;
    let height: u32 = height.parse().ok()?;
    Some((width, height))
}

/// Accepts resolutions within 320x240..4096x2160.
pub fn is_valid_resolution(resolution: &str) -> bool {
    match parse_resolution(resolution) {
        Some((width, height)) => (320..=4096).contains(&width) && (240..=2160).contains(&height),
        None => false,
    }
}

pub fn is_valid_framerate(framerate: u32) -> bool {
    (1..=120).contains(&framerate)
}

/// Accepts bitrate strings of the form `2500`, `2500k`, or `5M`.
pub fn is_valid_bitrate(bitrate: &str) -> bool {
    let digits = bitrate.strip_suffix(['k', 'K', 'm', 'M']).unwrap_or(bitrate);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolution_accepts_well_formed() {
        assert_eq!(parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_resolution("1280x720"), Some((1280, 720)));
    }

    #[test]
    fn parse_resolution_rejects_malformed() {
        assert_eq!(parse_resolution("1920"), None);
        assert_eq!(parse_resolution("axb"), None);
        assert_eq!(parse_resolution("1920x"), None);
    }

    #[test]
    fn resolution_bounds() {
        assert!(is_valid_resolution("320x240"));
        assert!(is_valid_resolution("4096x2160"));
        assert!(!is_valid_resolution("100x100"));
        assert!(!is_valid_resolution("8192x4320"));
    }

    #[test]
    fn framerate_bounds() {
        assert!(is_valid_framerate(1));
        assert!(is_valid_framerate(120));
        assert!(!is_valid_framerate(0));
        assert!(!is_valid_framerate(240));
    }

    #[test]
    fn bitrate_grammar() {
        assert!(is_valid_bitrate("2500"));
        assert!(is_valid_bitrate("2500k"));
        assert!(is_valid_bitrate("5M"));
        assert!(!is_valid_bitrate(""));
        assert!(!is_valid_bitrate("k"));
        assert!(!is_valid_bitrate("2.5M"));
        assert!(!is_valid_bitrate("fast"));
    }

    #[test]
    fn defaults_applied_when_unset() {
        let options = StreamOptions::default();
        assert_eq!(options.resolution_or_default(), "1280x720");
        assert_eq!(options.framerate_or_default(), 30);
    }

    #[test]
    fn validate_accepts_defaults_and_good_values() {
        assert!(StreamOptions::default().validate().is_ok());

        let options = StreamOptions {
            resolution: Some("1920x1080".to_string()),
            framerate: Some(60),
            video_bitrate: Some("2500k".to_string()),
            audio_bitrate: Some("128k".to_string()),
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let options = StreamOptions {
            resolution: Some("10x10".to_string()),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = StreamOptions {
            framerate: Some(500),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = StreamOptions {
            video_bitrate: Some("lots".to_string()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
