//! Encoder progress parsing
//!
//! ffmpeg prints periodic status lines to its diagnostic stream:
//!
//!   frame=  120 fps= 30 q=23.0 size=512kB time=00:00:04.00 bitrate=1048.5kbits/s speed=1.01x
//!
//! The parser recognizes a small set of `key=value` tokens. It is
//! best-effort: a line without the required fields yields `None`, which
//! is not an error.

/// Parsed progress fields from one diagnostic line.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderProgress {
    pub frame: u64,
    pub fps: f32,
    pub time: String,
    pub bitrate: String,
    pub speed: String,
}

/// Parse a diagnostic line into structured progress.
///
/// `frame`, `fps`, and `time` are required; `bitrate` and `speed` fall
/// back to `"N/A"` when absent.
pub fn parse_progress(line: &str) -> Option<EncoderProgress> {
    let frame = field(line, "frame=")?.parse().ok()?;
    let fps = field(line, "fps=")?.parse().ok()?;
    let time = field(line, "time=")?.to_string();

    let bitrate = field(line, "bitrate=").unwrap_or("N/A").to_string();
    let speed = field(line, "speed=").unwrap_or("N/A").to_string();

    Some(EncoderProgress {
        frame,
        fps,
        time,
        bitrate,
        speed,
    })
}

/// Extract the (possibly space-padded) value following `key` in `line`.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    let value = &rest[..end];
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
