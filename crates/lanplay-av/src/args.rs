//! ffmpeg argument builders.
//!
//! Every builder returns the argument vector only; spawning is left to the
//! caller (the process pool for thumbnails and live streams,
//! [`crate::ToolCommand`] for subtitle extraction).

use std::ffi::OsString;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default stereo downmix used when the source has more than two channels.
pub const DEFAULT_DOWNMIX_FILTER: &str =
    "pan=stereo|FL=0.5*FL+0.707*FC+0.5*BL|FR=0.5*FR+0.707*FC+0.5*BR";

/// Encoder settings for full re-encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeSettings {
    /// ffmpeg video encoder, e.g. `libx264`.
    pub video_encoder: String,
    /// ffmpeg audio encoder, e.g. `aac`.
    pub audio_encoder: String,
    /// Audio filter applied when the selected source stream has more than
    /// two channels. `None` leaves downmixing to `-ac 2` alone.
    pub downmix_filter: Option<String>,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            video_encoder: "libx264".to_string(),
            audio_encoder: "aac".to_string(),
            downmix_filter: Some(DEFAULT_DOWNMIX_FILTER.to_string()),
        }
    }
}

/// How a live stream is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveMode {
    /// Stream copy, container remuxed to fragmented MP4.
    Transmux,
    /// Full re-encode.
    Transcode(TranscodeSettings),
}

struct ArgList(Vec<OsString>);

impl ArgList {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, s: impl Into<OsString>) -> &mut Self {
        self.0.push(s.into());
        self
    }

    fn extend<const N: usize>(&mut self, items: [&str; N]) -> &mut Self {
        self.0.extend(items.iter().map(OsString::from));
        self
    }

    fn finish(self) -> Vec<OsString> {
        self.0
    }
}

/// Arguments for a live fragmented-MP4 stream written to stdout.
///
/// `audio_ordinal` selects `0:a:<n>`. `source_channels` is the channel count
/// of that stream; it gates the downmix filter in transcode mode.
pub fn live_stream_args(
    input: &Path,
    audio_ordinal: usize,
    source_channels: Option<u32>,
    mode: &LiveMode,
) -> Vec<OsString> {
    let mut args = ArgList::new();
    args.extend(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]);
    args.push(input.as_os_str());
    args.extend(["-map", "0:v:0", "-map"]);
    args.push(format!("0:a:{audio_ordinal}"));

    match mode {
        LiveMode::Transmux => {
            args.extend(["-c", "copy"]);
        }
        LiveMode::Transcode(settings) => {
            args.push("-c:v").push(settings.video_encoder.as_str());
            args.push("-c:a").push(settings.audio_encoder.as_str());
            args.extend(["-ac", "2"]);
            if source_channels.unwrap_or(0) > 2 {
                if let Some(filter) = &settings.downmix_filter {
                    args.push("-af").push(filter.as_str());
                }
            }
        }
    }

    args.extend(["-movflags", "frag_keyframe+empty_moov", "-f", "mp4", "pipe:1"]);
    args.finish()
}

/// Arguments for a single-frame PNG thumbnail.
pub fn thumbnail_args(input: &Path, output: &Path, offset_secs: u32, width: u32) -> Vec<OsString> {
    let mut args = ArgList::new();
    args.extend(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-ss"]);
    args.push(offset_secs.to_string());
    args.push("-i").push(input.as_os_str());
    args.extend(["-frames:v", "1", "-vf"]);
    args.push(format!("scale={width}:-1"));
    args.extend(["-f", "image2"]);
    args.push(output.as_os_str());
    args.finish()
}

/// Arguments extracting subtitle stream `0:s:<n>` to WebVTT.
pub fn subtitle_extract_args(input: &Path, subtitle_ordinal: usize, output: &Path) -> Vec<OsString> {
    let mut args = ArgList::new();
    args.extend(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]);
    args.push(input.as_os_str());
    args.push("-map").push(format!("0:s:{subtitle_ordinal}"));
    args.extend(["-c:s", "webvtt"]);
    args.push(output.as_os_str());
    args.finish()
}
