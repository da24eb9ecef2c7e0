//! Media description types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Result of probing one media file.
///
/// Streams keep the container order reported by the inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescription {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// Container duration, when reported.
    pub duration: Option<Duration>,
    /// All streams in container order.
    pub streams: Vec<StreamInfo>,
}

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    /// Map an ffprobe `codec_type` string.
    pub fn from_codec_type(s: &str) -> Self {
        match s {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            _ => Self::Other,
        }
    }
}

/// One elementary stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Container-relative stream index.
    pub index: u32,
    /// Stream kind.
    pub kind: StreamKind,
    /// Codec name as reported by the inspector (empty when unknown).
    pub codec: String,
    /// Channel count (audio only).
    pub channels: Option<u32>,
    /// Channel layout, e.g. "5.1(side)" (audio only).
    pub channel_layout: Option<String>,
    /// Language tag.
    pub language: Option<String>,
    /// Title tag.
    pub title: Option<String>,
    /// Default disposition flag.
    pub default: bool,
}

impl MediaDescription {
    /// First video stream in stream order.
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    /// First audio stream in stream order.
    pub fn first_audio(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Audio)
    }

    /// Streams of a given kind, in order.
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    /// Audio stream by its ordinal among audio streams (`0:a:<n>` in ffmpeg terms).
    pub fn audio_stream(&self, ordinal: usize) -> Option<&StreamInfo> {
        self.streams_of(StreamKind::Audio).nth(ordinal)
    }

    /// Number of audio streams.
    pub fn audio_count(&self) -> usize {
        self.streams_of(StreamKind::Audio).count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn stream(index: u32, kind: StreamKind, codec: &str) -> StreamInfo {
        StreamInfo {
            index,
            kind,
            codec: codec.to_string(),
            channels: None,
            channel_layout: None,
            language: None,
            title: None,
            default: false,
        }
    }

    pub fn description(streams: Vec<StreamInfo>) -> MediaDescription {
        MediaDescription {
            file_path: PathBuf::from("/media/test.mkv"),
            duration: None,
            streams,
        }
    }
}
