//! Delivery decision engine.
//!
//! Classifies a probed file into one of four delivery actions by comparing
//! its first video and first audio stream against the client's native codec
//! pair.

use lanplay_av::MediaDescription;
use serde::{Deserialize, Serialize};

/// How a file reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryAction {
    /// Original bytes, with range support.
    Direct,
    /// Video copied, container remuxed.
    Transmux,
    /// Full re-encode.
    Transcode,
    /// No usable video + audio pair.
    Unsupported,
}

impl DeliveryAction {
    /// Whether this action runs through a live transcoder process.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Transmux | Self::Transcode)
    }
}

impl std::fmt::Display for DeliveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Transmux => "transmux",
            Self::Transcode => "transcode",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Codecs the client plays natively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub video_codec: String,
    pub audio_codec: String,
}

impl ClientProfile {
    pub fn new(video_codec: impl Into<String>, audio_codec: impl Into<String>) -> Self {
        Self {
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self::new("h264", "aac")
    }
}

/// Decide how `desc` must be delivered to a client with `profile`.
///
/// Only the first video and first audio stream count. An empty codec name
/// never matches, even against an empty target.
pub fn decide(profile: &ClientProfile, desc: &MediaDescription) -> DeliveryAction {
    let (Some(video), Some(audio)) = (desc.first_video(), desc.first_audio()) else {
        return DeliveryAction::Unsupported;
    };

    let video_ok = codec_matches(&video.codec, &profile.video_codec);
    let audio_ok = codec_matches(&audio.codec, &profile.audio_codec);

    match (video_ok, audio_ok) {
        (true, true) => DeliveryAction::Direct,
        (true, false) => DeliveryAction::Transmux,
        (false, _) => DeliveryAction::Transcode,
    }
}

fn codec_matches(actual: &str, target: &str) -> bool {
    !actual.is_empty() && actual == target
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanplay_av::{StreamInfo, StreamKind};
    use std::path::PathBuf;

    fn stream(index: u32, kind: StreamKind, codec: &str) -> StreamInfo {
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

    fn desc(streams: Vec<StreamInfo>) -> MediaDescription {
        MediaDescription {
            file_path: PathBuf::from("/media/a.mkv"),
            duration: None,
            streams,
        }
    }

    fn av(video: &str, audio: &str) -> MediaDescription {
        desc(vec![
            stream(0, StreamKind::Video, video),
            stream(1, StreamKind::Audio, audio),
        ])
    }

    #[test]
    fn test_scenarios() {
        let profile = ClientProfile::default();
        assert_eq!(decide(&profile, &av("h264", "aac")), DeliveryAction::Direct);
        assert_eq!(decide(&profile, &av("h264", "ac3")), DeliveryAction::Transmux);
        assert_eq!(decide(&profile, &av("hevc", "aac")), DeliveryAction::Transcode);
        assert_eq!(decide(&profile, &av("hevc", "dts")), DeliveryAction::Transcode);
        assert_eq!(
            decide(&profile, &desc(vec![stream(0, StreamKind::Video, "h264")])),
            DeliveryAction::Unsupported
        );
    }

    #[test]
    fn test_missing_video_or_audio_is_unsupported() {
        let profile = ClientProfile::default();
        assert_eq!(decide(&profile, &desc(vec![])), DeliveryAction::Unsupported);
        assert_eq!(
            decide(&profile, &desc(vec![stream(0, StreamKind::Audio, "aac")])),
            DeliveryAction::Unsupported
        );
        assert_eq!(
            decide(
                &profile,
                &desc(vec![
                    stream(0, StreamKind::Audio, "aac"),
                    stream(1, StreamKind::Subtitle, "subrip"),
                    stream(2, StreamKind::Other, "ttf"),
                ])
            ),
            DeliveryAction::Unsupported
        );
    }

    #[test]
    fn test_only_first_streams_count() {
        let profile = ClientProfile::default();
        let d = desc(vec![
            stream(0, StreamKind::Subtitle, "h264"),
            stream(1, StreamKind::Audio, "ac3"),
            stream(2, StreamKind::Video, "h264"),
            stream(3, StreamKind::Audio, "aac"),
            stream(4, StreamKind::Video, "hevc"),
        ]);
        assert_eq!(decide(&profile, &d), DeliveryAction::Transmux);
    }

    #[test]
    fn test_empty_codec_never_matches() {
        let profile = ClientProfile::new("", "");
        assert_eq!(decide(&profile, &av("", "")), DeliveryAction::Transcode);

        let profile = ClientProfile::default();
        assert_eq!(decide(&profile, &av("h264", "")), DeliveryAction::Transmux);
        assert_eq!(decide(&profile, &av("", "aac")), DeliveryAction::Transcode);
    }

    #[test]
    fn test_profile_is_configurable() {
        let profile = ClientProfile::new("vp9", "opus");
        assert_eq!(decide(&profile, &av("vp9", "opus")), DeliveryAction::Direct);
        assert_eq!(decide(&profile, &av("h264", "aac")), DeliveryAction::Transcode);
    }

    #[test]
    fn test_display_and_live() {
        assert_eq!(DeliveryAction::Transmux.to_string(), "transmux");
        assert!(DeliveryAction::Transmux.is_live());
        assert!(DeliveryAction::Transcode.is_live());
        assert!(!DeliveryAction::Direct.is_live());
        assert!(!DeliveryAction::Unsupported.is_live());
    }
}
