//! FFprobe-based media probing.

use super::types::*;
use crate::command::ToolCommand;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Fixed argument set: errors only, JSON output, format + per-stream listing.
pub const FFPROBE_ARGS: &[&str] = &[
    "-v",
    "error",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    #[serde(default)]
    codec_type: String,
    codec_name: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

/// Probe a media file using the given ffprobe executable.
///
/// No retries: callers may simply call again.
pub async fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> Result<MediaDescription> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(Error::file_not_found(path));
    }

    let output = ToolCommand::new(ffprobe.to_path_buf())
        .args(FFPROBE_ARGS)
        .arg(path)
        .timeout(PROBE_TIMEOUT)
        .execute()
        .await?;

    let json_str = std::str::from_utf8(&output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_json(path, json_str)
}

/// Parse raw ffprobe JSON into a [`MediaDescription`].
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaDescription> {
    let output: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    Ok(convert(path, output))
}

fn convert(path: &Path, output: FfprobeOutput) -> MediaDescription {
    let duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    let streams = output
        .streams
        .into_iter()
        .map(|stream| {
            let kind = StreamKind::from_codec_type(&stream.codec_type);
            let audio = kind == StreamKind::Audio;
            StreamInfo {
                index: stream.index,
                kind,
                codec: stream.codec_name.unwrap_or_default(),
                channels: stream.channels.filter(|_| audio),
                channel_layout: stream.channel_layout.filter(|l| audio && !l.is_empty()),
                language: stream.tags.language,
                title: stream.tags.title,
                default: stream.disposition.default == 1,
            }
        })
        .collect();

    MediaDescription {
        file_path: path.to_path_buf(),
        duration,
        streams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            { "index": 0, "codec_name": "hevc", "codec_type": "video",
              "disposition": { "default": 1 } },
            { "index": 1, "codec_name": "eac3", "codec_type": "audio",
              "channels": 6, "channel_layout": "5.1(side)",
              "disposition": { "default": 1 },
              "tags": { "language": "eng", "title": "Surround" } },
            { "index": 2, "codec_name": "aac", "codec_type": "audio",
              "channels": 2, "channel_layout": "stereo",
              "tags": { "language": "jpn" } },
            { "index": 3, "codec_name": "subrip", "codec_type": "subtitle",
              "tags": { "language": "eng" } },
            { "index": 4, "codec_type": "attachment" }
        ],
        "format": { "filename": "movie.mkv", "duration": "5400.250000" }
    }"#;

    #[test]
    fn parses_streams_in_order() {
        let desc = parse_ffprobe_json(Path::new("/m/movie.mkv"), SAMPLE).unwrap();

        assert_eq!(desc.streams.len(), 5);
        assert_eq!(desc.duration, Some(Duration::from_secs_f64(5400.25)));

        let video = desc.first_video().unwrap();
        assert_eq!(video.codec, "hevc");
        assert!(video.default);
        assert_eq!(video.channels, None);

        let audio = desc.first_audio().unwrap();
        assert_eq!(audio.index, 1);
        assert_eq!(audio.codec, "eac3");
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.channel_layout.as_deref(), Some("5.1(side)"));
        assert_eq!(audio.language.as_deref(), Some("eng"));
        assert_eq!(audio.title.as_deref(), Some("Surround"));

        assert_eq!(desc.audio_stream(1).unwrap().language.as_deref(), Some("jpn"));
        assert!(!desc.audio_stream(1).unwrap().default);

        let other = &desc.streams[4];
        assert_eq!(other.kind, StreamKind::Other);
        assert_eq!(other.codec, "");
    }

    #[test]
    fn missing_format_and_streams_is_empty_description() {
        let desc = parse_ffprobe_json(Path::new("/m/empty.mkv"), "{}").unwrap();
        assert!(desc.streams.is_empty());
        assert!(desc.duration.is_none());
    }

    #[test]
    fn unparsable_duration_is_dropped() {
        let json = r#"{ "streams": [], "format": { "duration": "N/A" } }"#;
        let desc = parse_ffprobe_json(Path::new("/m/x.mkv"), json).unwrap();
        assert!(desc.duration.is_none());
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_ffprobe_json(Path::new("/m/x.mkv"), "not json").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = probe_with_ffprobe(Path::new("ffprobe"), Path::new("/definitely/not/here.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_inspector_and_parses_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"fake").unwrap();

        let script = dir.path().join("fake-ffprobe");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat <<'JSON'\n{\"streams\":[{\"index\":0,\"codec_type\":\"video\",\"codec_name\":\"h264\"},{\"index\":1,\"codec_type\":\"audio\",\"codec_name\":\"aac\",\"channels\":2}]}\nJSON\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let desc = probe_with_ffprobe(&script, &media).await.unwrap();
        assert_eq!(desc.first_video().unwrap().codec, "h264");
        assert_eq!(desc.first_audio().unwrap().codec, "aac");
        assert_eq!(desc.file_path, media);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn inspector_failure_is_tool_failed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("broken.mkv");
        std::fs::write(&media, b"fake").unwrap();

        let script = dir.path().join("fake-ffprobe");
        std::fs::write(&script, "#!/bin/sh\necho 'Invalid data' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = probe_with_ffprobe(&script, &media).await.unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }), "got {err:?}");
    }
}
