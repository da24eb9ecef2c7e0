use lanplay_av::{MediaDescription, StreamInfo, StreamKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

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

pub fn audio(index: u32, codec: &str, channels: u32) -> StreamInfo {
    StreamInfo {
        channels: Some(channels),
        channel_layout: Some(if channels > 2 { "5.1" } else { "stereo" }.to_string()),
        ..stream(index, StreamKind::Audio, codec)
    }
}

/// h264 video with one stereo AC-3 track: a transmux candidate.
pub fn make_test_description(path: &Path) -> MediaDescription {
    MediaDescription {
        file_path: path.to_path_buf(),
        duration: Some(Duration::from_secs(60)),
        streams: vec![stream(0, StreamKind::Video, "h264"), audio(1, "ac3", 2)],
    }
}

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
