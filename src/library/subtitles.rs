//! Subtitle discovery and extraction.
//!
//! Embedded subtitle streams are extracted once to WebVTT next to the video
//! as `<base>.<lang>.<title>.vtt`; later calls reuse the existing file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lanplay_av::args::subtitle_extract_args;
use lanplay_av::{MediaDescription, StreamKind, ToolCommand};

/// Upper bound for one extraction run.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

/// Extracts embedded subtitle streams with ffmpeg.
#[derive(Debug, Clone)]
pub struct SubtitleExtractor {
    ffmpeg: PathBuf,
}

impl SubtitleExtractor {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// Ensure every embedded subtitle stream of `video` has a `.vtt` sibling.
    ///
    /// Returns the file names that exist afterwards. Extraction failures are
    /// logged and skipped.
    pub async fn extract(&self, video: &Path, desc: &MediaDescription) -> Vec<String> {
        let Some(base) = video.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return Vec::new();
        };
        let dir = video.parent().unwrap_or(Path::new("."));

        let mut names = Vec::new();
        for (ordinal, stream) in desc.streams_of(StreamKind::Subtitle).enumerate() {
            let lang = stream.language.as_deref().unwrap_or("und");
            let title = stream.title.as_deref().unwrap_or("sub");
            let name = format!("{base}.{}.{}.vtt", sanitize(lang), sanitize(title));
            let output = dir.join(&name);

            if tokio::fs::try_exists(&output).await.unwrap_or(false) {
                names.push(name);
                continue;
            }

            let result = ToolCommand::new(self.ffmpeg.clone())
                .args(subtitle_extract_args(video, ordinal, &output))
                .timeout(EXTRACT_TIMEOUT)
                .execute()
                .await;

            match result {
                Ok(_) => {
                    tracing::info!(video = %video.display(), output = %name, "extracted subtitle stream");
                    names.push(name);
                }
                Err(e) => {
                    tracing::warn!(video = %video.display(), ordinal, error = %e, "subtitle extraction failed");
                    // ffmpeg may leave a truncated file behind.
                    let _ = tokio::fs::remove_file(&output).await;
                }
            }
        }
        names
    }
}

/// External `.srt` / `.vtt` files among `siblings` belonging to `video_name`.
pub fn external_subtitles<'a>(
    video_name: &str,
    siblings: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let stem = Path::new(video_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    siblings
        .into_iter()
        .filter(|name| name.starts_with(&stem) && subtitle_content_type(Path::new(name)).is_some())
        .map(str::to_string)
        .collect()
}

/// Content type for a subtitle file, by extension.
pub fn subtitle_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "vtt" => Some("text/vtt; charset=utf-8"),
        "srt" => Some("application/x-subrip; charset=utf-8"),
        _ => None,
    }
}

/// Keep tag values usable as a file name component.
fn sanitize(tag: &str) -> String {
    tag.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}
