//! Folder listings for the web UI.

use std::path::Path;

use lanplay_av::{MediaDescription, StreamKind};
use serde::Serialize;

use super::subtitles::external_subtitles;
use super::{join_relative, Library, SubtitleExtractor};
use crate::error::{Error, Result};
use crate::probe::Prober;

/// One folder listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Listing {
    /// The listed folder, relative to the library root.
    pub path: String,
    pub folders: Vec<FolderEntry>,
    pub videos: Vec<VideoEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    /// Thumbnail URL of the first video directly inside the folder.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoEntry {
    pub name: String,
    pub path: String,
    pub thumbnail: String,
    /// Subtitle files (library-relative), embedded extractions first.
    pub subtitles: Vec<String>,
    #[serde(rename = "audioTracks")]
    pub audio_tracks: Vec<AudioTrack>,
}

/// An audio stream as offered to the player. `index` is the ordinal used
/// by `?audio=<n>`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AudioTrack {
    pub index: usize,
    pub codec: String,
    pub channels: Option<u32>,
    pub layout: String,
    pub language: String,
    pub title: String,
    pub default: bool,
}

/// Audio tracks of `desc` in player form.
pub fn audio_tracks(desc: &MediaDescription) -> Vec<AudioTrack> {
    desc.streams_of(StreamKind::Audio)
        .enumerate()
        .map(|(i, s)| AudioTrack {
            index: i,
            codec: s.codec.clone(),
            channels: s.channels,
            layout: s.channel_layout.clone().unwrap_or_default(),
            language: s.language.clone().unwrap_or_else(|| "und".to_string()),
            title: s.title.clone().unwrap_or_else(|| format!("Track {}", i + 1)),
            default: s.default,
        })
        .collect()
}

/// URL of the thumbnail endpoint for a library path.
pub fn thumbnail_url(relative: &str) -> String {
    format!("/thumbnail/{}", encode_path(relative))
}

fn encode_path(relative: &str) -> String {
    relative
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl Library {
    /// List `folder` (relative to the root).
    ///
    /// Every video is probed (for its audio tracks) and has its embedded
    /// subtitles extracted. A video that fails to probe is still listed,
    /// without tracks.
    pub async fn browse(
        &self,
        folder: &str,
        prober: &Prober,
        subtitles: &SubtitleExtractor,
    ) -> Result<Listing> {
        let dir = self.resolve(folder)?;
        let folder = folder.trim_matches('/');

        let names = read_dir_sorted(&dir).await?;
        let mut folders = Vec::new();
        let mut videos = Vec::new();

        for (name, is_dir) in &names {
            let entry_path = dir.join(name);
            let relative = join_relative(folder, name);

            if *is_dir {
                let first_video = read_dir_sorted(&entry_path)
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .find(|(child, child_is_dir)| !child_is_dir && self.is_video(Path::new(child)));

                folders.push(FolderEntry {
                    thumbnail: first_video
                        .map(|(child, _)| thumbnail_url(&join_relative(&relative, &child))),
                    name: name.clone(),
                    path: relative,
                });
                continue;
            }

            if !self.is_video(&entry_path) {
                continue;
            }

            let (audio, mut subs) = match prober.probe(&entry_path).await {
                Ok(desc) => {
                    let extracted = subtitles.extract(&entry_path, &desc).await;
                    (audio_tracks(&desc), extracted)
                }
                Err(e) => {
                    tracing::warn!(path = %relative, error = %e, "failed to probe video while browsing");
                    (Vec::new(), Vec::new())
                }
            };

            let siblings = names.iter().filter(|(_, d)| !d).map(|(n, _)| n.as_str());
            for external in external_subtitles(name, siblings) {
                if !subs.contains(&external) {
                    subs.push(external);
                }
            }

            videos.push(VideoEntry {
                name: name.clone(),
                thumbnail: thumbnail_url(&relative),
                subtitles: subs.iter().map(|s| join_relative(folder, s)).collect(),
                audio_tracks: audio,
                path: relative,
            });
        }

        tracing::debug!(folder, folders = folders.len(), videos = videos.len(), "listed folder");
        Ok(Listing {
            path: folder.to_string(),
            folders,
            videos,
        })
    }
}

/// Entry names with a directory flag, sorted by name. Hidden entries are
/// skipped.
async fn read_dir_sorted(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(dir.display().to_string()),
        _ => Error::Io(e),
    })?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        names.push((name, is_dir));
    }
    names.sort();
    Ok(names)
}
