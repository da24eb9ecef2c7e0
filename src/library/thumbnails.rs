//! Thumbnail generation through the process pool.
//!
//! Concurrent requests for the same video share a single ffmpeg run via the
//! pool key `<path>:thumb`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use lanplay_av::args::thumbnail_args;

use super::Library;
use crate::error::{Error, Result};
use crate::process::{ProcessPool, SpawnSpec};

/// Produces PNG thumbnails under a cache directory.
#[derive(Clone)]
pub struct Thumbnailer {
    pool: ProcessPool,
    ffmpeg: PathBuf,
    dir: PathBuf,
    offset_secs: u32,
    width: u32,
}

impl Thumbnailer {
    pub fn new(pool: ProcessPool, ffmpeg: PathBuf, dir: PathBuf, offset_secs: u32, width: u32) -> Self {
        Self {
            pool,
            ffmpeg,
            dir,
            offset_secs,
            width,
        }
    }

    /// Cache location for the thumbnail of `relative` (a library path).
    pub fn thumbnail_path(&self, relative: &str) -> PathBuf {
        self.dir.join(format!("{}.png", relative.replace('/', "__")))
    }

    /// Return the thumbnail for `video`, generating it if it is missing or
    /// older than the video.
    pub async fn thumbnail(&self, library: &Library, video: &Path) -> Result<PathBuf> {
        let relative = library
            .relative(video)
            .ok_or_else(|| Error::forbidden(video.display().to_string()))?;
        let output = self.thumbnail_path(&relative);

        let video_modified = modified(video)
            .await?
            .ok_or_else(|| Error::not_found(relative.clone()))?;
        if let Ok(Some(thumb_modified)) = modified(&output).await {
            if thumb_modified > video_modified {
                tracing::trace!(video = %relative, "thumbnail up to date");
                return Ok(output);
            }
        }

        let key = format!("{}:thumb", video.display());
        let spec = SpawnSpec::new(
            self.ffmpeg.clone(),
            thumbnail_args(video, &output, self.offset_secs, self.width),
        );

        let handle = self.pool.acquire(&key, &spec)?;
        let exit = handle.wait().await;
        self.pool.release(&key);

        if exit.success() && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            tracing::debug!(video = %relative, thumbnail = %output.display(), "thumbnail generated");
            Ok(output)
        } else {
            Err(Error::Tool(lanplay_av::Error::tool_failed(
                "ffmpeg",
                format!("thumbnail generation failed for {relative} (exit code {:?})", exit.code),
            )))
        }
    }
}

/// Modification time, `None` if the file does not exist.
async fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.modified().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}
