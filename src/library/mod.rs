//! The media library on disk.
//!
//! Every request path is relative to the library root. [`Library::resolve`]
//! is the single gate between a client-supplied path and the filesystem.

mod browse;
mod subtitles;
mod thumbnails;

pub use browse::{AudioTrack, FolderEntry, Listing, VideoEntry};
pub use subtitles::{subtitle_content_type, SubtitleExtractor};
pub use thumbnails::Thumbnailer;

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Library root plus the extensions treated as videos.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
    extensions: Vec<String>,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a client path onto the filesystem.
    ///
    /// Rejects absolute paths, `..` components, and symlinks leading out of
    /// the root with [`Error::Forbidden`]. The target need not exist.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    tracing::warn!(path = relative, "rejected path outside library root");
                    return Err(Error::forbidden(relative));
                }
            }
        }

        if let (Ok(real), Ok(real_root)) = (path.canonicalize(), self.root.canonicalize()) {
            if !real.starts_with(&real_root) {
                tracing::warn!(path = relative, "rejected symlink outside library root");
                return Err(Error::forbidden(relative));
            }
        }

        Ok(path)
    }

    /// Path of `absolute` relative to the root, with `/` separators.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Whether `path` has one of the configured video extensions.
    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }
}

/// Join a folder path and an entry name the way URLs expect.
pub(crate) fn join_relative(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}
