//! Capability prober with an mtime-keyed cache.
//!
//! Wraps [`lanplay_av::probe`] and maps its failures onto service errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use lanplay_av::MediaDescription;

use crate::error::{Error, Result};

#[derive(Debug)]
struct CachedProbe {
    modified: SystemTime,
    description: Arc<MediaDescription>,
}

/// Media file prober.
pub struct Prober {
    ffprobe: PathBuf,
    cache: Option<DashMap<PathBuf, CachedProbe>>,
}

impl Prober {
    /// Create a prober; `cache` enables reuse of descriptions until the
    /// file's modification time changes.
    pub fn new(ffprobe: PathBuf, cache: bool) -> Self {
        Self {
            ffprobe,
            cache: cache.then(DashMap::new),
        }
    }

    /// Probe a media file.
    pub async fn probe(&self, path: &Path) -> Result<Arc<MediaDescription>> {
        let Some(cache) = &self.cache else {
            return self.probe_uncached(path).await.map(Arc::new);
        };

        let modified = tokio::fs::metadata(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::not_found(path.display().to_string()),
                _ => Error::Io(e),
            })?
            .modified()
            .ok();

        if let (Some(modified), Some(hit)) = (modified, cache.get(path)) {
            if hit.modified == modified {
                tracing::trace!(path = %path.display(), "probe cache hit");
                return Ok(hit.description.clone());
            }
        }

        let description = Arc::new(self.probe_uncached(path).await?);
        if let Some(modified) = modified {
            cache.insert(
                path.to_path_buf(),
                CachedProbe {
                    modified,
                    description: description.clone(),
                },
            );
        }
        Ok(description)
    }

    async fn probe_uncached(&self, path: &Path) -> Result<MediaDescription> {
        tracing::debug!(path = %path.display(), "probing media file");
        lanplay_av::probe(&self.ffprobe, path)
            .await
            .map_err(Error::from_probe)
    }

    /// Number of cached descriptions.
    pub fn cached(&self) -> usize {
        self.cache.as_ref().map_or(0, DashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        for cache in [true, false] {
            let prober = Prober::new(PathBuf::from("ffprobe"), cache);
            let err = prober
                .probe(Path::new("/definitely/not/here.mkv"))
                .await
                .unwrap_err();
            assert_eq!(err.http_status(), 404, "cache={cache}");
        }
    }

    #[tokio::test]
    async fn test_missing_inspector_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.mkv");
        std::fs::write(&media, b"x").unwrap();

        let prober = Prober::new(PathBuf::from("nonexistent_ffprobe_12345"), false);
        let err = prober.probe(&media).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }), "got {err:?}");
        assert_eq!(err.http_status(), 500);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cache_reuses_until_mtime_changes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.mp4");
        std::fs::write(&media, b"x").unwrap();

        // Counts invocations in a sidecar file.
        let counter = dir.path().join("count");
        let script = dir.path().join("fake-ffprobe");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho run >> '{}'\necho '{{\"streams\":[]}}'\n",
                counter.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = Prober::new(script, true);
        let first = prober.probe(&media).await.unwrap();
        let second = prober.probe(&media).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(prober.cached(), 1);

        let runs = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 1);

        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&media)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let third = prober.probe(&media).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        let runs = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 2);
    }
}
