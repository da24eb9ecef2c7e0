//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a temporary library, fake
//! `ffprobe`/`ffmpeg` scripts and a full [`AppContext`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! socket-level testing.
//!
//! The fake `ffprobe` prints the `<file>.probe.json` sidecar written by
//! [`TestHarness::add_video`]. The fake `ffmpeg` logs its arguments, streams
//! endless data for `pipe:1` and otherwise writes a small file to its last
//! argument.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use lanplay::config::Config;
use lanplay::server::{create_router, AppContext};
use lanplay_av::ToolPaths;
use serde_json::json;
use tempfile::TempDir;

pub struct TestHarness {
    pub ctx: AppContext,
    pub root: TempDir,
    pub tools: TempDir,
    pub thumbs: TempDir,
}

impl TestHarness {
    /// Create a new harness with an empty library.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create library dir");
        let tools = tempfile::tempdir().expect("failed to create tools dir");
        let thumbs = tempfile::tempdir().expect("failed to create thumbnail dir");

        let log = tools.path().join("ffmpeg.log");
        let ffprobe = write_script(
            tools.path(),
            "ffprobe",
            "for last; do :; done\ncat \"$last.probe.json\"",
        );
        let ffmpeg = write_script(
            tools.path(),
            "ffmpeg",
            &format!(
                "echo \"$@\" >> '{}'\nfor last; do :; done\ncase \"$last\" in\n  pipe:1) exec yes lanplay-frame ;;\n  *) printf 'fake output' > \"$last\" ;;\nesac",
                log.display()
            ),
        );

        let mut config = Config::default();
        config.library.root = root.path().to_path_buf();
        config.library.thumbnail_dir = thumbs.path().to_path_buf();
        config.delivery.idle_grace_ms = 100;

        let ctx = AppContext::new(config, ToolPaths { ffmpeg, ffprobe });

        Self {
            ctx,
            root,
            tools,
            thumbs,
        }
    }

    /// Router without a static directory.
    pub fn router(&self) -> Router {
        create_router(self.ctx.clone(), None)
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Write `bytes` at `relative` inside the library.
    pub fn add_file(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Add a 1000-byte video whose probe reports `video` (if any) followed
    /// by one audio stream per `(codec, channels)`.
    pub fn add_video(&self, relative: &str, video: Option<&str>, audio: &[(&str, u32)]) -> PathBuf {
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        let path = self.add_file(relative, &bytes);

        let mut streams = Vec::new();
        if let Some(codec) = video {
            streams.push(json!({
                "index": 0,
                "codec_type": "video",
                "codec_name": codec,
                "disposition": { "default": 1 },
            }));
        }
        for (codec, channels) in audio {
            streams.push(json!({
                "index": streams.len(),
                "codec_type": "audio",
                "codec_name": codec,
                "channels": channels,
                "channel_layout": if *channels > 2 { "5.1(side)" } else { "stereo" },
                "tags": { "language": "eng" },
            }));
        }

        let probe = json!({
            "streams": streams,
            "format": { "duration": "60.000000" },
        });
        let sidecar = PathBuf::from(format!("{}.probe.json", path.display()));
        std::fs::write(sidecar, probe.to_string()).unwrap();
        path
    }

    /// Every argument line the fake ffmpeg was invoked with.
    pub fn ffmpeg_log(&self) -> String {
        std::fs::read_to_string(self.tools.path().join("ffmpeg.log")).unwrap_or_default()
    }

    /// Wait until no live session is active.
    pub async fn wait_for_idle_session(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.ctx.live.active().is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("live session did not end");
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
