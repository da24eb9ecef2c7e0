//! Single-flight live streaming (transmux and transcode).
//!
//! At most one live session exists at a time. Starting a new one kills the
//! previous process and waits for it to exit before the new process is
//! spawned. The session's stdout is forwarded to the client as a
//! fragmented MP4 stream that only reads when the response body is polled.
//!
//! Teardown is triggered by whichever happens first:
//! - the response body is dropped (client disconnect or response error)
//! - the process exits (stdout reaches EOF)
//! - a newer session preempts this one (its cancellation token fires)

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use lanplay_av::args::live_stream_args;
use lanplay_av::{LiveMode, MediaDescription, TranscodeSettings};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::delivery::DeliveryAction;
use crate::error::{Error, Result};
use crate::process::{ProcessHandle, ProcessPool, SpawnSpec};

/// Read size for forwarding transcoder output.
const CHUNK_SIZE: usize = 64 * 1024;

struct ActiveSession {
    id: u64,
    handle: ProcessHandle,
    cancel: CancellationToken,
    path: PathBuf,
    action: DeliveryAction,
}

/// Snapshot of the active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: u64,
    pub path: PathBuf,
    pub action: DeliveryAction,
    pub pid: Option<u32>,
}

struct LiveInner {
    pool: ProcessPool,
    ffmpeg: PathBuf,
    transcode: TranscodeSettings,
    slot: Mutex<Option<ActiveSession>>,
    /// Serializes starts so terminate-then-spawn never interleaves.
    start_gate: tokio::sync::Mutex<()>,
    next_session: AtomicU64,
}

impl LiveInner {
    /// Tear down session `id` if it is still the active one. Idempotent.
    fn end_session(&self, id: u64, reason: &'static str) {
        let session = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(active) if active.id == id => slot.take(),
                _ => None,
            }
        };

        if let Some(session) = session {
            session.cancel.cancel();
            self.pool.terminate(&session.handle);
            tracing::info!(session = id, reason, path = %session.path.display(), "live session ended");
        }
    }

    /// Clear the slot after the process exited on its own, leaving the
    /// forwarding stream to drain whatever output is still buffered.
    fn clear_exited(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
            tracing::debug!(session = id, "live session process exited");
        }
    }
}

/// Owner of the single live session slot.
#[derive(Clone)]
pub struct LiveSessionManager {
    inner: Arc<LiveInner>,
}

impl LiveSessionManager {
    pub fn new(pool: ProcessPool, ffmpeg: PathBuf, transcode: TranscodeSettings) -> Self {
        Self {
            inner: Arc::new(LiveInner {
                pool,
                ffmpeg,
                transcode,
                slot: Mutex::new(None),
                start_gate: tokio::sync::Mutex::new(()),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Start a live session for `desc`, preempting any active one.
    ///
    /// `audio_track` is the audio-stream ordinal (default first).
    pub async fn start(
        &self,
        desc: &MediaDescription,
        action: DeliveryAction,
        audio_track: Option<usize>,
    ) -> Result<LiveStream> {
        let mode = match action {
            DeliveryAction::Transmux => LiveMode::Transmux,
            DeliveryAction::Transcode => LiveMode::Transcode(self.inner.transcode.clone()),
            other => {
                return Err(Error::internal(format!(
                    "{other} delivery does not use a live session"
                )))
            }
        };

        let ordinal = audio_track.unwrap_or(0);
        let audio = desc.audio_stream(ordinal).ok_or_else(|| {
            Error::invalid_input(format!(
                "audio track {ordinal} does not exist ({} available)",
                desc.audio_count()
            ))
        })?;

        let args = live_stream_args(&desc.file_path, ordinal, audio.channels, &mode);
        let spec = SpawnSpec::new(self.inner.ffmpeg.clone(), args).piped();

        let _gate = self.inner.start_gate.lock().await;
        self.preempt().await;

        let label = format!("live:{}", desc.file_path.display());
        let handle = self.inner.pool.spawn_unpooled(&label, &spec)?;
        let Some(stdout) = handle.take_stdout() else {
            self.inner.pool.terminate(&handle);
            return Err(Error::internal("transcoder stdout was not captured"));
        };

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *self.inner.slot.lock() = Some(ActiveSession {
            id,
            handle: handle.clone(),
            cancel: cancel.clone(),
            path: desc.file_path.clone(),
            action,
        });

        tracing::info!(
            session = id,
            pid = handle.pid(),
            action = %action,
            audio_track = ordinal,
            path = %desc.file_path.display(),
            "live session started"
        );

        let watcher = self.inner.clone();
        let exit_handle = handle.clone();
        tokio::spawn(async move {
            let exit = exit_handle.wait().await;
            if !exit.success() && !exit.killed {
                tracing::warn!(
                    session = id,
                    code = ?exit.code,
                    "PartialStreamFailure: transcoder exited with an error mid-stream"
                );
            }
            watcher.clear_exited(id);
        });

        let guard = SessionGuard {
            inner: self.inner.clone(),
            id,
        };
        let chunks = ReaderStream::with_capacity(stdout, CHUNK_SIZE);
        let body = forward(chunks, cancel, guard);

        Ok(LiveStream {
            session_id: id,
            handle,
            body: Box::pin(body),
        })
    }

    /// Kill the active session (if any) and wait for its process to exit.
    async fn preempt(&self) {
        let prior = self.inner.slot.lock().take();
        let Some(prior) = prior else {
            return;
        };

        tracing::info!(session = prior.id, path = %prior.path.display(), "preempting live session");
        prior.cancel.cancel();
        self.inner.pool.terminate(&prior.handle);
        prior.handle.wait().await;
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<SessionInfo> {
        self.inner.slot.lock().as_ref().map(|s| SessionInfo {
            id: s.id,
            path: s.path.clone(),
            action: s.action,
            pid: s.handle.pid(),
        })
    }
}

/// Ends its session when the forwarding stream is dropped.
struct SessionGuard {
    inner: Arc<LiveInner>,
    id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.end_session(self.id, "stream closed");
    }
}

fn forward(
    mut chunks: ReaderStream<tokio::process::ChildStdout>,
    cancel: CancellationToken,
    guard: SessionGuard,
) -> impl Stream<Item = io::Result<Bytes>> + Send {
    async_stream::stream! {
        let _guard = guard;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = chunks.next() => chunk,
            };
            match next {
                Some(Ok(bytes)) => yield Ok(bytes),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "failed reading transcoder output");
                    yield Err(e);
                    break;
                }
                None => break,
            }
        }
    }
}

/// Transcoder output for one live session.
///
/// Dropping it ends the session and kills the process.
pub struct LiveStream {
    session_id: u64,
    handle: ProcessHandle,
    body: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>,
}

impl LiveStream {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// The process producing this stream.
    pub fn process(&self) -> &ProcessHandle {
        &self.handle
    }
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("session_id", &self.session_id)
            .field("process", &self.handle)
            .finish()
    }
}

impl Stream for LiveStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.body.as_mut().poll_next(cx)
    }
}

impl IntoResponse for LiveStream {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp4"),
                (header::CACHE_CONTROL, "no-store"),
                (header::ACCEPT_RANGES, "none"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}
