//! # lanplay-av
//!
//! External media tool layer for lanplay.
//!
//! This crate owns everything that talks to the ffmpeg suite:
//! - Locating `ffmpeg` / `ffprobe` (configured path or `PATH` lookup)
//! - Running one-shot tool invocations with a timeout ([`ToolCommand`])
//! - Probing media files into a [`MediaDescription`]
//! - Building ffmpeg argument lists for live streaming, thumbnails and
//!   subtitle extraction
//!
//! It never spawns long-lived processes itself; that is the job of the
//! process pool in the `lanplay` service crate.
//!
//! ## Example
//!
//! ```no_run
//! use lanplay_av::{probe, ToolPaths};
//!
//! # async fn example() -> lanplay_av::Result<()> {
//! let tools = ToolPaths::discover(None, None);
//! let desc = probe(&tools.ffprobe, "/media/movie.mkv").await?;
//! if let Some(video) = desc.first_video() {
//!     println!("video codec: {}", video.codec);
//! }
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod command;
mod error;
pub mod probe;
pub mod tools;

pub use args::{LiveMode, TranscodeSettings};
pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::{MediaDescription, StreamInfo, StreamKind};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, ToolPaths};

/// Probe a media file with the given `ffprobe` executable.
///
/// Thin wrapper around [`probe::probe_with_ffprobe`] accepting anything
/// path-like.
pub async fn probe<P: AsRef<std::path::Path>>(
    ffprobe: &std::path::Path,
    path: P,
) -> Result<MediaDescription> {
    probe::probe_with_ffprobe(ffprobe, path.as_ref()).await
}
