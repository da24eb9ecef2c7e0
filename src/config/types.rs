use lanplay_av::args::DEFAULT_DOWNMIX_FILTER;
use lanplay_av::TranscodeSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::delivery::ClientProfile;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the web UI, served for any unmatched path.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root of the media library; every request path is relative to it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: PathBuf,

    /// Video file extensions listed when browsing (lowercase, no dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Seek position of the thumbnail frame.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: u32,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
}

fn default_root() -> PathBuf {
    PathBuf::from("./videos")
}
fn default_thumbnail_dir() -> PathBuf {
    PathBuf::from("./thumbs")
}
fn default_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mkv".to_string()]
}
fn default_thumbnail_offset() -> u32 {
    3
}
fn default_thumbnail_width() -> u32 {
    320
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            thumbnail_dir: default_thumbnail_dir(),
            extensions: default_extensions(),
            thumbnail_offset_secs: default_thumbnail_offset(),
            thumbnail_width: default_thumbnail_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    /// Video codec the client decodes natively (ffprobe name).
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio codec the client decodes natively (ffprobe name).
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Delay before an unused pooled process is killed.
    #[serde(default = "default_idle_grace_ms")]
    pub idle_grace_ms: u64,

    /// Reuse probe results until a file's mtime changes.
    #[serde(default = "default_true")]
    pub probe_cache: bool,
}

fn default_video_codec() -> String {
    "h264".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_idle_grace_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            idle_grace_ms: default_idle_grace_ms(),
            probe_cache: true,
        }
    }
}

impl DeliveryConfig {
    pub fn client_profile(&self) -> ClientProfile {
        ClientProfile::new(self.video_codec.clone(), self.audio_codec.clone())
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    #[serde(default = "default_video_encoder")]
    pub video_encoder: String,

    #[serde(default = "default_audio_encoder")]
    pub audio_encoder: String,

    /// Filter applied to sources with more than two channels. An empty
    /// string disables it.
    #[serde(default = "default_downmix_filter")]
    pub downmix_filter: String,
}

fn default_video_encoder() -> String {
    "libx264".to_string()
}
fn default_audio_encoder() -> String {
    "aac".to_string()
}
fn default_downmix_filter() -> String {
    DEFAULT_DOWNMIX_FILTER.to_string()
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_encoder: default_video_encoder(),
            audio_encoder: default_audio_encoder(),
            downmix_filter: default_downmix_filter(),
        }
    }
}

impl TranscodeConfig {
    pub fn settings(&self) -> TranscodeSettings {
        TranscodeSettings {
            video_encoder: self.video_encoder.clone(),
            audio_encoder: self.audio_encoder.clone(),
            downmix_filter: (!self.downmix_filter.is_empty()).then(|| self.downmix_filter.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}
