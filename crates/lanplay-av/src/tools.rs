//! External tool detection.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Resolved executable paths for the two tools the service drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Transcoder (`ffmpeg`).
    pub ffmpeg: PathBuf,
    /// Inspector (`ffprobe`).
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    /// Resolve both tools, preferring configured paths over `PATH` lookup.
    ///
    /// A tool that cannot be found anywhere resolves to its bare name, so the
    /// failure surfaces as a spawn error at the call site instead of at
    /// startup.
    pub fn discover(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Self {
        Self {
            ffmpeg: resolve_or_bare("ffmpeg", ffmpeg),
            ffprobe: resolve_or_bare("ffprobe", ffprobe),
        }
    }
}

fn resolve_or_bare(name: &str, configured: Option<&Path>) -> PathBuf {
    match get_tool_path(name, configured) {
        Ok(path) => path,
        Err(_) => {
            tracing::warn!(tool = name, "tool not found in PATH, using bare name");
            PathBuf::from(name)
        }
    }
}

/// Check if a tool is available using the given version argument.
///
/// # Example
///
/// ```no_run
/// use lanplay_av::check_tool;
///
/// let info = check_tool("ffprobe", "-version");
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(program: impl AsRef<Path>, version_arg: &str) -> ToolInfo {
    let program = program.as_ref();
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());

    match Command::new(program).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = if program.is_absolute() {
                Some(program.to_path_buf())
            } else {
                which::which(program).ok()
            };

            ToolInfo {
                name,
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check both media tools.
pub fn check_tools(paths: &ToolPaths) -> Vec<ToolInfo> {
    vec![
        check_tool(&paths.ffmpeg, "-version"),
        check_tool(&paths.ffprobe, "-version"),
    ]
}

/// Require that a tool is available on `PATH`, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            tool = name,
            path = %path.display(),
            "configured tool path does not exist, falling back to PATH"
        );
    }

    require_tool(name)
}
