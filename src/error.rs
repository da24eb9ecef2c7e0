//! Service-level error type.
//!
//! Every failure a playback, browse or thumbnail request can hit maps onto
//! one variant here; [`Error::http_status`] decides the response code. The
//! `IntoResponse` impl lives in [`crate::server::error`].

/// Errors surfaced by the delivery engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested path escapes the library root.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// The inspector tool was unusable or produced unparsable output.
    #[error("Probe failed: {0}")]
    Probe(#[source] lanplay_av::Error),

    /// The file has no usable video + audio pair.
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Direct delivery was chosen but the extension has no known content type.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The transcoder binary is missing or failed to start.
    #[error("Failed to spawn {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// A request parameter was invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external tool ran but failed (thumbnail or subtitle extraction).
    #[error("Tool error: {0}")]
    Tool(#[source] lanplay_av::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Forbidden error.
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a spawn failure for `program` from the OS error.
    pub fn spawn(program: &std::path::Path, err: &std::io::Error) -> Self {
        let tool = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| program.to_string_lossy().to_string());
        Self::Spawn {
            tool,
            message: err.to_string(),
        }
    }

    /// Map a probe-time tool error, keeping missing files as 404 and a
    /// missing inspector binary as a spawn failure.
    pub fn from_probe(err: lanplay_av::Error) -> Self {
        match err {
            lanplay_av::Error::FileNotFound { path } => {
                Self::NotFound(path.display().to_string())
            }
            lanplay_av::Error::ToolNotFound { tool } => Self::Spawn {
                tool,
                message: "executable not found".to_string(),
            },
            other if other.is_spawn_failure() => Self::Spawn {
                tool: "ffprobe".to_string(),
                message: other.to_string(),
            },
            other => Self::Probe(other),
        }
    }

    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::UnsupportedMedia(_) | Self::UnsupportedMediaType(_) => 415,
            Self::InvalidInput(_) => 400,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            Self::Probe(_) | Self::Spawn { .. } | Self::Io(_) | Self::Tool(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Probe(_) => "probe_error",
            Self::UnsupportedMedia(_) => "unsupported_media",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::Spawn { .. } => "spawn_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) => "io_error",
            Self::Tool(_) => "tool_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using the service Error type.
pub type Result<T> = std::result::Result<T, Error>;
