//! Direct streaming with HTTP range requests.
//!
//! Serves the original bytes of a file that the client can play as-is.

use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{Error, Result};

/// Serve `path` directly, honoring a `Range` header value if one is given.
///
/// A malformed or unsatisfiable range is treated as no range.
pub async fn serve(path: &Path, range: Option<&str>) -> Result<Response> {
    let content_type = content_type_for(path)
        .ok_or_else(|| Error::UnsupportedMediaType(path.display().to_string()))?;

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(path.display().to_string()),
        _ => Error::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(Error::not_found(path.display().to_string()));
    }
    let file_size = metadata.len();

    let range = range.and_then(|s| parse_range_header(s, file_size));
    let mut file = File::open(path).await?;

    let response = match range {
        Some((start, end)) => {
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start)).await?;

            tracing::debug!(path = %path.display(), start, end, file_size, "serving byte range");

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(ReaderStream::new(file.take(length))))
        }
        None => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, file_size.to_string())
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(ReaderStream::new(file))),
    };

    response.map_err(|e| Error::internal(e.to_string()))
}

/// Parse an HTTP Range header against a file of `file_size` bytes.
///
/// Supports formats:
/// - bytes=0-499
/// - bytes=500-
/// - bytes=-500 (last 500 bytes)
///
/// Multi-range requests are not supported.
pub fn parse_range_header(header: &str, file_size: u64) -> Option<(u64, u64)> {
    if file_size == 0 {
        return None;
    }
    let header = header.trim().strip_prefix("bytes=")?;

    let (start, end) = header.split_once('-')?;
    let start = start.trim();
    let end = end.trim();

    match (start.is_empty(), end.is_empty()) {
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            Some((file_size.saturating_sub(suffix_len), file_size - 1))
        }
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            if start >= file_size {
                return None;
            }
            Some((start, file_size - 1))
        }
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= file_size {
                return None;
            }
            let end = end.min(file_size - 1);
            if start > end {
                return None;
            }
            Some((start, end))
        }
        (true, true) => None,
    }
}

/// Content type for directly playable containers, by file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "mkv" => Some("video/x-matroska"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn fixture(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_parse_range_header_full_range() {
        assert_eq!(parse_range_header("bytes=0-499", 1000), Some((0, 499)));
    }

    #[test]
    fn test_parse_range_header_open_end() {
        assert_eq!(parse_range_header("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn test_parse_range_header_suffix() {
        assert_eq!(parse_range_header("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_range_header("bytes=-5000", 1000), Some((0, 999)));
        assert_eq!(parse_range_header("bytes=-0", 1000), None);
    }

    #[test]
    fn test_parse_range_header_clamped() {
        assert_eq!(parse_range_header("bytes=0-2000", 1000), Some((0, 999)));
    }

    #[test]
    fn test_parse_range_header_unsatisfiable() {
        assert_eq!(parse_range_header("bytes=1500-", 1000), None);
        assert_eq!(parse_range_header("bytes=300-200", 1000), None);
        assert_eq!(parse_range_header("bytes=0-10", 0), None);
    }

    #[test]
    fn test_parse_range_header_malformed() {
        assert_eq!(parse_range_header("bytes=-", 1000), None);
        assert_eq!(parse_range_header("bytes=abc-def", 1000), None);
        assert_eq!(parse_range_header("items=0-10", 1000), None);
        assert_eq!(parse_range_header("bytes=0-10,20-30", 1000), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.mp4")), Some("video/mp4"));
        assert_eq!(content_type_for(Path::new("a.M4V")), Some("video/mp4"));
        assert_eq!(content_type_for(Path::new("a.mkv")), Some("video/x-matroska"));
        assert_eq!(content_type_for(Path::new("a.webm")), Some("video/webm"));
        assert_eq!(content_type_for(Path::new("a.mov")), Some("video/quicktime"));
        assert_eq!(content_type_for(Path::new("a.avi")), None);
        assert_eq!(content_type_for(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_serve_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "clip.mp4");

        let response = serve(&path, Some("bytes=100-199")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(headers[header::CONTENT_LENGTH], "100");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");

        let expected: Vec<u8> = (100..200u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(body_bytes(response).await, expected);
    }

    #[tokio::test]
    async fn test_serve_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "clip.mkv");

        let response = serve(&path, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/x-matroska");
        assert_eq!(body_bytes(response).await.len(), 1000);
    }

    #[tokio::test]
    async fn test_serve_bad_range_falls_back_to_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "clip.mp4");

        let response = serve(&path, Some("bytes=5000-6000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
    }

    #[tokio::test]
    async fn test_serve_errors() {
        let dir = tempfile::tempdir().unwrap();
        let avi = fixture(&dir, "clip.avi");
        assert_eq!(serve(&avi, None).await.unwrap_err().http_status(), 415);

        let missing = dir.path().join("gone.mp4");
        assert_eq!(serve(&missing, None).await.unwrap_err().http_status(), 404);
    }
}
