//! Library routes: browsing, subtitles and thumbnails.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::AppContext;
use crate::error::{Error, Result};
use crate::library::{subtitle_content_type, Listing};

pub fn library_routes() -> Router<AppContext> {
    Router::new()
        .route("/api/browse", get(browse))
        .route("/subtitles/*path", get(subtitle_file))
        .route("/thumbnail/*path", get(thumbnail))
}

#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub path: String,
}

async fn browse(
    State(ctx): State<AppContext>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Listing>> {
    let listing = ctx
        .library
        .browse(&query.path, &ctx.prober, &ctx.subtitles)
        .await?;
    Ok(Json(listing))
}

async fn subtitle_file(
    State(ctx): State<AppContext>,
    Path(relative): Path<String>,
) -> Result<Response> {
    let path = ctx.library.resolve(&relative)?;
    let content_type = subtitle_content_type(&path)
        .ok_or_else(|| Error::UnsupportedMediaType(relative.clone()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(relative.clone()),
        _ => Error::Io(e),
    })?;

    Ok(([(header::CONTENT_TYPE, content_type)], Body::from(bytes)).into_response())
}

async fn thumbnail(
    State(ctx): State<AppContext>,
    Path(relative): Path<String>,
) -> Result<Response> {
    let video = ctx.library.resolve(&relative)?;
    if !ctx.library.is_video(&video) {
        return Err(Error::not_found(relative));
    }

    let png = ctx.thumbnails.thumbnail(&ctx.library, &video).await?;
    let bytes = tokio::fs::read(&png).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        Body::from(bytes),
    )
        .into_response())
}
