//! Playback routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::delivery::{decide, DeliveryAction};
use crate::error::{Error, Result};
use crate::streaming::{direct, SessionInfo};
use lanplay_av::MediaDescription;

pub fn video_routes() -> Router<AppContext> {
    Router::new()
        .route("/video/*path", get(play_video))
        .route("/api/probe/*path", get(probe_video))
        .route("/api/session", get(active_session))
}

#[derive(Debug, Deserialize)]
pub struct PlayQuery {
    /// Audio-stream ordinal for live delivery.
    pub audio: Option<usize>,
}

/// Probe, decide, then hand off to the direct server or a live session.
async fn play_video(
    State(ctx): State<AppContext>,
    Path(relative): Path<String>,
    Query(query): Query<PlayQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let path = ctx.library.resolve(&relative)?;
    if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
        return Err(Error::not_found(relative));
    }

    let desc = ctx.prober.probe(&path).await?;
    let action = decide(&ctx.profile, &desc);
    tracing::debug!(path = %relative, action = %action, audio = ?query.audio, "playback requested");

    match action {
        DeliveryAction::Direct => {
            let range = headers.get(header::RANGE).and_then(|h| h.to_str().ok());
            direct::serve(&path, range).await
        }
        DeliveryAction::Transmux | DeliveryAction::Transcode => {
            let stream = ctx.live.start(&desc, action, query.audio).await?;
            Ok(stream.into_response())
        }
        DeliveryAction::Unsupported => Err(Error::UnsupportedMedia(format!(
            "{relative} has no playable video and audio pair"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub description: MediaDescription,
    pub action: DeliveryAction,
}

async fn probe_video(
    State(ctx): State<AppContext>,
    Path(relative): Path<String>,
) -> Result<Json<ProbeResponse>> {
    let path = ctx.library.resolve(&relative)?;
    let description = ctx.prober.probe(&path).await?;
    let action = decide(&ctx.profile, &description);
    Ok(Json(ProbeResponse {
        description: MediaDescription::clone(&description),
        action,
    }))
}

async fn active_session(State(ctx): State<AppContext>) -> Json<Option<SessionInfo>> {
    Json(ctx.live.active())
}
