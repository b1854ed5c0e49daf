use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::presence::dto::*;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/presence/{content_id}/{viewer_id}/join",
    params(
        ("content_id" = Uuid, Path, description = "Live stream content ID"),
        ("viewer_id" = String, Path, description = "Viewer ID")
    ),
    responses(
        (status = 200, description = "Viewer tracked", body = ApiResponse<PresenceAck>),
        (status = 404, description = "Content Not Found"),
        (status = 409, description = "Content is not a running live stream")
    ),
    tag = "Presence"
)]
pub async fn join(
    State(state): State<AppState>,
    Path((content_id, viewer_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = state.presence.join(content_id, &viewer_id).await?;
    Ok(ApiSuccess::ok(ack, "Viewer joined"))
}

#[utoipa::path(
    post,
    path = "/api/v1/presence/{content_id}/{viewer_id}/heartbeat",
    params(
        ("content_id" = Uuid, Path, description = "Live stream content ID"),
        ("viewer_id" = String, Path, description = "Viewer ID")
    ),
    responses(
        (status = 200, description = "Heartbeat accepted", body = ApiResponse<PresenceUpdate>)
    ),
    tag = "Presence"
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Path((content_id, viewer_id)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let found = state.presence.heartbeat(content_id, &viewer_id).await;
    ApiSuccess::ok(PresenceUpdate { content_id, viewer_id, found }, "Heartbeat accepted")
}

#[utoipa::path(
    post,
    path = "/api/v1/presence/{content_id}/{viewer_id}/leave",
    params(
        ("content_id" = Uuid, Path, description = "Live stream content ID"),
        ("viewer_id" = String, Path, description = "Viewer ID")
    ),
    responses(
        (status = 200, description = "Viewer left", body = ApiResponse<PresenceUpdate>)
    ),
    tag = "Presence"
)]
pub async fn leave(
    State(state): State<AppState>,
    Path((content_id, viewer_id)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let found = state.presence.leave(content_id, &viewer_id).await;
    ApiSuccess::ok(PresenceUpdate { content_id, viewer_id, found }, "Viewer left")
}

#[utoipa::path(
    get,
    path = "/api/v1/presence/{content_id}/count",
    params(
        ("content_id" = Uuid, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Current viewer count", body = ApiResponse<ViewerCount>),
        (status = 404, description = "Content Not Found")
    ),
    tag = "Presence"
)]
pub async fn viewer_count(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_count = state.presence.current_viewer_count(content_id).await?;
    Ok(ApiSuccess::ok(ViewerCount { content_id, viewer_count }, "Viewer count retrieved"))
}
