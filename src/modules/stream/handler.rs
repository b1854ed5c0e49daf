use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::content::dto::TransitionResponse;
use crate::modules::stream::dto::*;
use crate::modules::stream::prober::ProbeReport;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Form, Json,
};
use std::time::Duration;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/api/v1/streams",
    request_body = CreateLiveSessionRequest,
    responses(
        (status = 201, description = "Live session created", body = ApiResponse<LiveSession>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streams"
)]
pub async fn create_live_session(
    State(state): State<AppState>,
    Json(req): Json<CreateLiveSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let session = state.streams.create_live_session(&req.owner_id, &req.title).await?;
    Ok(ApiSuccess::created(session, "Live session created"))
}

#[utoipa::path(
    get,
    path = "/api/v1/streams/lookup",
    params(StreamLookupQuery),
    responses(
        (status = 200, description = "Stream found", body = ApiResponse<StreamInfo>),
        (status = 404, description = "Unknown stream key")
    ),
    tag = "Streams"
)]
pub async fn lookup_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamLookupQuery>,
) -> impl IntoResponse {
    match state.streams.lookup(&query.stream_key).await {
        Ok(item) => ApiSuccess::ok(StreamInfo::from(item), "Stream found").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// The media server refuses the publish on any non-2xx answer.
#[utoipa::path(
    post,
    path = "/api/v1/streams/hooks/publish",
    request_body(content = PublishHook, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Publish accepted", body = ApiResponse<TransitionResponse>),
        (status = 404, description = "Unknown stream key"),
        (status = 409, description = "Broadcast already finished")
    ),
    tag = "Streams"
)]
pub async fn publish_start(
    State(state): State<AppState>,
    Form(hook): Form<PublishHook>,
) -> Result<impl IntoResponse, ApiError> {
    let transition = state.streams.advance_on_publish_start(&hook.name).await?;
    Ok(ApiSuccess::ok(TransitionResponse::from(transition), "Stream is live"))
}

#[utoipa::path(
    post,
    path = "/api/v1/streams/hooks/publish-done",
    request_body(content = PublishHook, content_type = "application/x-www-form-urlencoded"),
    responses(
        (
            status = 200,
            description = "Termination recorded or already handled",
            body = ApiResponse<TransitionResponse>
        ),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streams"
)]
pub async fn publish_done(
    State(state): State<AppState>,
    Form(hook): Form<PublishHook>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .streams
        .advance_on_publish_done(&hook.name)
        .await?
        .map(TransitionResponse::from);
    Ok(ApiSuccess::ok(response, "Stream ended"))
}

#[utoipa::path(
    post,
    path = "/api/v1/streams/probe",
    request_body = ProbeRequest,
    responses(
        (
            status = 200,
            description = "Probe finished; `ready` tells whether segments were seen",
            body = ApiResponse<ProbeReport>
        ),
        (status = 400, description = "Bad Request"),
        (status = 404, description = "Unknown stream key")
    ),
    tag = "Streams"
)]
pub async fn probe(
    State(state): State<AppState>,
    Json(req): Json<ProbeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let report = state
        .streams
        .probe_stream(
            &req.stream_key,
            req.max_wait_secs.map(Duration::from_secs),
            req.min_segments,
        )
        .await?;
    Ok(ApiSuccess::ok(report, "Probe finished"))
}
