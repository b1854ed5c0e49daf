use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::content::dto::*;
use crate::modules::content::model::ContentItem;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/api/v1/content",
    request_body = RegisterUploadRequest,
    responses(
        (status = 201, description = "Content Registered", body = ApiResponse<ContentItem>),
        (status = 400, description = "Rejected by intake policy"),
        (status = 409, description = "Kind cannot be uploaded"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn register_upload(
    State(state): State<AppState>,
    Json(req): Json<RegisterUploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let item = state.content.register_upload(&req).await?;
    Ok(ApiSuccess::created(item, "Content registered successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/content/{id}",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Get Content", body = ApiResponse<ContentItem>),
        (status = 404, description = "Content Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.content.get(id).await {
        Ok(item) => ApiSuccess::ok(item, "Content retrieved successfully").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/content/{id}/upload-complete",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    request_body = UploadCompleteRequest,
    responses(
        (
            status = 200,
            description = "Upload accepted for processing",
            body = ApiResponse<TransitionResponse>
        ),
        (status = 404, description = "Content Not Found"),
        (status = 409, description = "Content already processed"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn upload_complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadCompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let transition = state
        .content
        .advance_on_upload_complete(id, req.raw_location.as_deref())
        .await?;
    Ok(ApiSuccess::ok(TransitionResponse::from(transition), "Upload accepted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/content/{id}/processing",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    request_body = ProcessingSignalRequest,
    responses(
        (
            status = 200,
            description = "Processing outcome applied",
            body = ApiResponse<TransitionResponse>
        ),
        (status = 404, description = "Content Not Found"),
        (status = 409, description = "Out-of-order or contradictory outcome"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn processing_callback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProcessingSignalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transition = state
        .content
        .advance_on_processing_signal(id, req.outcome, &req.outputs)
        .await?;
    Ok(ApiSuccess::ok(TransitionResponse::from(transition), "Processing outcome applied"))
}
