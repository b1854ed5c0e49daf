use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub mod dto;
pub mod handler;
pub mod service;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presence/{content_id}/{viewer_id}/join", post(handler::join))
        .route("/presence/{content_id}/{viewer_id}/heartbeat", post(handler::heartbeat))
        .route("/presence/{content_id}/{viewer_id}/leave", post(handler::leave))
        .route("/presence/{content_id}/count", get(handler::viewer_count))
}
