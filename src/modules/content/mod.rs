use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub mod dto;
pub mod events;
pub mod handler;
pub mod intake;
pub mod lifecycle;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content", post(handler::register_upload))
        .route("/content/{id}", get(handler::get_content))
        .route("/content/{id}/upload-complete", post(handler::upload_complete))
        .route("/content/{id}/processing", post(handler::processing_callback))
}
