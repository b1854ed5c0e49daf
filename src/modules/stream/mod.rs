use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub mod dto;
pub mod handler;
pub mod locks;
pub mod prober;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/streams", post(handler::create_live_session))
        .route("/streams/lookup", get(handler::lookup_stream))
        .route("/streams/hooks/publish", post(handler::publish_start))
        .route("/streams/hooks/publish-done", post(handler::publish_done))
        .route("/streams/probe", post(handler::probe))
}
