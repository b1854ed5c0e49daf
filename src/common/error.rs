use crate::common::response::ApiError;
use crate::modules::content::model::ContentKind;
use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the persisted content store. These are the only errors the
/// core escalates to its callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt content row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("content {0} not found")]
    NotFound(Uuid),

    #[error("unknown stream key")]
    UnknownStreamKey,

    #[error("content {id} is {current}, cannot apply {signal}")]
    Conflict {
        id: Uuid,
        current: String,
        signal: &'static str,
    },

    #[error("{kind} content does not take part in the {flow} lifecycle")]
    UnsupportedKind { kind: ContentKind, flow: &'static str },

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::NotFound(_) | LifecycleError::UnknownStreamKey => StatusCode::NOT_FOUND,
            LifecycleError::Conflict { .. } | LifecycleError::UnsupportedKind { .. } => {
                StatusCode::CONFLICT
            }
            LifecycleError::Rejected(_) => StatusCode::BAD_REQUEST,
            LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!("Lifecycle operation failed: {}", err);
        }
        ApiError(err.to_string(), status)
    }
}
