use crate::modules::content::model::{ContentItem, LiveStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLiveSessionRequest {
    #[validate(length(min = 1, message = "Owner is required"))]
    pub owner_id: String,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
}

/// What a broadcaster needs to start streaming.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveSession {
    pub content_id: Uuid,
    pub stream_key: String,
    pub ingest_url: String,
    pub playback_url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StreamLookupQuery {
    pub stream_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StreamInfo {
    pub content_id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub live_status: LiveStatus,
}

impl From<ContentItem> for StreamInfo {
    fn from(item: ContentItem) -> Self {
        Self {
            content_id: item.id,
            owner_id: item.owner_id,
            title: item.title,
            live_status: item.live_status,
        }
    }
}

/// Media server hook payload (`on_publish` / `on_publish_done`); the stream
/// key arrives as `name`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishHook {
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProbeRequest {
    #[validate(length(min = 1, message = "Stream key is required"))]
    pub stream_key: String,
    /// Capped at the configured maximum.
    #[validate(range(min = 1, max = 300))]
    pub max_wait_secs: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub min_segments: Option<usize>,
}
