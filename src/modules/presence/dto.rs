use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceAck {
    pub content_id: Uuid,
    pub viewer_id: String,
    /// `false` when the presence cache could not record the join.
    pub tracked: bool,
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceUpdate {
    pub content_id: Uuid,
    pub viewer_id: String,
    /// Whether an entry existed to extend or remove.
    pub found: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerCount {
    pub content_id: Uuid,
    pub viewer_count: u64,
}
