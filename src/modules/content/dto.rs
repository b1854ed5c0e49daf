use super::lifecycle::{ProcessingOutcome, Transition};
use super::model::{ContentItem, ContentKind, ProcessingOutputs};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUploadRequest {
    pub kind: ContentKind,
    #[validate(length(min = 1, message = "Owner is required"))]
    pub owner_id: String,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    /// Declared content type of the file; omitted for text posts.
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UploadCompleteRequest {
    #[validate(length(min = 1, message = "Raw location must not be empty"))]
    pub raw_location: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessingSignalRequest {
    pub outcome: ProcessingOutcome,
    #[serde(default)]
    pub outputs: ProcessingOutputs,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// `false` when the item already was in the target state.
    pub changed: bool,
    pub item: ContentItem,
}

impl From<Transition> for TransitionResponse {
    fn from(transition: Transition) -> Self {
        Self {
            changed: transition.applied(),
            item: transition.into_item(),
        }
    }
}
