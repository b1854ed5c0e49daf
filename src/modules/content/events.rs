use super::lifecycle::ProcessingOutcome;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Result message emitted by the transcoding farm onto the results queue.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscodeResult {
    pub content_id: Uuid,
    pub outcome: ProcessingOutcome,
    #[serde(default)]
    pub playback_ref: Option<String>,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    PublishDone,
    Orphaned,
}

/// Lifecycle event published on the notification channel for follower fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    LiveStarted {
        content_id: Uuid,
        owner_id: String,
        stream_key: String,
        manifest_ready: bool,
        message: String,
        #[serde(with = "time::serde::rfc3339")]
        occurred_at: OffsetDateTime,
    },
    LiveEnded {
        content_id: Uuid,
        owner_id: String,
        stream_key: String,
        reason: EndReason,
        #[serde(with = "time::serde::rfc3339")]
        occurred_at: OffsetDateTime,
    },
}

impl LiveEvent {
    pub fn content_id(&self) -> Uuid {
        match self {
            LiveEvent::LiveStarted { content_id, .. } | LiveEvent::LiveEnded { content_id, .. } => {
                *content_id
            }
        }
    }
}
