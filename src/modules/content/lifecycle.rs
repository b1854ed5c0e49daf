//! Transition rules for content status. Pure functions only; persistence and
//! serialization live in the services that apply them.

use super::model::{ContentItem, LiveStatus, TranscodingStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingOutcome {
    Done,
    Failed,
}

impl ProcessingOutcome {
    pub fn target(self) -> TranscodingStatus {
        match self {
            ProcessingOutcome::Done => TranscodingStatus::Done,
            ProcessingOutcome::Failed => TranscodingStatus::Failed,
        }
    }

    pub fn signal_name(self) -> &'static str {
        match self {
            ProcessingOutcome::Done => "processing-complete",
            ProcessingOutcome::Failed => "processing-failed",
        }
    }
}

/// What a signal does to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// Move from the observed state to this one.
    Advance(S),
    /// The signal was already applied or carries nothing to do.
    Stay,
    /// The signal contradicts the current state.
    Reject,
}

/// Result of applying a signal through the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// This call moved the item.
    Applied(ContentItem),
    /// The target state was already reached; nothing was written.
    Unchanged(ContentItem),
}

impl Transition {
    pub fn item(&self) -> &ContentItem {
        match self {
            Transition::Applied(item) | Transition::Unchanged(item) => item,
        }
    }

    pub fn into_item(self) -> ContentItem {
        match self {
            Transition::Applied(item) | Transition::Unchanged(item) => item,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

pub fn on_upload_complete(current: TranscodingStatus) -> Step<TranscodingStatus> {
    match current {
        TranscodingStatus::Pending => Step::Advance(TranscodingStatus::Processing),
        TranscodingStatus::Processing => Step::Stay,
        TranscodingStatus::Done | TranscodingStatus::Failed => Step::Reject,
    }
}

pub fn on_processing_signal(
    current: TranscodingStatus,
    outcome: ProcessingOutcome,
) -> Step<TranscodingStatus> {
    let target = outcome.target();
    match current {
        TranscodingStatus::Processing => Step::Advance(target),
        reached if reached == target => Step::Stay,
        _ => Step::Reject,
    }
}

/// A key whose broadcast already ended cannot go live again; a new broadcast
/// needs a new session and key.
pub fn on_publish_start(current: LiveStatus) -> Step<LiveStatus> {
    match current {
        LiveStatus::NotStarted => Step::Advance(LiveStatus::Live),
        LiveStatus::Live => Step::Stay,
        LiveStatus::Ended => Step::Reject,
    }
}

/// Termination signals arrive late, duplicated, or before the start signal;
/// none of those cases is an error.
pub fn on_publish_done(current: LiveStatus) -> Step<LiveStatus> {
    match current {
        LiveStatus::Live => Step::Advance(LiveStatus::Ended),
        LiveStatus::NotStarted | LiveStatus::Ended => Step::Stay,
    }
}
