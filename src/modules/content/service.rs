use super::dto::RegisterUploadRequest;
use super::intake::IntakePolicy;
use super::lifecycle::{
    on_processing_signal, on_upload_complete, ProcessingOutcome, Step, Transition,
};
use super::model::{ContentItem, ContentKind, ProcessingOutputs, TranscodingStatus};
use super::repository::{ContentStore, TranscodingPatch};
use crate::common::error::LifecycleError;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Re-reads allowed when a concurrent writer moves the item between our read
/// and our conditional write.
const CAS_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Single intake path for every uploadable kind.
    pub async fn register_upload(
        &self,
        req: &RegisterUploadRequest,
    ) -> Result<ContentItem, LifecycleError> {
        let policy = IntakePolicy::for_kind(req.kind).ok_or(LifecycleError::UnsupportedKind {
            kind: req.kind,
            flow: "upload",
        })?;
        policy.check(req.mime_type.as_deref(), req.size_bytes)?;

        let item = ContentItem::new(req.kind, req.owner_id.trim(), req.title.trim());
        self.store.insert(&item).await?;

        info!(content_id = %item.id, kind = %item.kind, "Registered content");
        Ok(item)
    }

    pub async fn get(&self, id: Uuid) -> Result<ContentItem, LifecycleError> {
        self.store.get(id).await?.ok_or(LifecycleError::NotFound(id))
    }

    /// `pending -> processing`, recording where the raw upload landed.
    pub async fn advance_on_upload_complete(
        &self,
        id: Uuid,
        raw_location: Option<&str>,
    ) -> Result<Transition, LifecycleError> {
        let patch = TranscodingPatch {
            raw_location: raw_location.map(str::to_string),
            ..Default::default()
        };
        self.apply_transcoding(id, "upload-complete", on_upload_complete, &patch)
            .await
    }

    /// `processing -> done | failed`. Replays of the reached outcome are
    /// accepted without a write; contradicting signals are conflicts.
    pub async fn advance_on_processing_signal(
        &self,
        id: Uuid,
        outcome: ProcessingOutcome,
        outputs: &ProcessingOutputs,
    ) -> Result<Transition, LifecycleError> {
        let patch = match outcome {
            ProcessingOutcome::Done => TranscodingPatch {
                raw_location: None,
                playback_ref: outputs.playback_ref.clone(),
                thumbnail_ref: outputs.thumbnail_ref.clone(),
            },
            ProcessingOutcome::Failed => TranscodingPatch::default(),
        };
        self.apply_transcoding(
            id,
            outcome.signal_name(),
            |current| on_processing_signal(current, outcome),
            &patch,
        )
        .await
    }

    async fn apply_transcoding<F>(
        &self,
        id: Uuid,
        signal: &'static str,
        rule: F,
        patch: &TranscodingPatch,
    ) -> Result<Transition, LifecycleError>
    where
        F: Fn(TranscodingStatus) -> Step<TranscodingStatus>,
    {
        let mut observed = None;

        for _ in 0..CAS_ATTEMPTS {
            let item = self.get(id).await?;
            if item.kind != ContentKind::Video {
                return Err(LifecycleError::UnsupportedKind {
                    kind: item.kind,
                    flow: "transcoding",
                });
            }

            let from = item.transcoding_status;
            match rule(from) {
                Step::Stay => {
                    debug!(content_id = %id, status = %from, signal, "Signal already applied");
                    return Ok(Transition::Unchanged(item));
                }
                Step::Reject => {
                    warn!(content_id = %id, status = %from, signal, "Rejected out-of-order signal");
                    return Err(LifecycleError::Conflict {
                        id,
                        current: from.to_string(),
                        signal,
                    });
                }
                Step::Advance(to) => {
                    let updated = self.store.update_transcoding(id, from, to, patch).await?;
                    if let Some(updated) = updated {
                        info!(content_id = %id, %from, %to, "Transcoding status advanced");
                        return Ok(Transition::Applied(updated));
                    }
                    debug!(content_id = %id, signal, "Status moved concurrently, re-reading");
                    observed = Some(from);
                }
            }
        }

        Err(LifecycleError::Conflict {
            id,
            current: observed.map(|s| s.to_string()).unwrap_or_default(),
            signal,
        })
    }
}
