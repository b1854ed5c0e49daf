use super::model::{ContentItem, LiveStatus, Recording, TranscodingStatus};
use super::repository::{ContentStore, TranscodingPatch};
use crate::common::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

/// In-process content store with the same compare-and-set semantics as the
/// Postgres store.
#[derive(Default)]
pub struct MemoryContentStore {
    items: Mutex<HashMap<Uuid, ContentItem>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, f: F) -> Option<ContentItem>
    where
        F: FnOnce(&mut ContentItem) -> bool,
    {
        let mut items = self.items.lock().unwrap();
        let item = items.get_mut(&id)?;
        if f(item) {
            item.updated_at = OffsetDateTime::now_utc();
            Some(item.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert(&self, item: &ContentItem) -> Result<(), StoreError> {
        self.items.lock().unwrap().insert(item.id, item.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_stream_key(
        &self,
        stream_key: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .find(|i| i.stream_key.as_deref() == Some(stream_key))
            .cloned())
    }

    async fn list_live(&self) -> Result<Vec<ContentItem>, StoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.live_status == LiveStatus::Live)
            .cloned()
            .collect())
    }

    async fn update_transcoding(
        &self,
        id: Uuid,
        from: TranscodingStatus,
        to: TranscodingStatus,
        patch: &TranscodingPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.update(id, |item| {
            if item.transcoding_status != from {
                return false;
            }
            item.transcoding_status = to;
            if let Some(raw) = &patch.raw_location {
                item.raw_location = Some(raw.clone());
            }
            if let Some(playback) = &patch.playback_ref {
                item.playback_manifest_ref = Some(playback.clone());
            }
            if let Some(thumb) = &patch.thumbnail_ref {
                item.thumbnail_ref = Some(thumb.clone());
            }
            true
        }))
    }

    async fn mark_live(
        &self,
        id: Uuid,
        started_at: OffsetDateTime,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.update(id, |item| {
            let has_key = item.stream_key.as_deref().is_some_and(|k| !k.is_empty());
            if item.live_status != LiveStatus::NotStarted || !has_key {
                return false;
            }
            item.live_status = LiveStatus::Live;
            item.live_started_at = Some(started_at);
            true
        }))
    }

    async fn mark_ended(
        &self,
        id: Uuid,
        ended_at: OffsetDateTime,
        recording: &Recording,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.update(id, |item| {
            let Some(started) = item.live_started_at else {
                return false;
            };
            if item.live_status != LiveStatus::Live {
                return false;
            }
            item.live_status = LiveStatus::Ended;
            item.live_ended_at = Some(ended_at.max(started));
            item.playback_manifest_ref = Some(recording.playback_ref.clone());
            item.recording_ref = Some(recording.playback_ref.clone());
            item.thumbnail_ref = Some(recording.thumbnail_ref.clone());
            item.transcoding_status = TranscodingStatus::Done;
            item.viewer_count = 0;
            true
        }))
    }

    async fn record_playback_ref(&self, id: Uuid, manifest: &str) -> Result<bool, StoreError> {
        Ok(self
            .update(id, |item| {
                if item.playback_manifest_ref.is_some() {
                    return false;
                }
                item.playback_manifest_ref = Some(manifest.to_string());
                true
            })
            .is_some())
    }

    async fn set_viewer_count(&self, id: Uuid, count: i64) -> Result<bool, StoreError> {
        Ok(self
            .update(id, |item| {
                if item.live_status != LiveStatus::Live {
                    return false;
                }
                item.viewer_count = count.max(0);
                true
            })
            .is_some())
    }
}
