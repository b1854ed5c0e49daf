use super::dto::PresenceAck;
use super::store::PresenceStore;
use crate::common::error::LifecycleError;
use crate::modules::content::model::{ContentKind, LiveStatus};
use crate::modules::content::repository::ContentStore;
use crate::workers::scheduler::spawn_detached;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const RECOMPUTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Viewer tracking for live streams. Cache trouble never fails a viewer
/// request; the stored `viewer_count` is only ever derived from here.
#[derive(Clone)]
pub struct PresenceService {
    store: Arc<dyn PresenceStore>,
    content: Arc<dyn ContentStore>,
    ttl: Duration,
}

impl PresenceService {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        content: Arc<dyn ContentStore>,
        ttl: Duration,
    ) -> Self {
        Self { store, content, ttl }
    }

    pub async fn join(
        &self,
        content_id: Uuid,
        viewer_id: &str,
    ) -> Result<PresenceAck, LifecycleError> {
        let item = self
            .content
            .get(content_id)
            .await?
            .ok_or(LifecycleError::NotFound(content_id))?;
        if item.kind != ContentKind::LiveStream {
            return Err(LifecycleError::UnsupportedKind {
                kind: item.kind,
                flow: "presence",
            });
        }
        if item.live_status != LiveStatus::Live {
            return Err(LifecycleError::Conflict {
                id: content_id,
                current: item.live_status.to_string(),
                signal: "join",
            });
        }

        let tracked = match self.store.join(content_id, viewer_id, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%content_id, "Presence join not recorded: {:#}", e);
                false
            }
        };
        self.spawn_recompute(content_id);

        Ok(PresenceAck {
            content_id,
            viewer_id: viewer_id.to_string(),
            tracked,
            ttl_secs: self.ttl.as_secs(),
        })
    }

    /// `false` when there was no live entry to extend.
    pub async fn heartbeat(&self, content_id: Uuid, viewer_id: &str) -> bool {
        match self.store.heartbeat(content_id, viewer_id, self.ttl).await {
            Ok(extended) => extended,
            Err(e) => {
                warn!(%content_id, "Presence heartbeat not recorded: {:#}", e);
                false
            }
        }
    }

    pub async fn leave(&self, content_id: Uuid, viewer_id: &str) -> bool {
        let removed = match self.store.leave(content_id, viewer_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(%content_id, "Presence leave not recorded: {:#}", e);
                false
            }
        };
        self.spawn_recompute(content_id);
        removed
    }

    /// Live count from the cache, or the last stored count when the cache is
    /// unavailable.
    pub async fn current_viewer_count(&self, content_id: Uuid) -> Result<u64, LifecycleError> {
        let item = self
            .content
            .get(content_id)
            .await?
            .ok_or(LifecycleError::NotFound(content_id))?;

        match self.store.count_active(content_id).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(%content_id, "Presence count unavailable, serving stored count: {:#}", e);
                Ok(item.viewer_count.max(0) as u64)
            }
        }
    }

    /// Writes the active count back to the content record.
    pub async fn recompute(&self, content_id: Uuid) -> Result<u64> {
        let count = self.store.count_active(content_id).await?;
        let count_i64 = i64::try_from(count).unwrap_or(i64::MAX);
        if !self.content.set_viewer_count(content_id, count_i64).await? {
            debug!(%content_id, "Viewer count not stored, item is gone or no longer live");
        }
        Ok(count)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.purge_expired().await
    }

    pub fn spawn_recompute(&self, content_id: Uuid) {
        let service = self.clone();
        spawn_detached("viewer-count", RECOMPUTE_TIMEOUT, async move {
            service.recompute(content_id).await.map(|_| ())
        });
    }
}
