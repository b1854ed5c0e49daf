use crate::modules::content::repository::ContentStore;
use crate::modules::presence::service::PresenceService;
use crate::workers::scheduler::Sweep;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Makes TTL expiry visible in stored viewer counts: drops expired entries
/// where the store needs it, then recounts every live stream.
pub struct PresenceSweep {
    presence: PresenceService,
    content: Arc<dyn ContentStore>,
}

impl PresenceSweep {
    pub fn new(presence: PresenceService, content: Arc<dyn ContentStore>) -> Self {
        Self { presence, content }
    }
}

#[async_trait]
impl Sweep for PresenceSweep {
    fn name(&self) -> &'static str {
        "presence-sweep"
    }

    async fn sweep(&self) -> Result<()> {
        match self.presence.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired presence entries"),
            Err(e) => warn!("Presence purge failed: {:#}", e),
        }

        for item in self.content.list_live().await? {
            if let Err(e) = self.presence.recompute(item.id).await {
                warn!(content_id = %item.id, "Viewer count recompute failed: {:#}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::content::memory::MemoryContentStore;
    use crate::modules::content::model::{ContentItem, Recording};
    use crate::modules::presence::store::MemoryPresenceStore;
    use std::time::Duration;
    use time::OffsetDateTime;

    #[tokio::test(start_paused = true)]
    async fn expired_viewers_drop_out_of_stored_count() {
        let content = Arc::new(MemoryContentStore::new());
        let item = ContentItem::new_live_stream("u1", "show", "k-sweep");
        content.insert(&item).await.unwrap();
        content.mark_live(item.id, OffsetDateTime::now_utc()).await.unwrap();

        let presence = PresenceService::new(
            Arc::new(MemoryPresenceStore::new()),
            content.clone(),
            Duration::from_secs(1),
        );
        presence.join(item.id, "a").await.unwrap();
        presence.join(item.id, "b").await.unwrap();

        let sweep = PresenceSweep::new(presence.clone(), content.clone());
        sweep.sweep().await.unwrap();
        assert_eq!(content.get(item.id).await.unwrap().unwrap().viewer_count, 2);

        tokio::time::advance(Duration::from_millis(1100)).await;
        sweep.sweep().await.unwrap();
        assert_eq!(content.get(item.id).await.unwrap().unwrap().viewer_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_stream_keeps_zero_viewers_after_late_leave() {
        let content = Arc::new(MemoryContentStore::new());
        let item = ContentItem::new_live_stream("u1", "show", "k-ended");
        content.insert(&item).await.unwrap();
        content.mark_live(item.id, OffsetDateTime::now_utc()).await.unwrap();

        let presence = PresenceService::new(
            Arc::new(MemoryPresenceStore::new()),
            content.clone(),
            Duration::from_secs(1),
        );
        presence.join(item.id, "a").await.unwrap();
        presence.join(item.id, "b").await.unwrap();

        let recording = Recording {
            playback_ref: "https://cdn.local/rec/k-ended.m3u8".to_string(),
            thumbnail_ref: "https://cdn.local/rec/k-ended.jpg".to_string(),
        };
        content
            .mark_ended(item.id, OffsetDateTime::now_utc(), &recording)
            .await
            .unwrap()
            .unwrap();

        presence.leave(item.id, "a").await;
        assert_eq!(presence.recompute(item.id).await.unwrap(), 1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(content.get(item.id).await.unwrap().unwrap().viewer_count, 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        PresenceSweep::new(presence, content.clone()).sweep().await.unwrap();
        assert_eq!(content.get(item.id).await.unwrap().unwrap().viewer_count, 0);
    }
}
