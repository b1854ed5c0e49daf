use crate::infrastructure::redis::client::RedisService;
use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ephemeral "viewer X is watching content Y until T" records. Eventually
/// consistent; never used for access control.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Creates or overwrites the entry, expiring `ttl` from now.
    async fn join(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<()>;

    /// Extends a live entry. Returns `false` when there was nothing to extend.
    async fn heartbeat(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<bool>;

    /// Returns `false` when the entry was already gone.
    async fn leave(&self, content_id: Uuid, viewer_id: &str) -> Result<bool>;

    async fn count_active(&self, content_id: Uuid) -> Result<u64>;

    /// Drops expired entries for stores that do not expire keys on their own.
    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// One sorted set per content item: members are viewer ids, scores are expiry
/// times in unix milliseconds. Expired members are trimmed on every write and
/// ignored by counts; the set itself expires one TTL after its last write.
#[derive(Clone)]
pub struct RedisPresenceStore {
    redis: RedisService,
}

impl RedisPresenceStore {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }

    fn presence_key(content_id: Uuid) -> String {
        format!("presence:{}", content_id)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn join(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.redis.conn();
        let key = Self::presence_key(content_id);
        let now = now_millis();
        let ttl_ms = ttl_millis(ttl) as i64;

        let _: () = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", now)
            .ignore()
            .zadd(&key, viewer_id, now + ttl_ms)
            .ignore()
            .pexpire(&key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn heartbeat(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.redis.conn();
        let key = Self::presence_key(content_id);
        let now = now_millis();
        let ttl_ms = ttl_millis(ttl) as i64;

        let (score,): (Option<f64>,) = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", now)
            .ignore()
            .zscore(&key, viewer_id)
            .query_async(&mut conn)
            .await?;
        if score.is_none() {
            return Ok(false);
        }

        // XX: a viewer who left in the meantime stays gone.
        let (extended,): (Option<f64>,) = redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&key)
            .arg("XX")
            .arg(now + ttl_ms)
            .arg(viewer_id)
            .ignore()
            .zscore(&key, viewer_id)
            .pexpire(&key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(extended.is_some())
    }

    async fn leave(&self, content_id: Uuid, viewer_id: &str) -> Result<bool> {
        let mut conn = self.redis.conn();
        let key = Self::presence_key(content_id);

        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", now_millis())
            .ignore()
            .zrem(&key, viewer_id)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn count_active(&self, content_id: Uuid) -> Result<u64> {
        let mut conn = self.redis.conn();
        let count: u64 = conn
            .zcount(Self::presence_key(content_id), format!("({}", now_millis()), "+inf")
            .await?;
        Ok(count)
    }
}

/// In-process store keyed by (content, viewer); expiry is evaluated lazily and
/// by `purge_expired`.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryPresenceStore {
    entries: std::sync::Mutex<std::collections::HashMap<(Uuid, String), tokio::time::Instant>>,
}

#[cfg(test)]
impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn join(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert((content_id, viewer_id.to_string()), tokio::time::Instant::now() + ttl);
        Ok(())
    }

    async fn heartbeat(&self, content_id: Uuid, viewer_id: &str, ttl: Duration) -> Result<bool> {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(&(content_id, viewer_id.to_string())) {
            Some(expires_at) if *expires_at > now => {
                *expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn leave(&self, content_id: Uuid, viewer_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.remove(&(content_id, viewer_id.to_string())).is_some())
    }

    async fn count_active(&self, content_id: Uuid) -> Result<u64> {
        let now = tokio::time::Instant::now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .filter(|((cid, _), expires_at)| *cid == content_id && **expires_at > now)
            .count() as u64)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn entry_disappears_after_ttl_without_heartbeat() {
        let store = MemoryPresenceStore::new();
        let content = Uuid::new_v4();
        store.join(content, "v1", TTL).await.unwrap();
        assert_eq!(store.count_active(content).await.unwrap(), 1);

        advance(Duration::from_millis(1100)).await;
        assert_eq!(store.count_active(content).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_extends_visibility_past_original_expiry() {
        let store = MemoryPresenceStore::new();
        let content = Uuid::new_v4();
        store.join(content, "v1", TTL).await.unwrap();

        advance(Duration::from_millis(500)).await;
        assert!(store.heartbeat(content, "v1", TTL).await.unwrap());

        advance(Duration::from_millis(600)).await;
        assert_eq!(store.count_active(content).await.unwrap(), 1);

        advance(Duration::from_millis(500)).await;
        assert_eq!(store.count_active(content).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_on_expired_or_unknown_entry_is_a_noop() {
        let store = MemoryPresenceStore::new();
        let content = Uuid::new_v4();
        assert!(!store.heartbeat(content, "ghost", TTL).await.unwrap());

        store.join(content, "v1", TTL).await.unwrap();
        advance(Duration::from_secs(2)).await;
        assert!(!store.heartbeat(content, "v1", TTL).await.unwrap());
        assert_eq!(store.count_active(content).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejoin_is_idempotent_and_leave_tolerates_absence() {
        let store = MemoryPresenceStore::new();
        let content = Uuid::new_v4();
        store.join(content, "v1", TTL).await.unwrap();
        store.join(content, "v1", TTL).await.unwrap();
        store.join(content, "v2", TTL).await.unwrap();
        store.join(Uuid::new_v4(), "v1", TTL).await.unwrap();
        assert_eq!(store.count_active(content).await.unwrap(), 2);

        assert!(store.leave(content, "v1").await.unwrap());
        assert!(!store.leave(content, "v1").await.unwrap());
        assert_eq!(store.count_active(content).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let store = MemoryPresenceStore::new();
        let content = Uuid::new_v4();
        store.join(content, "short", TTL).await.unwrap();
        store.join(content, "long", Duration::from_secs(30)).await.unwrap();

        advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.count_active(content).await.unwrap(), 1);
    }

    #[test]
    fn redis_presence_is_one_set_per_content() {
        let content = Uuid::nil();
        assert_eq!(
            RedisPresenceStore::presence_key(content),
            "presence:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert!(now_millis() > 1_600_000_000_000);
    }
}
