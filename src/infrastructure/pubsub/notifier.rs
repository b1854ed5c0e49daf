use crate::infrastructure::redis::client::RedisService;
use crate::modules::content::events::LiveEvent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Publish-only side of the pub/sub provider. Fan-out to followers happens
/// downstream of the channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &LiveEvent) -> Result<()>;
}

pub struct RedisNotifier {
    redis: RedisService,
    channel: String,
    timeout: Duration,
}

impl RedisNotifier {
    pub fn new(redis: RedisService, channel: &str) -> Self {
        Self {
            redis,
            channel: channel.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, event: &LiveEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.redis.conn();

        let publish = conn.publish(&self.channel, payload);
        let receivers: i64 = tokio::time::timeout(self.timeout, publish)
            .await
            .map_err(|_| anyhow!("Publishing to '{}' timed out", self.channel))??;

        debug!(
            content_id = %event.content_id(),
            receivers,
            "Published lifecycle event on '{}'", self.channel
        );
        Ok(())
    }
}
