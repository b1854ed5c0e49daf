use crate::common::error::{LifecycleError, StoreError};
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::content::events::TranscodeResult;
use crate::modules::content::lifecycle::Transition;
use crate::modules::content::model::ProcessingOutputs;
use crate::modules::content::service::ContentService;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONSUMER_TAG: &str = "lifecycle_results";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEUE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
}

/// Only database failures are worth another delivery; anything the state
/// machine decided on would be decided the same way again.
pub fn disposition(result: &Result<Transition, LifecycleError>) -> Disposition {
    match result {
        Err(LifecycleError::Store(StoreError::Database(_))) => Disposition::Requeue,
        _ => Disposition::Ack,
    }
}

pub async fn run_transcode_results(
    queue: RabbitMqService,
    content: ContentService,
    queue_name: String,
    shutdown: CancellationToken,
) {
    info!("🎥 Starting transcode results consumer on '{}'", queue_name);

    loop {
        match queue.consume(&queue_name, CONSUMER_TAG).await {
            Ok(mut consumer) => loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Stopping transcode results consumer");
                        return;
                    }
                    next = consumer.next() => match next {
                        Some(Ok(delivery)) => handle_delivery(&content, delivery).await,
                        Some(Err(e)) => {
                            warn!("Transcode results consumer error: {}", e);
                            break;
                        }
                        None => {
                            warn!("Transcode results consumer closed");
                            break;
                        }
                    }
                }
            },
            Err(e) => error!("Cannot consume '{}': {:#}", queue_name, e),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
        if let Err(e) = queue.reconnect().await {
            error!("RabbitMQ reconnect failed: {:#}", e);
        }
    }
}

async fn handle_delivery(content: &ContentService, delivery: Delivery) {
    let outcome = match serde_json::from_slice::<TranscodeResult>(&delivery.data) {
        Ok(result) => {
            let outputs = ProcessingOutputs {
                playback_ref: result.playback_ref,
                thumbnail_ref: result.thumbnail_ref,
            };
            let applied = content
                .advance_on_processing_signal(result.content_id, result.outcome, &outputs)
                .await;
            match &applied {
                Ok(t) => info!(
                    content_id = %result.content_id,
                    status = %t.item().transcoding_status,
                    changed = t.applied(),
                    "Transcode result applied"
                ),
                Err(e) => {
                    warn!(content_id = %result.content_id, "Transcode result not applied: {}", e)
                }
            }
            disposition(&applied)
        }
        Err(e) => {
            error!("Dropping malformed transcode result: {}", e);
            Disposition::Ack
        }
    };

    let settled = match outcome {
        Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
        Disposition::Requeue => {
            tokio::time::sleep(REQUEUE_DELAY).await;
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await
        }
    };
    if let Err(e) = settled {
        error!("Failed to settle transcode result delivery: {}", e);
    }
}
