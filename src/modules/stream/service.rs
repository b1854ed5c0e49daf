use super::dto::LiveSession;
use super::locks::StreamLocks;
use super::prober::{ProbeReport, ReadinessProber};
use crate::common::error::LifecycleError;
use crate::infrastructure::media_server::MediaServer;
use crate::infrastructure::pubsub::notifier::Notifier;
use crate::modules::content::events::{EndReason, LiveEvent};
use crate::modules::content::lifecycle::{on_publish_done, on_publish_start, Step, Transition};
use crate::modules::content::model::ContentItem;
use crate::modules::content::repository::ContentStore;
use crate::workers::scheduler::spawn_detached;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Slack on top of the probing budget for the store write and the publish.
const ANNOUNCE_GRACE: Duration = Duration::from_secs(10);
const NOTICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Live-stream side of the lifecycle: session creation, the media server's
/// publish hooks and the forced end used by the orphan monitor.
#[derive(Clone)]
pub struct LiveStreamService {
    store: Arc<dyn ContentStore>,
    media: MediaServer,
    prober: ReadinessProber,
    notifier: Arc<dyn Notifier>,
    locks: Arc<StreamLocks>,
}

impl LiveStreamService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        media: MediaServer,
        prober: ReadinessProber,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            media,
            prober,
            notifier,
            locks: Arc::new(StreamLocks::new()),
        }
    }

    pub fn media(&self) -> &MediaServer {
        &self.media
    }

    pub async fn create_live_session(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<LiveSession, LifecycleError> {
        let stream_key = Uuid::new_v4().simple().to_string();
        let item = ContentItem::new_live_stream(owner_id.trim(), title.trim(), &stream_key);
        self.store.insert(&item).await?;

        info!(content_id = %item.id, "Created live session");
        Ok(LiveSession {
            content_id: item.id,
            ingest_url: self.media.ingest_url(&stream_key),
            playback_url: self.media.manifest_url(&stream_key),
            stream_key,
        })
    }

    pub async fn lookup(&self, stream_key: &str) -> Result<ContentItem, LifecycleError> {
        self.store
            .find_by_stream_key(stream_key)
            .await?
            .ok_or(LifecycleError::UnknownStreamKey)
    }

    /// Synchronous readiness check for a known stream. `max_wait` is capped at
    /// the configured budget.
    pub async fn probe_stream(
        &self,
        stream_key: &str,
        max_wait: Option<Duration>,
        min_segments: Option<usize>,
    ) -> Result<ProbeReport, LifecycleError> {
        self.lookup(stream_key).await?;
        let settings = self.prober.settings();
        let max_wait = max_wait.map_or(settings.max_wait, |w| w.min(settings.max_wait));
        let min_segments = min_segments.unwrap_or(settings.min_segments);
        Ok(self
            .prober
            .probe(&self.media.manifest_url(stream_key), max_wait, min_segments)
            .await)
    }

    /// `not-started -> live`. Unknown keys never touch state. Readiness and
    /// the follower notification run detached after the transition commits.
    pub async fn advance_on_publish_start(
        &self,
        stream_key: &str,
    ) -> Result<Transition, LifecycleError> {
        let _guard = self.locks.acquire(stream_key).await;

        let Some(item) = self.store.find_by_stream_key(stream_key).await? else {
            warn!("Publish attempt with unknown stream key rejected");
            return Err(LifecycleError::UnknownStreamKey);
        };

        match on_publish_start(item.live_status) {
            Step::Stay => {
                debug!(content_id = %item.id, "Duplicate publish-start ignored");
                Ok(Transition::Unchanged(item))
            }
            Step::Reject => {
                warn!(
                    content_id = %item.id,
                    status = %item.live_status,
                    "Publish on a finished broadcast rejected"
                );
                Err(LifecycleError::Conflict {
                    id: item.id,
                    current: item.live_status.to_string(),
                    signal: "publish-start",
                })
            }
            Step::Advance(_) => {
                let marked = self.store.mark_live(item.id, OffsetDateTime::now_utc()).await?;
                let Some(live) = marked else {
                    let current = self.store.get(item.id).await?.unwrap_or(item);
                    return Err(LifecycleError::Conflict {
                        id: current.id,
                        current: current.live_status.to_string(),
                        signal: "publish-start",
                    });
                };

                info!(content_id = %live.id, owner_id = %live.owner_id, "Stream is live");
                self.spawn_announcement(live.clone(), stream_key);
                Ok(Transition::Applied(live))
            }
        }
    }

    /// `live -> ended`. Unknown keys yield `Ok(None)`: the session may already
    /// be cleaned up.
    pub async fn advance_on_publish_done(
        &self,
        stream_key: &str,
    ) -> Result<Option<Transition>, LifecycleError> {
        self.end_stream(stream_key, EndReason::PublishDone).await
    }

    /// Shared by the publish-done hook and the orphan monitor; whichever gets
    /// the key lock first ends the broadcast, the other sees `Unchanged`.
    pub async fn end_stream(
        &self,
        stream_key: &str,
        reason: EndReason,
    ) -> Result<Option<Transition>, LifecycleError> {
        let _guard = self.locks.acquire(stream_key).await;

        let Some(item) = self.store.find_by_stream_key(stream_key).await? else {
            debug!(?reason, "End signal for unknown stream key ignored");
            return Ok(None);
        };

        match on_publish_done(item.live_status) {
            Step::Stay | Step::Reject => {
                debug!(
                    content_id = %item.id,
                    status = %item.live_status,
                    ?reason,
                    "End signal ignored"
                );
                Ok(Some(Transition::Unchanged(item)))
            }
            Step::Advance(_) => {
                let recording = self.media.recording(&item.owner_id, stream_key);
                match self
                    .store
                    .mark_ended(item.id, OffsetDateTime::now_utc(), &recording)
                    .await?
                {
                    Some(ended) => {
                        info!(content_id = %ended.id, ?reason, "Stream ended");
                        self.spawn_end_notice(&ended, stream_key, reason);
                        Ok(Some(Transition::Applied(ended)))
                    }
                    None => {
                        let current = self.store.get(item.id).await?.unwrap_or(item);
                        Ok(Some(Transition::Unchanged(current)))
                    }
                }
            }
        }
    }

    fn spawn_announcement(&self, item: ContentItem, stream_key: &str) {
        let manifest_url = self.media.manifest_url(stream_key);
        let stream_key = stream_key.to_string();
        let settings = self.prober.settings().clone();
        let prober = self.prober.clone();
        let store = self.store.clone();
        let notifier = self.notifier.clone();

        spawn_detached("live-announcement", settings.max_wait + ANNOUNCE_GRACE, async move {
            let report = prober
                .probe(&manifest_url, settings.max_wait, settings.min_segments)
                .await;

            if report.ready {
                if let Err(e) = store.record_playback_ref(item.id, &manifest_url).await {
                    warn!(content_id = %item.id, "Failed to record playback manifest: {}", e);
                }
            } else {
                warn!(
                    content_id = %item.id,
                    attempts = report.attempts,
                    "Manifest not confirmed, announcing anyway"
                );
            }

            let event = LiveEvent::LiveStarted {
                content_id: item.id,
                owner_id: item.owner_id.clone(),
                stream_key,
                manifest_ready: report.ready,
                message: format!("{} started a live stream: {}", item.owner_id, item.title),
                occurred_at: OffsetDateTime::now_utc(),
            };
            notifier.publish(&event).await
        });
    }

    fn spawn_end_notice(&self, item: &ContentItem, stream_key: &str, reason: EndReason) {
        let notifier = self.notifier.clone();
        let event = LiveEvent::LiveEnded {
            content_id: item.id,
            owner_id: item.owner_id.clone(),
            stream_key: stream_key.to_string(),
            reason,
            occurred_at: OffsetDateTime::now_utc(),
        };
        spawn_detached("live-ended-notice", NOTICE_TIMEOUT, async move {
            notifier.publish(&event).await
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::modules::content::model::{LiveStatus, TranscodingStatus};
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYLIST: &str = "#EXTM3U\n#EXTINF:2.0,\na.ts\n#EXTINF:2.0,\nb.ts\n#EXTINF:2.0,\nc.ts\n";

    async fn serving_media() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/hls/[0-9a-f]+/index\.m3u8$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn session_goes_live_announces_and_ends_with_recording() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());

        let session = h.streams.create_live_session("u1", "Friday show").await.unwrap();
        assert_eq!(session.stream_key.len(), 32);
        assert_eq!(session.ingest_url, format!("rtmp://media.local/live/{}", session.stream_key));

        let started = h.streams.advance_on_publish_start(&session.stream_key).await.unwrap();
        assert!(started.applied());
        assert_eq!(started.item().live_status, LiveStatus::Live);
        assert!(started.item().live_started_at.is_some());

        let events = wait_for_events(&h.notifier, 1).await;
        match &events[0] {
            LiveEvent::LiveStarted { content_id, manifest_ready, .. } => {
                assert_eq!(*content_id, session.content_id);
                assert!(*manifest_ready);
            }
            other => panic!("unexpected event {:?}", other),
        }
        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert_eq!(item.playback_manifest_ref.as_deref(), Some(session.playback_url.as_str()));

        let ended = h
            .streams
            .advance_on_publish_done(&session.stream_key)
            .await
            .unwrap()
            .unwrap();
        assert!(ended.applied());
        let item = ended.into_item();
        assert_eq!(item.live_status, LiveStatus::Ended);
        assert_eq!(item.transcoding_status, TranscodingStatus::Done);
        assert!(item.live_ended_at.unwrap() >= item.live_started_at.unwrap());
        assert_eq!(
            item.recording_ref,
            Some(format!("https://cdn.local/streams/u1/{}/playlist.m3u8", session.stream_key))
        );

        let events = wait_for_events(&h.notifier, 2).await;
        assert!(matches!(
            events[1],
            LiveEvent::LiveEnded { reason: EndReason::PublishDone, .. }
        ));
    }

    #[tokio::test]
    async fn unconfirmed_manifest_still_announces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let mut probe = fast_probe();
        probe.max_wait = Duration::from_millis(400);
        let h = harness(&server.uri(), probe);

        let session = h.streams.create_live_session("u1", "quiet").await.unwrap();
        h.streams.advance_on_publish_start(&session.stream_key).await.unwrap();

        let events = wait_for_events(&h.notifier, 1).await;
        assert!(matches!(
            events[0],
            LiveEvent::LiveStarted { manifest_ready: false, .. }
        ));
        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert!(item.playback_manifest_ref.is_none());
    }

    #[tokio::test]
    async fn unknown_key_cannot_publish() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());
        let session = h.streams.create_live_session("u1", "show").await.unwrap();

        let err = h.streams.advance_on_publish_start("not-a-key").await.unwrap_err();
        assert!(matches!(err, LifecycleError::UnknownStreamKey));
        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert_eq!(item.live_status, LiveStatus::NotStarted);
    }

    #[tokio::test]
    async fn publish_done_is_a_noop_when_unknown_early_or_repeated() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());

        assert!(h.streams.advance_on_publish_done("gone").await.unwrap().is_none());

        let session = h.streams.create_live_session("u1", "show").await.unwrap();
        let early = h
            .streams
            .advance_on_publish_done(&session.stream_key)
            .await
            .unwrap()
            .unwrap();
        assert!(!early.applied());
        assert_eq!(early.item().live_status, LiveStatus::NotStarted);

        h.streams.advance_on_publish_start(&session.stream_key).await.unwrap();
        let first = h.streams.advance_on_publish_done(&session.stream_key).await.unwrap().unwrap();
        let second = h.streams.advance_on_publish_done(&session.stream_key).await.unwrap().unwrap();
        assert!(first.applied());
        assert!(!second.applied());
        assert_eq!(second.item().live_ended_at, first.item().live_ended_at);
    }

    #[tokio::test]
    async fn ended_key_cannot_be_resurrected() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());
        let session = h.streams.create_live_session("u1", "show").await.unwrap();

        h.streams.advance_on_publish_start(&session.stream_key).await.unwrap();
        let dup = h.streams.advance_on_publish_start(&session.stream_key).await.unwrap();
        assert!(!dup.applied());
        h.streams.advance_on_publish_done(&session.stream_key).await.unwrap();

        let err = h.streams.advance_on_publish_start(&session.stream_key).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict { signal: "publish-start", .. }));
        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert_eq!(item.live_status, LiveStatus::Ended);

        let next = h.streams.create_live_session("u1", "show").await.unwrap();
        assert_ne!(next.stream_key, session.stream_key);
        assert_ne!(next.content_id, session.content_id);
    }

    #[tokio::test]
    async fn racing_start_and_done_keep_invariants() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());

        for _ in 0..20 {
            let session = h.streams.create_live_session("u1", "race").await.unwrap();
            let (a, b) = (h.streams.clone(), h.streams.clone());
            let (k1, k2) = (session.stream_key.clone(), session.stream_key.clone());
            let start = tokio::spawn(async move { a.advance_on_publish_start(&k1).await });
            let done = tokio::spawn(async move { b.advance_on_publish_done(&k2).await });
            start.await.unwrap().unwrap();
            done.await.unwrap().unwrap();

            let item = h.store.get(session.content_id).await.unwrap().unwrap();
            match item.live_status {
                LiveStatus::Live => assert!(item.live_ended_at.is_none()),
                LiveStatus::Ended => {
                    assert!(item.live_ended_at.unwrap() >= item.live_started_at.unwrap())
                }
                LiveStatus::NotStarted => panic!("start signal was lost"),
            }
        }
    }

    #[tokio::test]
    async fn probe_requires_a_known_key() {
        let server = serving_media().await;
        let h = harness(&server.uri(), fast_probe());
        assert!(matches!(
            h.streams.probe_stream("nope", None, None).await,
            Err(LifecycleError::UnknownStreamKey)
        ));

        let session = h.streams.create_live_session("u1", "show").await.unwrap();
        let report = h
            .streams
            .probe_stream(&session.stream_key, Some(Duration::from_secs(600)), None)
            .await
            .unwrap();
        assert!(report.ready);
        assert_eq!(report.attempts, 1);
    }
}
