use crate::config::settings::OrphanSettings;
use crate::infrastructure::media_server::ManifestState;
use crate::modules::content::events::EndReason;
use crate::modules::content::model::ContentItem;
use crate::modules::content::repository::ContentStore;
use crate::modules::stream::service::LiveStreamService;
use crate::workers::scheduler::{spawn_detached, Sweep};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Healthy,
    /// Missing, but not for long enough yet.
    Suspect,
    /// The probe said nothing either way.
    Unknown,
    Orphaned,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub orphaned: usize,
}

/// Cross-checks every `live` claim against the media server and ends the
/// broadcasts whose manifest stopped advancing.
pub struct OrphanMonitor {
    store: Arc<dyn ContentStore>,
    streams: LiveStreamService,
    settings: OrphanSettings,
    /// First sweep at which a live item's manifest was not served.
    absent_since: Mutex<HashMap<Uuid, OffsetDateTime>>,
}

fn older_than(age: time::Duration, limit: Duration) -> bool {
    age.whole_milliseconds() > limit.as_millis() as i128
}

impl OrphanMonitor {
    pub fn new(
        store: Arc<dyn ContentStore>,
        streams: LiveStreamService,
        settings: OrphanSettings,
    ) -> Self {
        Self {
            store,
            streams,
            settings,
            absent_since: Mutex::new(HashMap::new()),
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepSummary> {
        let live = self.store.list_live().await?;
        {
            let mut absent = self.absent_since.lock().unwrap_or_else(|e| e.into_inner());
            absent.retain(|id, _| live.iter().any(|item| item.id == *id));
        }

        let verdicts = join_all(live.iter().map(|item| self.check(item))).await;

        let mut summary = SweepSummary {
            checked: live.len(),
            orphaned: 0,
        };
        for (item, verdict) in live.iter().zip(verdicts) {
            if verdict == Verdict::Orphaned && self.end_orphan(item).await {
                summary.orphaned += 1;
            }
        }

        if summary.orphaned > 0 {
            info!(checked = summary.checked, orphaned = summary.orphaned, "Orphan sweep finished");
        } else {
            debug!(checked = summary.checked, "Orphan sweep finished");
        }
        Ok(summary)
    }

    async fn check(&self, item: &ContentItem) -> Verdict {
        let Some(stream_key) = item.stream_key.as_deref() else {
            return Verdict::Unknown;
        };
        let media = self.streams.media();
        let state = media
            .manifest_state(&media.manifest_url(stream_key), self.settings.probe_timeout)
            .await;
        let now = OffsetDateTime::now_utc();
        let mut absent = self.absent_since.lock().unwrap_or_else(|e| e.into_inner());

        match state {
            ManifestState::Present { last_modified } => {
                absent.remove(&item.id);
                if older_than(now - last_modified, self.settings.staleness) {
                    warn!(content_id = %item.id, %last_modified, "Manifest stopped advancing");
                    Verdict::Orphaned
                } else {
                    Verdict::Healthy
                }
            }
            ManifestState::Missing(status) => {
                let since = *absent.entry(item.id).or_insert(now);
                if older_than(now - since, self.settings.staleness) {
                    warn!(
                        content_id = %item.id,
                        %status,
                        "Manifest missing past the staleness threshold"
                    );
                    Verdict::Orphaned
                } else {
                    debug!(content_id = %item.id, %status, "Manifest missing");
                    Verdict::Suspect
                }
            }
            ManifestState::Unreachable => Verdict::Unknown,
        }
    }

    /// Returns `true` only when this sweep ended the broadcast. Cleanup is
    /// requested once per ended broadcast and never rolls the state back.
    async fn end_orphan(&self, item: &ContentItem) -> bool {
        let Some(stream_key) = item.stream_key.clone() else {
            return false;
        };
        self.absent_since
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&item.id);

        match self.streams.end_stream(&stream_key, EndReason::Orphaned).await {
            Ok(Some(transition)) if transition.applied() => {
                let media = self.streams.media().clone();
                let timeout = self.settings.cleanup_timeout;
                spawn_detached("media-cleanup", timeout + Duration::from_secs(1), async move {
                    media.trigger_cleanup(&stream_key, timeout).await
                });
                true
            }
            Ok(_) => {
                debug!(content_id = %item.id, "Stream already ended elsewhere");
                false
            }
            Err(e) => {
                error!(content_id = %item.id, "Failed to end orphaned stream: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Sweep for OrphanMonitor {
    fn name(&self) -> &'static str {
        "orphan-monitor"
    }

    async fn sweep(&self) -> Result<()> {
        self.sweep_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::content::model::LiveStatus;
    use crate::modules::stream::dto::LiveSession;
    use crate::modules::stream::service::testing::{fast_probe, harness, Harness};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(staleness: Duration) -> OrphanSettings {
        OrphanSettings {
            interval: Duration::from_secs(12),
            staleness,
            probe_timeout: Duration::from_millis(500),
            cleanup_timeout: Duration::from_secs(1),
        }
    }

    async fn live_session(h: &Harness) -> LiveSession {
        let session = h.streams.create_live_session("u1", "show").await.unwrap();
        h.store
            .mark_live(session.content_id, OffsetDateTime::now_utc())
            .await
            .unwrap()
            .unwrap();
        session
    }

    async fn expect_cleanup(server: &MockServer, stream_key: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/api/cleanup/{}", stream_key)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn stale_manifest_ends_stream_and_cleans_up_once() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), fast_probe());
        let session = live_session(&h).await;

        Mock::given(method("HEAD"))
            .and(path(format!("/hls/{}/index.m3u8", session.stream_key)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT"),
            )
            .mount(&server)
            .await;
        expect_cleanup(&server, &session.stream_key).await;

        let monitor = OrphanMonitor::new(
            h.store.clone(),
            h.streams.clone(),
            settings(Duration::from_secs(45)),
        );
        let first = monitor.sweep_once().await.unwrap();
        let second = monitor.sweep_once().await.unwrap();
        assert_eq!(first, SweepSummary { checked: 1, orphaned: 1 });
        assert_eq!(second, SweepSummary { checked: 0, orphaned: 0 });

        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert_eq!(item.live_status, LiveStatus::Ended);
        assert!(item.recording_ref.is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn fresh_manifest_keeps_stream_live() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), fast_probe());
        let session = live_session(&h).await;

        // No Last-Modified header counts as just written.
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let monitor = OrphanMonitor::new(
            h.store.clone(),
            h.streams.clone(),
            settings(Duration::from_secs(45)),
        );
        let summary = monitor.sweep_once().await.unwrap();
        assert_eq!(summary, SweepSummary { checked: 1, orphaned: 0 });
        let item = h.store.get(session.content_id).await.unwrap().unwrap();
        assert_eq!(item.live_status, LiveStatus::Live);
    }

    #[tokio::test]
    async fn missing_manifest_is_orphaned_only_after_threshold() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), fast_probe());
        let session = live_session(&h).await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        expect_cleanup(&server, &session.stream_key).await;

        let monitor = OrphanMonitor::new(
            h.store.clone(),
            h.streams.clone(),
            settings(Duration::from_millis(300)),
        );
        assert_eq!(monitor.sweep_once().await.unwrap().orphaned, 0);
        assert_eq!(
            h.store.get(session.content_id).await.unwrap().unwrap().live_status,
            LiveStatus::Live
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(monitor.sweep_once().await.unwrap().orphaned, 1);
        assert_eq!(
            h.store.get(session.content_id).await.unwrap().unwrap().live_status,
            LiveStatus::Ended
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn unreachable_media_server_changes_nothing() {
        // Nothing listens on the discard port.
        let h = harness("http://127.0.0.1:9", fast_probe());
        let session = live_session(&h).await;

        let monitor = OrphanMonitor::new(
            h.store.clone(),
            h.streams.clone(),
            settings(Duration::ZERO),
        );
        monitor.sweep_once().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let summary = monitor.sweep_once().await.unwrap();

        assert_eq!(summary, SweepSummary { checked: 1, orphaned: 0 });
        assert_eq!(
            h.store.get(session.content_id).await.unwrap().unwrap().live_status,
            LiveStatus::Live
        );
    }
}
