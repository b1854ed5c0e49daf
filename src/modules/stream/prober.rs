use crate::config::settings::ProbeSettings;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use utoipa::ToSchema;

/// Outcome of a bounded readiness run. `ready == false` is a timeout, not an
/// error; callers decide what to do without a confirmed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProbeReport {
    pub ready: bool,
    pub attempts: u32,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    #[schema(value_type = u64)]
    pub elapsed: Duration,
    /// Segments seen by the last successful fetch.
    pub segments: usize,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// One GET inside a run. Lives only for the duration of the loop iteration.
#[derive(Debug)]
struct ProbeAttempt {
    number: u32,
    elapsed: Duration,
    status: Option<StatusCode>,
    segments: usize,
}

#[derive(Clone)]
pub struct ReadinessProber {
    http: Client,
    settings: ProbeSettings,
}

impl ReadinessProber {
    pub fn new(http: Client, settings: ProbeSettings) -> Self {
        Self { http, settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Polls `manifest_url` with capped exponential backoff until it lists at
    /// least `min_segments` media segments or `max_wait` runs out. With
    /// `min_segments == 0` any 200 answer counts as ready.
    pub async fn probe(
        &self,
        manifest_url: &str,
        max_wait: Duration,
        min_segments: usize,
    ) -> ProbeReport {
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut wait = self.settings.initial_backoff;
        let mut attempts = 0u32;
        let mut segments = 0usize;

        while Instant::now() < deadline {
            attempts += 1;
            let attempt = self.attempt(manifest_url, attempts, started, deadline).await;
            debug!(
                url = manifest_url,
                attempt = attempt.number,
                elapsed_ms = attempt.elapsed.as_millis() as u64,
                status = ?attempt.status,
                segments = attempt.segments,
                "Readiness probe attempt"
            );

            if attempt.status == Some(StatusCode::OK) {
                segments = attempt.segments;
                if segments >= min_segments {
                    let elapsed = started.elapsed();
                    info!(url = manifest_url, attempts, ?elapsed, segments, "Manifest is ready");
                    return ProbeReport { ready: true, attempts, elapsed, segments };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(wait.min(deadline - now)).await;
            wait = next_backoff(wait, self.settings.max_backoff);
        }

        let elapsed = started.elapsed();
        info!(url = manifest_url, attempts, ?elapsed, "Manifest not ready before deadline");
        ProbeReport { ready: false, attempts, elapsed, segments }
    }

    async fn attempt(
        &self,
        manifest_url: &str,
        number: u32,
        started: Instant,
        deadline: Instant,
    ) -> ProbeAttempt {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout = self.settings.request_timeout.min(remaining).max(Duration::from_millis(1));

        let (status, segments) = match self.http.get(manifest_url).timeout(timeout).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => match resp.text().await {
                Ok(body) => (Some(StatusCode::OK), count_segments(&body)),
                Err(_) => (None, 0),
            },
            Ok(resp) => (Some(resp.status()), 0),
            Err(_) => (None, 0),
        };

        ProbeAttempt {
            number,
            elapsed: started.elapsed(),
            status,
            segments,
        }
    }
}

pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 3 / 2).min(max)
}

/// Media segment URIs in an HLS playlist: every non-tag line that does not
/// point at another playlist.
pub fn count_segments(playlist: &str) -> usize {
    playlist
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let path = line.split(['?', '#']).next().unwrap_or(line);
            !path.ends_with(".m3u8")
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const THREE_SEGMENTS: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n\
        #EXTINF:2.000,\nseg0.ts\n#EXTINF:2.000,\nseg1.ts\n#EXTINF:2.000,\nseg2.ts\n";
    const ONE_SEGMENT: &str = "#EXTM3U\n#EXTINF:2.000,\nseg0.ts\n";

    fn prober() -> ReadinessProber {
        ReadinessProber::new(Client::new(), ProbeSettings::default())
    }

    #[test]
    fn backoff_grows_by_half_and_caps() {
        let max = Duration::from_secs(2);
        let mut wait = Duration::from_millis(300);
        let mut schedule = Vec::new();
        for _ in 0..6 {
            schedule.push(wait.as_millis());
            wait = next_backoff(wait, max);
        }
        assert_eq!(schedule, vec![300, 450, 675, 1012, 1518, 2000]);
    }

    #[test]
    fn counts_media_segments_only() {
        assert_eq!(count_segments(THREE_SEGMENTS), 3);
        assert_eq!(count_segments("#EXTM3U\n#EXT-X-ENDLIST\n"), 0);
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8?token=1\n";
        assert_eq!(count_segments(master), 0);
        assert_eq!(count_segments("#EXTM3U\r\n#EXTINF:4,\r\nchunk-1.m4s\r\n"), 1);
    }

    #[tokio::test]
    async fn ready_on_first_attempt_returns_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hls/k/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THREE_SEGMENTS))
            .mount(&server)
            .await;

        let report = prober()
            .probe(&format!("{}/hls/k/index.m3u8", server.uri()), Duration::from_secs(30), 2)
            .await;
        assert!(report.ready);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.segments, 3);
        assert!(report.elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn zero_min_segments_accepts_an_empty_playlist() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let report = prober()
            .probe(&format!("{}/hls/k/index.m3u8", server.uri()), Duration::from_secs(2), 0)
            .await;
        assert!(report.ready);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.segments, 0);
    }

    #[tokio::test]
    async fn missing_manifest_times_out_within_one_request_of_max_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let max_wait = Duration::from_secs(2);
        let report = prober()
            .probe(&format!("{}/hls/none/index.m3u8", server.uri()), max_wait, 2)
            .await;
        assert!(!report.ready);
        assert!(report.elapsed >= max_wait);
        assert!(report.elapsed < max_wait + ProbeSettings::default().request_timeout);
        assert!(report.attempts >= 3);
    }

    #[tokio::test]
    async fn keeps_polling_until_enough_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_SEGMENT))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THREE_SEGMENTS))
            .mount(&server)
            .await;

        let report = prober()
            .probe(&format!("{}/hls/k/index.m3u8", server.uri()), Duration::from_secs(30), 2)
            .await;
        assert!(report.ready);
        assert_eq!(report.attempts, 4);
    }

    /// 404 until `after` has passed since the server was built, then a full playlist.
    struct SegmentsAfter {
        since: StdInstant,
        after: Duration,
    }

    impl Respond for SegmentsAfter {
        fn respond(&self, _: &Request) -> ResponseTemplate {
            if self.since.elapsed() < self.after {
                ResponseTemplate::new(404)
            } else {
                ResponseTemplate::new(200).set_body_string(THREE_SEGMENTS)
            }
        }
    }

    #[tokio::test]
    async fn stream_that_segments_after_a_delay_is_detected_in_a_few_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(SegmentsAfter {
                since: StdInstant::now(),
                after: Duration::from_millis(1200),
            })
            .mount(&server)
            .await;

        let report = prober()
            .probe(&format!("{}/hls/k/index.m3u8", server.uri()), Duration::from_secs(30), 2)
            .await;
        assert!(report.ready);
        assert!((3..=5).contains(&report.attempts), "attempts = {}", report.attempts);
    }
}
