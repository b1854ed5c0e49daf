use crate::config::env::{self, EnvKey};
use std::time::Duration;
use tracing::warn;

/// Bounds for one readiness probing run.
#[derive(Clone, Debug)]
pub struct ProbeSettings {
    pub max_wait: Duration,
    pub min_segments: usize,
    pub request_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            min_segments: 2,
            request_timeout: Duration::from_secs(3),
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrphanSettings {
    pub interval: Duration,
    pub staleness: Duration,
    pub probe_timeout: Duration,
    pub cleanup_timeout: Duration,
}

impl Default for OrphanSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12),
            staleness: Duration::from_secs(45),
            probe_timeout: Duration::from_secs(3),
            cleanup_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PresenceSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

/// Where the media server lives and how its URLs are shaped.
#[derive(Clone, Debug)]
pub struct MediaServerSettings {
    pub http_url: String,
    pub rtmp_url: String,
    pub control_url: String,
    pub cdn_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub rabbitmq_url: Option<String>,
    pub transcode_results_queue: String,
    pub notification_channel: String,
    pub sweep_iteration_timeout: Duration,
    pub media: MediaServerSettings,
    pub presence: PresenceSettings,
    pub probe: ProbeSettings,
    pub orphan: OrphanSettings,
}

fn secs(key: EnvKey, default: Duration) -> Duration {
    Duration::from_secs(env::get_parsed(key, default.as_secs()))
}

/// Zero would stop the ticker or expire everything at once; such values fall
/// back to the default.
fn nonzero_secs(key: EnvKey, default: Duration) -> Duration {
    let name = key.as_str();
    nonzero_or(secs(key, default), default, name)
}

fn nonzero_or(value: Duration, default: Duration, name: &str) -> Duration {
    if value.is_zero() {
        warn!("{} must be at least one second, using {:?}", name, default);
        default
    } else {
        value
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let presence_defaults = PresenceSettings::default();
        let probe_defaults = ProbeSettings::default();
        let orphan_defaults = OrphanSettings::default();

        let http_url = trim_base(env::get(EnvKey::MediaServerHttpUrl)?);
        let control_url = env::get_opt(EnvKey::MediaServerControlUrl)
            .map(trim_base)
            .unwrap_or_else(|| format!("{}/api", http_url));

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            rabbitmq_url: env::get_opt(EnvKey::RabbitMqUrl),
            transcode_results_queue: env::get_or(
                EnvKey::TranscodeResultsQueue,
                "transcoding_results",
            ),
            notification_channel: env::get_or(EnvKey::NotificationChannel, "notifications"),
            sweep_iteration_timeout: nonzero_secs(
                EnvKey::SweepIterationTimeoutSecs,
                Duration::from_secs(30),
            ),
            media: MediaServerSettings {
                http_url,
                rtmp_url: trim_base(env::get(EnvKey::MediaServerRtmpUrl)?),
                control_url,
                cdn_url: trim_base(env::get(EnvKey::CdnUrl)?),
            },
            presence: PresenceSettings {
                ttl: nonzero_secs(EnvKey::PresenceTtlSecs, presence_defaults.ttl),
                sweep_interval: nonzero_secs(
                    EnvKey::PresenceSweepIntervalSecs,
                    presence_defaults.sweep_interval,
                ),
            },
            probe: ProbeSettings {
                max_wait: secs(EnvKey::ProbeMaxWaitSecs, probe_defaults.max_wait),
                min_segments: env::get_parsed(
                    EnvKey::ProbeMinSegments,
                    probe_defaults.min_segments,
                ),
                request_timeout: secs(
                    EnvKey::ProbeRequestTimeoutSecs,
                    probe_defaults.request_timeout,
                ),
                ..probe_defaults
            },
            orphan: OrphanSettings {
                interval: nonzero_secs(EnvKey::OrphanSweepIntervalSecs, orphan_defaults.interval),
                staleness: secs(EnvKey::OrphanStalenessSecs, orphan_defaults.staleness),
                ..orphan_defaults
            },
        })
    }
}
