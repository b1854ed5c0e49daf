use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    RabbitMqUrl,
    TranscodeResultsQueue,
    MediaServerHttpUrl,
    MediaServerRtmpUrl,
    MediaServerControlUrl,
    CdnUrl,
    NotificationChannel,
    PresenceTtlSecs,
    PresenceSweepIntervalSecs,
    ProbeMaxWaitSecs,
    ProbeMinSegments,
    ProbeRequestTimeoutSecs,
    OrphanSweepIntervalSecs,
    OrphanStalenessSecs,
    SweepIterationTimeoutSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::TranscodeResultsQueue => "TRANSCODE_RESULTS_QUEUE",
            EnvKey::MediaServerHttpUrl => "MEDIA_SERVER_HTTP_URL",
            EnvKey::MediaServerRtmpUrl => "MEDIA_SERVER_RTMP_URL",
            EnvKey::MediaServerControlUrl => "MEDIA_SERVER_CONTROL_URL",
            EnvKey::CdnUrl => "CDN_URL",
            EnvKey::NotificationChannel => "NOTIFICATION_CHANNEL",
            EnvKey::PresenceTtlSecs => "PRESENCE_TTL_SECS",
            EnvKey::PresenceSweepIntervalSecs => "PRESENCE_SWEEP_INTERVAL_SECS",
            EnvKey::ProbeMaxWaitSecs => "PROBE_MAX_WAIT_SECS",
            EnvKey::ProbeMinSegments => "PROBE_MIN_SEGMENTS",
            EnvKey::ProbeRequestTimeoutSecs => "PROBE_REQUEST_TIMEOUT_SECS",
            EnvKey::OrphanSweepIntervalSecs => "ORPHAN_SWEEP_INTERVAL_SECS",
            EnvKey::OrphanStalenessSecs => "ORPHAN_STALENESS_SECS",
            EnvKey::SweepIterationTimeoutSecs => "SWEEP_ITERATION_TIMEOUT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
        .inspect_err(|_| tracing::error!("Environment variable {} is not set", key.as_str()))
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

/// Optional keys fall back to `default` quietly; only a value that is set but
/// unparseable is worth a warning.
pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    let name = key.as_str();
    match env::var(name) {
        Ok(val) => val.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} is unusable, using the default", name);
            default
        }),
        Err(_) => default,
    }
}
