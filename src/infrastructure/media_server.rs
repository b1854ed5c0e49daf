use crate::config::settings::MediaServerSettings;
use crate::modules::content::model::Recording;
use anyhow::{anyhow, Result};
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;
use url::Url;

/// What a lightweight HEAD of a manifest revealed.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestState {
    /// Served with this modification time (now, when the header is absent).
    Present { last_modified: OffsetDateTime },
    /// The server answered, but not with the manifest.
    Missing(StatusCode),
    /// No answer within the timeout; says nothing about the stream.
    Unreachable,
}

/// Client for the RTMP/HLS media server: URL layout, manifest liveness
/// probes and the remote cleanup endpoint.
#[derive(Clone)]
pub struct MediaServer {
    settings: MediaServerSettings,
    http: Client,
}

impl MediaServer {
    pub fn new(settings: MediaServerSettings, http: Client) -> Result<Self> {
        for base in [&settings.http_url, &settings.control_url, &settings.cdn_url] {
            Url::parse(base).map_err(|e| anyhow!("Invalid media server URL '{}': {}", base, e))?;
        }
        Ok(Self { settings, http })
    }

    pub fn manifest_url(&self, stream_key: &str) -> String {
        format!("{}/hls/{}/index.m3u8", self.settings.http_url, stream_key)
    }

    pub fn ingest_url(&self, stream_key: &str) -> String {
        format!("{}/{}", self.settings.rtmp_url, stream_key)
    }

    pub fn cleanup_url(&self, stream_key: &str) -> String {
        format!("{}/cleanup/{}", self.settings.control_url, stream_key)
    }

    /// Where the CDN keeps the archived broadcast.
    pub fn recording(&self, owner_id: &str, stream_key: &str) -> Recording {
        let base = format!("{}/streams/{}/{}", self.settings.cdn_url, owner_id, stream_key);
        Recording {
            playback_ref: format!("{}/playlist.m3u8", base),
            thumbnail_ref: format!("{}/thumbnail.jpg", base),
        }
    }

    pub async fn manifest_state(&self, manifest_url: &str, timeout: Duration) -> ManifestState {
        let resp = match self.http.head(manifest_url).timeout(timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Manifest HEAD {} failed: {}", manifest_url, e);
                return ManifestState::Unreachable;
            }
        };

        if resp.status() != StatusCode::OK {
            return ManifestState::Missing(resp.status());
        }

        let last_modified = resp
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .unwrap_or_else(OffsetDateTime::now_utc);

        ManifestState::Present { last_modified }
    }

    pub async fn trigger_cleanup(&self, stream_key: &str, timeout: Duration) -> Result<()> {
        let url = self.cleanup_url(stream_key);
        let resp = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| anyhow!("Cleanup request to {} failed: {}", url, e))?;

        if !resp.status().is_success() {
            return Err(anyhow!("Cleanup request to {} returned {}", url, resp.status()));
        }
        Ok(())
    }
}

/// Parses an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(value.trim(), format)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
