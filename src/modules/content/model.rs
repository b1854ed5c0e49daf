use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Video,
    LiveStream,
    Picture,
    Text,
}

string_enum!(ContentKind {
    Video => "video",
    LiveStream => "live-stream",
    Picture => "picture",
    Text => "text",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TranscodingStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

string_enum!(TranscodingStatus {
    Pending => "pending",
    Processing => "processing",
    Done => "done",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LiveStatus {
    NotStarted,
    Live,
    Ended,
}

string_enum!(LiveStatus {
    NotStarted => "not-started",
    Live => "live",
    Ended => "ended",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContentItem {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: ContentKind,
    pub title: String,
    pub transcoding_status: TranscodingStatus,
    pub live_status: LiveStatus,
    pub stream_key: Option<String>,
    pub raw_location: Option<String>,
    pub playback_manifest_ref: Option<String>,
    pub recording_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
    pub viewer_count: i64,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[schema(value_type = Option<String>, format = DateTime)]
    #[serde(with = "time::serde::rfc3339::option")]
    pub live_started_at: Option<OffsetDateTime>,
    #[schema(value_type = Option<String>, format = DateTime)]
    #[serde(with = "time::serde::rfc3339::option")]
    pub live_ended_at: Option<OffsetDateTime>,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ContentItem {
    /// A freshly registered item. Kinds without a processing stage start `done`.
    pub fn new(kind: ContentKind, owner_id: &str, title: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        let transcoding_status = match kind {
            ContentKind::Video | ContentKind::LiveStream => TranscodingStatus::Pending,
            ContentKind::Picture | ContentKind::Text => TranscodingStatus::Done,
        };

        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            kind,
            title: title.to_string(),
            transcoding_status,
            live_status: LiveStatus::NotStarted,
            stream_key: None,
            raw_location: None,
            playback_manifest_ref: None,
            recording_ref: None,
            thumbnail_ref: None,
            viewer_count: 0,
            created_at: now,
            live_started_at: None,
            live_ended_at: None,
            updated_at: now,
        }
    }

    pub fn new_live_stream(owner_id: &str, title: &str, stream_key: &str) -> Self {
        let mut item = Self::new(ContentKind::LiveStream, owner_id, title);
        item.stream_key = Some(stream_key.to_string());
        item
    }
}

/// Postgres row shape; enums are stored as text.
#[derive(Debug, FromRow)]
pub struct ContentRow {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: String,
    pub title: String,
    pub transcoding_status: String,
    pub live_status: String,
    pub stream_key: Option<String>,
    pub raw_location: Option<String>,
    pub playback_manifest_ref: Option<String>,
    pub recording_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
    pub viewer_count: i64,
    pub created_at: OffsetDateTime,
    pub live_started_at: Option<OffsetDateTime>,
    pub live_ended_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = String;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            kind: row.kind.parse()?,
            title: row.title,
            transcoding_status: row.transcoding_status.parse()?,
            live_status: row.live_status.parse()?,
            stream_key: row.stream_key,
            raw_location: row.raw_location,
            playback_manifest_ref: row.playback_manifest_ref,
            recording_ref: row.recording_ref,
            thumbnail_ref: row.thumbnail_ref,
            viewer_count: row.viewer_count.max(0),
            created_at: row.created_at,
            live_started_at: row.live_started_at,
            live_ended_at: row.live_ended_at,
            updated_at: row.updated_at,
        })
    }
}

/// Outputs reported by the transcoding farm alongside its outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessingOutputs {
    pub playback_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
}

/// Final references written when a broadcast ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub playback_ref: String,
    pub thumbnail_ref: String,
}
