use super::model::{ContentItem, ContentRow, LiveStatus, Recording, TranscodingStatus};
use crate::common::error::StoreError;
use crate::infrastructure::db::pool::DbPool;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Optional fields written together with a transcoding transition. `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TranscodingPatch {
    pub raw_location: Option<String>,
    pub playback_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
}

/// The content collection. Status writes are compare-and-set on the current
/// status: they return `None` when the stored state no longer matches.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert(&self, item: &ContentItem) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError>;

    async fn find_by_stream_key(&self, stream_key: &str) -> Result<Option<ContentItem>, StoreError>;

    async fn list_live(&self) -> Result<Vec<ContentItem>, StoreError>;

    async fn update_transcoding(
        &self,
        id: Uuid,
        from: TranscodingStatus,
        to: TranscodingStatus,
        patch: &TranscodingPatch,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// `not-started -> live`, stamping the start time.
    async fn mark_live(
        &self,
        id: Uuid,
        started_at: OffsetDateTime,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// `live -> ended`. The end stamp never precedes the start stamp.
    async fn mark_ended(
        &self,
        id: Uuid,
        ended_at: OffsetDateTime,
        recording: &Recording,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Sets the manifest reference if none was observed yet.
    async fn record_playback_ref(&self, id: Uuid, manifest: &str) -> Result<bool, StoreError>;

    /// Only a `live` item takes a new count; the zero written by `mark_ended` is final.
    async fn set_viewer_count(&self, id: Uuid, count: i64) -> Result<bool, StoreError>;
}

const COLUMNS: &str = "id, owner_id, kind, title, transcoding_status, live_status, stream_key, \
    raw_location, playback_manifest_ref, recording_ref, thumbnail_ref, viewer_count, \
    created_at, live_started_at, live_ended_at, updated_at";

fn to_item(row: ContentRow) -> Result<ContentItem, StoreError> {
    let id = row.id;
    ContentItem::try_from(row).map_err(|reason| StoreError::Corrupt { id, reason })
}

fn to_opt_item(row: Option<ContentRow>) -> Result<Option<ContentItem>, StoreError> {
    row.map(to_item).transpose()
}

#[derive(Clone)]
pub struct PgContentStore {
    pool: DbPool,
}

impl PgContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn insert(&self, item: &ContentItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO content_items (
                id, owner_id, kind, title, transcoding_status, live_status, stream_key,
                raw_location, playback_manifest_ref, recording_ref, thumbnail_ref, viewer_count,
                created_at, live_started_at, live_ended_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item.id)
        .bind(&item.owner_id)
        .bind(item.kind.as_str())
        .bind(&item.title)
        .bind(item.transcoding_status.as_str())
        .bind(item.live_status.as_str())
        .bind(&item.stream_key)
        .bind(&item.raw_location)
        .bind(&item.playback_manifest_ref)
        .bind(&item.recording_ref)
        .bind(&item.thumbnail_ref)
        .bind(item.viewer_count)
        .bind(item.created_at)
        .bind(item.live_started_at)
        .bind(item.live_ended_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM content_items WHERE id = $1");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        to_opt_item(row)
    }

    async fn find_by_stream_key(
        &self,
        stream_key: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {COLUMNS} FROM content_items WHERE stream_key = $1 AND kind = 'live-stream'"
        ))
        .bind(stream_key)
        .fetch_optional(&self.pool)
        .await?;
        to_opt_item(row)
    }

    async fn list_live(&self) -> Result<Vec<ContentItem>, StoreError> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {COLUMNS} FROM content_items \
             WHERE kind = 'live-stream' AND live_status = $1 ORDER BY live_started_at"
        ))
        .bind(LiveStatus::Live.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_item).collect()
    }

    async fn update_transcoding(
        &self,
        id: Uuid,
        from: TranscodingStatus,
        to: TranscodingStatus,
        patch: &TranscodingPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            UPDATE content_items
            SET
                transcoding_status = $3,
                raw_location = COALESCE($4, raw_location),
                playback_manifest_ref = COALESCE($5, playback_manifest_ref),
                thumbnail_ref = COALESCE($6, thumbnail_ref),
                updated_at = NOW()
            WHERE id = $1 AND transcoding_status = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(&patch.raw_location)
        .bind(&patch.playback_ref)
        .bind(&patch.thumbnail_ref)
        .fetch_optional(&self.pool)
        .await?;
        to_opt_item(row)
    }

    async fn mark_live(
        &self,
        id: Uuid,
        started_at: OffsetDateTime,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            UPDATE content_items
            SET live_status = $2, live_started_at = $3, updated_at = NOW()
            WHERE id = $1
              AND live_status = $4
              AND stream_key IS NOT NULL AND stream_key <> ''
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(LiveStatus::Live.as_str())
        .bind(started_at)
        .bind(LiveStatus::NotStarted.as_str())
        .fetch_optional(&self.pool)
        .await?;
        to_opt_item(row)
    }

    async fn mark_ended(
        &self,
        id: Uuid,
        ended_at: OffsetDateTime,
        recording: &Recording,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            UPDATE content_items
            SET
                live_status = $2,
                live_ended_at = GREATEST($3, live_started_at),
                playback_manifest_ref = $4,
                recording_ref = $4,
                thumbnail_ref = $5,
                transcoding_status = $6,
                viewer_count = 0,
                updated_at = NOW()
            WHERE id = $1 AND live_status = $7 AND live_started_at IS NOT NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(LiveStatus::Ended.as_str())
        .bind(ended_at)
        .bind(&recording.playback_ref)
        .bind(&recording.thumbnail_ref)
        .bind(TranscodingStatus::Done.as_str())
        .bind(LiveStatus::Live.as_str())
        .fetch_optional(&self.pool)
        .await?;
        to_opt_item(row)
    }

    async fn record_playback_ref(&self, id: Uuid, manifest: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE content_items SET playback_manifest_ref = $2, updated_at = NOW() \
             WHERE id = $1 AND playback_manifest_ref IS NULL",
        )
        .bind(id)
        .bind(manifest)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_viewer_count(&self, id: Uuid, count: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE content_items SET viewer_count = $2 WHERE id = $1 AND live_status = 'live'",
        )
        .bind(id)
        .bind(count.max(0))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
