use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{RoomId, UserId, Video, VideoId},
    Result,
};

/// Playlist entry repository for database operations
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, video: &Video) -> Result<Video> {
        let row = sqlx::query(
            r"
            INSERT INTO videos (id, room_id, external_id, title, thumbnail_url,
                                added_by, is_played, sort_order, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id, room_id, external_id, title, thumbnail_url,
                       added_by, is_played, sort_order, created_at
            ",
        )
        .bind(video.id.as_str())
        .bind(video.room_id.as_str())
        .bind(&video.external_id)
        .bind(&video.title)
        .bind(&video.thumbnail_url)
        .bind(video.added_by.as_str())
        .bind(video.is_played)
        .bind(video.order)
        .bind(video.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_video(&row)
    }

    pub async fn delete(&self, video_id: &VideoId) -> Result<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(video_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::NotFound("Video not found".to_string()));
        }
        Ok(())
    }

    /// Mark an entry as advanced past. Advisory only.
    pub async fn set_played(&self, video_id: &VideoId, played: bool) -> Result<()> {
        sqlx::query("UPDATE videos SET is_played = $2 WHERE id = $1")
            .bind(video_id.as_str())
            .bind(played)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Playlist for a room in its total order.
    pub async fn list_by_room(&self, room_id: &RoomId) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r"
            SELECT id, room_id, external_id, title, thumbnail_url,
                   added_by, is_played, sort_order, created_at
             FROM videos
             WHERE room_id = $1
             ORDER BY sort_order ASC, created_at ASC, id ASC
            ",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_video).collect()
    }
}

fn row_to_video(row: &PgRow) -> Result<Video> {
    Ok(Video {
        id: VideoId::from_string(row.try_get("id")?),
        room_id: RoomId::from_string(row.try_get("room_id")?),
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        added_by: UserId::from_string(row.try_get("added_by")?),
        is_played: row.try_get("is_played")?,
        order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
    })
}
