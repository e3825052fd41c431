use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Room, RoomId},
    Result,
};

/// Room repository for database operations
#[derive(Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new room. A unique-violation on `code` surfaces as
    /// `Error::AlreadyExists` via the shared sqlx mapping.
    pub async fn create(&self, room: &Room) -> Result<Room> {
        let row = sqlx::query(
            r"
            INSERT INTO rooms (id, code, current_video_id, is_playing, current_seconds,
                               created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, code, current_video_id, is_playing, current_seconds,
                       created_at, updated_at
            ",
        )
        .bind(room.id.as_str())
        .bind(&room.code)
        .bind(room.current_video_id.as_deref())
        .bind(room.is_playing)
        .bind(room.current_time)
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_room(&row)
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Room>> {
        let row = sqlx::query(
            r"
            SELECT id, code, current_video_id, is_playing, current_seconds,
                   created_at, updated_at
             FROM rooms
             WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_room(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist the playback triple. Called eagerly on user-visible
    /// transitions and on a throttle for position reports.
    pub async fn update_playback(
        &self,
        room_id: &RoomId,
        current_video_id: Option<&str>,
        is_playing: bool,
        current_time: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE rooms
            SET current_video_id = $2, is_playing = $3, current_seconds = $4,
                updated_at = NOW()
             WHERE id = $1
            ",
        )
        .bind(room_id.as_str())
        .bind(current_video_id)
        .bind(is_playing)
        .bind(current_time)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::NotFound("Room not found".to_string()));
        }
        Ok(())
    }
}

fn row_to_room(row: &PgRow) -> Result<Room> {
    Ok(Room {
        id: RoomId::from_string(row.try_get("id")?),
        code: row.try_get("code")?,
        current_video_id: row.try_get("current_video_id")?,
        is_playing: row.try_get("is_playing")?,
        current_time: row.try_get("current_seconds")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
