use assess_core::model::{ActiveSession, UserId};
use chrono::Utc;
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{conn, ser, user_i64},
};
use crate::repository::{SessionStore, StorageError};

#[async_trait::async_trait]
impl SessionStore for SqliteRepository {
    async fn load(&self, user: UserId) -> Result<Option<ActiveSession>, StorageError> {
        let row = sqlx::query("SELECT payload FROM active_sessions WHERE user_id = ?1")
            .bind(user_i64(user)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        serde_json::from_str(&payload).map(Some).map_err(ser)
    }

    async fn save(&self, user: UserId, session: &ActiveSession) -> Result<(), StorageError> {
        if session.user_id() != user {
            return Err(StorageError::Conflict);
        }
        let payload = serde_json::to_string(session).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO active_sessions (user_id, kind, session_id, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    kind = excluded.kind,
                    session_id = excluded.session_id,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user_i64(user)?)
        .bind(session.kind().as_str())
        .bind(session.id().to_string())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear(&self, user: UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM active_sessions WHERE user_id = ?1")
            .bind(user_i64(user)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
