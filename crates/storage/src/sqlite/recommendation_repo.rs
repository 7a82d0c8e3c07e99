use assess_core::model::Recommendation;
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{conn, ser},
};
use crate::repository::{RecommendationRepository, StorageError};

#[async_trait::async_trait]
impl RecommendationRepository for SqliteRepository {
    async fn upsert_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO recommendations (topic, youtube_url, resource_url)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(topic) DO UPDATE SET
                    topic = excluded.topic,
                    youtube_url = excluded.youtube_url,
                    resource_url = excluded.resource_url
            ",
        )
        .bind(recommendation.topic())
        .bind(recommendation.video_url())
        .bind(recommendation.resource_url())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn recommendation_for(
        &self,
        topic: &str,
    ) -> Result<Option<Recommendation>, StorageError> {
        // An entry stored under the canonical name wins over one under an alias.
        let row = sqlx::query(
            r"
                SELECT youtube_url, resource_url
                FROM recommendations
                WHERE lower(topic) = lower(?1)
                   OR lower(topic) IN (SELECT alias FROM topic_aliases WHERE canonical = ?1)
                ORDER BY lower(topic) = lower(?1) DESC
                LIMIT 1
            ",
        )
        .bind(topic)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            tracing::trace!(topic, "no recommendation stored");
            return Ok(None);
        };
        Ok(Some(Recommendation::new(
            topic,
            row.try_get::<Option<String>, _>("youtube_url").map_err(ser)?,
            row.try_get::<Option<String>, _>("resource_url").map_err(ser)?,
        )))
    }
}
