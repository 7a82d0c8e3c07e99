use assess_core::model::{TestRecord, TopicPool};

use super::{
    SqliteRepository,
    mapping::{conn, user_i64},
    pool_repo::{add_topic, remove_topic},
    result_repo::insert_result,
};
use crate::repository::{CompletionPersistence, StorageError};

#[async_trait::async_trait]
impl CompletionPersistence for SqliteRepository {
    async fn complete_assessment(&self, record: &TestRecord) -> Result<i64, StorageError> {
        let user = user_i64(record.user_id())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let id = insert_result(&mut *tx, record).await?;
        for topic in &record.outcome().weak {
            add_topic(&mut *tx, user, TopicPool::Weak, topic).await?;
        }
        for topic in &record.outcome().needs_training {
            add_topic(&mut *tx, user, TopicPool::NeedsTraining, topic).await?;
        }
        sqlx::query("DELETE FROM active_sessions WHERE user_id = ?1")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(id)
    }

    async fn complete_follow_up(
        &self,
        record: &TestRecord,
        pool: TopicPool,
        topic: &str,
        improved: bool,
    ) -> Result<i64, StorageError> {
        let user = user_i64(record.user_id())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let id = insert_result(&mut *tx, record).await?;
        if improved {
            remove_topic(&mut *tx, user, pool, topic).await?;
        } else {
            add_topic(&mut *tx, user, pool, topic).await?;
        }
        sqlx::query("DELETE FROM active_sessions WHERE user_id = ?1")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(id)
    }
}
