use assess_core::model::{TopicPool, UserId};
use chrono::Utc;
use sqlx::{Row, Sqlite};

use super::{
    SqliteRepository,
    mapping::{conn, pool_table, ser, user_i64},
};
use crate::repository::{StorageError, TopicPoolRepository};

fn insert_sql(pool: TopicPool) -> &'static str {
    match pool {
        TopicPool::Weak => {
            "INSERT OR IGNORE INTO weak_topics (user_id, topic, created_at) VALUES (?1, ?2, ?3)"
        }
        TopicPool::NeedsTraining => {
            "INSERT OR IGNORE INTO needs_training_topics (user_id, topic, created_at) VALUES (?1, ?2, ?3)"
        }
    }
}

fn delete_sql(pool: TopicPool) -> &'static str {
    match pool {
        TopicPool::Weak => "DELETE FROM weak_topics WHERE user_id = ?1 AND topic = ?2",
        TopicPool::NeedsTraining => {
            "DELETE FROM needs_training_topics WHERE user_id = ?1 AND topic = ?2"
        }
    }
}

fn select_sql(pool: TopicPool) -> &'static str {
    match pool {
        TopicPool::Weak => {
            "SELECT topic FROM weak_topics WHERE user_id = ?1 ORDER BY rowid"
        }
        TopicPool::NeedsTraining => {
            "SELECT topic FROM needs_training_topics WHERE user_id = ?1 ORDER BY rowid"
        }
    }
}

/// Adds a topic to a pool through any executor, so completion writes can share a transaction.
pub(super) async fn add_topic<'c, E>(
    executor: E,
    user: i64,
    pool: TopicPool,
    topic: &str,
) -> Result<(), StorageError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query(insert_sql(pool))
        .bind(user)
        .bind(topic)
        .bind(Utc::now())
        .execute(executor)
        .await
        .map_err(conn)?;
    Ok(())
}

pub(super) async fn remove_topic<'c, E>(
    executor: E,
    user: i64,
    pool: TopicPool,
    topic: &str,
) -> Result<bool, StorageError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let res = sqlx::query(delete_sql(pool))
        .bind(user)
        .bind(topic)
        .execute(executor)
        .await
        .map_err(conn)?;
    Ok(res.rows_affected() > 0)
}

#[async_trait::async_trait]
impl TopicPoolRepository for SqliteRepository {
    async fn pool_topics(
        &self,
        user: UserId,
        pool: TopicPool,
    ) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(select_sql(pool))
            .bind(user_i64(user)?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        tracing::trace!(table = pool_table(pool), rows = rows.len(), "read topic pool");

        rows.iter()
            .map(|row| row.try_get::<String, _>("topic").map_err(ser))
            .collect()
    }

    async fn add_to_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<(), StorageError> {
        add_topic(&self.pool, user_i64(user)?, pool, topic).await
    }

    async fn remove_from_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<bool, StorageError> {
        remove_topic(&self.pool, user_i64(user)?, pool, topic).await
    }
}
