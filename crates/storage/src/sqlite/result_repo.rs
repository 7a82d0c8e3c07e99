use assess_core::model::{TestRecord, UserId};
use sqlx::Sqlite;

use super::{
    SqliteRepository,
    mapping::{conn, map_result_row, strings_to_json, user_i64},
};
use crate::repository::{ResultRepository, StorageError};

pub(super) async fn insert_result<'c, E>(
    executor: E,
    record: &TestRecord,
) -> Result<i64, StorageError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let outcome = record.outcome();
    let res = sqlx::query(
        r"
            INSERT INTO test_results (
                user_id, kind, topics_json, correct, total,
                passed_json, weak_json, needs_training_json, started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ",
    )
    .bind(user_i64(record.user_id())?)
    .bind(record.kind().as_str())
    .bind(strings_to_json(record.topics())?)
    .bind(i64::from(record.correct()))
    .bind(i64::from(record.total()))
    .bind(strings_to_json(&outcome.passed)?)
    .bind(strings_to_json(&outcome.weak)?)
    .bind(strings_to_json(&outcome.needs_training)?)
    .bind(record.started_at())
    .bind(record.completed_at())
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(res.last_insert_rowid())
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, record: &TestRecord) -> Result<i64, StorageError> {
        insert_result(&self.pool, record).await
    }

    async fn recent_results(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, kind, topics_json, correct, total,
                    passed_json, weak_json, needs_training_json, started_at, completed_at
                FROM test_results
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user_i64(user)?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }
}
