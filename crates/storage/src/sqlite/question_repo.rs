use assess_core::model::{Difficulty, Question};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{alias_key, choices_to_json, conn, map_question_row, ser},
};
use crate::repository::{QuestionBank, QuestionCatalog, StorageError};

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn resolve_topic_alias(&self, name: &str) -> Result<String, StorageError> {
        let trimmed = name.trim();

        let aliased = sqlx::query("SELECT canonical FROM topic_aliases WHERE alias = ?1")
            .bind(alias_key(trimmed))
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if let Some(row) = aliased {
            return row.try_get::<String, _>("canonical").map_err(ser);
        }

        let known = sqlx::query(
            r"
                SELECT topic FROM questions
                WHERE lower(topic) = lower(?1)
                ORDER BY id
                LIMIT 1
            ",
        )
        .bind(trimmed)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match known {
            Some(row) => row.try_get::<String, _>("topic").map_err(ser),
            None => Ok(trimmed.to_owned()),
        }
    }

    async fn candidates(
        &self,
        topic: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, topic, difficulty, prompt, choices_json, correct_choice, explanation
                FROM questions
                WHERE (
                    lower(topic) = lower(?1)
                    OR lower(topic) IN (SELECT alias FROM topic_aliases WHERE canonical = ?1)
                )
                AND (?2 IS NULL OR difficulty = ?2)
                ORDER BY id ASC
            ",
        )
        .bind(topic)
        .bind(difficulty.map(Difficulty::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?.with_topic(topic));
        }
        tracing::debug!(topic, ?difficulty, found = out.len(), "loaded question candidates");
        Ok(out)
    }

    async fn list_topics(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT COALESCE(a.canonical, q.topic) AS topic
                FROM questions q
                LEFT JOIN topic_aliases a ON a.alias = lower(q.topic)
                ORDER BY topic ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("topic").map_err(ser))
            .collect()
    }
}

#[async_trait::async_trait]
impl QuestionCatalog for SqliteRepository {
    async fn insert_question(&self, question: &Question) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO questions (
                    topic, difficulty, prompt, choices_json, correct_choice,
                    explanation, content_hash
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(topic, content_hash) DO NOTHING
            ",
        )
        .bind(question.topic())
        .bind(question.difficulty().as_str())
        .bind(question.prompt())
        .bind(choices_to_json(question)?)
        .bind(question.correct_choice().to_string())
        .bind(question.explanation())
        .bind(question.content_hash().as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() > 0)
    }

    async fn upsert_alias(&self, alias: &str, canonical: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO topic_aliases (alias, canonical)
                VALUES (?1, ?2)
                ON CONFLICT(alias) DO UPDATE SET canonical = excluded.canonical
            ",
        )
        .bind(alias_key(alias))
        .bind(canonical.trim())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
