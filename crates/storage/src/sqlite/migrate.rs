use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            topic TEXT NOT NULL,
            difficulty TEXT NOT NULL CHECK (difficulty IN ('Easy', 'Medium', 'Hard')),
            prompt TEXT NOT NULL,
            choices_json TEXT NOT NULL,
            correct_choice TEXT NOT NULL,
            explanation TEXT NOT NULL DEFAULT '',
            content_hash TEXT NOT NULL,
            UNIQUE (topic, content_hash)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS topic_aliases (
            alias TEXT PRIMARY KEY,
            canonical TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS active_sessions (
            user_id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('assessment', 'follow_up')),
            session_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS weak_topics (
            user_id INTEGER NOT NULL,
            topic TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, topic)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS needs_training_topics (
            user_id INTEGER NOT NULL,
            topic TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, topic)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            topics_json TEXT NOT NULL,
            correct INTEGER NOT NULL CHECK (correct >= 0),
            total INTEGER NOT NULL CHECK (total >= correct),
            passed_json TEXT NOT NULL,
            weak_json TEXT NOT NULL,
            needs_training_json TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_topic_difficulty
            ON questions (topic, difficulty);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_test_results_user_completed
            ON test_results (user_id, completed_at);
    ",
];

const SCHEMA_V2: &[&str] = &[r"
        CREATE TABLE IF NOT EXISTS recommendations (
            topic TEXT PRIMARY KEY COLLATE NOCASE,
            youtube_url TEXT,
            resource_url TEXT
        );
    "];

/// Version, description and statements, applied in order.
const MIGRATIONS: &[(i64, &str, &[&str])] = &[
    (1, "question bank, active sessions, topic pools and history", SCHEMA_V1),
    (2, "study recommendations", SCHEMA_V2),
];

/// Applies versioned schema migrations, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for (version, description, statements) in MIGRATIONS {
        if is_applied(pool, *version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;

        for statement in *statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(*version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = *version, description = *description, "applied sqlite migration");
    }

    Ok(())
}
