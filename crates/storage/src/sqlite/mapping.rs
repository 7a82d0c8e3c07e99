use assess_core::model::{
    AssessmentSummary, ChoiceLetter, Difficulty, Question, TestKind, TestRecord, TopicPool, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::collections::BTreeMap;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_i64(user: UserId) -> Result<i64, StorageError> {
    id_i64("user_id", user.value())
}

fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Table holding the given topic pool.
pub(crate) fn pool_table(pool: TopicPool) -> &'static str {
    match pool {
        TopicPool::Weak => "weak_topics",
        TopicPool::NeedsTraining => "needs_training_topics",
    }
}

/// Alias keys are stored lowercased so lookups ignore case.
pub(crate) fn alias_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn choices_to_json(question: &Question) -> Result<String, StorageError> {
    serde_json::to_string(question.choices()).map_err(ser)
}

pub(crate) fn strings_to_json(values: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(values).map_err(ser)
}

fn strings_from_json(row: &SqliteRow, column: &str) -> Result<Vec<String>, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let choices_json: String = row.try_get("choices_json").map_err(ser)?;
    let choices: BTreeMap<ChoiceLetter, String> =
        serde_json::from_str(&choices_json).map_err(ser)?;
    let correct = ChoiceLetter::parse(&row.try_get::<String, _>("correct_choice").map_err(ser)?)
        .map_err(ser)?;

    Question::new(
        row.try_get::<String, _>("topic").map_err(ser)?,
        difficulty,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        choices,
        correct,
        row.try_get::<String, _>("explanation").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<TestRecord, StorageError> {
    let kind: TestKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let outcome = AssessmentSummary {
        passed: strings_from_json(row, "passed_json")?,
        weak: strings_from_json(row, "weak_json")?,
        needs_training: strings_from_json(row, "needs_training_json")?,
    };

    TestRecord::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        kind,
        strings_from_json(row, "topics_json")?,
        u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
        u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        outcome,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}
