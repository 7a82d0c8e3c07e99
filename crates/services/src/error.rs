//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::SessionStateError;
use assess_core::model::{AnswerError, Difficulty, FollowUpKind, RecordError, SessionKind};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the assessment and follow-up services.
///
/// Everything except `Storage` is an expected condition the caller can turn
/// into a message; nothing is persisted when one is returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("no active session")]
    SessionNotFound,

    #[error("expected an active {expected} session, found {found}")]
    SessionTypeMismatch {
        expected: SessionKind,
        found: SessionKind,
    },

    #[error("no questions available for {topic}{}", at_level(.difficulty))]
    NoQuestionsAvailable {
        topic: String,
        difficulty: Option<Difficulty>,
    },

    #[error(transparent)]
    InvalidAnswerFormat(#[from] AnswerError),

    #[error("a session is already in progress")]
    AlreadyActiveSession,

    #[error("no topics selected")]
    NoTopicsSelected,

    #[error("{topic} is not in the pool for a {kind} follow-up")]
    TopicNotEligible { topic: String, kind: FollowUpKind },

    #[error(transparent)]
    Session(#[from] SessionStateError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn at_level(difficulty: &Option<Difficulty>) -> String {
    difficulty.map(|d| format!(" at {d}")).unwrap_or_default()
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_missing_level() {
        let err = AssessmentError::NoQuestionsAvailable {
            topic: "Graphs".to_string(),
            difficulty: Some(Difficulty::Hard),
        };
        assert_eq!(err.to_string(), "no questions available for Graphs at Hard");

        let err = AssessmentError::SessionTypeMismatch {
            expected: SessionKind::FollowUp,
            found: SessionKind::Assessment,
        };
        assert_eq!(
            err.to_string(),
            "expected an active follow_up session, found assessment"
        );
    }
}
