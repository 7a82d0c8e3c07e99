use thiserror::Error;

use crate::model::{AnswerError, DifficultyError, QuestionError, RecordError};
use crate::policy::PolicyError;

/// A persisted session is not in a state that allows the requested step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is not active")]
    NotActive,
    #[error("session has no question awaiting an answer")]
    NoCurrentQuestion,
    #[error("session has no topic left to assess")]
    NoCurrentTopic,
    #[error("session was started without topics")]
    NoTopics,
    #[error("follow-up test is already finished")]
    FollowUpFinished,
    #[error("follow-up test has no questions")]
    EmptyFollowUp,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Record(#[from] RecordError),
}
