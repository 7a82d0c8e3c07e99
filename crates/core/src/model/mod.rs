mod difficulty;
mod follow_up;
mod ids;
mod outcome;
mod question;
mod recommendation;
mod record;
mod session;

pub use difficulty::{Difficulty, DifficultyError};
pub use follow_up::{FollowUpGrade, FollowUpKind, FollowUpSession, ParseFollowUpKindError, TopicPool};
pub use ids::{ParseIdError, SessionId, UserId};
pub use outcome::{AssessmentSummary, TopicOutcome, TopicResolution};
pub use question::{AnswerError, ChoiceLetter, Question, QuestionError, QuestionHash};
pub use recommendation::Recommendation;
pub use record::{RecordError, TestKind, TestRecord};
pub use session::{
    ActiveSession, AnswerRecord, AssessmentSession, GradedAnswer, SessionKind, SessionProgress,
    SessionStatus,
};
