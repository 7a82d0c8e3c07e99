use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{AssessmentSession, AssessmentSummary, FollowUpKind, FollowUpSession, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct answers ({correct}) exceed total ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("too many answers for a single test: {len}")]
    TooManyAnswers { len: usize },

    #[error("unknown test kind: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Adaptive,
    FollowUpStandard,
    FollowUpAdvanced,
}

impl TestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Adaptive => "adaptive",
            TestKind::FollowUpStandard => "follow_up_standard",
            TestKind::FollowUpAdvanced => "follow_up_advanced",
        }
    }
}

impl From<FollowUpKind> for TestKind {
    fn from(kind: FollowUpKind) -> Self {
        match kind {
            FollowUpKind::Standard => TestKind::FollowUpStandard,
            FollowUpKind::Advanced => TestKind::FollowUpAdvanced,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive" => Ok(TestKind::Adaptive),
            "follow_up_standard" => Ok(TestKind::FollowUpStandard),
            "follow_up_advanced" => Ok(TestKind::FollowUpAdvanced),
            other => Err(RecordError::UnknownKind(other.to_owned())),
        }
    }
}

/// Historical result of one finished test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    user_id: UserId,
    kind: TestKind,
    topics: Vec<String>,
    correct: u32,
    total: u32,
    outcome: AssessmentSummary,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl TestRecord {
    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidTimeRange` or `RecordError::CountMismatch`
    /// if the stored values are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        kind: TestKind,
        topics: Vec<String>,
        correct: u32,
        total: u32,
        outcome: AssessmentSummary,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if completed_at < started_at {
            return Err(RecordError::InvalidTimeRange);
        }
        if correct > total {
            return Err(RecordError::CountMismatch { correct, total });
        }
        Ok(Self {
            user_id,
            kind,
            topics,
            correct,
            total,
            outcome,
            started_at,
            completed_at,
        })
    }

    /// Build the record of a completed adaptive session.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if the answer log cannot be counted or the times are inverted.
    pub fn from_assessment(
        session: &AssessmentSession,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let len = session.answer_log().len();
        let total = u32::try_from(len).map_err(|_| RecordError::TooManyAnswers { len })?;
        let correct = u32::try_from(session.correct_answers())
            .map_err(|_| RecordError::TooManyAnswers { len })?;

        Self::from_persisted(
            session.user_id(),
            TestKind::Adaptive,
            session.topics().to_vec(),
            correct,
            total,
            session.summary().cloned().unwrap_or_default(),
            session.started_at(),
            completed_at,
        )
    }

    /// Build the record of a finished follow-up; `improved` decides which list
    /// the topic lands in.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidTimeRange` if `completed_at` is before the start.
    pub fn from_follow_up(
        session: &FollowUpSession,
        improved: bool,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let topic = session.topic().to_owned();
        let mut outcome = AssessmentSummary::default();
        match (improved, session.kind()) {
            (true, _) => outcome.passed.push(topic.clone()),
            (false, FollowUpKind::Standard) => outcome.weak.push(topic.clone()),
            (false, FollowUpKind::Advanced) => outcome.needs_training.push(topic.clone()),
        }
        let (correct, total) = session.score();

        Self::from_persisted(
            session.user_id(),
            session.kind().into(),
            vec![topic],
            correct,
            total,
            outcome,
            session.started_at(),
            completed_at,
        )
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn outcome(&self) -> &AssessmentSummary {
        &self.outcome
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Share of correct answers in percent, `0.0` for an empty test.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) * 100.0 / f64::from(self.total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChoiceLetter, Difficulty, Question, SessionId};
    use crate::time::fixed_now;
    use chrono::Duration;
    use std::collections::BTreeMap;

    #[test]
    fn rejects_inconsistent_counts_and_times() {
        let now = fixed_now();
        let err = TestRecord::from_persisted(
            UserId::new(1),
            TestKind::Adaptive,
            vec![],
            4,
            3,
            AssessmentSummary::default(),
            now,
            now,
        )
        .unwrap_err();
        assert_eq!(err, RecordError::CountMismatch { correct: 4, total: 3 });

        let err = TestRecord::from_persisted(
            UserId::new(1),
            TestKind::Adaptive,
            vec![],
            0,
            0,
            AssessmentSummary::default(),
            now,
            now - Duration::seconds(1),
        )
        .unwrap_err();
        assert_eq!(err, RecordError::InvalidTimeRange);
    }

    #[test]
    fn failed_advanced_follow_up_stays_needs_training() {
        let a = ChoiceLetter::parse("A").unwrap();
        let b = ChoiceLetter::parse("B").unwrap();
        let question = Question::new(
            "Graphs",
            Difficulty::Hard,
            "BFS uses?",
            BTreeMap::from([(a, "queue".to_string()), (b, "stack".to_string())]),
            a,
            "",
        )
        .unwrap();
        let mut session = FollowUpSession::new(
            SessionId::generate(),
            UserId::new(3),
            "Graphs",
            FollowUpKind::Advanced,
            vec![question],
            fixed_now(),
        )
        .unwrap();
        session.record_answer(b).unwrap();

        let record = TestRecord::from_follow_up(&session, false, fixed_now()).unwrap();
        assert_eq!(record.kind(), TestKind::FollowUpAdvanced);
        assert_eq!(record.outcome().needs_training, vec!["Graphs".to_string()]);
        assert_eq!((record.correct(), record.total()), (0, 1));
        assert!(record.percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn kind_parses_its_own_names() {
        for kind in [
            TestKind::Adaptive,
            TestKind::FollowUpStandard,
            TestKind::FollowUpAdvanced,
        ] {
            assert_eq!(kind.as_str().parse::<TestKind>().unwrap(), kind);
        }
    }
}
