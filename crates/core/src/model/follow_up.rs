use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::SessionStateError;
use crate::model::{ChoiceLetter, Question, SessionId, UserId};
use crate::policy::{AssessmentPolicy, PassRule};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown follow-up kind: {0}")]
pub struct ParseFollowUpKindError(String);

/// Learner-level topic list a follow-up test draws from and reports back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicPool {
    Weak,
    NeedsTraining,
}

impl TopicPool {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicPool::Weak => "weak",
            TopicPool::NeedsTraining => "needs_training",
        }
    }
}

impl fmt::Display for TopicPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Standard` re-tests a weak topic with one question per difficulty;
/// `Advanced` re-tests a needs-training topic with Hard questions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Standard,
    Advanced,
}

impl FollowUpKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FollowUpKind::Standard => "standard",
            FollowUpKind::Advanced => "advanced",
        }
    }

    #[must_use]
    pub fn pool(self) -> TopicPool {
        match self {
            FollowUpKind::Standard => TopicPool::Weak,
            FollowUpKind::Advanced => TopicPool::NeedsTraining,
        }
    }

    #[must_use]
    pub fn pass_rule(self, policy: &AssessmentPolicy) -> PassRule {
        match self {
            FollowUpKind::Standard => policy.standard_pass(),
            FollowUpKind::Advanced => policy.advanced_pass(),
        }
    }
}

impl fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowUpKind {
    type Err = ParseFollowUpKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(FollowUpKind::Standard),
            "advanced" => Ok(FollowUpKind::Advanced),
            _ => Err(ParseFollowUpKindError(s.to_owned())),
        }
    }
}

/// Grading of one follow-up answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpGrade {
    pub question: Question,
    pub correct: bool,
    pub completed: bool,
}

/// Short fixed-length re-test of a single topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpSession {
    id: SessionId,
    user_id: UserId,
    topic: String,
    kind: FollowUpKind,
    questions: Vec<Question>,
    index: usize,
    correct_count: u32,
    started_at: DateTime<Utc>,
}

impl FollowUpSession {
    /// # Errors
    ///
    /// Returns `SessionStateError::EmptyFollowUp` if `questions` is empty.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        topic: impl Into<String>,
        kind: FollowUpKind,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if questions.is_empty() {
            return Err(SessionStateError::EmptyFollowUp);
        }
        Ok(Self {
            id,
            user_id,
            topic: topic.into(),
            kind,
            questions,
            index: 0,
            correct_count: 0,
            started_at: now,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn kind(&self) -> FollowUpKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answered(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index >= self.questions.len()
    }

    /// `(correct, total)` so far.
    #[must_use]
    pub fn score(&self) -> (u32, u32) {
        (self.correct_count, self.total())
    }

    /// Whether the learner met the pass rule of this kind of test.
    #[must_use]
    pub fn improved(&self, policy: &AssessmentPolicy) -> bool {
        self.is_complete()
            && self
                .kind
                .pass_rule(policy)
                .is_met(self.correct_count, self.total())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::FollowUpFinished` once every question is answered.
    pub fn record_answer(
        &mut self,
        answer: ChoiceLetter,
    ) -> Result<FollowUpGrade, SessionStateError> {
        let question = self
            .current_question()
            .cloned()
            .ok_or(SessionStateError::FollowUpFinished)?;
        let correct = question.is_correct(answer);
        if correct {
            self.correct_count = self.correct_count.saturating_add(1);
        }
        self.index += 1;
        Ok(FollowUpGrade {
            question,
            correct,
            completed: self.is_complete(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use crate::time::fixed_now;
    use std::collections::BTreeMap;

    fn q(prompt: &str, difficulty: Difficulty) -> Question {
        let a = ChoiceLetter::parse("A").unwrap();
        let b = ChoiceLetter::parse("B").unwrap();
        Question::new(
            "Recursion",
            difficulty,
            prompt,
            BTreeMap::from([(a, "base case".to_string()), (b, "loop".to_string())]),
            a,
            "",
        )
        .unwrap()
    }

    fn follow_up(kind: FollowUpKind) -> FollowUpSession {
        FollowUpSession::new(
            SessionId::generate(),
            UserId::new(9),
            "Recursion",
            kind,
            vec![
                q("e", Difficulty::Easy),
                q("m", Difficulty::Medium),
                q("h", Difficulty::Hard),
            ],
            fixed_now(),
        )
        .unwrap()
    }

    fn answer(s: &mut FollowUpSession, letters: &[&str]) {
        for l in letters {
            s.record_answer(ChoiceLetter::parse(l).unwrap()).unwrap();
        }
    }

    #[test]
    fn standard_passes_with_two_of_three() {
        let policy = AssessmentPolicy::default();
        let mut s = follow_up(FollowUpKind::Standard);
        answer(&mut s, &["A", "B"]);
        assert!(!s.is_complete());
        assert!(!s.improved(&policy));
        answer(&mut s, &["A"]);
        assert!(s.is_complete());
        assert_eq!(s.score(), (2, 3));
        assert!(s.improved(&policy));
    }

    #[test]
    fn advanced_requires_every_answer() {
        let policy = AssessmentPolicy::default();
        let mut s = follow_up(FollowUpKind::Advanced);
        answer(&mut s, &["A", "A", "B"]);
        assert!(!s.improved(&policy));

        let mut s = follow_up(FollowUpKind::Advanced);
        answer(&mut s, &["A", "A", "A"]);
        assert!(s.improved(&policy));
    }

    #[test]
    fn rejects_answers_after_completion_and_empty_tests() {
        let mut s = follow_up(FollowUpKind::Standard);
        answer(&mut s, &["A", "A", "A"]);
        let err = s.record_answer(ChoiceLetter::parse("A").unwrap()).unwrap_err();
        assert_eq!(err, SessionStateError::FollowUpFinished);

        let err = FollowUpSession::new(
            SessionId::generate(),
            UserId::new(9),
            "Recursion",
            FollowUpKind::Standard,
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::EmptyFollowUp);
    }

    #[test]
    fn kind_maps_to_pool_and_parses() {
        assert_eq!(FollowUpKind::Standard.pool(), TopicPool::Weak);
        assert_eq!(FollowUpKind::Advanced.pool(), TopicPool::NeedsTraining);
        assert_eq!("Advanced".parse::<FollowUpKind>().unwrap(), FollowUpKind::Advanced);
        assert!("expert".parse::<FollowUpKind>().is_err());
    }
}
