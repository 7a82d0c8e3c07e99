use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::engine::{SelectionKind, Step, TopicState, UsedQuestions};
use crate::error::SessionStateError;
use crate::model::{
    AssessmentSummary, ChoiceLetter, Difficulty, FollowUpSession, Question, SessionId, UserId,
};
use crate::policy::AssessmentPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One graded answer, in the order it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub topic: String,
    pub difficulty: Difficulty,
    pub correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Outcome of grading the question that was awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question: Question,
    pub answer: ChoiceLetter,
    pub correct: bool,
    pub step: Step,
}

/// Snapshot of how far a learner is through an adaptive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub topics_total: usize,
    pub topics_completed: usize,
    pub current_topic: Option<String>,
    pub questions_on_topic: u32,
    pub questions_answered: usize,
    pub correct_answers: usize,
}

//
// ─── ASSESSMENT SESSION ────────────────────────────────────────────────────────
//

/// Adaptive multi-topic assessment for one learner.
///
/// Topics are worked through front to back; `remaining_topics` and
/// `completed_topics` never share a topic, and every topic of `topics` has a
/// `TopicState` for the whole life of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub(crate) id: SessionId,
    pub(crate) user_id: UserId,
    pub(crate) topics: Vec<String>,
    pub(crate) remaining_topics: VecDeque<String>,
    pub(crate) completed_topics: Vec<String>,
    pub(crate) current_question: Option<Question>,
    pub(crate) topic_states: BTreeMap<String, TopicState>,
    pub(crate) answer_log: Vec<AnswerRecord>,
    pub(crate) used_questions: UsedQuestions,
    pub(crate) summary: Option<AssessmentSummary>,
    pub(crate) status: SessionStatus,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl AssessmentSession {
    /// Opens a session over `topics`, keeping the first occurrence of each name.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NoTopics` if no non-blank topic is given.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        topics: impl IntoIterator<Item = String>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        let mut selected: Vec<String> = Vec::new();
        for topic in topics {
            let topic = topic.trim();
            if !topic.is_empty() && !selected.iter().any(|t| t == topic) {
                selected.push(topic.to_owned());
            }
        }
        if selected.is_empty() {
            return Err(SessionStateError::NoTopics);
        }

        let topic_states = selected
            .iter()
            .map(|t| (t.clone(), TopicState::default()))
            .collect();

        Ok(Self {
            id,
            user_id,
            remaining_topics: selected.iter().cloned().collect(),
            topics: selected,
            completed_topics: Vec::new(),
            current_question: None,
            topic_states,
            answer_log: Vec::new(),
            used_questions: UsedQuestions::default(),
            summary: None,
            status: SessionStatus::Active,
            started_at: now,
            completed_at: None,
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
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn remaining_topics(&self) -> impl Iterator<Item = &str> {
        self.remaining_topics.iter().map(String::as_str)
    }

    #[must_use]
    pub fn completed_topics(&self) -> &[String] {
        &self.completed_topics
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    #[must_use]
    pub fn topic_state(&self, topic: &str) -> Option<&TopicState> {
        self.topic_states.get(topic)
    }

    #[must_use]
    pub fn answer_log(&self) -> &[AnswerRecord] {
        &self.answer_log
    }

    #[must_use]
    pub fn used_questions(&self) -> &UsedQuestions {
        &self.used_questions
    }

    /// Final classification, present once the session is completed.
    #[must_use]
    pub fn summary(&self) -> Option<&AssessmentSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn correct_answers(&self) -> usize {
        self.answer_log.iter().filter(|a| a.correct).count()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let current_topic = self.remaining_topics.front().cloned();
        let questions_on_topic = current_topic
            .as_deref()
            .and_then(|t| self.topic_states.get(t))
            .map_or(0, TopicState::question_count);
        SessionProgress {
            topics_total: self.topics.len(),
            topics_completed: self.completed_topics.len(),
            current_topic,
            questions_on_topic,
            questions_answered: self.answer_log.len(),
            correct_answers: self.correct_answers(),
        }
    }

    /// Picks the next question for the current topic out of `candidates` and
    /// makes it the question awaiting an answer.
    ///
    /// Returns `Ok(None)` when there is nothing at all to serve for the topic.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the session is finished or has no current topic.
    pub fn serve_next<R: Rng + ?Sized>(
        &mut self,
        candidates: &[Question],
        wanted: Difficulty,
        rng: &mut R,
    ) -> Result<Option<SelectionKind>, SessionStateError> {
        self.ensure_active()?;
        let topic = self
            .remaining_topics
            .front()
            .cloned()
            .ok_or(SessionStateError::NoCurrentTopic)?;

        let Some(selection) = self.used_questions.select(candidates, wanted, rng) else {
            return Ok(None);
        };
        self.current_question = Some(selection.question.with_topic(topic));
        Ok(Some(selection.kind))
    }

    /// Grades `answer` against the pending question and feeds the result to the
    /// current topic's state machine. The pending question is consumed.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the session is finished, has no current
    /// topic, or has no pending question.
    pub fn record_answer(
        &mut self,
        answer: ChoiceLetter,
        now: DateTime<Utc>,
        policy: &AssessmentPolicy,
    ) -> Result<GradedAnswer, SessionStateError> {
        self.ensure_active()?;
        let topic = self
            .remaining_topics
            .front()
            .cloned()
            .ok_or(SessionStateError::NoCurrentTopic)?;
        let question = self
            .current_question
            .take()
            .ok_or(SessionStateError::NoCurrentQuestion)?;

        let correct = question.is_correct(answer);
        self.answer_log.push(AnswerRecord {
            topic: topic.clone(),
            difficulty: question.difficulty(),
            correct,
            answered_at: now,
        });
        let step = self
            .topic_states
            .entry(topic)
            .or_default()
            .record_answer(question.difficulty(), correct, policy);

        Ok(GradedAnswer {
            question,
            answer,
            correct,
            step,
        })
    }

    pub(crate) fn ensure_active(&self) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Completed => Err(SessionStateError::NotActive),
        }
    }
}

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Assessment,
    FollowUp,
}

impl SessionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Assessment => "assessment",
            SessionKind::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single session record a learner may have open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "session", rename_all = "snake_case")]
pub enum ActiveSession {
    Assessment(AssessmentSession),
    FollowUp(FollowUpSession),
}

impl ActiveSession {
    #[must_use]
    pub fn kind(&self) -> SessionKind {
        match self {
            ActiveSession::Assessment(_) => SessionKind::Assessment,
            ActiveSession::FollowUp(_) => SessionKind::FollowUp,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        match self {
            ActiveSession::Assessment(s) => s.id(),
            ActiveSession::FollowUp(s) => s.id(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            ActiveSession::Assessment(s) => s.user_id(),
            ActiveSession::FollowUp(s) => s.user_id(),
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self {
            ActiveSession::Assessment(s) => s.current_question(),
            ActiveSession::FollowUp(s) => s.current_question(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TopicResolution;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question(topic: &str, difficulty: Difficulty, prompt: &str) -> Question {
        let a = ChoiceLetter::parse("A").unwrap();
        let b = ChoiceLetter::parse("B").unwrap();
        Question::new(
            topic,
            difficulty,
            prompt,
            BTreeMap::from([(a, "right".to_string()), (b, "wrong".to_string())]),
            a,
            "because",
        )
        .unwrap()
    }

    fn session(topics: &[&str]) -> AssessmentSession {
        AssessmentSession::new(
            SessionId::generate(),
            UserId::new(1),
            topics.iter().map(|t| (*t).to_string()),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn new_deduplicates_topics_and_rejects_empty_selection() {
        let s = session(&["Stacks", " Queues ", "Stacks", ""]);
        assert_eq!(s.topics(), ["Stacks".to_string(), "Queues".to_string()]);
        assert_eq!(s.remaining_topics().collect::<Vec<_>>(), ["Stacks", "Queues"]);
        assert!(s.topic_state("Queues").is_some());

        let err = AssessmentSession::new(
            SessionId::generate(),
            UserId::new(1),
            vec!["  ".to_string()],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::NoTopics);
    }

    #[test]
    fn serve_then_answer_updates_log_and_state() {
        let mut s = session(&["Stacks"]);
        let bank = vec![question("Stack", Difficulty::Medium, "m1")];
        let mut rng = StdRng::seed_from_u64(5);

        let kind = s.serve_next(&bank, Difficulty::Medium, &mut rng).unwrap();
        assert_eq!(kind, Some(SelectionKind::Fresh));
        assert_eq!(s.current_question().unwrap().topic(), "Stacks");

        let a = ChoiceLetter::parse("A").unwrap();
        let graded = s
            .record_answer(a, fixed_now(), &AssessmentPolicy::default())
            .unwrap();
        assert!(graded.correct);
        assert_eq!(graded.step, Step::Ask(Difficulty::Hard));
        assert!(s.current_question().is_none());
        assert_eq!(s.answer_log().len(), 1);
        assert_eq!(s.progress().questions_on_topic, 1);
    }

    #[test]
    fn answering_without_pending_question_fails() {
        let mut s = session(&["Stacks"]);
        let a = ChoiceLetter::parse("A").unwrap();
        let err = s
            .record_answer(a, fixed_now(), &AssessmentPolicy::default())
            .unwrap_err();
        assert_eq!(err, SessionStateError::NoCurrentQuestion);
        assert!(s.answer_log().is_empty());
    }

    #[test]
    fn empty_bank_serves_nothing() {
        let mut s = session(&["Graphs"]);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(s.serve_next(&[], Difficulty::Medium, &mut rng).unwrap(), None);
        assert!(s.current_question().is_none());
    }

    #[test]
    fn active_session_round_trips_with_kind_tag() {
        let mut s = session(&["Stacks"]);
        s.topic_states
            .get_mut("Stacks")
            .unwrap()
            .force_resolve(TopicResolution::Weak);
        let active = ActiveSession::Assessment(s);

        let json = serde_json::to_value(&active).unwrap();
        assert_eq!(json["kind"], "assessment");

        let back: ActiveSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, active);
        assert_eq!(back.kind(), SessionKind::Assessment);
    }
}
