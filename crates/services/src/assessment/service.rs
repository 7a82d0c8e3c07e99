use std::sync::Arc;

use chrono::{DateTime, Utc};

use assess_core::engine::{Advance, Step, TopicState};
use assess_core::model::{
    ActiveSession, AssessmentSession, AssessmentSummary, Difficulty, Question, SessionId,
    SessionKind, SessionProgress, TestRecord, TopicResolution, UserId,
};
use assess_core::{AssessmentPolicy, SessionStateError};
use storage::repository::{CompletionPersistence, QuestionBank, SessionStore};

use super::types::{AnswerResult, NextAction};
use crate::Clock;
use crate::error::AssessmentError;
use crate::locks::UserLocks;
use crate::retrieval::QuestionPicker;

/// Result of moving a session to its next servable question.
enum Served {
    /// `skipped` is set when the topic in progress had nothing left and the
    /// question belongs to a later topic.
    Question { question: Question, skipped: bool },
    Finished(AssessmentSummary),
}

/// Runs adaptive multi-topic assessments against the session store.
///
/// Every call reloads the learner's session, applies one step and writes the
/// whole record back. Nothing is cached between calls.
#[derive(Clone)]
pub struct AdaptiveAssessmentService {
    clock: Clock,
    policy: AssessmentPolicy,
    bank: Arc<dyn QuestionBank>,
    picker: QuestionPicker,
    sessions: Arc<dyn SessionStore>,
    completions: Arc<dyn CompletionPersistence>,
    locks: Arc<UserLocks>,
}

impl AdaptiveAssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<dyn QuestionBank>,
        sessions: Arc<dyn SessionStore>,
        completions: Arc<dyn CompletionPersistence>,
    ) -> Self {
        Self {
            clock,
            policy: AssessmentPolicy::default(),
            picker: QuestionPicker::new(Arc::clone(&bank)),
            bank,
            sessions,
            completions,
            locks: Arc::new(UserLocks::new()),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AssessmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share per-learner locks with the other services that write sessions.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<UserLocks>) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &AssessmentPolicy {
        &self.policy
    }

    /// Start an adaptive session over `topics` and return its first question.
    ///
    /// Topic names are resolved through the alias table and deduplicated.
    /// Topics the bank has no question for are left out.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AlreadyActiveSession` if the learner has a
    /// session of either kind, `NoTopicsSelected` if `topics` is blank, and
    /// `NoQuestionsAvailable` if no topic has any question.
    pub async fn start_adaptive_session(
        &self,
        user: UserId,
        topics: Vec<String>,
    ) -> Result<Question, AssessmentError> {
        let _guard = self.locks.lock(user).await;
        if let Some(active) = self.sessions.load(user).await? {
            tracing::debug!(user_id = %user, kind = %active.kind(), "start refused, session in progress");
            return Err(AssessmentError::AlreadyActiveSession);
        }

        let mut servable: Vec<String> = Vec::new();
        let mut first_missing = None;
        for raw in &topics {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let topic = self.bank.resolve_topic_alias(raw).await?;
            if servable.contains(&topic) || first_missing.as_ref() == Some(&topic) {
                continue;
            }
            if self.picker.has_questions(&topic).await? {
                servable.push(topic);
            } else {
                tracing::warn!(user_id = %user, topic = %topic, "topic has no questions, left out");
                first_missing.get_or_insert(topic);
            }
        }

        if servable.is_empty() {
            return Err(match first_missing {
                Some(topic) => AssessmentError::NoQuestionsAvailable {
                    topic,
                    difficulty: None,
                },
                None => AssessmentError::NoTopicsSelected,
            });
        }

        let now = self.clock.now();
        let mut session = AssessmentSession::new(SessionId::generate(), user, servable, now)?;
        let question = match self.advance_to_question(&mut session, TopicState::OPENING, now).await? {
            Served::Question { question, .. } => question,
            Served::Finished(_) => {
                return Err(AssessmentError::NoQuestionsAvailable {
                    topic: session.topics().first().cloned().unwrap_or_default(),
                    difficulty: None,
                });
            }
        };

        tracing::info!(
            user_id = %user,
            session_id = %session.id(),
            topics = ?session.topics(),
            "adaptive session started"
        );
        self.sessions
            .save(user, &ActiveSession::Assessment(session))
            .await?;
        Ok(question)
    }

    /// Grade `raw` against the pending question and move the session on.
    ///
    /// When the last topic resolves, the result record, the pool updates and
    /// the session removal are written in one step.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::SessionNotFound` or `SessionTypeMismatch` when
    /// there is no adaptive session, and `InvalidAnswerFormat` when `raw` is
    /// not one of the question's letters. The stored session is unchanged on
    /// any error.
    pub async fn submit_answer(
        &self,
        user: UserId,
        raw: &str,
    ) -> Result<AnswerResult, AssessmentError> {
        let _guard = self.locks.lock(user).await;
        let mut session = self.load_assessment(user).await?;

        let answer = session
            .current_question()
            .ok_or(SessionStateError::NoCurrentQuestion)?
            .parse_answer(raw)?;
        let topic = session
            .current_topic()
            .ok_or(SessionStateError::NoCurrentTopic)?
            .to_owned();
        let now = self.clock.now();
        let graded = session.record_answer(answer, now, &self.policy)?;

        tracing::debug!(
            user_id = %user,
            session_id = %session.id(),
            topic = %topic,
            difficulty = %graded.question.difficulty(),
            correct = graded.correct,
            "answer graded"
        );

        let next_action = match graded.step {
            Step::Ask(difficulty) => match self.advance_to_question(&mut session, difficulty, now).await? {
                Served::Question {
                    question,
                    skipped: false,
                } => NextAction::NextQuestion(question),
                Served::Question {
                    question,
                    skipped: true,
                } => NextAction::TopicTransition {
                    completed: topic,
                    resolution: TopicResolution::Exhausted,
                    next_topic: question.topic().to_owned(),
                    question,
                },
                Served::Finished(summary) => NextAction::SessionComplete(summary),
            },
            Step::Resolve(resolution) => {
                tracing::info!(
                    user_id = %user,
                    session_id = %session.id(),
                    topic = %topic,
                    %resolution,
                    "topic resolved"
                );
                match session.resolve_current_topic(resolution, now, &self.policy)? {
                    Advance::Finished(summary) => NextAction::SessionComplete(summary),
                    Advance::Next(_) => {
                        match self
                            .advance_to_question(&mut session, TopicState::OPENING, now)
                            .await?
                        {
                            Served::Finished(summary) => NextAction::SessionComplete(summary),
                            Served::Question { question, .. } => {
                                let next_topic = question.topic().to_owned();
                                if resolution == TopicResolution::NeedsTraining {
                                    NextAction::NeedsTrainingTopicComplete {
                                        topic,
                                        next_topic,
                                        question,
                                    }
                                } else {
                                    NextAction::TopicTransition {
                                        completed: topic,
                                        resolution,
                                        next_topic,
                                        question,
                                    }
                                }
                            }
                        }
                    }
                }
            }
        };

        if let NextAction::SessionComplete(summary) = &next_action {
            let record = TestRecord::from_assessment(&session, now)?;
            self.completions.complete_assessment(&record).await?;
            tracing::info!(
                user_id = %user,
                session_id = %session.id(),
                passed = summary.passed.len(),
                weak = summary.weak.len(),
                needs_training = summary.needs_training.len(),
                "adaptive session completed"
            );
        } else {
            self.sessions
                .save(user, &ActiveSession::Assessment(session))
                .await?;
        }

        Ok(AnswerResult {
            correct: graded.correct,
            correct_choice: graded.question.correct_choice(),
            explanation: graded.question.explanation().to_owned(),
            next_action,
        })
    }

    /// Drop whatever session the learner has. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` if the store cannot be written.
    pub async fn reset_session(&self, user: UserId) -> Result<(), AssessmentError> {
        let _guard = self.locks.lock(user).await;
        self.sessions.clear(user).await?;
        tracing::info!(user_id = %user, "session reset");
        Ok(())
    }

    /// The question awaiting an answer in the learner's session of either kind.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` if the store cannot be read.
    pub async fn current_question(&self, user: UserId) -> Result<Option<Question>, AssessmentError> {
        let active = self.sessions.load(user).await?;
        Ok(active.as_ref().and_then(ActiveSession::current_question).cloned())
    }

    /// Counters of the learner's adaptive session.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::SessionNotFound` or `SessionTypeMismatch`
    /// when there is no adaptive session.
    pub async fn session_progress(&self, user: UserId) -> Result<SessionProgress, AssessmentError> {
        Ok(self.load_assessment(user).await?.progress())
    }

    async fn load_assessment(&self, user: UserId) -> Result<AssessmentSession, AssessmentError> {
        match self.sessions.load(user).await? {
            None => Err(AssessmentError::SessionNotFound),
            Some(ActiveSession::Assessment(session)) => Ok(session),
            Some(other) => Err(AssessmentError::SessionTypeMismatch {
                expected: SessionKind::Assessment,
                found: other.kind(),
            }),
        }
    }

    /// Serves the next question, resolving topics that have nothing left to serve.
    async fn advance_to_question(
        &self,
        session: &mut AssessmentSession,
        wanted: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<Served, AssessmentError> {
        let mut wanted = wanted;
        let mut skipped = false;
        loop {
            let topic = session
                .current_topic()
                .ok_or(SessionStateError::NoCurrentTopic)?
                .to_owned();
            if let Some(question) = self.picker.serve(session, &topic, wanted).await? {
                return Ok(Served::Question { question, skipped });
            }

            tracing::warn!(
                session_id = %session.id(),
                topic = %topic,
                "bank has no question for topic, skipping"
            );
            match session.resolve_current_topic(TopicResolution::Exhausted, now, &self.policy)? {
                Advance::Next(_) => {
                    wanted = TopicState::OPENING;
                    skipped = true;
                }
                Advance::Finished(summary) => return Ok(Served::Finished(summary)),
            }
        }
    }
}
