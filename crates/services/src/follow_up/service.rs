use std::sync::Arc;

use assess_core::engine::FollowUpBuildError;
use assess_core::engine::follow_up;
use assess_core::model::{
    ActiveSession, ChoiceLetter, FollowUpKind, FollowUpSession, Question, SessionId, SessionKind,
    TestRecord, UserId,
};
use assess_core::{AssessmentPolicy, SessionStateError};
use storage::repository::{CompletionPersistence, QuestionBank, SessionStore, TopicPoolRepository};

use crate::Clock;
use crate::error::AssessmentError;
use crate::locks::UserLocks;

/// What the learner sees after answering a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpAnswerResult {
    pub correct: bool,
    pub correct_choice: ChoiceLetter,
    pub explanation: String,
    pub completed: bool,
    /// Set once the test is complete.
    pub improved: Option<bool>,
    pub next_question: Option<Question>,
    /// `(correct, total)` so far.
    pub score: (u32, u32),
}

/// Runs fixed-length re-tests of a single weak or needs-training topic.
#[derive(Clone)]
pub struct FollowUpService {
    clock: Clock,
    policy: AssessmentPolicy,
    bank: Arc<dyn QuestionBank>,
    sessions: Arc<dyn SessionStore>,
    pools: Arc<dyn TopicPoolRepository>,
    completions: Arc<dyn CompletionPersistence>,
    locks: Arc<UserLocks>,
}

impl FollowUpService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<dyn QuestionBank>,
        sessions: Arc<dyn SessionStore>,
        pools: Arc<dyn TopicPoolRepository>,
        completions: Arc<dyn CompletionPersistence>,
    ) -> Self {
        Self {
            clock,
            policy: AssessmentPolicy::default(),
            bank,
            sessions,
            pools,
            completions,
            locks: Arc::new(UserLocks::new()),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AssessmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_locks(mut self, locks: Arc<UserLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Start a `kind` follow-up on `topic` and return its first question.
    ///
    /// The topic must be in the learner's pool for that kind. A follow-up
    /// already in progress is replaced.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::TopicNotEligible` if the topic is not pooled,
    /// `AlreadyActiveSession` if an adaptive session is in progress, and
    /// `NoQuestionsAvailable` if the bank cannot supply the test.
    pub async fn start_follow_up(
        &self,
        user: UserId,
        topic: &str,
        kind: FollowUpKind,
    ) -> Result<Question, AssessmentError> {
        let _guard = self.locks.lock(user).await;
        let canonical = self.bank.resolve_topic_alias(topic.trim()).await?;

        let pooled = self.pools.pool_topics(user, kind.pool()).await?;
        let Some(topic) = pooled
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(&canonical))
        else {
            return Err(AssessmentError::TopicNotEligible {
                topic: canonical,
                kind,
            });
        };

        match self.sessions.load(user).await? {
            Some(ActiveSession::Assessment(_)) => return Err(AssessmentError::AlreadyActiveSession),
            Some(ActiveSession::FollowUp(previous)) => {
                tracing::warn!(
                    user_id = %user,
                    session_id = %previous.id(),
                    topic = previous.topic(),
                    "replacing unfinished follow-up"
                );
            }
            None => {}
        }

        let candidates = self.bank.candidates(&topic, None).await?;
        let questions = {
            let mut rng = rand::rng();
            follow_up::build(kind, &candidates, &mut rng)
        }
        .map_err(|FollowUpBuildError::NoQuestions { difficulty }| {
            AssessmentError::NoQuestionsAvailable {
                topic: topic.clone(),
                difficulty,
            }
        })?;

        let session = FollowUpSession::new(
            SessionId::generate(),
            user,
            topic,
            kind,
            questions,
            self.clock.now(),
        )?;
        let first = session
            .current_question()
            .cloned()
            .ok_or(SessionStateError::EmptyFollowUp)?;

        tracing::info!(
            user_id = %user,
            session_id = %session.id(),
            topic = session.topic(),
            %kind,
            questions = session.total(),
            "follow-up started"
        );
        self.sessions
            .save(user, &ActiveSession::FollowUp(session))
            .await?;
        Ok(first)
    }

    /// Grade `raw` against the current follow-up question.
    ///
    /// On the last answer the result is recorded and the topic leaves its
    /// pool if the pass rule is met.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::SessionNotFound` or `SessionTypeMismatch` when
    /// there is no follow-up, and `InvalidAnswerFormat` for a bad letter.
    pub async fn submit_follow_up_answer(
        &self,
        user: UserId,
        raw: &str,
    ) -> Result<FollowUpAnswerResult, AssessmentError> {
        let _guard = self.locks.lock(user).await;
        let mut session = match self.sessions.load(user).await? {
            None => return Err(AssessmentError::SessionNotFound),
            Some(ActiveSession::FollowUp(session)) => session,
            Some(other) => {
                return Err(AssessmentError::SessionTypeMismatch {
                    expected: SessionKind::FollowUp,
                    found: other.kind(),
                });
            }
        };

        let answer = session
            .current_question()
            .ok_or(SessionStateError::FollowUpFinished)?
            .parse_answer(raw)?;
        let grade = session.record_answer(answer)?;

        let improved = if grade.completed {
            let improved = session.improved(&self.policy);
            let record = TestRecord::from_follow_up(&session, improved, self.clock.now())?;
            self.completions
                .complete_follow_up(&record, session.kind().pool(), session.topic(), improved)
                .await?;
            let (correct, total) = session.score();
            tracing::info!(
                user_id = %user,
                session_id = %session.id(),
                topic = session.topic(),
                kind = %session.kind(),
                correct,
                total,
                improved,
                "follow-up completed"
            );
            Some(improved)
        } else {
            self.sessions
                .save(user, &ActiveSession::FollowUp(session.clone()))
                .await?;
            None
        };

        Ok(FollowUpAnswerResult {
            correct: grade.correct,
            correct_choice: grade.question.correct_choice(),
            explanation: grade.question.explanation().to_owned(),
            completed: grade.completed,
            improved,
            next_question: session.current_question().cloned(),
            score: session.score(),
        })
    }
}
