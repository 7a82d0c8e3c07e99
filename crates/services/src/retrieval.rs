use std::sync::Arc;

use assess_core::engine::SelectionKind;
use assess_core::model::{AssessmentSession, Difficulty, Question};
use storage::repository::QuestionBank;

use crate::error::AssessmentError;

/// Fetches candidates from the bank and lets the session's dedup tracker pick one.
#[derive(Clone)]
pub(crate) struct QuestionPicker {
    bank: Arc<dyn QuestionBank>,
}

impl QuestionPicker {
    pub(crate) fn new(bank: Arc<dyn QuestionBank>) -> Self {
        Self { bank }
    }

    /// Serves a question on the session's current topic, preferring `wanted`.
    ///
    /// Returns `Ok(None)` if the bank has nothing for the topic.
    pub(crate) async fn serve(
        &self,
        session: &mut AssessmentSession,
        topic: &str,
        wanted: Difficulty,
    ) -> Result<Option<Question>, AssessmentError> {
        let candidates = self.bank.candidates(topic, None).await?;
        let kind = {
            let mut rng = rand::rng();
            session.serve_next(&candidates, wanted, &mut rng)?
        };

        match kind {
            None => return Ok(None),
            Some(SelectionKind::Fresh) => {}
            Some(SelectionKind::Broadened) => {
                tracing::debug!(
                    session_id = %session.id(),
                    topic,
                    difficulty = %wanted,
                    "no unused question at requested difficulty, broadened"
                );
            }
            Some(SelectionKind::Duplicate) => {
                tracing::warn!(
                    session_id = %session.id(),
                    topic,
                    difficulty = %wanted,
                    "every question of topic already served, repeating one"
                );
            }
        }
        Ok(session.current_question().cloned())
    }

    /// Whether the bank holds at least one question for `topic`.
    pub(crate) async fn has_questions(&self, topic: &str) -> Result<bool, AssessmentError> {
        Ok(!self.bank.candidates(topic, None).await?.is_empty())
    }
}
