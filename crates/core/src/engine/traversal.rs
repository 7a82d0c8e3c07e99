use chrono::{DateTime, Utc};

use crate::engine::classifier;
use crate::error::SessionStateError;
use crate::model::{AssessmentSession, AssessmentSummary, SessionStatus, TopicResolution};
use crate::policy::AssessmentPolicy;

/// Where the session stands after a topic is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next topic is now current and starts fresh at Medium.
    Next(String),
    /// No topic was left; the session is completed and classified.
    Finished(AssessmentSummary),
}

impl AssessmentSession {
    #[must_use]
    pub fn current_topic(&self) -> Option<&str> {
        self.remaining_topics.front().map(String::as_str)
    }

    /// Moves the current topic to the completed list, records `resolution` on
    /// it unless the state machine already resolved it, and moves on.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the session is finished or has no current topic.
    pub fn resolve_current_topic(
        &mut self,
        resolution: TopicResolution,
        now: DateTime<Utc>,
        policy: &AssessmentPolicy,
    ) -> Result<Advance, SessionStateError> {
        self.ensure_active()?;
        let topic = self
            .remaining_topics
            .pop_front()
            .ok_or(SessionStateError::NoCurrentTopic)?;

        self.topic_states
            .entry(topic.clone())
            .or_default()
            .force_resolve(resolution);
        self.completed_topics.push(topic);
        self.current_question = None;

        if let Some(next) = self.remaining_topics.front() {
            return Ok(Advance::Next(next.clone()));
        }

        let summary =
            classifier::classify(&self.topics, &self.topic_states, &self.answer_log, policy);
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.summary = Some(summary.clone());
        Ok(Advance::Finished(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionId, UserId};
    use crate::time::fixed_now;

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
    fn queue_shrinks_by_one_per_resolution() {
        let policy = AssessmentPolicy::default();
        let mut s = session(&["Stacks", "Queues", "Graphs"]);
        assert_eq!(s.current_topic(), Some("Stacks"));

        let step = s
            .resolve_current_topic(TopicResolution::Passed, fixed_now(), &policy)
            .unwrap();
        assert_eq!(step, Advance::Next("Queues".to_string()));
        assert_eq!(s.remaining_topics().count(), 2);
        assert_eq!(s.completed_topics(), ["Stacks".to_string()]);
        assert!(!s.remaining_topics().any(|t| t == "Stacks"));
    }

    #[test]
    fn last_resolution_completes_and_classifies() {
        let policy = AssessmentPolicy::default();
        let mut s = session(&["Stacks"]);
        let step = s
            .resolve_current_topic(TopicResolution::NeedsTraining, fixed_now(), &policy)
            .unwrap();

        let Advance::Finished(summary) = step else {
            panic!("expected session to finish");
        };
        assert_eq!(summary.needs_training, vec!["Stacks".to_string()]);
        assert!(s.is_completed());
        assert_eq!(s.completed_at(), Some(fixed_now()));
        assert_eq!(s.current_topic(), None);
        assert_eq!(s.summary(), Some(&summary));

        let err = s
            .resolve_current_topic(TopicResolution::Passed, fixed_now(), &policy)
            .unwrap_err();
        assert_eq!(err, SessionStateError::NotActive);
    }

    #[test]
    fn earlier_state_machine_resolution_wins() {
        let policy = AssessmentPolicy::default();
        let mut s = session(&["Stacks", "Queues"]);
        s.topic_states
            .get_mut("Stacks")
            .unwrap()
            .force_resolve(TopicResolution::Weak);
        s.resolve_current_topic(TopicResolution::Exhausted, fixed_now(), &policy)
            .unwrap();
        assert_eq!(
            s.topic_state("Stacks").unwrap().resolution(),
            Some(TopicResolution::Weak)
        );
    }
}
