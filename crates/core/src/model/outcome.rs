use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the adaptive run on a topic stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicResolution {
    /// Answered a Hard question correctly.
    Passed,
    /// Missed an Easy question with no retry left.
    Weak,
    /// Missed Hard twice. Authoritative, never re-classified by ratio.
    NeedsTraining,
    /// Hit the per-topic question ceiling.
    CeilingReached,
    /// The bank had nothing left to serve for the topic.
    Exhausted,
}

impl TopicResolution {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicResolution::Passed => "passed",
            TopicResolution::Weak => "weak",
            TopicResolution::NeedsTraining => "needs_training",
            TopicResolution::CeilingReached => "ceiling_reached",
            TopicResolution::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for TopicResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification of a topic once the session is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicOutcome {
    Passed,
    Weak,
    NeedsTraining,
}

/// The three disjoint topic lists produced at session completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub passed: Vec<String>,
    pub weak: Vec<String>,
    pub needs_training: Vec<String>,
}

impl AssessmentSummary {
    #[must_use]
    pub fn outcome_of(&self, topic: &str) -> Option<TopicOutcome> {
        if self.passed.iter().any(|t| t == topic) {
            Some(TopicOutcome::Passed)
        } else if self.weak.iter().any(|t| t == topic) {
            Some(TopicOutcome::Weak)
        } else if self.needs_training.iter().any(|t| t == topic) {
            Some(TopicOutcome::NeedsTraining)
        } else {
            None
        }
    }

    pub(crate) fn push(&mut self, topic: String, outcome: TopicOutcome) {
        match outcome {
            TopicOutcome::Passed => self.passed.push(topic),
            TopicOutcome::Weak => self.weak.push(topic),
            TopicOutcome::NeedsTraining => self.needs_training.push(topic),
        }
    }
}
