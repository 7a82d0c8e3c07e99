use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, TopicResolution};
use crate::policy::AssessmentPolicy;

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// What the state machine wants after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Serve another question of this difficulty on the same topic.
    Ask(Difficulty),
    /// The topic is finished.
    Resolve(TopicResolution),
}

//
// ─── TOPIC STATE ───────────────────────────────────────────────────────────────
//

/// Per-topic adaptive state: counters, retry flags and the resolution once reached.
///
/// A topic opens at Medium. The first question has its own retry rule: missing
/// it sends the learner to Easy with one spare Easy attempt. After that, a miss
/// on Easy ends the topic as weak, Medium is the only way up to Hard, one Hard
/// miss drops back to Medium with `came_from_hard_failure` set, and a second Hard
/// miss ends the topic as needs-training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicState {
    question_count: u32,
    hard_failure_count: u32,
    came_from_hard_failure: bool,
    easy_retry_used: bool,
    is_first_question: bool,
    first_was_medium: bool,
    resolution: Option<TopicResolution>,
}

impl Default for TopicState {
    fn default() -> Self {
        Self {
            question_count: 0,
            hard_failure_count: 0,
            came_from_hard_failure: false,
            easy_retry_used: false,
            is_first_question: true,
            first_was_medium: false,
            resolution: None,
        }
    }
}

impl TopicState {
    /// The difficulty every topic opens with.
    pub const OPENING: Difficulty = Difficulty::Medium;

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn hard_failure_count(&self) -> u32 {
        self.hard_failure_count
    }

    #[must_use]
    pub fn came_from_hard_failure(&self) -> bool {
        self.came_from_hard_failure
    }

    #[must_use]
    pub fn easy_retry_used(&self) -> bool {
        self.easy_retry_used
    }

    #[must_use]
    pub fn is_first_question(&self) -> bool {
        self.is_first_question
    }

    #[must_use]
    pub fn resolution(&self) -> Option<TopicResolution> {
        self.resolution
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Feeds one answer into the state machine.
    ///
    /// `served` is the difficulty of the question that was actually answered,
    /// which can differ from the requested one when retrieval had to broaden.
    /// An already resolved topic keeps its resolution.
    pub fn record_answer(
        &mut self,
        served: Difficulty,
        correct: bool,
        policy: &AssessmentPolicy,
    ) -> Step {
        if let Some(resolution) = self.resolution {
            return Step::Resolve(resolution);
        }

        self.question_count = self.question_count.saturating_add(1);
        let (step, hard_retry) = self.transition(served, correct);

        let step = match step {
            Step::Ask(next)
                if self.question_count >= policy.max_questions_per_topic()
                    && !(next == Difficulty::Hard && hard_retry) =>
            {
                Step::Resolve(TopicResolution::CeilingReached)
            }
            other => other,
        };

        if let Step::Resolve(resolution) = step {
            self.resolution = Some(resolution);
        }
        step
    }

    /// Marks the topic finished from outside the state machine (nothing left to serve).
    pub fn force_resolve(&mut self, resolution: TopicResolution) -> TopicResolution {
        *self.resolution.get_or_insert(resolution)
    }

    /// Returns the next step and whether it is the Hard retry that may exceed the ceiling.
    fn transition(&mut self, served: Difficulty, correct: bool) -> (Step, bool) {
        if self.is_first_question {
            match served {
                Difficulty::Medium => {
                    self.first_was_medium = true;
                    if correct {
                        self.is_first_question = false;
                        return (Step::Ask(Difficulty::Hard), false);
                    }
                    return (Step::Ask(Difficulty::Easy), false);
                }
                Difficulty::Easy if self.first_was_medium => {
                    if correct {
                        self.is_first_question = false;
                        return (Step::Ask(Difficulty::Medium), false);
                    }
                    if !self.easy_retry_used {
                        self.easy_retry_used = true;
                        return (Step::Ask(Difficulty::Easy), false);
                    }
                    self.is_first_question = false;
                    return (Step::Resolve(TopicResolution::Weak), false);
                }
                _ => self.is_first_question = false,
            }
        }

        match (served, correct) {
            (Difficulty::Hard, true) => (Step::Resolve(TopicResolution::Passed), false),
            (Difficulty::Hard, false) => {
                self.hard_failure_count = self.hard_failure_count.saturating_add(1);
                if self.hard_failure_count >= 2 {
                    (Step::Resolve(TopicResolution::NeedsTraining), false)
                } else {
                    self.came_from_hard_failure = true;
                    (Step::Ask(Difficulty::Medium), false)
                }
            }
            (Difficulty::Medium, true) => {
                let hard_retry = std::mem::take(&mut self.came_from_hard_failure);
                (Step::Ask(Difficulty::Hard), hard_retry)
            }
            // A Medium miss keeps `came_from_hard_failure`: the Hard retry is still owed.
            (Difficulty::Medium, false) => (Step::Ask(Difficulty::Easy), false),
            (Difficulty::Easy, true) => (Step::Ask(Difficulty::Medium), false),
            (Difficulty::Easy, false) => (Step::Resolve(TopicResolution::Weak), false),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
