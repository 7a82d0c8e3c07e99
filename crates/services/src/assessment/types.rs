use assess_core::model::{AssessmentSummary, ChoiceLetter, Question, TopicResolution};

/// What the learner sees after answering an adaptive question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_choice: ChoiceLetter,
    pub explanation: String,
    pub next_action: NextAction,
}

/// Where the session goes after an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Same topic, another question.
    NextQuestion(Question),
    /// The topic ended and the next one starts with `question`.
    TopicTransition {
        completed: String,
        resolution: TopicResolution,
        next_topic: String,
        question: Question,
    },
    /// The topic ended on a second Hard miss and the next one starts with `question`.
    NeedsTrainingTopicComplete {
        topic: String,
        next_topic: String,
        question: Question,
    },
    /// No topic is left. The session has been recorded and cleared.
    SessionComplete(AssessmentSummary),
}

impl NextAction {
    /// The question to show next, if any.
    #[must_use]
    pub fn question(&self) -> Option<&Question> {
        match self {
            NextAction::NextQuestion(question)
            | NextAction::TopicTransition { question, .. }
            | NextAction::NeedsTrainingTopicComplete { question, .. } => Some(question),
            NextAction::SessionComplete(_) => None,
        }
    }
}
