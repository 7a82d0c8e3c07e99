use std::collections::BTreeMap;

use crate::engine::TopicState;
use crate::model::{AnswerRecord, AssessmentSummary, TopicOutcome, TopicResolution};
use crate::policy::AssessmentPolicy;

/// Final outcome of one topic.
///
/// A needs-training resolution stands as is. Everything else is judged on the
/// share of correct answers; a topic nobody answered counts as weak.
#[must_use]
pub fn topic_outcome(
    resolution: Option<TopicResolution>,
    correct: usize,
    total: usize,
    policy: &AssessmentPolicy,
) -> TopicOutcome {
    if resolution == Some(TopicResolution::NeedsTraining) {
        return TopicOutcome::NeedsTraining;
    }
    if total == 0 {
        return TopicOutcome::Weak;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = correct as f64 / total as f64;
    if ratio < policy.weak_ratio_threshold() {
        TopicOutcome::Weak
    } else {
        TopicOutcome::Passed
    }
}

/// Splits `topics` into passed, weak and needs-training, keeping their order.
#[must_use]
pub fn classify(
    topics: &[String],
    states: &BTreeMap<String, TopicState>,
    answers: &[AnswerRecord],
    policy: &AssessmentPolicy,
) -> AssessmentSummary {
    let mut summary = AssessmentSummary::default();
    for topic in topics {
        let (correct, total) = answers
            .iter()
            .filter(|a| &a.topic == topic)
            .fold((0, 0), |(c, t), a| (c + usize::from(a.correct), t + 1));
        let resolution = states.get(topic).and_then(TopicState::resolution);
        summary.push(topic.clone(), topic_outcome(resolution, correct, total, policy));
    }
    summary
}
