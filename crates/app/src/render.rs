use assess_core::model::{AssessmentSummary, Question, Recommendation, SessionProgress, TestRecord};
use services::{AnswerResult, FollowUpAnswerResult, NextAction};

pub fn question(q: &Question) {
    println!("[{} · {}]", q.topic(), q.difficulty());
    println!("{}", q.prompt());
    for (letter, text) in q.choices() {
        println!("  {letter}) {text}");
    }
}

fn verdict(correct: bool, choice: impl std::fmt::Display, explanation: &str) {
    if correct {
        println!("Correct.");
    } else {
        println!("Incorrect. The answer was {choice}.");
    }
    if !explanation.is_empty() {
        println!("{explanation}");
    }
    println!();
}

pub fn summary(summary: &AssessmentSummary) {
    println!("Assessment complete.");
    let lists = [
        ("Passed", &summary.passed),
        ("Weak", &summary.weak),
        ("Needs training", &summary.needs_training),
    ];
    for (label, topics) in lists {
        if !topics.is_empty() {
            println!("  {label}: {}", topics.join(", "));
        }
    }
}

pub fn answer(result: &AnswerResult) {
    verdict(result.correct, result.correct_choice, &result.explanation);
    match &result.next_action {
        NextAction::NextQuestion(next) => question(next),
        NextAction::TopicTransition {
            completed,
            resolution,
            next_topic,
            question: next,
        } => {
            println!("{completed}: {resolution}. Moving on to {next_topic}.");
            println!();
            question(next);
        }
        NextAction::NeedsTrainingTopicComplete {
            topic,
            next_topic,
            question: next,
        } => {
            println!("{topic} needs more practice on hard questions. Moving on to {next_topic}.");
            println!();
            question(next);
        }
        NextAction::SessionComplete(outcome) => summary(outcome),
    }
}

fn recommendation_lines(rec: &Recommendation) -> Vec<String> {
    let mut lines = vec![format!("Recommended resources for {}:", rec.topic())];
    if let Some(url) = rec.video_url() {
        lines.push(format!("  Video tutorial: {url}"));
    }
    if let Some(url) = rec.resource_url() {
        lines.push(format!("  Reading material: {url}"));
    }
    lines
}

pub fn recommendations(recommendations: &[Recommendation]) {
    for rec in recommendations {
        println!();
        for line in recommendation_lines(rec) {
            println!("{line}");
        }
    }
}

pub fn follow_up_answer(result: &FollowUpAnswerResult) {
    verdict(result.correct, result.correct_choice, &result.explanation);
    let (correct, total) = result.score;
    match (&result.next_question, result.improved) {
        (Some(next), _) => question(next),
        (None, Some(true)) => println!("Follow-up complete: {correct}/{total}. Topic cleared."),
        (None, _) => println!("Follow-up complete: {correct}/{total}. Keep practising."),
    }
}

pub fn progress(progress: &SessionProgress) {
    println!(
        "Topics: {}/{} done{}",
        progress.topics_completed,
        progress.topics_total,
        progress
            .current_topic
            .as_deref()
            .map(|t| format!(", now on {t}"))
            .unwrap_or_default()
    );
    println!(
        "Answers: {} correct of {} ({} on this topic)",
        progress.correct_answers, progress.questions_answered, progress.questions_on_topic
    );
}

pub fn history(records: &[TestRecord]) {
    if records.is_empty() {
        println!("No results yet.");
        return;
    }
    for record in records {
        println!(
            "{}  {:<18} {}/{} ({:.0}%)  {}",
            record.completed_at().format("%Y-%m-%d %H:%M"),
            record.kind().as_str(),
            record.correct(),
            record.total(),
            record.percentage(),
            record.topics().join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_lists_only_present_links() {
        let rec = Recommendation::new(
            "Graphs",
            None,
            Some("https://docs.example/graphs".to_string()),
        );
        assert_eq!(
            recommendation_lines(&rec),
            vec![
                "Recommended resources for Graphs:".to_string(),
                "  Reading material: https://docs.example/graphs".to_string(),
            ]
        );
    }
}
