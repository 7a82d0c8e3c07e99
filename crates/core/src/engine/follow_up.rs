use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{Difficulty, FollowUpKind, Question};

/// Number of questions in a follow-up test.
pub const FOLLOW_UP_LENGTH: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FollowUpBuildError {
    #[error("no questions available{}", at_level(.difficulty))]
    NoQuestions { difficulty: Option<Difficulty> },
}

fn at_level(difficulty: &Option<Difficulty>) -> String {
    difficulty.map(|d| format!(" at {d}")).unwrap_or_default()
}

/// Builds the question list for `kind` from every question of one topic.
///
/// # Errors
///
/// Returns `FollowUpBuildError::NoQuestions` when nothing eligible exists.
pub fn build<R: Rng + ?Sized>(
    kind: FollowUpKind,
    candidates: &[Question],
    rng: &mut R,
) -> Result<Vec<Question>, FollowUpBuildError> {
    match kind {
        FollowUpKind::Standard => build_standard(candidates, rng),
        FollowUpKind::Advanced => build_advanced(candidates, rng),
    }
}

/// One Easy, one Medium and one Hard question, in that order. A difficulty with
/// no unused question is skipped.
///
/// # Errors
///
/// Returns `FollowUpBuildError::NoQuestions` if every bucket is empty.
pub fn build_standard<R: Rng + ?Sized>(
    candidates: &[Question],
    rng: &mut R,
) -> Result<Vec<Question>, FollowUpBuildError> {
    let mut picked = Vec::with_capacity(FOLLOW_UP_LENGTH);
    let mut seen = BTreeSet::new();

    for difficulty in Difficulty::ALL {
        let bucket: Vec<&Question> = candidates
            .iter()
            .filter(|q| q.difficulty() == difficulty && !seen.contains(&q.content_hash()))
            .collect();
        if let Some(q) = bucket.choose(rng) {
            seen.insert(q.content_hash());
            picked.push((*q).clone());
        }
    }

    if picked.is_empty() {
        return Err(FollowUpBuildError::NoQuestions { difficulty: None });
    }
    Ok(picked)
}

/// Up to three distinct Hard questions in random order.
///
/// # Errors
///
/// Returns `FollowUpBuildError::NoQuestions` if the topic has no Hard question.
pub fn build_advanced<R: Rng + ?Sized>(
    candidates: &[Question],
    rng: &mut R,
) -> Result<Vec<Question>, FollowUpBuildError> {
    let mut seen = BTreeSet::new();
    let mut hard: Vec<Question> = candidates
        .iter()
        .filter(|q| q.difficulty() == Difficulty::Hard && seen.insert(q.content_hash()))
        .cloned()
        .collect();

    if hard.is_empty() {
        return Err(FollowUpBuildError::NoQuestions {
            difficulty: Some(Difficulty::Hard),
        });
    }
    hard.shuffle(rng);
    hard.truncate(FOLLOW_UP_LENGTH);
    Ok(hard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChoiceLetter;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn q(prompt: &str, difficulty: Difficulty) -> Question {
        let a = ChoiceLetter::parse("A").unwrap();
        let b = ChoiceLetter::parse("B").unwrap();
        Question::new(
            "Sorting Algorithms",
            difficulty,
            prompt,
            BTreeMap::from([(a, "n log n".to_string()), (b, "n^2".to_string())]),
            a,
            "",
        )
        .unwrap()
    }

    #[test]
    fn standard_orders_easy_medium_hard() {
        let bank = vec![
            q("h1", Difficulty::Hard),
            q("m1", Difficulty::Medium),
            q("e1", Difficulty::Easy),
            q("e2", Difficulty::Easy),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let built = build_standard(&bank, &mut rng).unwrap();
        let levels: Vec<_> = built.iter().map(Question::difficulty).collect();
        assert_eq!(levels, vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]);
    }

    #[test]
    fn standard_skips_empty_buckets() {
        let bank = vec![q("e1", Difficulty::Easy), q("h1", Difficulty::Hard)];
        let mut rng = StdRng::seed_from_u64(2);
        let built = build_standard(&bank, &mut rng).unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].difficulty(), Difficulty::Easy);
        assert_eq!(built[1].difficulty(), Difficulty::Hard);
    }

    #[test]
    fn advanced_takes_three_distinct_hard_questions() {
        let bank = vec![
            q("h1", Difficulty::Hard),
            q("h2", Difficulty::Hard),
            q("h2", Difficulty::Hard),
            q("h3", Difficulty::Hard),
            q("h4", Difficulty::Hard),
            q("m1", Difficulty::Medium),
        ];
        let mut rng = StdRng::seed_from_u64(4);
        let built = build_advanced(&bank, &mut rng).unwrap();
        assert_eq!(built.len(), FOLLOW_UP_LENGTH);
        assert!(built.iter().all(|q| q.difficulty() == Difficulty::Hard));
        let distinct: BTreeSet<_> = built.iter().map(Question::content_hash).collect();
        assert_eq!(distinct.len(), built.len());
    }

    #[test]
    fn empty_topic_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            build(FollowUpKind::Standard, &[], &mut rng).unwrap_err(),
            FollowUpBuildError::NoQuestions { difficulty: None }
        );
        let only_easy = vec![q("e1", Difficulty::Easy)];
        assert_eq!(
            build(FollowUpKind::Advanced, &only_easy, &mut rng).unwrap_err(),
            FollowUpBuildError::NoQuestions {
                difficulty: Some(Difficulty::Hard)
            }
        );
    }
}
