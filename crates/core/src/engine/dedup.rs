use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Difficulty, Question, QuestionHash};

/// How a selected question relates to what was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// Unused question of the requested difficulty.
    Fresh,
    /// Unused question, but of another difficulty on the same topic.
    Broadened,
    /// Every candidate had been served already; a repeat was accepted.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub question: Question,
    pub kind: SelectionKind,
}

/// Content hashes already served in one session. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedQuestions(BTreeSet<QuestionHash>);

impl UsedQuestions {
    #[must_use]
    pub fn contains(&self, hash: &QuestionHash) -> bool {
        self.0.contains(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the hash was not yet recorded.
    pub fn record(&mut self, hash: QuestionHash) -> bool {
        self.0.insert(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionHash> {
        self.0.iter()
    }

    /// Picks a question for `wanted` out of every candidate of one topic and
    /// records its hash.
    ///
    /// Preference order: unused at the wanted difficulty, unused at any
    /// difficulty, then a repeat (at the wanted difficulty when one exists).
    /// Returns `None` only when `candidates` is empty.
    pub fn select<R: Rng + ?Sized>(
        &mut self,
        candidates: &[Question],
        wanted: Difficulty,
        rng: &mut R,
    ) -> Option<Selection> {
        let fresh: Vec<&Question> = candidates
            .iter()
            .filter(|q| !self.contains(&q.content_hash()))
            .collect();

        let at_wanted: Vec<&Question> = fresh
            .iter()
            .copied()
            .filter(|q| q.difficulty() == wanted)
            .collect();

        let (picked, kind) = if let Some(q) = at_wanted.choose(rng) {
            (*q, SelectionKind::Fresh)
        } else if let Some(q) = fresh.choose(rng) {
            (*q, SelectionKind::Broadened)
        } else {
            let repeats: Vec<&Question> = candidates
                .iter()
                .filter(|q| q.difficulty() == wanted)
                .collect();
            let q = repeats
                .choose(rng)
                .copied()
                .or_else(|| candidates.choose(rng))?;
            (q, SelectionKind::Duplicate)
        };

        self.record(picked.content_hash());
        Some(Selection {
            question: picked.clone(),
            kind,
        })
    }
}
