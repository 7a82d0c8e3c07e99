use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::model::difficulty::Difficulty;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,
    #[error("question needs at least two choices, got {0}")]
    TooFewChoices(usize),
    #[error("invalid choice letter: {0:?}")]
    InvalidLetter(String),
    #[error("correct choice {0} is not one of the choices")]
    CorrectChoiceMissing(ChoiceLetter),
}

/// The learner's answer could not be matched to a choice of the current question.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("answer {raw:?} is not a valid choice (expected one of {expected})")]
    InvalidFormat { raw: String, expected: String },
}

//
// ─── CHOICE LETTER ─────────────────────────────────────────────────────────────
//

/// Upper-case letter labelling a multiple-choice option (`A`, `B`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChoiceLetter(char);

impl ChoiceLetter {
    /// Parses a single ASCII letter, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidLetter` for anything that is not exactly one letter.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(Self(c.to_ascii_uppercase())),
            _ => Err(QuestionError::InvalidLetter(raw.to_owned())),
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<String> for ChoiceLetter {
    type Error = QuestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChoiceLetter> for String {
    fn from(value: ChoiceLetter) -> Self {
        value.0.to_string()
    }
}

impl fmt::Debug for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceLetter({})", self.0)
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── QUESTION HASH ─────────────────────────────────────────────────────────────
//

/// Stable content hash identifying a question for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionHash(String);

impl QuestionHash {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Immutable multiple-choice question served by the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    topic: String,
    difficulty: Difficulty,
    prompt: String,
    choices: BTreeMap<ChoiceLetter, String>,
    correct_choice: ChoiceLetter,
    explanation: String,
}

impl Question {
    /// Builds a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two choices are
    /// given, or the correct choice is not among them.
    pub fn new(
        topic: impl Into<String>,
        difficulty: Difficulty,
        prompt: impl Into<String>,
        choices: BTreeMap<ChoiceLetter, String>,
        correct_choice: ChoiceLetter,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if choices.len() < 2 {
            return Err(QuestionError::TooFewChoices(choices.len()));
        }
        if !choices.contains_key(&correct_choice) {
            return Err(QuestionError::CorrectChoiceMissing(correct_choice));
        }

        Ok(Self {
            topic: topic.into(),
            difficulty,
            prompt,
            choices,
            correct_choice,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &BTreeMap<ChoiceLetter, String> {
        &self.choices
    }

    #[must_use]
    pub fn correct_choice(&self) -> ChoiceLetter {
        self.correct_choice
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Returns a copy filed under `topic`, used when an alias-named question is
    /// served for its canonical topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Content hash over prompt, correct choice and the sorted choices.
    ///
    /// Topic and difficulty are deliberately left out so the same question
    /// imported under two topic spellings is still recognised as a repeat.
    /// Every field is length-prefixed, so text containing separators cannot
    /// make two different questions collide.
    #[must_use]
    pub fn content_hash(&self) -> QuestionHash {
        fn field(hasher: &mut Sha256, bytes: &[u8]) {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }

        let mut hasher = Sha256::new();
        field(&mut hasher, self.prompt.as_bytes());
        field(&mut hasher, self.correct_choice.to_string().as_bytes());
        hasher.update((self.choices.len() as u64).to_be_bytes());
        for (letter, text) in &self.choices {
            field(&mut hasher, letter.to_string().as_bytes());
            field(&mut hasher, text.as_bytes());
        }
        QuestionHash(hex::encode(hasher.finalize()))
    }

    /// Matches a raw answer against this question's choices.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::InvalidFormat` if the answer is not one of the choice letters.
    pub fn parse_answer(&self, raw: &str) -> Result<ChoiceLetter, AnswerError> {
        ChoiceLetter::parse(raw)
            .ok()
            .filter(|letter| self.choices.contains_key(letter))
            .ok_or_else(|| AnswerError::InvalidFormat {
                raw: raw.to_owned(),
                expected: self
                    .choices
                    .keys()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    #[must_use]
    pub fn is_correct(&self, answer: ChoiceLetter) -> bool {
        answer == self.correct_choice
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: &str) -> ChoiceLetter {
        ChoiceLetter::parse(c).unwrap()
    }

    fn choices() -> BTreeMap<ChoiceLetter, String> {
        BTreeMap::from([
            (letter("A"), "push".to_string()),
            (letter("B"), "pop".to_string()),
            (letter("C"), "peek".to_string()),
        ])
    }

    fn build(prompt: &str) -> Question {
        Question::new(
            "Stacks",
            Difficulty::Medium,
            prompt,
            choices(),
            letter("B"),
            "pop removes the top",
        )
        .unwrap()
    }

    #[test]
    fn rejects_blank_prompt_and_missing_correct_choice() {
        let err = Question::new("Stacks", Difficulty::Easy, "  ", choices(), letter("A"), "")
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyPrompt);

        let err = Question::new("Stacks", Difficulty::Easy, "Q", choices(), letter("D"), "")
            .unwrap_err();
        assert_eq!(err, QuestionError::CorrectChoiceMissing(letter("D")));
    }

    #[test]
    fn rejects_single_choice() {
        let one = BTreeMap::from([(letter("A"), "only".to_string())]);
        let err = Question::new("Stacks", Difficulty::Easy, "Q", one, letter("A"), "")
            .unwrap_err();
        assert_eq!(err, QuestionError::TooFewChoices(1));
    }

    #[test]
    fn hash_ignores_topic_and_difficulty_but_not_content() {
        let q = build("Which operation removes the top element?");
        let renamed = q.clone().with_topic("Stack");
        assert_eq!(q.content_hash(), renamed.content_hash());

        let other = build("Which operation inspects the top element?");
        assert_ne!(q.content_hash(), other.content_hash());
        assert_eq!(q.content_hash().as_str().len(), 64);
    }

    #[test]
    fn separators_inside_choice_text_do_not_collide() {
        let with = |choices: BTreeMap<ChoiceLetter, String>| {
            Question::new("Stacks", Difficulty::Easy, "Pick one", choices, letter("C"), "")
                .unwrap()
        };
        let merged = with(BTreeMap::from([
            (letter("A"), "x;B=y".to_string()),
            (letter("C"), "z".to_string()),
        ]));
        let split = with(BTreeMap::from([
            (letter("A"), "x".to_string()),
            (letter("B"), "y".to_string()),
            (letter("C"), "z".to_string()),
        ]));
        assert_ne!(merged.content_hash(), split.content_hash());

        let shifted = Question::new(
            "Stacks",
            Difficulty::Easy,
            "Pick one|C",
            BTreeMap::from([(letter("A"), "x".to_string()), (letter("C"), "z".to_string())]),
            letter("A"),
            "",
        )
        .unwrap();
        let plain = Question::new(
            "Stacks",
            Difficulty::Easy,
            "Pick one",
            BTreeMap::from([(letter("A"), "x".to_string()), (letter("C"), "z".to_string())]),
            letter("A"),
            "",
        )
        .unwrap();
        assert_ne!(shifted.content_hash(), plain.content_hash());
    }

    #[test]
    fn parse_answer_accepts_lowercase_and_rejects_unknown_letters() {
        let q = build("Q");
        assert_eq!(q.parse_answer(" b ").unwrap(), letter("B"));
        assert!(q.is_correct(letter("B")));

        let err = q.parse_answer("D").unwrap_err();
        assert_eq!(
            err,
            AnswerError::InvalidFormat {
                raw: "D".into(),
                expected: "A, B, C".into()
            }
        );
        assert!(q.parse_answer("AB").is_err());
    }

    #[test]
    fn serializes_choices_as_letter_keyed_map() {
        let q = build("Q");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["choices"]["A"], "push");
        assert_eq!(json["correct_choice"], "B");

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }
}
