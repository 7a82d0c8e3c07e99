//! Question-set import in the `mcqs.json` layout:
//! `[{topic, difficulty, question, choices: {letter: text}, correct_answer, explanation}]`,
//! and study recommendations as `{topic: {youtube, resource}}`.

use assess_core::model::{ChoiceLetter, Difficulty, Question, Recommendation};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::repository::{QuestionCatalog, RecommendationRepository, StorageError};

/// Canonical topic names and the spellings found in imported question sets.
pub const DEFAULT_TOPIC_ALIASES: &[(&str, &[&str])] = &[
    (
        "Algorithm Analysis and Big-O Notation",
        &[
            "Big-O",
            "Algorithm Analysis",
            "Algorithmic Analysis",
            "Big O",
            "Big-O Notation",
        ],
    ),
    (
        "Array-Based Lists",
        &["Arrays", "Array", "Array-Based", "Array Based Lists"],
    ),
    ("Linked Lists", &["Linked List", "LinkedList", "LinkedLists"]),
    ("Stacks", &["Stack"]),
    ("Queues", &["Queue"]),
    ("Recursion", &["Recursive"]),
    (
        "Searching and Hashing",
        &["Hashing", "Hash", "Search", "Searching"],
    ),
    ("Binary Trees", &["Tree", "Trees", "Binary Tree"]),
    ("Graphs", &["Graph"]),
    ("Sorting Algorithms", &["Sorting", "Sort Algorithms", "Sort"]),
];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("invalid question file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("question #{index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: assess_core::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Deserialize)]
struct McqRecord {
    topic: String,
    difficulty: String,
    question: String,
    choices: BTreeMap<String, String>,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

impl McqRecord {
    fn into_question(self) -> Result<Question, assess_core::Error> {
        let difficulty: Difficulty = self.difficulty.parse()?;
        let mut choices = BTreeMap::new();
        for (letter, text) in self.choices {
            choices.insert(ChoiceLetter::parse(&letter)?, text);
        }
        let correct = ChoiceLetter::parse(&self.correct_answer)?;
        Ok(Question::new(
            self.topic.trim(),
            difficulty,
            self.question,
            choices,
            correct,
            self.explanation,
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct RecommendationRecord {
    #[serde(default)]
    youtube: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Parse and validate a question file. The first invalid entry aborts the parse.
///
/// # Errors
///
/// Returns `ImportError::Json` for malformed JSON and `ImportError::Question`
/// for an entry that is not a valid question.
pub fn parse_questions(json: &str) -> Result<Vec<Question>, ImportError> {
    let records: Vec<McqRecord> = serde_json::from_str(json)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_question()
                .map_err(|source| ImportError::Question { index, source })
        })
        .collect()
}

/// Store `questions`, counting the ones the catalog already had.
///
/// # Errors
///
/// Returns `ImportError::Storage` if a write fails.
pub async fn import_questions(
    catalog: &dyn QuestionCatalog,
    questions: &[Question],
) -> Result<ImportReport, ImportError> {
    let mut report = ImportReport::default();
    for question in questions {
        if catalog.insert_question(question).await? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
    }
    tracing::info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        "imported questions"
    );
    Ok(report)
}

/// Parse a recommendations file. Entries without any link are skipped.
///
/// # Errors
///
/// Returns `ImportError::Json` for malformed JSON.
pub fn parse_recommendations(json: &str) -> Result<Vec<Recommendation>, ImportError> {
    let records: BTreeMap<String, RecommendationRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|(topic, record)| Recommendation::new(topic, record.youtube, record.resource))
        .filter(|rec| !rec.topic().is_empty() && !rec.is_empty())
        .collect())
}

/// Store `recommendations`, replacing earlier entries for the same topic.
/// Returns the number written.
///
/// # Errors
///
/// Returns `ImportError::Storage` if a write fails.
pub async fn import_recommendations(
    repo: &dyn RecommendationRepository,
    recommendations: &[Recommendation],
) -> Result<usize, ImportError> {
    for recommendation in recommendations {
        repo.upsert_recommendation(recommendation).await?;
    }
    tracing::info!(written = recommendations.len(), "imported recommendations");
    Ok(recommendations.len())
}

/// Register [`DEFAULT_TOPIC_ALIASES`]. Returns the number of aliases written.
///
/// # Errors
///
/// Returns `ImportError::Storage` if a write fails.
pub async fn seed_default_aliases(catalog: &dyn QuestionCatalog) -> Result<usize, ImportError> {
    let mut written = 0;
    for (canonical, aliases) in DEFAULT_TOPIC_ALIASES {
        for alias in *aliases {
            catalog.upsert_alias(alias, canonical).await?;
            written += 1;
        }
    }
    Ok(written)
}
