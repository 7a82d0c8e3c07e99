use assess_core::model::{
    ActiveSession, Difficulty, Question, Recommendation, TestRecord, TopicPool, UserId,
};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read side of the question bank.
///
/// Topic names are canonical after `resolve_topic_alias`; `candidates` also
/// returns questions stored under any alias of the topic, re-filed under the
/// canonical name.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Map a user-supplied topic name to its canonical spelling. Unknown names
    /// come back trimmed but otherwise unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the alias table cannot be read.
    async fn resolve_topic_alias(&self, name: &str) -> Result<String, StorageError>;

    /// Every question of `topic`, optionally restricted to one difficulty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn candidates(
        &self,
        topic: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Question>, StorageError>;

    /// One uniformly random question of `topic` at `difficulty`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn random_question(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Option<Question>, StorageError> {
        let candidates = self.candidates(topic, Some(difficulty)).await?;
        Ok(candidates.choose(&mut rand::rng()).cloned())
    }

    /// Canonical topics that have at least one question, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn list_topics(&self) -> Result<Vec<String>, StorageError>;
}

/// Write side of the question bank, used by importers.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Store a question. Returns `false` if an identical question already exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: &Question) -> Result<bool, StorageError>;

    /// Register `alias` (matched case-insensitively) as another name for `canonical`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the alias cannot be stored.
    async fn upsert_alias(&self, alias: &str, canonical: &str) -> Result<(), StorageError>;
}

/// One active session record per learner.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record is unreadable.
    async fn load(&self, user: UserId) -> Result<Option<ActiveSession>, StorageError>;

    /// Replace the learner's record as a whole.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn save(&self, user: UserId, session: &ActiveSession) -> Result<(), StorageError>;

    /// Remove the learner's record. Clearing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn clear(&self, user: UserId) -> Result<(), StorageError>;
}

/// Per-learner weak and needs-training topic lists, in insertion order.
#[async_trait]
pub trait TopicPoolRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be read.
    async fn pool_topics(&self, user: UserId, pool: TopicPool)
    -> Result<Vec<String>, StorageError>;

    /// Adding a topic already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be written.
    async fn add_to_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<(), StorageError>;

    /// Returns `true` if the topic was present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be written.
    async fn remove_from_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<bool, StorageError>;
}

/// Append-only test history.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_result(&self, record: &TestRecord) -> Result<i64, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if history cannot be read or a row is invalid.
    async fn recent_results(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestRecord>, StorageError>;
}

/// Study material per topic.
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// Insert or replace the entry for the recommendation's topic
    /// (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn upsert_recommendation(&self, recommendation: &Recommendation)
    -> Result<(), StorageError>;

    /// The entry for canonical `topic`, also found when it was stored under one
    /// of the topic's aliases. The result is re-filed under `topic`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the table cannot be read.
    async fn recommendation_for(
        &self,
        topic: &str,
    ) -> Result<Option<Recommendation>, StorageError>;
}

/// Writes that finish a session: history, pool updates and clearing the
/// active record happen together or not at all.
#[async_trait]
pub trait CompletionPersistence: Send + Sync {
    /// Append the assessment result, add its weak and needs-training topics to
    /// the learner's pools and clear the active session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is persisted then.
    async fn complete_assessment(&self, record: &TestRecord) -> Result<i64, StorageError>;

    /// Append the follow-up result, then remove `topic` from `pool` when
    /// `improved` or make sure it is present otherwise, and clear the active
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is persisted then.
    async fn complete_follow_up(
        &self,
        record: &TestRecord,
        pool: TopicPool,
        topic: &str,
        improved: bool,
    ) -> Result<i64, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Vec<Question>>>,
    aliases: Arc<Mutex<HashMap<String, String>>>,
    sessions: Arc<Mutex<HashMap<UserId, ActiveSession>>>,
    pools: Arc<Mutex<HashMap<(UserId, TopicPool), Vec<String>>>>,
    results: Arc<Mutex<Vec<TestRecord>>>,
    recommendations: Arc<Mutex<Vec<Recommendation>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical_of(aliases: &HashMap<String, String>, name: &str) -> Option<String> {
        aliases.get(&name.trim().to_lowercase()).cloned()
    }

    fn append_locked(results: &mut Vec<TestRecord>, record: &TestRecord) -> i64 {
        results.push(record.clone());
        i64::try_from(results.len()).unwrap_or(i64::MAX)
    }

    fn add_locked(
        pools: &mut HashMap<(UserId, TopicPool), Vec<String>>,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) {
        let topics = pools.entry((user, pool)).or_default();
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_owned());
        }
    }

    fn remove_locked(
        pools: &mut HashMap<(UserId, TopicPool), Vec<String>>,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> bool {
        let Some(topics) = pools.get_mut(&(user, pool)) else {
            return false;
        };
        let before = topics.len();
        topics.retain(|t| t != topic);
        topics.len() != before
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn resolve_topic_alias(&self, name: &str) -> Result<String, StorageError> {
        let trimmed = name.trim();
        if let Some(canonical) = Self::canonical_of(&*lock(&self.aliases)?, trimmed) {
            return Ok(canonical);
        }
        let questions = lock(&self.questions)?;
        Ok(questions
            .iter()
            .map(Question::topic)
            .find(|t| t.eq_ignore_ascii_case(trimmed))
            .unwrap_or(trimmed)
            .to_owned())
    }

    async fn candidates(
        &self,
        topic: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Question>, StorageError> {
        let aliases = lock(&self.aliases)?;
        let questions = lock(&self.questions)?;
        Ok(questions
            .iter()
            .filter(|q| difficulty.is_none_or(|d| q.difficulty() == d))
            .filter(|q| {
                q.topic().eq_ignore_ascii_case(topic)
                    || Self::canonical_of(&aliases, q.topic()).as_deref() == Some(topic)
            })
            .map(|q| q.clone().with_topic(topic))
            .collect())
    }

    async fn list_topics(&self) -> Result<Vec<String>, StorageError> {
        let aliases = lock(&self.aliases)?;
        let questions = lock(&self.questions)?;
        let topics: BTreeSet<String> = questions
            .iter()
            .map(|q| Self::canonical_of(&aliases, q.topic()).unwrap_or_else(|| q.topic().to_owned()))
            .collect();
        Ok(topics.into_iter().collect())
    }
}

#[async_trait]
impl QuestionCatalog for InMemoryRepository {
    async fn insert_question(&self, question: &Question) -> Result<bool, StorageError> {
        let mut questions = lock(&self.questions)?;
        let hash = question.content_hash();
        if questions
            .iter()
            .any(|q| q.topic() == question.topic() && q.content_hash() == hash)
        {
            return Ok(false);
        }
        questions.push(question.clone());
        Ok(true)
    }

    async fn upsert_alias(&self, alias: &str, canonical: &str) -> Result<(), StorageError> {
        lock(&self.aliases)?.insert(alias.trim().to_lowercase(), canonical.trim().to_owned());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn load(&self, user: UserId) -> Result<Option<ActiveSession>, StorageError> {
        Ok(lock(&self.sessions)?.get(&user).cloned())
    }

    async fn save(&self, user: UserId, session: &ActiveSession) -> Result<(), StorageError> {
        if session.user_id() != user {
            return Err(StorageError::Conflict);
        }
        lock(&self.sessions)?.insert(user, session.clone());
        Ok(())
    }

    async fn clear(&self, user: UserId) -> Result<(), StorageError> {
        lock(&self.sessions)?.remove(&user);
        Ok(())
    }
}

#[async_trait]
impl TopicPoolRepository for InMemoryRepository {
    async fn pool_topics(
        &self,
        user: UserId,
        pool: TopicPool,
    ) -> Result<Vec<String>, StorageError> {
        Ok(lock(&self.pools)?
            .get(&(user, pool))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_to_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<(), StorageError> {
        Self::add_locked(&mut *lock(&self.pools)?, user, pool, topic);
        Ok(())
    }

    async fn remove_from_pool(
        &self,
        user: UserId,
        pool: TopicPool,
        topic: &str,
    ) -> Result<bool, StorageError> {
        Ok(Self::remove_locked(&mut *lock(&self.pools)?, user, pool, topic))
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, record: &TestRecord) -> Result<i64, StorageError> {
        Ok(Self::append_locked(&mut *lock(&self.results)?, record))
    }

    async fn recent_results(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestRecord>, StorageError> {
        let results = lock(&self.results)?;
        Ok(results
            .iter()
            .rev()
            .filter(|r| r.user_id() == user)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecommendationRepository for InMemoryRepository {
    async fn upsert_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<(), StorageError> {
        let mut entries = lock(&self.recommendations)?;
        entries.retain(|r| !r.topic().eq_ignore_ascii_case(recommendation.topic()));
        entries.push(recommendation.clone());
        Ok(())
    }

    async fn recommendation_for(
        &self,
        topic: &str,
    ) -> Result<Option<Recommendation>, StorageError> {
        let aliases = lock(&self.aliases)?;
        let entries = lock(&self.recommendations)?;
        let found = entries
            .iter()
            .find(|r| r.topic().eq_ignore_ascii_case(topic))
            .or_else(|| {
                entries
                    .iter()
                    .find(|r| Self::canonical_of(&aliases, r.topic()).as_deref() == Some(topic))
            });
        Ok(found.map(|r| r.clone().with_topic(topic)))
    }
}

#[async_trait]
impl CompletionPersistence for InMemoryRepository {
    async fn complete_assessment(&self, record: &TestRecord) -> Result<i64, StorageError> {
        let mut sessions = lock(&self.sessions)?;
        let mut pools = lock(&self.pools)?;
        let mut results = lock(&self.results)?;

        let user = record.user_id();
        for topic in &record.outcome().weak {
            Self::add_locked(&mut pools, user, TopicPool::Weak, topic);
        }
        for topic in &record.outcome().needs_training {
            Self::add_locked(&mut pools, user, TopicPool::NeedsTraining, topic);
        }
        sessions.remove(&user);
        Ok(Self::append_locked(&mut results, record))
    }

    async fn complete_follow_up(
        &self,
        record: &TestRecord,
        pool: TopicPool,
        topic: &str,
        improved: bool,
    ) -> Result<i64, StorageError> {
        let mut sessions = lock(&self.sessions)?;
        let mut pools = lock(&self.pools)?;
        let mut results = lock(&self.results)?;

        let user = record.user_id();
        if improved {
            Self::remove_locked(&mut pools, user, pool, topic);
        } else {
            Self::add_locked(&mut pools, user, pool, topic);
        }
        sessions.remove(&user);
        Ok(Self::append_locked(&mut results, record))
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionBank>,
    pub catalog: Arc<dyn QuestionCatalog>,
    pub sessions: Arc<dyn SessionStore>,
    pub pools: Arc<dyn TopicPoolRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub completions: Arc<dyn CompletionPersistence>,
    pub recommendations: Arc<dyn RecommendationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every contract to the same repository value.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuestionBank
            + QuestionCatalog
            + SessionStore
            + TopicPoolRepository
            + ResultRepository
            + CompletionPersistence
            + RecommendationRepository
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            catalog: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            pools: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            completions: Arc::new(repo.clone()),
            recommendations: Arc::new(repo),
        }
    }
}
