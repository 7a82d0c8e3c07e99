use std::sync::Arc;

use assess_core::model::{Recommendation, TestRecord, TopicPool, UserId};
use storage::repository::{
    QuestionBank, RecommendationRepository, ResultRepository, StorageError, TopicPoolRepository,
};

/// Read-only views over pools, past results, study material and the topic catalog.
#[derive(Clone)]
pub struct HistoryService {
    bank: Arc<dyn QuestionBank>,
    pools: Arc<dyn TopicPoolRepository>,
    results: Arc<dyn ResultRepository>,
    recommendations: Arc<dyn RecommendationRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        pools: Arc<dyn TopicPoolRepository>,
        results: Arc<dyn ResultRepository>,
        recommendations: Arc<dyn RecommendationRepository>,
    ) -> Self {
        Self {
            bank,
            pools,
            results,
            recommendations,
        }
    }

    /// Topics eligible for a Standard follow-up, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be read.
    pub async fn weak_topics(&self, user: UserId) -> Result<Vec<String>, StorageError> {
        self.pools.pool_topics(user, TopicPool::Weak).await
    }

    /// Topics eligible for an Advanced follow-up, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be read.
    pub async fn needs_training_topics(&self, user: UserId) -> Result<Vec<String>, StorageError> {
        self.pools.pool_topics(user, TopicPool::NeedsTraining).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be read.
    pub async fn recent_results(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestRecord>, StorageError> {
        self.results.recent_results(user, limit).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    pub async fn available_topics(&self) -> Result<Vec<String>, StorageError> {
        self.bank.list_topics().await
    }

    /// Study material for `topic`, looked up under its canonical name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the alias or recommendation table cannot be read.
    pub async fn recommendation(&self, topic: &str) -> Result<Option<Recommendation>, StorageError> {
        let canonical = self.bank.resolve_topic_alias(topic).await?;
        self.recommendations.recommendation_for(&canonical).await
    }

    /// Study material for each of `topics` that has any, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a lookup fails.
    pub async fn recommendations(
        &self,
        topics: &[String],
    ) -> Result<Vec<Recommendation>, StorageError> {
        let mut found = Vec::new();
        for topic in topics {
            if let Some(rec) = self.recommendation(topic).await? {
                found.push(rec);
            }
        }
        Ok(found)
    }
}
