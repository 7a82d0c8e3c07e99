use std::sync::Arc;

use assess_core::AssessmentPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::assessment::AdaptiveAssessmentService;
use crate::error::AppServicesError;
use crate::follow_up::FollowUpService;
use crate::history::HistoryService;
use crate::locks::UserLocks;

/// Assembles app-facing services over one storage backend.
///
/// The adaptive and follow-up services share one set of per-learner locks,
/// since both write the same session slot.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    assessment: Arc<AdaptiveAssessmentService>,
    follow_up: Arc<FollowUpService>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        policy: AssessmentPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, policy))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock, AssessmentPolicy::default())
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, policy: AssessmentPolicy) -> Self {
        let locks = Arc::new(UserLocks::new());

        let assessment = AdaptiveAssessmentService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.completions),
        )
        .with_policy(policy.clone())
        .with_locks(Arc::clone(&locks));

        let follow_up = FollowUpService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.pools),
            Arc::clone(&storage.completions),
        )
        .with_policy(policy)
        .with_locks(locks);

        let history = HistoryService::new(
            Arc::clone(&storage.questions),
            Arc::clone(&storage.pools),
            Arc::clone(&storage.results),
            Arc::clone(&storage.recommendations),
        );

        Self {
            storage,
            assessment: Arc::new(assessment),
            follow_up: Arc::new(follow_up),
            history: Arc::new(history),
        }
    }

    /// The underlying repositories, for importers and tooling.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn assessment(&self) -> Arc<AdaptiveAssessmentService> {
        Arc::clone(&self.assessment)
    }

    #[must_use]
    pub fn follow_up(&self) -> Arc<FollowUpService> {
        Arc::clone(&self.follow_up)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }
}
