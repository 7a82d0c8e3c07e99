use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use assess_core::model::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = HashMap<UserId, Arc<Mutex<()>>>;

/// One async mutex per learner.
///
/// Every operation that reads and then rewrites a learner's session holds the
/// guard from `lock` for the whole load, compute and save sequence, so two
/// answers from the same learner can never interleave. Distinct learners never
/// contend.
///
/// A learner's slot lives only while someone holds or waits for it; the last
/// guard to drop removes it.
#[derive(Debug, Default)]
pub struct UserLocks {
    slots: Arc<StdMutex<Slots>>,
}

/// Exclusive access to one learner's session until dropped.
#[derive(Debug)]
pub struct UserGuard {
    user: UserId,
    slots: Arc<StdMutex<Slots>>,
    slot: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

fn slots_of(slots: &StdMutex<Slots>) -> StdMutexGuard<'_, Slots> {
    // Map updates are single calls, so a poisoned map is still consistent.
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UserLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user`'s session.
    pub async fn lock(&self, user: UserId) -> UserGuard {
        let slot = Arc::clone(slots_of(&self.slots).entry(user).or_default());
        let guard = Arc::clone(&slot).lock_owned().await;
        UserGuard {
            user,
            slots: Arc::clone(&self.slots),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of learners currently holding or waiting for a lock.
    #[must_use]
    pub fn tracked(&self) -> usize {
        slots_of(&self.slots).len()
    }
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = slots_of(&self.slots);
        // One reference in the map and one here: nobody else is waiting.
        let idle = slots
            .get(&self.user)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
            && Arc::strong_count(&self.slot) == 2;
        if idle {
            slots.remove(&self.user);
        }
    }
}
