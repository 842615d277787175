use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ChannelId;

type Slots = HashMap<ChannelId, Arc<AsyncMutex<()>>>;

/// Per-thread async locks. Discord offers no compare-and-swap on a thread's
/// tag set, so every read-modify-write of one thread goes through here.
#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    slots: Arc<Mutex<Slots>>,
}

/// Held while a thread is being worked on. Dropping it releases the thread
/// and forgets the slot once nobody else is waiting for it.
#[derive(Debug)]
pub struct ThreadGuard {
    id: ChannelId,
    slots: Arc<Mutex<Slots>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ThreadLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: ChannelId) -> ThreadGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(id).or_default())
        };
        let guard = slot.lock_owned().await;
        ThreadGuard {
            id,
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Number of threads currently locked or awaited.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map itself still references an idle slot.
        if slots
            .get(&self.id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.id);
        }
    }
}
