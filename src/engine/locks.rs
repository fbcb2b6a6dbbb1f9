//! Per-entity mutation locks.
//!
//! One async mutex per `(kind, id)`, created on demand and dropped once no
//! guard or waiter holds it. Locks on different entities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::model::EntityKind;

/// Prune dead slots once the map grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

type Slot = AsyncMutex<()>;

/// Held for the duration of one mutation on one entity.
#[derive(Debug)]
pub struct EntityGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct LockRegistry {
    slots: Mutex<HashMap<(EntityKind, Uuid), Weak<Slot>>>,
}

impl LockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: EntityKind, id: Uuid) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.get(&(kind, id)).and_then(Weak::upgrade) {
            return slot;
        }

        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, weak| weak.strong_count() > 0);
        }

        let slot = Arc::new(AsyncMutex::new(()));
        slots.insert((kind, id), Arc::downgrade(&slot));
        slot
    }

    /// Wait for exclusive access to one entity.
    pub async fn acquire(&self, kind: EntityKind, id: Uuid) -> EntityGuard {
        EntityGuard {
            _guard: self.slot(kind, id).lock_owned().await,
        }
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
