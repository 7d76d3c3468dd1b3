use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Async mutexes created per key on first use.
///
/// An entry is removed when its last guard drops and nobody else is waiting on it.
#[derive(Clone)]
pub(crate) struct KeyedLocks<K> {
    table: LockTable<K>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Waits for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: K) -> KeyedGuard<K> {
        let entry = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        let guard = entry.lock_owned().await;

        KeyedGuard {
            key,
            guard: Some(guard),
            table: self.table.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds one key of a [`KeyedLocks`] table.
pub(crate) struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable<K>,
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.guard.take();

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // waiters hold their own clone of the entry
        if table
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            table.remove(&self.key);
        }
    }
}
