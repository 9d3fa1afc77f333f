use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A mutex per key (e.g. one staged file), so writers to different keys never wait on each other.
#[derive(Debug)]
pub struct KeyedMutex<K: Eq + Hash> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the lock for `key`; released when the guard is dropped.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Drops entries nobody holds or waits for.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// Clones share the same lock table.
impl<K: Eq + Hash> Clone for KeyedMutex<K> {
    fn clone(&self) -> Self {
        Self {
            locks: self.locks.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks: KeyedMutex<String> = KeyedMutex::new();
        let guard = locks.lock(&"a".to_string()).await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.lock(&"a".to_string()).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks: KeyedMutex<String> = KeyedMutex::new();
        let _a = locks.lock(&"a".to_string()).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(&"b".to_string())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_held_locks() {
        let locks: KeyedMutex<String> = KeyedMutex::new();
        let held = locks.lock(&"held".to_string()).await;
        drop(locks.lock(&"released".to_string()).await);
        assert_eq!(locks.len(), 2);

        locks.cleanup();
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.cleanup();
        assert!(locks.is_empty());
    }
}
