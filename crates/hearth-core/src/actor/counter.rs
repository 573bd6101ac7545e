//! Persisted counter cached in memory

use std::sync::Arc;

use crate::storage::RecordStore;
use crate::{Error, Result};

/// Record key holding the counter value
pub const COUNTER_KEY: &str = "value";

/// A single integer persisted under [`COUNTER_KEY`].
///
/// The cached value only changes after the store has committed the new one.
pub struct Counter {
    value: i64,
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("value", &self.value).finish()
    }
}

impl Counter {
    /// Load the persisted value, or start at zero
    pub async fn load(store: Arc<dyn RecordStore>) -> Result<Self> {
        let value = match store.get(COUNTER_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => 0,
        };
        Ok(Self { value, store })
    }

    /// The cached value
    pub fn value(&self) -> i64 {
        self.value
    }

    pub async fn increment(&mut self, amount: i64) -> Result<i64> {
        let next = self
            .value
            .checked_add(amount)
            .ok_or(Error::CounterOverflow {
                value: self.value,
                delta: amount,
            })?;
        self.persist(next).await
    }

    pub async fn decrement(&mut self, amount: i64) -> Result<i64> {
        let next = self
            .value
            .checked_sub(amount)
            .ok_or(Error::CounterOverflow {
                value: self.value,
                delta: amount.saturating_neg(),
            })?;
        self.persist(next).await
    }

    async fn persist(&mut self, next: i64) -> Result<i64> {
        let bytes = serde_json::to_vec(&next)?;
        self.store.put(COUNTER_KEY, &bytes).await?;
        tracing::debug!(previous = self.value, value = next, "Counter updated");
        self.value = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<BTreeMap<String, Vec<u8>>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }

        async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("store unavailable").into());
            }
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }
    }

    async fn persisted(store: &MemoryStore) -> Option<i64> {
        store
            .get(COUNTER_KEY)
            .await
            .unwrap()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_starts_at_zero() {
        let counter = Counter::load(Arc::new(MemoryStore::default())).await.unwrap();
        assert_eq!(counter.value(), 0);
    }

    #[tokio::test]
    async fn test_loads_existing_value() {
        let store = Arc::new(MemoryStore::default());
        store.put(COUNTER_KEY, b"41").await.unwrap();

        let counter = Counter::load(store).await.unwrap();
        assert_eq!(counter.value(), 41);
    }

    #[tokio::test]
    async fn test_increment_and_decrement_persist() {
        let store = Arc::new(MemoryStore::default());
        let mut counter = Counter::load(store.clone()).await.unwrap();

        assert_eq!(counter.increment(1).await.unwrap(), 1);
        assert_eq!(counter.increment(5).await.unwrap(), 6);
        assert_eq!(counter.decrement(2).await.unwrap(), 4);

        assert_eq!(counter.value(), 4);
        assert_eq!(persisted(&store).await, Some(4));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cached_value() {
        let store = Arc::new(MemoryStore::default());
        let mut counter = Counter::load(store.clone()).await.unwrap();
        counter.increment(3).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(counter.increment(1).await.is_err());

        assert_eq!(counter.value(), 3);
        assert_eq!(persisted(&store).await, Some(3));
    }

    #[tokio::test]
    async fn test_overflow_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        store
            .put(COUNTER_KEY, i64::MAX.to_string().as_bytes())
            .await
            .unwrap();
        let mut counter = Counter::load(store.clone()).await.unwrap();

        let err = counter.increment(1).await.unwrap_err();
        assert!(matches!(err, Error::CounterOverflow { .. }));
        assert_eq!(counter.value(), i64::MAX);
    }

    #[tokio::test]
    async fn test_corrupt_value_fails_load() {
        let store = Arc::new(MemoryStore::default());
        store.put(COUNTER_KEY, b"not a number").await.unwrap();

        let err = Counter::load(store).await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
