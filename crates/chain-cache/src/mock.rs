//! In-memory [`Cache`] for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{CacheError, Result};
use crate::{Bytes, Cache};

/// Thread-safe in-memory cache used by fetcher/syncer unit tests so they
/// don't need a real filesystem.
#[derive(Debug, Default)]
pub struct MockCache {
    entries: Mutex<BTreeMap<(u32, u64), Bytes>>,
    checkpoints: Mutex<BTreeMap<u32, u64>>,
}

impl MockCache {
    /// Create an empty mock cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently cached, for assertions like "zero RPC
    /// calls were needed" in fetcher tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the mock cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Cache for MockCache {
    async fn put(&self, chain_id: u32, height: u64, bytes: Bytes) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((chain_id, height), bytes);
        Ok(())
    }

    async fn get(&self, chain_id: u32, height: u64) -> Option<Bytes> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(chain_id, height))
            .cloned()
    }

    async fn get_range(&self, chain_id: u32, from: u64, to: u64) -> BTreeMap<u64, Bytes> {
        if from > to {
            return BTreeMap::new();
        }
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|((c, h), _)| *c == chain_id && *h >= from && *h <= to)
            .map(|((_, h), bytes)| (*h, bytes.clone()))
            .collect()
    }

    async fn get_checkpoint(&self, chain_id: u32) -> u64 {
        self.checkpoints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&chain_id)
            .copied()
            .unwrap_or(0)
    }

    async fn set_checkpoint(&self, chain_id: u32, height: u64) -> Result<()> {
        let mut checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let current = checkpoints.get(&chain_id).copied().unwrap_or(0);
        if height < current {
            return Err(CacheError::NonMonotoneCheckpoint {
                chain_id,
                current,
                attempted: height,
            });
        }
        checkpoints.insert(chain_id, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_cache_roundtrips() {
        let cache = MockCache::new();
        cache.put(1, 5, b"x".to_vec()).await.unwrap();
        assert_eq!(cache.get(1, 5).await, Some(b"x".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn mock_cache_checkpoint_monotone() {
        let cache = MockCache::new();
        cache.set_checkpoint(1, 10).await.unwrap();
        assert!(cache.set_checkpoint(1, 5).await.is_err());
        assert_eq!(cache.get_checkpoint(1).await, 10);
    }
}
