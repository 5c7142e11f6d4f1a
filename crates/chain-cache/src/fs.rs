//! On-disk implementation of [`Cache`].
//!
//! Layout: `<root>/<chain_id>/<height / BUCKET_SIZE>/<height>.blk` for block
//! bytes, plus a single `<root>/<chain_id>/checkpoint` file holding the
//! decimal highest-densely-cached height. Both are written through a
//! temp-file-then-rename so a crash mid-write never leaves a torn file
//! behind for a later reader to trip over.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::{CacheError, Result};
use crate::{Bytes, Cache};

/// Number of heights grouped into one bucket directory, keeping any single
/// directory's entry count bounded as a chain grows into the tens of millions
/// of blocks.
pub const BUCKET_SIZE: u64 = 10_000;

/// Content-addressed on-disk cache of raw block bytes, rooted at a
/// configurable directory (`./rpc_cache/<chain_id>/` by default).
#[derive(Debug, Clone)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    /// Create a cache rooted at `root`. The directory is created lazily on
    /// first write, not here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn chain_dir(&self, chain_id: u32) -> PathBuf {
        self.root.join(chain_id.to_string())
    }

    fn entry_path(&self, chain_id: u32, height: u64) -> PathBuf {
        self.chain_dir(chain_id)
            .join((height / BUCKET_SIZE).to_string())
            .join(format!("{height}.blk"))
    }

    fn checkpoint_path(&self, chain_id: u32) -> PathBuf {
        self.chain_dir(chain_id).join("checkpoint")
    }

    /// Atomically write `bytes` to `path`: write to a sibling temp file, then
    /// `rename` over the destination. `rename` within one filesystem is
    /// atomic, so a concurrent or crashed reader never observes a partial
    /// file.
    async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Cache for FsCache {
    #[instrument(skip(self, bytes), fields(chain_id, height, len = bytes.len()))]
    async fn put(&self, chain_id: u32, height: u64, bytes: Bytes) -> Result<()> {
        let path = self.entry_path(chain_id, height);
        Self::atomic_write(&path, &bytes).await
    }

    #[instrument(skip(self), fields(chain_id, height))]
    async fn get(&self, chain_id: u32, height: u64) -> Option<Bytes> {
        let path = self.entry_path(chain_id, height);
        match fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                debug!(%err, "cache miss (read error treated as miss)");
                None
            }
        }
    }

    #[instrument(skip(self), fields(chain_id, from, to))]
    async fn get_range(&self, chain_id: u32, from: u64, to: u64) -> BTreeMap<u64, Bytes> {
        let mut out = BTreeMap::new();
        if from > to {
            return out;
        }
        for height in from..=to {
            if let Some(bytes) = self.get(chain_id, height).await {
                out.insert(height, bytes);
            }
        }
        out
    }

    #[instrument(skip(self), fields(chain_id))]
    async fn get_checkpoint(&self, chain_id: u32) -> u64 {
        let path = self.checkpoint_path(chain_id);
        match fs::read_to_string(&path).await {
            Ok(content) => content.trim().parse().unwrap_or_else(|_| {
                warn!(chain_id, content = %content.trim(), "corrupt checkpoint file, treating as 0");
                0
            }),
            Err(_) => 0,
        }
    }

    #[instrument(skip(self), fields(chain_id, height))]
    async fn set_checkpoint(&self, chain_id: u32, height: u64) -> Result<()> {
        let current = self.get_checkpoint(chain_id).await;
        if height < current {
            return Err(CacheError::NonMonotoneCheckpoint {
                chain_id,
                current,
                attempted: height,
            });
        }
        let path = self.checkpoint_path(chain_id);
        Self::atomic_write(&path, height.to_string().as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_root() -> PathBuf {
        std::env::temp_dir().join(format!(
            "chain-cache-test-{}-{}",
            std::process::id(),
            rand_suffix()
        ))
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let cache = FsCache::new(tmp_root());
        cache.put(1, 42, b"hello".to_vec()).await.unwrap();
        assert_eq!(cache.get(1, 42).await, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let cache = FsCache::new(tmp_root());
        assert_eq!(cache.get(1, 999).await, None);
    }

    #[tokio::test]
    async fn get_range_returns_present_subset() {
        let cache = FsCache::new(tmp_root());
        cache.put(1, 10, b"a".to_vec()).await.unwrap();
        cache.put(1, 12, b"c".to_vec()).await.unwrap();
        // 11 is deliberately absent.
        let range = cache.get_range(1, 10, 12).await;
        assert_eq!(range.len(), 2);
        assert_eq!(range.get(&10), Some(&b"a".to_vec()));
        assert_eq!(range.get(&11), None);
        assert_eq!(range.get(&12), Some(&b"c".to_vec()));
    }

    #[tokio::test]
    async fn get_range_empty_when_from_after_to() {
        let cache = FsCache::new(tmp_root());
        assert!(cache.get_range(1, 5, 4).await.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_defaults_to_zero() {
        let cache = FsCache::new(tmp_root());
        assert_eq!(cache.get_checkpoint(1).await, 0);
    }

    #[tokio::test]
    async fn checkpoint_roundtrips_and_is_monotone() {
        let cache = FsCache::new(tmp_root());
        cache.set_checkpoint(1, 100).await.unwrap();
        assert_eq!(cache.get_checkpoint(1).await, 100);

        cache.set_checkpoint(1, 200).await.unwrap();
        assert_eq!(cache.get_checkpoint(1).await, 200);

        let err = cache.set_checkpoint(1, 150).await.unwrap_err();
        assert!(matches!(err, CacheError::NonMonotoneCheckpoint { .. }));
        assert_eq!(cache.get_checkpoint(1).await, 200);
    }

    #[tokio::test]
    async fn buckets_separate_directories() {
        let cache = FsCache::new(tmp_root());
        cache.put(1, 5, b"low".to_vec()).await.unwrap();
        cache.put(1, BUCKET_SIZE + 5, b"high".to_vec()).await.unwrap();
        assert_eq!(cache.get(1, 5).await, Some(b"low".to_vec()));
        assert_eq!(cache.get(1, BUCKET_SIZE + 5).await, Some(b"high".to_vec()));
    }

    #[tokio::test]
    async fn get_or_fill_fills_on_miss_and_caches() {
        let cache = FsCache::new(tmp_root());
        let calls = std::sync::atomic::AtomicU32::new(0);
        let fill = || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { b"filled".to_vec() }
        };
        let bytes = cache.get_or_fill(1, 7, fill).await.unwrap();
        assert_eq!(bytes, b"filled".to_vec());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Second call must hit the cache, not call fill again.
        let bytes2 = cache.get_or_fill(1, 7, fill).await.unwrap();
        assert_eq!(bytes2, b"filled".to_vec());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
