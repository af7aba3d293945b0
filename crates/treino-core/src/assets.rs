//! Image asset cache
//!
//! Keeps recently used image bytes in memory, backed by one file per asset
//! in the device's documents directory. The in-memory side is bounded by
//! entry count and evicts the least recently used entry first; evicted
//! assets stay resolvable from disk.
//!
//! Nothing here fails loudly: a missing asset resolves to `None` (renderers
//! show a placeholder) and a failed write is logged.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use tracing::{debug, warn};

use crate::models::Locator;
use crate::storage::files::{atomic_write, read_file, remove_file};
use crate::storage::StorageError;

/// Counters describing cache behaviour since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from memory
    pub hits: u64,
    /// Lookups that went to disk
    pub misses: u64,
    /// Successful file reads
    pub disk_reads: u64,
    /// Successful file writes
    pub disk_writes: u64,
    /// Entries dropped to make room
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    evictions: AtomicU64,
}

/// Bounded, disk-backed cache of image bytes keyed by locator
///
/// Safe to share between threads (`Arc<AssetCache>`); the LRU is guarded by
/// a mutex and file I/O happens outside the lock.
#[derive(Debug)]
pub struct AssetCache {
    dir: PathBuf,
    entries: Mutex<LruCache<Locator, Arc<[u8]>>>,
    counters: Counters,
}

impl AssetCache {
    /// Create a cache storing files in `dir`, holding at most `capacity`
    /// entries in memory (a capacity of zero is treated as one)
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            dir: dir.into(),
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    /// Directory holding the asset files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a locator, `None` if the locator is not a plain file name
    pub fn path_for(&self, locator: &Locator) -> Option<PathBuf> {
        locator.is_valid().then(|| self.dir.join(locator.as_str()))
    }

    /// Resolve an asset: memory first, then disk
    ///
    /// A disk hit is cached for next time. Returns `None` when the asset
    /// cannot be found or read.
    pub fn get(&self, locator: &Locator) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.lock().get(locator) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(bytes));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let path = self.path_for(locator)?;
        let bytes: Arc<[u8]> = match read_file(&path) {
            Ok(data) => data.into(),
            Err(StorageError::NotFound { .. }) => {
                debug!("Asset {} not found", locator);
                return None;
            }
            Err(e) => {
                e.report(&format!("Failed to read asset {}", locator));
                return None;
            }
        };
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);

        self.insert(locator.clone(), Arc::clone(&bytes));
        Some(bytes)
    }

    /// Store an asset on disk, then cache it
    ///
    /// Returns `false` if the file could not be written; the cache is left
    /// untouched in that case.
    pub fn put(&self, bytes: &[u8], locator: &Locator) -> bool {
        let Some(path) = self.path_for(locator) else {
            warn!("Refusing to store asset with invalid name {:?}", locator.as_str());
            return false;
        };

        if let Err(e) = atomic_write(&path, bytes) {
            e.report(&format!("Failed to save asset {}", locator));
            return false;
        }
        self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);

        self.insert(locator.clone(), Arc::from(bytes));
        debug!("Stored asset {} ({} bytes)", locator, bytes.len());
        true
    }

    /// Drop an asset from memory and disk
    pub fn remove(&self, locator: &Locator) {
        self.lock().pop(locator);

        if let Some(path) = self.path_for(locator) {
            if let Err(e) = remove_file(&path) {
                e.report(&format!("Failed to remove asset {}", locator));
            }
        }
    }

    /// Whether the asset is currently held in memory
    ///
    /// Does not touch recency.
    pub fn contains(&self, locator: &Locator) -> bool {
        self.lock().contains(locator)
    }

    /// Number of entries held in memory
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.counters.disk_writes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    fn insert(&self, locator: Locator, bytes: Arc<[u8]>) {
        let displaced = self.lock().push(locator.clone(), bytes);
        if let Some((old, _)) = displaced {
            // push also hands back the previous value when the key was present
            if old != locator {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Evicted asset {} from memory", old);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Locator, Arc<[u8]>>> {
        // A panic while holding the lock cannot leave the LRU half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locator(name: &str) -> Locator {
        Locator::new(name).unwrap()
    }

    #[test]
    fn test_put_then_get_is_a_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 100);
        let loc = locator("x.jpg");

        assert!(cache.put(b"jpeg bytes", &loc));
        let before = cache.stats();

        let bytes = cache.get(&loc).unwrap();
        assert_eq!(&*bytes, b"jpeg bytes");

        let after = cache.stats();
        assert_eq!(after.disk_reads, before.disk_reads);
        assert_eq!(after.hits, before.hits + 1);
    }

    #[test]
    fn test_put_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 10);
        let loc = locator("squat.jpg");

        cache.put(b"abc", &loc);

        let on_disk = std::fs::read(temp_dir.path().join("squat.jpg")).unwrap();
        assert_eq!(on_disk, b"abc");
    }

    #[test]
    fn test_get_missing_asset_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 10);

        assert!(cache.get(&locator("nope.jpg")).is_none());
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_reads_from_disk_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("row.jpg"), b"from disk").unwrap();
        let cache = AssetCache::new(temp_dir.path(), 10);
        let loc = locator("row.jpg");

        assert_eq!(&*cache.get(&loc).unwrap(), b"from disk");
        assert!(cache.contains(&loc));

        cache.get(&loc).unwrap();
        assert_eq!(cache.stats().disk_reads, 1);
    }

    #[test]
    fn test_eviction_keeps_capacity_and_disk_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let capacity = 5;
        let cache = AssetCache::new(temp_dir.path(), capacity);

        let locators: Vec<Locator> = (0..=capacity)
            .map(|i| locator(&format!("img-{}.jpg", i)))
            .collect();
        for (i, loc) in locators.iter().enumerate() {
            assert!(cache.put(format!("bytes-{}", i).as_bytes(), loc));
        }

        assert!(cache.len() <= capacity);
        assert_eq!(cache.stats().evictions, 1);

        for (i, loc) in locators.iter().enumerate() {
            let bytes = cache.get(loc).unwrap();
            assert_eq!(&*bytes, format!("bytes-{}", i).as_bytes());
            assert!(cache.len() <= capacity);
        }
    }

    #[test]
    fn test_least_recently_used_is_evicted_first() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 2);
        let (a, b, c) = (locator("a.jpg"), locator("b.jpg"), locator("c.jpg"));

        cache.put(b"a", &a);
        cache.put(b"b", &b);
        cache.get(&a).unwrap();
        cache.put(b"c", &c);

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_replacing_an_entry_is_not_an_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 2);
        let loc = locator("same.jpg");

        cache.put(b"v1", &loc);
        cache.put(b"v2", &loc);

        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(&*cache.get(&loc).unwrap(), b"v2");
    }

    #[test]
    fn test_failed_write_does_not_populate_cache() {
        let temp_dir = TempDir::new().unwrap();
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, b"a file, not a directory").unwrap();

        let cache = AssetCache::new(&blocked, 10);
        let loc = locator("x.jpg");

        assert!(!cache.put(b"bytes", &loc));
        assert!(!cache.contains(&loc));
        assert_eq!(cache.stats().disk_writes, 0);
    }

    #[test]
    fn test_invalid_locator_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path().join("assets"), 10);
        let bad: Locator = serde_json::from_str("\"../escape.jpg\"").unwrap();

        assert!(!cache.put(b"bytes", &bad));
        assert!(cache.get(&bad).is_none());
        assert!(!temp_dir.path().join("escape.jpg").exists());
    }

    #[test]
    fn test_remove_drops_memory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 10);
        let loc = locator("old.jpg");

        cache.put(b"old", &loc);
        cache.remove(&loc);

        assert!(!cache.contains(&loc));
        assert!(cache.get(&loc).is_none());
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(temp_dir.path(), 0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(AssetCache::new(temp_dir.path(), 4));
        let locators: Vec<Locator> = (0..8).map(|i| locator(&format!("c{}.jpg", i))).collect();
        for loc in &locators {
            cache.put(loc.as_str().as_bytes(), loc);
        }

        std::thread::scope(|scope| {
            for t in 0..4 {
                let cache = Arc::clone(&cache);
                let locators = &locators;
                scope.spawn(move || {
                    for round in 0..50 {
                        let index = (t + round) % locators.len();
                        let loc = &locators[index];
                        // Each locator has a single writer thread
                        if index % 4 == t {
                            cache.put(loc.as_str().as_bytes(), loc);
                        }
                        let bytes = cache.get(loc).unwrap();
                        assert_eq!(&*bytes, loc.as_str().as_bytes());
                    }
                });
            }
        });

        assert!(cache.len() <= 4);
    }
}
