//! Two-tier result cache: DashMap in front of a JSON-file directory.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};
use vigil_core_types::ComparisonResult;

use crate::entry::CacheEntry;
use crate::errors::CacheError;
use crate::fs::{entry_files, remove_reporting_size, write_atomic};
use crate::key::CacheKey;

/// Informational hit-rate target under repeated-comparison workloads
pub const TARGET_HIT_RATE: f64 = 60.0;

/// Outcome of a full clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearStats {
    pub memory_entries_cleared: usize,
    pub disk_entries_cleared: usize,
    pub freed_bytes: u64,
}

/// Outcome of an expired-entry sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepStats {
    pub expired_entries_removed: usize,
    pub freed_bytes: u64,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Percentage, 0-100
    pub hit_rate: f64,
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub disk_usage_bytes: u64,
    pub target_hit_rate: f64,
    pub target_met: bool,
}

/// Content-addressed comparison result cache with TTL.
pub struct ResultCache {
    dir: PathBuf,
    ttl: Duration,
    memory: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), ttl_secs = ttl.as_secs(), "result cache ready");
        Ok(Self {
            dir,
            ttl,
            memory: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up a cached result; TTL-expired entries are misses and
    /// evicted from both tiers. A failed disk read is a miss, never
    /// an error.
    pub fn get(&self, key: &CacheKey) -> Option<ComparisonResult> {
        if let Some(entry) = self.memory.get(key.as_str()) {
            if !entry.is_expired(self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache hit (memory)");
                return Some(entry.result.clone());
            }
            drop(entry);
            self.memory.remove(key.as_str());
            let _ = fs::remove_file(self.entry_path(key));
        }

        match self.read_disk(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache hit (disk)");
                let result = entry.result.clone();
                self.memory.insert(key.as_str().to_string(), entry);
                Some(result)
            }
            Some(_) => {
                let _ = fs::remove_file(self.entry_path(key));
                self.miss(key)
            }
            None => self.miss(key),
        }
    }

    /// Write-through both tiers. Durable-tier failure degrades to
    /// memory-only with a warning.
    pub fn put(&self, key: &CacheKey, result: &ComparisonResult) {
        let entry = CacheEntry::new(key.as_str().to_string(), result.clone());

        match serde_json::to_vec_pretty(&entry) {
            Ok(data) => {
                if let Err(err) = write_atomic(&self.entry_path(key), &data) {
                    warn!(key = %key, error = %err, "durable cache write failed");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "cache entry serialization failed"),
        }

        self.memory.insert(key.as_str().to_string(), entry);
    }

    /// Remove one entry from both tiers. Returns true if anything was
    /// removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let in_memory = self.memory.remove(key.as_str()).is_some();
        let path = self.entry_path(key);
        let on_disk = path.exists();
        if on_disk {
            remove_reporting_size(&path);
        }
        if in_memory || on_disk {
            info!(key = %key, "cache entry invalidated");
        }
        in_memory || on_disk
    }

    /// Drop everything and report what was freed.
    pub fn clear(&self) -> ClearStats {
        let memory_entries_cleared = self.memory.len();
        self.memory.clear();

        let mut disk_entries_cleared = 0;
        let mut freed_bytes = 0;
        for path in entry_files(&self.dir).unwrap_or_default() {
            freed_bytes += remove_reporting_size(&path);
            disk_entries_cleared += 1;
        }

        info!(
            memory_entries_cleared,
            disk_entries_cleared, freed_bytes, "cache cleared"
        );
        ClearStats {
            memory_entries_cleared,
            disk_entries_cleared,
            freed_bytes,
        }
    }

    /// Sweep the durable tier for TTL-expired entries; also drops
    /// expired memory entries.
    pub fn cleanup_expired(&self) -> SweepStats {
        let mut expired_entries_removed = 0;
        let mut freed_bytes = 0;

        for path in entry_files(&self.dir).unwrap_or_default() {
            let expired = match fs::read(&path)
                .ok()
                .and_then(|data| serde_json::from_slice::<CacheEntry>(&data).ok())
            {
                Some(entry) => entry.is_expired(self.ttl),
                // Unreadable entries are dead weight
                None => true,
            };
            if expired {
                freed_bytes += remove_reporting_size(&path);
                expired_entries_removed += 1;
            }
        }

        self.memory.retain(|_, entry| !entry.is_expired(self.ttl));

        info!(expired_entries_removed, freed_bytes, "expired cache entries swept");
        SweepStats {
            expired_entries_removed,
            freed_bytes,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests > 0 {
            hits as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        let disk_files = entry_files(&self.dir).unwrap_or_default();
        let disk_usage_bytes = disk_files
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum();

        CacheStats {
            hits,
            misses,
            total_requests,
            hit_rate,
            memory_entries: self.memory.len(),
            disk_entries: disk_files.len(),
            disk_usage_bytes,
            target_hit_rate: TARGET_HIT_RATE,
            target_met: hit_rate >= TARGET_HIT_RATE,
        }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }

    fn read_disk(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                warn!(key = %key, error = %err, "cache file unreadable, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(key = %key, error = %err, "cache file corrupt, treating as miss");
                None
            }
        }
    }

    fn miss(&self, key: &CacheKey) -> Option<ComparisonResult> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "cache miss");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::cache_key;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_result() -> ComparisonResult {
        ComparisonResult {
            before_path: "before.png".into(),
            after_path: "after.png".into(),
            threshold: 2,
            changed_pixels: 2500,
            total_pixels: 40_000,
            changed_percentage: 6.25,
            intended_changes: Vec::new(),
            unintended_changes: Vec::new(),
            passed: false,
            failure_reason: Some("Too many changed pixels: 6.25% > 0.5%".to_string()),
            analysis_summary: None,
            heatmap_path: None,
            report_path: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn put_then_get_is_a_hit() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let key = cache_key(b"a", b"b", 2);

        assert!(cache.get(&key).is_none());
        cache.put(&key, &sample_result());
        let hit = cache.get(&key).expect("cached result");
        assert_eq!(hit.changed_pixels, 2500);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn disk_tier_survives_a_fresh_instance() {
        let dir = TempDir::new().unwrap();
        let key = cache_key(b"a", b"b", 2);
        {
            let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
            cache.put(&key, &sample_result());
        }
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn expired_entries_are_misses_and_evicted() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), Duration::ZERO).unwrap();
        let key = cache_key(b"a", b"b", 2);

        cache.put(&key, &sample_result());
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().disk_entries, 0);
    }

    #[test]
    fn corrupt_disk_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let key = cache_key(b"a", b"b", 2);

        fs::write(dir.path().join(format!("{}.json", key.as_str())), b"{broken").unwrap();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn clear_reports_entries_and_bytes() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        cache.put(&cache_key(b"a", b"b", 2), &sample_result());
        cache.put(&cache_key(b"c", b"d", 2), &sample_result());

        let stats = cache.clear();
        assert_eq!(stats.memory_entries_cleared, 2);
        assert_eq!(stats.disk_entries_cleared, 2);
        assert!(stats.freed_bytes > 0);
        assert_eq!(cache.stats().disk_entries, 0);
    }

    #[test]
    fn sweep_removes_expired_disk_entries() {
        let dir = TempDir::new().unwrap();
        let key = cache_key(b"a", b"b", 2);
        {
            let cache = ResultCache::new(dir.path(), Duration::ZERO).unwrap();
            cache.put(&key, &sample_result());
        }
        let cache = ResultCache::new(dir.path(), Duration::ZERO).unwrap();
        let stats = cache.cleanup_expired();
        assert_eq!(stats.expired_entries_removed, 1);
    }

    #[test]
    fn invalidate_removes_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let key = cache_key(b"a", b"b", 2);
        cache.put(&key, &sample_result());

        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        assert!(cache.get(&key).is_none());
    }
}
