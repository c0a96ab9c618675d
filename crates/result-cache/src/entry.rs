use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use vigil_core_types::ComparisonResult;

/// One cached comparison result with its creation time.
///
/// The full result snapshot is kept, artifact paths included, so a
/// cache hit reproduces the original outcome except for timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub result: ComparisonResult,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(cache_key: String, result: ComparisonResult) -> Self {
        Self {
            cache_key,
            result,
            created_at: Utc::now(),
        }
    }

    /// Valid while `now - created_at < ttl`
    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age >= ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX)
    }
}
