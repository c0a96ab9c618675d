//! Role-aware content hashing for cache keys.

use std::fmt;

use blake3::Hasher;

/// Opaque cache key, safe to use as a file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for an image pair and threshold.
///
/// The two content hashes are fed to the outer hasher in role order
/// (baseline first), so swapping before and after yields a different
/// key.
pub fn cache_key(before: &[u8], after: &[u8], threshold: u8) -> CacheKey {
    let before_hash = blake3::hash(before);
    let after_hash = blake3::hash(after);

    let mut hasher = Hasher::new();
    hasher.update(before_hash.as_bytes());
    hasher.update(after_hash.as_bytes());
    hasher.update(&[threshold]);

    CacheKey(format!("cmp_{}", hasher.finalize().to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapping_roles_changes_the_key() {
        let a = b"image-a".as_slice();
        let b = b"image-b".as_slice();
        assert_ne!(cache_key(a, b, 2), cache_key(b, a, 2));
    }

    #[test]
    fn threshold_changes_the_key() {
        let a = b"image-a".as_slice();
        let b = b"image-b".as_slice();
        assert_ne!(cache_key(a, b, 2), cache_key(a, b, 3));
    }

    #[test]
    fn identical_inputs_reproduce_the_key() {
        let a = b"image-a".as_slice();
        let b = b"image-b".as_slice();
        assert_eq!(cache_key(a, b, 2), cache_key(a, b, 2));
    }
}
