//! Content-addressed cache for comparison results.
//!
//! Keys are derived from the two images' bytes plus the threshold, in
//! fixed role order: before and after are not interchangeable because
//! regression direction matters. Entries live in an in-process map
//! backed by a durable JSON-file tier with atomic writes; both tiers
//! honor a shared TTL.

pub mod entry;
pub mod errors;
mod fs;
pub mod key;
pub mod store;

pub use entry::CacheEntry;
pub use errors::CacheError;
pub use key::{cache_key, CacheKey};
pub use store::{CacheStats, ClearStats, ResultCache, SweepStats};
