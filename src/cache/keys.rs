//! Key naming conventions shared with every service using the same store
//!
//! - cached records: `<keyPrefix><id>`
//! - locks: `lock:<resourceName>`
//! - ID counters: `icr:<businessPrefix>:<yyMMdd>`

use crate::cache::types::CacheKey;
use std::fmt::Display;

/// Prefix for lock records
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Prefix for ID generator counters
pub const ID_COUNTER_PREFIX: &str = "icr:";

/// Cached shop records, keyed by shop id
pub const CACHE_SHOP_KEY: &str = "cache:shop:";

/// Build the cache key for a record
pub fn cache_key(key_prefix: &str, id: impl Display) -> CacheKey {
    format!("{}{}", key_prefix, id)
}

/// Build the lock key for a resource
pub fn lock_key(resource_name: &str) -> CacheKey {
    format!("{}{}", LOCK_KEY_PREFIX, resource_name)
}

/// Build the counter key for a business prefix and a `yyMMdd` date partition
pub fn counter_key(business_prefix: &str, date_partition: &str) -> CacheKey {
    format!("{}{}:{}", ID_COUNTER_PREFIX, business_prefix, date_partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(CACHE_SHOP_KEY, 42), "cache:shop:42");
        assert_eq!(cache_key("item:", "abc"), "item:abc");
    }

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key("order:7"), "lock:order:7");
        assert_eq!(lock_key(&cache_key(CACHE_SHOP_KEY, 1)), "lock:cache:shop:1");
    }

    #[test]
    fn test_counter_key() {
        assert_eq!(counter_key("order", "240315"), "icr:order:240315");
    }
}
