//! Stored entry shapes: raw value classification and the logical-expiration envelope

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Value written for "checked, confirmed absent upstream"
pub const TOMBSTONE: &str = "";

/// What a raw read from the store turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A non-blank document
    Value(String),

    /// A blank value: the key was checked and does not exist upstream
    Tombstone,

    /// Nothing stored (never cached, evicted, or physically expired)
    Missing,
}

impl Lookup {
    /// Classify the result of a store `get`
    ///
    /// Whitespace-only values count as tombstones.
    pub fn from_raw(raw: Option<String>) -> Self {
        match raw {
            None => Lookup::Missing,
            Some(value) if value.trim().is_empty() => Lookup::Tombstone,
            Some(value) => Lookup::Value(value),
        }
    }
}

/// Envelope for entries that expire logically instead of physically
///
/// Serialized as `{"data": ..., "expireTime": <epoch millis>}` and stored
/// without a store-side TTL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalEntry<T> {
    /// The cached record
    #[serde(rename = "data")]
    pub payload: T,

    /// When the payload stops being fresh
    #[serde(rename = "expireTime", with = "chrono::serde::ts_milliseconds")]
    pub expire_at: DateTime<Utc>,
}

impl<T> LogicalEntry<T> {
    /// Wrap a payload that stays fresh for `ttl` from now
    ///
    /// A `ttl` past the representable range saturates to the latest instant.
    pub fn new(payload: T, ttl: Duration) -> Self {
        let expire_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { payload, expire_at }
    }

    /// Wrap a payload with an explicit expiry instant
    pub fn with_expiration(payload: T, expire_at: DateTime<Utc>) -> Self {
        Self { payload, expire_at }
    }

    /// Check if the payload is past its logical expiry
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against a given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }

    /// Time until the payload goes stale, `None` once it has
    pub fn time_until_expiration(&self) -> Option<Duration> {
        (self.expire_at - Utc::now()).to_std().ok()
    }
}

impl<T: Serialize> LogicalEntry<T> {
    /// Serialize the envelope for storage
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> LogicalEntry<T> {
    /// Parse a stored envelope
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
