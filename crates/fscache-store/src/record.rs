//! The persisted unit: a value plus its expiry metadata.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A cache record as written to disk.
///
/// `expires_at` is always derived from `created_at + ttl_seconds` when the
/// record is written; it is never set on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<V> {
    /// The original cache key (diagnostics only; lookup is by digest)
    pub key: String,
    /// The cached payload
    pub value: V,
    /// Time to live in seconds, `None` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// When this record was written
    pub created_at: DateTime<Utc>,
    /// When this record expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheRecord<V> {
    /// Create a record stamped with the current time.
    ///
    /// A TTL of zero means "never expires".
    pub fn new(key: &str, value: V, ttl_seconds: Option<u64>) -> Self {
        Self::created_at(key, value, ttl_seconds, Utc::now())
    }

    /// Create a record with an explicit creation time.
    pub fn created_at(
        key: &str,
        value: V,
        ttl_seconds: Option<u64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let ttl_seconds = ttl_seconds.filter(|ttl| *ttl > 0);
        Self {
            key: key.to_string(),
            value,
            ttl_seconds,
            created_at,
            expires_at: expiry(created_at, ttl_seconds),
        }
    }

    /// Restart the expiry clock from now, keeping the same TTL.
    pub fn restart_clock(&mut self) {
        self.restart_clock_at(Utc::now());
    }

    /// Restart the expiry clock from `now`.
    pub fn restart_clock_at(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.expires_at = expiry(now, self.ttl_seconds);
    }

    /// Check if this record has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against a given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// True if this record was created before `instant`.
    pub fn is_older_than(&self, instant: DateTime<Utc>) -> bool {
        self.created_at < instant
    }

    /// Replace the value, keeping key and timing metadata.
    pub fn with_value<W>(self, value: W) -> CacheRecord<W> {
        CacheRecord {
            key: self.key,
            value,
            ttl_seconds: self.ttl_seconds,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

// TTLs too large to represent as a timestamp never expire.
fn expiry(created_at: DateTime<Utc>, ttl_seconds: Option<u64>) -> Option<DateTime<Utc>> {
    let ttl = i64::try_from(ttl_seconds?).ok()?;
    created_at.checked_add_signed(TimeDelta::try_seconds(ttl)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_record_without_ttl_never_expires() {
        let record = CacheRecord::created_at("k", 1, None, at(1_000));
        assert!(record.expires_at.is_none());
        assert!(!record.is_expired_at(at(i32::MAX as i64)));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let record = CacheRecord::created_at("k", 1, Some(0), at(1_000));
        assert_eq!(record.ttl_seconds, None);
        assert!(record.expires_at.is_none());
    }

    #[test]
    fn test_expiry_is_derived_from_created_at() {
        let record = CacheRecord::created_at("k", "v", Some(60), at(1_000));
        assert_eq!(record.expires_at, Some(at(1_060)));
        assert!(!record.is_expired_at(at(1_060)));
        assert!(record.is_expired_at(at(1_061)));
    }

    #[test]
    fn test_restart_clock_keeps_ttl() {
        let mut record = CacheRecord::created_at("k", "v", Some(5), at(1_000));
        record.restart_clock_at(at(2_000));
        assert_eq!(record.ttl_seconds, Some(5));
        assert_eq!(record.created_at, at(2_000));
        assert_eq!(record.expires_at, Some(at(2_005)));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let record = CacheRecord::created_at("k", "v", Some(u64::MAX), at(1_000));
        assert_eq!(record.ttl_seconds, Some(u64::MAX));
        assert!(record.expires_at.is_none());
    }

    #[test]
    fn test_is_older_than() {
        let record = CacheRecord::created_at("k", "v", None, at(1_000));
        assert!(record.is_older_than(at(1_005)));
        assert!(!record.is_older_than(at(995)));
        assert!(!record.is_older_than(at(1_000)));
    }

    #[test]
    fn test_with_value_preserves_schedule() {
        let record = CacheRecord::created_at("k", "a".to_string(), Some(3), at(1_000));
        let expires = record.expires_at;
        let next = record.with_value(42u32);
        assert_eq!(next.value, 42);
        assert_eq!(next.created_at, at(1_000));
        assert_eq!(next.expires_at, expires);
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let record = CacheRecord::created_at("k", "v", None, at(1_000));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("ttl_seconds").is_none());
        assert!(json.get("expires_at").is_none());
        assert_eq!(json["key"], "k");
    }
}
