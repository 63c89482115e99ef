//! Cache entry types and statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// A cached value with its expiration metadata
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,

    /// When the value was written
    pub stored_at: DateTime<Utc>,

    /// When the value stops being served (`None` = never)
    pub expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    /// Create an entry written at `now`
    ///
    /// A `ttl_ms` of zero or less produces an entry that never expires.
    pub fn new(value: V, now: DateTime<Utc>, ttl_ms: i64) -> Self {
        let expires_at = if ttl_ms > 0 {
            now.checked_add_signed(chrono::Duration::milliseconds(ttl_ms))
        } else {
            None
        };

        Self {
            value,
            stored_at: now,
            expires_at,
        }
    }

    /// Check if the entry is past its expiration at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Check if the entry never expires
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Get the age of the entry at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, expired or not
    pub total: usize,

    /// Entries past expiration that have not been evicted yet
    pub expired: usize,

    /// Entries still served
    pub valid: usize,
}

impl CacheStats {
    /// Fraction of stored entries that are expired
    pub fn expired_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.expired as f64 / self.total as f64
        }
    }
}
