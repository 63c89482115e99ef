//! # RHTMX Cache - TTL key/value store
//!
//! This crate provides the in-process cache shared by the RHTMX navigation
//! services (locale preference, section preload records, merged translations).
//!
//! ## Features
//!
//! - **Lazy Expiration**: entries are checked on `get`/`has`, no sweeper task
//! - **Per-Entry TTL**: `ttl_ms <= 0` stores an entry that never expires
//! - **Pluggable Clock**: `SystemClock` in production, `ManualClock` in tests
//!
//! ## Example
//!
//! ```rust
//! use rhtmx_cache::TtlCache;
//!
//! let cache: TtlCache<String> = TtlCache::new();
//! cache.set("user_locale_preference", "vi".to_string(), 0);
//!
//! assert_eq!(cache.get("user_locale_preference"), Some("vi".to_string()));
//! assert_eq!(cache.stats().valid, 1);
//! ```

pub mod clock;
pub mod entry;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheStats};
pub use store::TtlCache;
