//! Freshness contracts for cache reads.
//!
//! Callers state how old a cached entity may be before it is refetched, and
//! reads come back wrapped in [`CacheRead`] so the age of the data travels
//! with it.

use mapcache_core::{elapsed_since, Timestamp};
use std::time::Duration;

/// Staleness tolerance for a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve the cached copy while it is strictly younger than `max_age`.
    Within {
        /// Maximum acceptable age of the cached copy.
        max_age: Duration,
    },

    /// Never serve from cache; always go to the network.
    Refetch,
}

impl Freshness {
    pub fn within(max_age: Duration) -> Self {
        Self::Within { max_age }
    }

    pub fn refetch() -> Self {
        Self::Refetch
    }

    /// Max age for `Within`, zero for `Refetch`.
    pub fn max_age(&self) -> Duration {
        match self {
            Self::Within { max_age } => *max_age,
            Self::Refetch => Duration::ZERO,
        }
    }

    /// Whether a copy fetched at `fetched_at` may be served at `now`.
    pub fn admits(&self, fetched_at: Timestamp, now: Timestamp) -> bool {
        match self {
            Self::Within { max_age } => elapsed_since(fetched_at, now) < *max_age,
            Self::Refetch => false,
        }
    }
}

/// Result of a cache read, carrying when the data was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: Timestamp,
}

impl<T> CacheRead<T> {
    /// A value served from the store without a network round trip.
    pub fn from_cache(value: T, fetched_at: Timestamp) -> Self {
        Self { value, fetched_at }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Age of the data as of `now`.
    pub fn age(&self, now: Timestamp) -> Duration {
        elapsed_since(self.fetched_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_within_admits_young_copies_only() {
        let freshness = Freshness::within(Duration::from_secs(60));
        let now = Utc::now();
        assert!(freshness.admits(now - chrono::Duration::seconds(59), now));
        assert!(!freshness.admits(now - chrono::Duration::seconds(60), now));
        assert!(!freshness.admits(now - chrono::Duration::seconds(61), now));
    }

    #[test]
    fn test_refetch_never_admits() {
        let now = Utc::now();
        assert!(!Freshness::refetch().admits(now, now));
        assert_eq!(Freshness::refetch().max_age(), Duration::ZERO);
    }

    #[test]
    fn test_cache_read_age() {
        let now = Utc::now();
        let fetched_at = now - chrono::Duration::seconds(5);
        let read = CacheRead::from_cache("v", fetched_at);
        assert_eq!(read.fetched_at(), fetched_at);
        assert_eq!(read.age(now), Duration::from_secs(5));
        assert_eq!(read.into_value(), "v");
    }
}
