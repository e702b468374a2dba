use chrono::{DateTime, Duration, Utc};

/// Single-value cache with an explicit time-to-live.
///
/// Holds `(value, fetched_at)`; callers pass `now` so freshness checks are
/// deterministic. Owners call [`TtlCache::invalidate`] when a refresh fails
/// so a stale value is never served past its TTL.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use idxmon_common::cache::TtlCache;
///
/// let mut cache = TtlCache::new(Duration::seconds(60));
/// let now = Utc::now();
/// cache.store(42, now);
/// assert_eq!(cache.get(now + Duration::seconds(30)), Some(&42));
/// assert_eq!(cache.get(now + Duration::seconds(61)), None);
/// ```
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(T, DateTime<Utc>)>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value if it was fetched less than `ttl` before `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        match &self.entry {
            Some((value, fetched_at)) if now - *fetched_at < self.ttl => Some(value),
            _ => None,
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|(_, at)| *at)
    }

    pub fn store(&mut self, value: T, now: DateTime<Utc>) {
        self.entry = Some((value, now));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_misses() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::seconds(60));
        assert!(cache.get(Utc::now()).is_none());
        assert!(cache.fetched_at().is_none());
    }

    #[test]
    fn expires_exactly_at_ttl() {
        let mut cache = TtlCache::new(Duration::seconds(60));
        let now = Utc::now();
        cache.store("v", now);
        assert_eq!(cache.get(now + Duration::seconds(59)), Some(&"v"));
        assert_eq!(cache.get(now + Duration::seconds(60)), None);
    }

    #[test]
    fn invalidate_clears_value() {
        let mut cache = TtlCache::new(Duration::seconds(60));
        let now = Utc::now();
        cache.store(1u8, now);
        cache.invalidate();
        assert!(cache.get(now).is_none());
    }
}
