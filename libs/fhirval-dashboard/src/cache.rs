//! TTL-bounded cache for one computed `DashboardSnapshot` (SS 4.13: "Cache
//! lifetime defaults to five minutes; settings changes invalidate the cache").

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct TtlSlot<T: Clone> {
    ttl: Duration,
    inner: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlSlot<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Mutex::new(None) }
    }

    /// Returns the cached value if still fresh.
    pub async fn get(&self) -> Option<T> {
        let guard = self.inner.lock().await;
        match &*guard {
            Some((stamped_at, value)) if stamped_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, value: T) {
        *self.inner.lock().await = Some((Instant::now(), value));
    }

    /// Settings changes invalidate the cache outright (SS 4.12/4.13) rather
    /// than waiting out the TTL.
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }

    /// The last computed value even if stale, annotated by the caller (SS 7:
    /// "dashboards always render with the last-known-good snapshot ...
    /// annotated with a staleness marker").
    pub async fn get_stale(&self) -> Option<T> {
        self.inner.lock().await.as_ref().map(|(_, value)| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_value_is_returned() {
        let slot = TtlSlot::new(Duration::from_secs(60));
        slot.set(42).await;
        assert_eq!(slot.get().await, Some(42));
    }

    #[tokio::test]
    async fn expired_value_is_not_returned_but_stale_get_still_works() {
        let slot = TtlSlot::new(Duration::from_millis(1));
        slot.set(7).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(slot.get().await, None);
        assert_eq!(slot.get_stale().await, Some(7));
    }

    #[tokio::test]
    async fn invalidate_clears_even_a_fresh_value() {
        let slot = TtlSlot::new(Duration::from_secs(60));
        slot.set(1).await;
        slot.invalidate().await;
        assert_eq!(slot.get().await, None);
    }
}
