use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-fixture critical sections for settlement. All three settlement triggers
/// (result pass, admin update, sweep) go through the same registry, so at most one
/// settlement per fixture runs inside this process at a time.
///
/// Entries are never evicted. One `Arc<Mutex<()>>` per fixture that ever had a
/// settlement attempt is a few dozen bytes.
#[derive(Default)]
pub struct FixtureLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl FixtureLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `fixture_id`. Released when the guard drops.
    pub async fn acquire(&self, fixture_id: i64) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is not held across the await.
        let lock = self
            .locks
            .entry(fixture_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_fixture_is_exclusive() {
        let locks = Arc::new(FixtureLocks::new());
        let guard = locks.acquire(7).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(7).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_fixtures_do_not_block() {
        let locks = FixtureLocks::new();
        let _a = locks.acquire(1).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2))
            .await
            .unwrap();
        assert_eq!(locks.locks.len(), 2);
    }
}
