//! Per-name operation serialization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per logical server name.
///
/// Operations on the same name queue behind each other; different names run
/// concurrently. Entries are dropped once no operation holds or waits on them.
#[derive(Default)]
pub(crate) struct NameLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub(crate) struct NameGuard<'a> {
    owner: &'a NameLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NameLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, name: &str) -> NameGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        NameGuard {
            owner: self,
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks.lock();
        // Only the map itself still references the mutex.
        if locks
            .get(&self.name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_serialized() {
        let locks = Arc::new(NameLocks::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = locks.acquire("web").await;
        let task = {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let _guard = locks.acquire("web").await;
                order.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        drop(first);
        task.await.unwrap();

        assert_eq!(*order.lock(), ["first", "second"]);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = NameLocks::new();
        let _web = locks.acquire("web").await;
        let db = tokio::time::timeout(Duration::from_millis(100), locks.acquire("db")).await;
        assert!(db.is_ok());
    }
}
