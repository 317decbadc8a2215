use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::resources::ResourceKey;

/// One async lock per resource key, so that two operations on the same object never
/// overlap while different objects proceed in parallel.
#[derive(Debug, Default, Clone)]
pub struct KeyLocks {
    table: Arc<Mutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>>,
}

impl KeyLocks {
    pub async fn lock(&self, key: &ResourceKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(key.clone()).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Drops the locks nobody holds or waits for.
    pub fn prune(&self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_key_never_overlaps() {
        let locks = KeyLocks::default();
        let key = ResourceKey::new("DaemonSet", Some("kube-system"), "csi-azuredisk-node");
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let tasks = (0..4)
            .map(|_| {
                let (locks, key, active, peak) = (locks.clone(), key.clone(), active.clone(), peak.clone());
                tokio::spawn(async move {
                    let _guard = locks.lock(&key).await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyLocks::default();
        let _first = locks.lock(&ResourceKey::new("Secret", Some("kube-system"), "a")).await;
        let _second = locks.lock(&ResourceKey::new("Secret", Some("kube-system"), "b")).await;

        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = KeyLocks::default();
        let held = locks.lock(&ResourceKey::new("Secret", Some("kube-system"), "a")).await;
        drop(locks.lock(&ResourceKey::new("Secret", Some("kube-system"), "b")).await);

        locks.prune();
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
