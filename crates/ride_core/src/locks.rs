use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// Mutual exclusion scoped to a key, e.g. one ride code.
///
/// Entries are created on first use and dropped once the last holder or
/// waiter lets go, so the map only holds keys that are in flight.
#[derive(Debug, Clone, Default)]
pub struct KeyLocker {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        drop(lock);
        self.locks
            .remove_if(key, |_, existing| Arc::strong_count(existing) == 1);
        result
    }

    /// Keys currently held or waited on.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_is_serialized() {
        let locker = KeyLocker::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    locker.with_lock("ride-1", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locker.in_flight(), 0);
    }

    #[test]
    fn different_keys_do_not_block_each_other() {
        let locker = KeyLocker::new();
        let value = locker.with_lock("a", || locker.with_lock("b", || 42));
        assert_eq!(value, 42);
        assert_eq!(locker.in_flight(), 0);
    }
}
