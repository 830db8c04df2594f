use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

const FREE: usize = 0;

/// A single fork: an exclusive lock plus the id of whoever holds it.
#[derive(Debug, Default)]
struct Fork {
    lock: Mutex<()>,
    holder: AtomicUsize,
}

/// The ring of forks on the table, one per philosopher.
///
/// Acquisition hands out a [`ForkGuard`]; dropping the guard puts the fork back.
/// Every acquisition is checked against a held-by registry so that a broken
/// exclusion invariant shows up as a counted violation instead of going unseen.
#[derive(Debug)]
pub struct ForkSet {
    forks: Vec<Fork>,
    violations: AtomicUsize,
}

impl ForkSet {
    pub fn new(count: usize) -> Self {
        Self {
            forks: (0..count).map(|_| Fork::default()).collect(),
            violations: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.forks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forks.is_empty()
    }

    /// Blocks until fork `index` is held by `holder_id`.
    ///
    /// # Panics
    /// Panics if `index` is outside the ring or `holder_id` is zero.
    pub fn acquire(&self, index: usize, holder_id: usize) -> ForkGuard<'_> {
        assert_ne!(holder_id, FREE, "fork holders are numbered from 1");
        let fork = &self.forks[index];
        let guard = fork.lock.lock();

        let previous = fork.holder.swap(holder_id, Ordering::AcqRel);
        if previous != FREE {
            self.violations.fetch_add(1, Ordering::Relaxed);
        }

        ForkGuard {
            index,
            holder: &fork.holder,
            _guard: guard,
        }
    }

    /// Current holder of fork `index`, if any.
    pub fn holder(&self, index: usize) -> Option<usize> {
        match self.forks.get(index)?.holder.load(Ordering::Acquire) {
            FREE => None,
            id => Some(id),
        }
    }

    /// Number of times a fork was observed held by two philosophers at once.
    pub fn exclusion_violations(&self) -> usize {
        self.violations.load(Ordering::Relaxed)
    }
}

/// Exclusive hold on one fork.
#[derive(Debug)]
pub struct ForkGuard<'a> {
    index: usize,
    holder: &'a AtomicUsize,
    _guard: MutexGuard<'a, ()>,
}

impl ForkGuard<'_> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for ForkGuard<'_> {
    fn drop(&mut self) {
        // Clear the registry before the lock field is dropped.
        self.holder.store(FREE, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_records_and_clears_holder() {
        let forks = ForkSet::new(3);
        {
            let guard = forks.acquire(1, 2);
            assert_eq!(guard.index(), 1);
            assert_eq!(forks.holder(1), Some(2));
            assert_eq!(forks.holder(0), None);
        }
        assert_eq!(forks.holder(1), None);
        assert_eq!(forks.holder(7), None);
    }

    #[test]
    fn contended_fork_is_never_shared() {
        let forks = Arc::new(ForkSet::new(1));
        let mut handles = Vec::new();

        for id in 1..=4 {
            let forks = Arc::clone(&forks);
            handles.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    let _fork = forks.acquire(0, id);
                    assert_eq!(forks.holder(0), Some(id));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(forks.exclusion_violations(), 0);
        assert_eq!(forks.holder(0), None);
    }
}
