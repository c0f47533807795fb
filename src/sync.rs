//! Internal synchronization primitives.
//!
//! Every lock in this crate is a `parking_lot` lock: fair acquisition, no
//! poisoning on panic, and small enough critical sections (map lookup plus
//! an eviction decision, a counter update, a ring push) that a spin-first
//! lock consistently beats the stdlib's OS-assisted one. Each owning
//! component (cache, cost tracker, performance budget, processor queue)
//! holds exactly one lock over its own state and never nests a second
//! lock acquisition inside it, so re-exporting the primitives here rather
//! than scattering `parking_lot::Mutex` imports keeps that discipline
//! visible at a glance.
//!
//! # Examples
//!
//! ```
//! use agent_turn_runtime::sync::Mutex;
//!
//! let spend = Mutex::new(0.0_f64);
//! *spend.lock() += 1.5;
//! assert_eq!(*spend.lock(), 1.5);
//! ```

pub use parking_lot::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutex_guards_a_running_total() {
        let total = Mutex::new(0u32);
        *total.lock() += 10;
        assert_eq!(*total.lock(), 10);
    }

    #[test]
    fn mutex_survives_concurrent_increments() {
        let total = Arc::new(Mutex::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let total = Arc::clone(&total);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *total.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*total.lock(), 8000);
    }

    #[test]
    fn rwlock_allows_concurrent_reads() {
        let entries = RwLock::new(vec![1, 2, 3]);
        let a = entries.read();
        let b = entries.read();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn condvar_wakes_a_waiter() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);

        thread::spawn(move || {
            let (lock, cvar) = &*pair2;
            *lock.lock() = true;
            cvar.notify_one();
        });

        let (lock, cvar) = &*pair;
        let mut ready = lock.lock();
        if !*ready {
            cvar.wait(&mut ready);
        }
        assert!(*ready);
    }
}
