// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::hint;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use lock_api::RawMutex;
use rand::Rng;

#[derive(Eq, PartialEq, Debug)]
pub(crate) struct NonCopy(pub(crate) i32);

/// Hammers `lock` from `threads` threads and panics if two of them are ever
/// inside the critical section at the same time.
pub(crate) fn assert_exclusive<R>(lock: &Arc<R>, threads: usize, iters: usize)
where
    R: RawMutex + Send + Sync + 'static,
{
    let occupied = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let lock = lock.clone();
            let occupied = occupied.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..iters {
                    lock.lock();
                    assert!(
                        !occupied.swap(true, Ordering::SeqCst),
                        "two threads inside the critical section"
                    );
                    entered.fetch_add(1, Ordering::Relaxed);

                    for _ in 0..rng.random_range(0..64) {
                        hint::spin_loop();
                    }

                    occupied.store(false, Ordering::SeqCst);
                    // Safety: locked at the top of this iteration
                    unsafe { lock.unlock() };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(entered.load(Ordering::Relaxed), threads * iters);
    assert!(!lock.is_locked());
}

/// A single-threaded lock whose `try_lock` fails exactly as many times as
/// scripted in every acquisition round before it succeeds.
///
/// The blocking `lock` always succeeds immediately and counts how often it was
/// called, so tests can observe when an adaptive mutex gave up spinning.
#[derive(Debug)]
pub(crate) struct ScriptedLock {
    script: AtomicUsize,
    locked: AtomicBool,
    failures_left: AtomicUsize,
    failed_attempts: AtomicUsize,
    blocking_locks: AtomicUsize,
}

impl ScriptedLock {
    /// Makes every following acquisition round fail `failures` times first.
    pub(crate) fn script(&self, failures: usize) {
        self.script.store(failures, Ordering::Relaxed);
        self.failures_left.store(failures, Ordering::Relaxed);
    }

    /// Number of `try_lock` calls that returned `false` since the last reset.
    pub(crate) fn failed_attempts(&self) -> usize {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Number of times the blocking `lock` was entered since the last reset.
    pub(crate) fn blocking_locks(&self) -> usize {
        self.blocking_locks.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_counters(&self) {
        self.failed_attempts.store(0, Ordering::Relaxed);
        self.blocking_locks.store(0, Ordering::Relaxed);
    }
}

// Safety: only used single-threaded in tests, the flag still guards against
// a second holder.
unsafe impl RawMutex for ScriptedLock {
    type GuardMarker = lock_api::GuardSend;

    const INIT: Self = Self {
        script: AtomicUsize::new(0),
        locked: AtomicBool::new(false),
        failures_left: AtomicUsize::new(0),
        failed_attempts: AtomicUsize::new(0),
        blocking_locks: AtomicUsize::new(0),
    };

    fn lock(&self) {
        self.blocking_locks.fetch_add(1, Ordering::Relaxed);
        let was_locked = self.locked.swap(true, Ordering::Acquire);
        assert!(!was_locked, "ScriptedLock is not reentrant");
    }

    fn try_lock(&self) -> bool {
        let scripted_failure = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if scripted_failure
            || self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
        {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        self.failures_left
            .store(self.script.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
