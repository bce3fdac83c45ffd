// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// A mutual exclusion primitive that protects its data with a [`RawSpinlock`].
pub type Spinlock<T> = lock_api::Mutex<RawSpinlock, T>;
pub type SpinlockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinlock, T>;

/// A lock that waits for its flag to clear by busy-waiting.
///
/// Waiting threads never yield to the scheduler, so a `RawSpinlock` only makes
/// sense for critical sections that are shorter than a context switch. There
/// is no fairness: a newly arriving thread may win against one that has been
/// spinning for a long time.
#[derive(Debug)]
pub struct RawSpinlock {
    locked: AtomicBool,
}

impl RawSpinlock {
    /// Creates a new, unlocked spinlock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinlock {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: `lock` and `try_lock` only return (true) after this thread flipped the
// flag from `false` to `true` with `Acquire` ordering, and `unlock` clears it
// with `Release`, so at most one holder exists at a time.
unsafe impl lock_api::RawMutex for RawSpinlock {
    type GuardMarker = lock_api::GuardSend;

    const INIT: Self = Self::new();

    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // spin on a plain load so waiters don't keep the cache line exclusive
            while self.is_locked() {
                hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        debug_assert!(self.is_locked(), "unlocked a spinlock that wasn't held");
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
