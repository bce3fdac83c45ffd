// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::hint;
use core::sync::atomic::{AtomicIsize, Ordering};

use lock_api::RawMutex;

/// A mutual exclusion primitive that protects its data with a
/// [`RawAdaptiveMutex`] wrapping the blocking lock `M`.
#[cfg(feature = "parking_lot")]
pub type AdaptiveMutex<T, M = parking_lot::RawMutex> = lock_api::Mutex<RawAdaptiveMutex<M>, T>;
#[cfg(feature = "parking_lot")]
pub type AdaptiveMutexGuard<'a, T, M = parking_lot::RawMutex> =
    lock_api::MutexGuard<'a, RawAdaptiveMutex<M>, T>;

/// A mutual exclusion primitive that protects its data with a
/// [`RawAdaptiveMutex`] wrapping the blocking lock `M`.
#[cfg(not(feature = "parking_lot"))]
pub type AdaptiveMutex<T, M> = lock_api::Mutex<RawAdaptiveMutex<M>, T>;
#[cfg(not(feature = "parking_lot"))]
pub type AdaptiveMutexGuard<'a, T, M> = lock_api::MutexGuard<'a, RawAdaptiveMutex<M>, T>;

/// Spinning is given up once a call has failed this many times the predicted
/// spin count.
const GRACE_FACTOR: isize = 2;
/// Weight of the newest observation is `1 / SMOOTHING_DIVISOR`.
const SMOOTHING_DIVISOR: isize = 8;

/// A lock that spins on `M::try_lock` for as long as recent acquisitions
/// suggest is worthwhile, and otherwise falls back to `M::lock`.
///
/// The mutex keeps a single *predictor*: an exponential moving average of how
/// many failed `try_lock` attempts recent calls to [`lock`] needed. A call
/// keeps spinning until it has failed `2 * predictor` times, at which point it
/// commits to the blocking `M::lock` (which may deschedule the thread). Every
/// successful `lock` then moves the predictor one eighth of the way towards the
/// number of failed attempts it observed.
///
/// A fresh mutex starts with a predictor of zero, meaning the very first failed
/// attempt falls back to blocking: without evidence that spinning pays off,
/// the mutex never spins speculatively.
///
/// The predictor only steers the spin-vs-block decision. Mutual exclusion
/// relies entirely on `M`, so a stale or raced predictor degrades latency,
/// never correctness. Like `M`, this lock is neither fair nor reentrant.
///
/// [`lock`]: RawMutex::lock
pub struct RawAdaptiveMutex<M> {
    inner: M,
    predictor: AtomicIsize,
}

impl<M: RawMutex> RawAdaptiveMutex<M> {
    /// Creates a new, unlocked mutex that assumes no contention.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_predictor(0)
    }

    /// Creates a new, unlocked mutex whose predictor starts out at `predictor`
    /// spins instead of zero.
    ///
    /// Useful to warm-start a mutex that is known to see contention, since a
    /// predictor that is pinned at zero lets the mutex fall back to blocking on
    /// its first failed attempt forever.
    #[must_use]
    pub const fn with_predictor(predictor: isize) -> Self {
        Self {
            inner: M::INIT,
            predictor: AtomicIsize::new(predictor),
        }
    }

    /// Returns the current estimate of how many failed attempts an acquisition
    /// costs.
    ///
    /// The value is a relaxed snapshot and may already be stale.
    pub fn predictor(&self) -> isize {
        self.predictor.load(Ordering::Relaxed)
    }

    /// Returns the wrapped lock.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Folds the spin count of one acquisition into the predictor.
    #[inline]
    fn observe(&self, num_spins: isize) {
        let predictor = self.predictor.load(Ordering::Relaxed);
        let delta = num_spins.saturating_sub(predictor) / SMOOTHING_DIVISOR;
        self.predictor.fetch_add(delta, Ordering::Relaxed);
    }
}

impl<M: RawMutex> Default for RawAdaptiveMutex<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> fmt::Debug for RawAdaptiveMutex<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAdaptiveMutex")
            .field("locked", &self.inner.is_locked())
            .field("predictor", &self.predictor())
            .finish_non_exhaustive()
    }
}

// Safety: every path through `lock` returns only after `M::try_lock` succeeded
// or `M::lock` returned, `try_lock` and `unlock` forward to `M` directly, so
// exclusion is exactly that of `M`.
unsafe impl<M: RawMutex> RawMutex for RawAdaptiveMutex<M> {
    type GuardMarker = M::GuardMarker;

    const INIT: Self = Self::new();

    fn lock(&self) {
        let mut num_spins: isize = 0;

        while !self.inner.try_lock() {
            num_spins += 1;

            let predictor = self.predictor.load(Ordering::Relaxed);
            if num_spins >= predictor.saturating_mul(GRACE_FACTOR) {
                tracing::trace!(num_spins, predictor, "spin budget exhausted, blocking");
                self.inner.lock();
                break;
            }

            hint::spin_loop();
        }

        // the fallback path is folded in too, counting only the spins before it
        self.observe(num_spins);
    }

    fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    unsafe fn unlock(&self) {
        // Safety: ensured by caller
        unsafe { self.inner.unlock() }
    }

    fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
