// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Mutual exclusion primitives for latency-sensitive code.
//!
//! This crate provides two raw locks, both implementing [`lock_api::RawMutex`]
//! so they can be used directly or through the data-owning [`lock_api::Mutex`]
//! wrapper:
//!
//! - [`RawSpinlock`] busy-waits on an atomic flag and never yields.
//! - [`RawAdaptiveMutex`] wraps any other [`lock_api::RawMutex`] and decides on
//!   every acquisition whether to keep spinning on `try_lock` or to fall back
//!   to the wrapped lock's blocking `lock`, based on a running estimate of the
//!   recent spin cost.
//!
//! Any type implementing [`lock_api::RawMutex`] satisfies the capability the
//! adaptive mutex requires of the lock it wraps. With the default
//! `parking_lot` feature, [`AdaptiveMutex`] wraps a `parking_lot::RawMutex`
//! unless told otherwise.

#![cfg_attr(not(test), no_std)]

mod adaptive;
mod spinlock;

#[cfg(test)]
mod test_util;

pub use adaptive::{AdaptiveMutex, AdaptiveMutexGuard, RawAdaptiveMutex};
pub use spinlock::{RawSpinlock, Spinlock, SpinlockGuard};

// Both primitives can themselves be wrapped by a `RawAdaptiveMutex`, and neither
// can be duplicated.
static_assertions::assert_impl_all!(RawSpinlock: lock_api::RawMutex, Send, Sync);
static_assertions::assert_impl_all!(RawAdaptiveMutex<RawSpinlock>: lock_api::RawMutex, Send, Sync);
static_assertions::assert_not_impl_any!(RawSpinlock: Clone, Copy);
static_assertions::assert_not_impl_any!(RawAdaptiveMutex<RawSpinlock>: Clone, Copy);
