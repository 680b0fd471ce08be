//! Monotonic ID generation.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing IDs of one type.
///
/// Safe to share between threads; every call to [`IdSequence::next`]
/// returns a value no other caller has seen.
#[derive(Debug)]
pub struct IdSequence<T> {
    next: AtomicU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: From<u64>> IdSequence<T> {
    /// Creates a sequence whose first ID is `1`.
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a sequence whose first ID is `first`.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
            _marker: PhantomData,
        }
    }

    /// Allocates the next ID.
    pub fn next(&self) -> T {
        T::from(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T: From<u64>> Default for IdSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}
