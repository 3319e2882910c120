//! Cache-line-padded atomic sequence counters.
//!
//! Isolating each cursor on its own cache line keeps the producer's claim
//! counter and every independently-progressing consumer sequence from
//! false-sharing one cache line between cores.

use std::sync::atomic::{AtomicU64, Ordering};

#[repr(align(128))]
#[derive(Debug)]
pub struct PaddedSequence(AtomicU64);

impl PaddedSequence {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> u64 {
        self.0.load(order)
    }

    #[inline]
    pub fn store(&self, value: u64, order: Ordering) {
        self.0.store(value, order)
    }

    #[inline]
    pub fn fetch_add(&self, value: u64, order: Ordering) -> u64 {
        self.0.fetch_add(value, order)
    }
}
