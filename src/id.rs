//! Cyclic id allocation for pool entities.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out `u32` ids in sequence, wrapping to 0 after `u32::MAX` has been issued.
///
/// Every value of a full cycle is issued exactly once, regardless of how many
/// tasks call [`next`](IdGenerator::next) concurrently.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the sequence at `first` instead of 0.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Returns the next id. `fetch_add` wraps on overflow.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
