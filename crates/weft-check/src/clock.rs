//! Vector clocks for happens-before tracking
//!
//! The race detector computes happens-before from program order plus
//! synchronization edges (release→acquire, spawn, exit→join). Clocks are
//! sized to the program's fixed thread count.

use smallvec::SmallVec;
use weft_core::ThreadId;

/// A vector clock indexed by thread id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockVec {
    clocks: SmallVec<[u32; 8]>,
}

impl ClockVec {
    /// The zero clock for `threads` threads.
    pub fn new(threads: usize) -> Self {
        ClockVec {
            clocks: smallvec::smallvec![0; threads],
        }
    }

    /// This thread's own component.
    pub fn get(&self, tid: ThreadId) -> u32 {
        self.clocks[tid.as_usize()]
    }

    /// Advance this thread's own component by one.
    pub fn tick(&mut self, tid: ThreadId) {
        self.clocks[tid.as_usize()] += 1;
    }

    /// Component-wise maximum: `self = max(self, other)`.
    pub fn join(&mut self, other: &ClockVec) {
        for (a, b) in self.clocks.iter_mut().zip(other.clocks.iter()) {
            *a = (*a).max(*b);
        }
    }

    /// Component-wise `self <= other`: the event stamped `self` happens
    /// before (or is) the event stamped `other`.
    pub fn le(&self, other: &ClockVec) -> bool {
        self.clocks
            .iter()
            .zip(other.clocks.iter())
            .all(|(a, b)| a <= b)
    }

    /// Neither ordered before the other.
    pub fn concurrent_with(&self, other: &ClockVec) -> bool {
        !self.le(other) && !other.le(self)
    }
}
