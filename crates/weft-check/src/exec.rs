//! The execution backend seam
//!
//! The exploration engine never executes target-program operations itself;
//! it consumes this capability set from a backend chosen at setup. The
//! built-in backend is [`crate::interp::Interpreter`]; external engines
//! implement the same trait.

use crate::event::{ErrorKind, Event};
use smallvec::SmallVec;
use thiserror::Error;
use weft_core::ThreadId;

/// Ready set returned by a backend, in the backend's deterministic order
/// (ascending thread id for the built-in interpreter).
pub type ReadySet = SmallVec<[ThreadId; 8]>;

/// A fault inside the backend: stepping a non-ready thread, releasing a
/// mutex that is not held, and similar contract breaches. These signal
/// engine or backend bugs and abort the whole exploration.
#[derive(Debug, Clone, Error)]
#[error("execution backend fault: {0}")]
pub struct BackendFault(pub String);

/// One operation of one thread at a time, restartable from the program's
/// fixed initial state.
///
/// Replay determinism is the load-bearing contract: after `reset`, feeding
/// the same sequence of `step` choices must reproduce the same Events,
/// byte for byte. The driver checks this and treats divergence as fatal.
pub trait ExecutionBackend {
    /// Number of threads in the program (fixed for its lifetime).
    fn thread_count(&self) -> usize;

    /// Threads that can execute an operation right now.
    fn ready_threads(&self) -> ReadySet;

    /// Execute the next operation of `tid` and report its effect.
    fn step(&mut self, tid: ThreadId) -> Result<Event, BackendFault>;

    /// All threads have exited.
    fn is_finished(&self) -> bool;

    /// Classify an event as an error terminal, if it is one.
    fn is_error(&self, event: &Event) -> Option<ErrorKind>;

    /// Return to the program's initial state.
    fn reset(&mut self);

    /// Human-readable thread name, for trace rendering.
    fn thread_name(&self, tid: ThreadId) -> String {
        format!("{tid}")
    }

    /// Human-readable description of an event, for trace rendering.
    fn describe_event(&self, event: &Event) -> String {
        event.kind.to_string()
    }
}
