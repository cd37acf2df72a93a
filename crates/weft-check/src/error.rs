//! Engine errors
//!
//! Program errors (assertion failures, deadlocks, flagged races) are *not*
//! here — they are data in [`crate::result::CheckResult`]. This module
//! covers the failures that abort a whole invocation: setup problems and
//! internal invariant violations, which signal engine bugs and carry
//! diagnostic detail.

use thiserror::Error;

/// Result type for checker operations
pub type CheckResultT<T> = Result<T, CheckError>;

/// Fatal errors of the exploration engine.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Setup: the backend reports no threads to run
    #[error("program has no threads")]
    EmptyProgram,

    /// Replay of a recorded decision sequence produced different behavior
    /// than the run that recorded it
    #[error("replay diverged at step {step}: {detail}")]
    ReplayDivergence { step: usize, detail: String },

    /// A backtrack obligation targeted a choice that is not admissible
    #[error("inadmissible backtrack point at step {step}: {detail}")]
    InadmissibleBacktrack { step: usize, detail: String },

    /// The backend broke its contract
    #[error(transparent)]
    Backend(#[from] crate::exec::BackendFault),
}
