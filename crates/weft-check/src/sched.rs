//! Scheduler: pick exactly one thread per step
//!
//! Fresh exploration chooses the first admissible thread (ready and not
//! slept) in the configured tie-break order. Forced choices during replay
//! bypass the sleep set — the backtrack manager never forces a slept
//! thread — and are validated against the ready set by the driver.

use crate::backtrack::SleepSet;
use crate::config::TieBreak;
use weft_core::ThreadId;

/// Outcome of a fresh scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run this thread next
    Pick(ThreadId),
    /// Ready set empty: the run concludes (completion or deadlock)
    RunOver,
    /// Ready threads exist but all are slept: sleepset-blocked
    Blocked,
}

/// Decide the next thread for a fresh (non-replay) step. `ready` comes from
/// the backend in ascending thread-id order.
pub fn decide(ready: &[ThreadId], sleep: &SleepSet, tie_break: TieBreak) -> Decision {
    if ready.is_empty() {
        return Decision::RunOver;
    }
    let admissible = |tid: &&ThreadId| !sleep.contains(**tid);
    let pick = match tie_break {
        TieBreak::LowestFirst => ready.iter().find(admissible),
        TieBreak::HighestFirst => ready.iter().rev().find(admissible),
    };
    match pick {
        Some(&tid) => Decision::Pick(tid),
        None => Decision::Blocked,
    }
}
