//! The event model: one executed operation of the target program
//!
//! Events are what the execution backend reports and all the engine ever
//! sees of the target program — the checker reasons about conflicts between
//! event kinds and never about data values. Events are immutable once
//! recorded and live in an append-only per-run log; cross-references (races,
//! synchronization edges) use positional indices into that log.

use serde::{Deserialize, Serialize};
use std::fmt;
use weft_core::{LockId, ThreadId, VarId};

/// One executed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Thread that executed the operation
    pub thread: ThreadId,
    /// Run-local sequence number; strictly increasing, equals the event's
    /// index in the run log
    pub seq: u32,
    /// What the operation did
    pub kind: EventKind,
}

/// The operation kinds the engine distinguishes.
///
/// Only the conflict-relevant structure is kept: the resource acted on and
/// the access mode. `Rmw` is an atomic read-modify-write and conflicts as a
/// write, but is not a *plain* access for data-race flagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Plain store to a shared variable
    Write { var: VarId },
    /// Plain load of a shared variable
    Read { var: VarId },
    /// Atomic read-modify-write of a shared variable
    Rmw { var: VarId },
    /// Memory fence
    Fence,
    /// Mutex acquisition
    Acquire { lock: LockId },
    /// Mutex release
    Release { lock: LockId },
    /// Started a deferred thread
    Spawn { child: ThreadId },
    /// Joined a finished thread
    Join { target: ThreadId },
    /// Thread ran off the end of its body
    Exit,
    /// Assertion check; `ok == false` is an error terminal
    Assert { ok: bool },
    /// Assumption check; `ok == false` is an error terminal
    Assume { ok: bool },
}

impl EventKind {
    /// The shared variable this event accesses, with a mutation flag.
    fn var_access(&self) -> Option<(VarId, bool)> {
        match self {
            EventKind::Write { var } | EventKind::Rmw { var } => Some((*var, true)),
            EventKind::Read { var } => Some((*var, false)),
            _ => None,
        }
    }

    /// Whether this is a plain (non-atomic) variable access.
    pub fn is_plain_access(&self) -> bool {
        matches!(self, EventKind::Write { .. } | EventKind::Read { .. })
    }

    /// Conflict predicate: two operations conflict when reordering them can
    /// change the outcome. Variable accesses to the same variable conflict
    /// when at least one mutates; acquisitions of the same mutex conflict
    /// (their order decides who enters first). Everything else commutes.
    pub fn conflicts_with(&self, other: &EventKind) -> bool {
        if let (Some((va, ma)), Some((vb, mb))) = (self.var_access(), other.var_access()) {
            return va == vb && (ma || mb);
        }
        matches!(
            (self, other),
            (EventKind::Acquire { lock: a }, EventKind::Acquire { lock: b }) if a == b
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Write { var } => write!(f, "write v{}", var.0),
            EventKind::Read { var } => write!(f, "read v{}", var.0),
            EventKind::Rmw { var } => write!(f, "rmw v{}", var.0),
            EventKind::Fence => write!(f, "fence"),
            EventKind::Acquire { lock } => write!(f, "acquire l{}", lock.0),
            EventKind::Release { lock } => write!(f, "release l{}", lock.0),
            EventKind::Spawn { child } => write!(f, "spawn {child}"),
            EventKind::Join { target } => write!(f, "join {target}"),
            EventKind::Exit => write!(f, "exit"),
            EventKind::Assert { ok: true } => write!(f, "assert (passed)"),
            EventKind::Assert { ok: false } => write!(f, "assert (failed)"),
            EventKind::Assume { ok: true } => write!(f, "assume (passed)"),
            EventKind::Assume { ok: false } => write!(f, "assume (failed)"),
        }
    }
}

/// Program-error classification of a run terminal.
///
/// These are data flowing through the driver loop, not engine failures: an
/// erroneous run ends normally, is analyzed like any other, and is surfaced
/// through the result aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An `assert` evaluated to false
    AssertFailure,
    /// An `assume` evaluated to false
    AssumeFailure,
    /// Unsynchronized conflicting plain accesses (only when configured as a
    /// bug class)
    DataRace,
    /// Ready set empty while unfinished threads remain
    Deadlock,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AssertFailure => write!(f, "assertion failure"),
            ErrorKind::AssumeFailure => write!(f, "assumption failure"),
            ErrorKind::DataRace => write!(f, "data race"),
            ErrorKind::Deadlock => write!(f, "deadlock"),
        }
    }
}
