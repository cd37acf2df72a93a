//! Post-run race detection
//!
//! After a run completes, one forward scan over its event log finds every
//! pair of conflicting events from different threads that no
//! synchronization orders. Happens-before is rebuilt from the log itself:
//! program order, release→acquire chains per mutex, spawn edges, and
//! exit→join edges. The engine stores no clocks on events — races reference
//! the log by position.
//!
//! Candidate sets are bounded: per variable, the last unordered write plus
//! the latest read per thread since that write; per mutex, the last
//! acquisition. Reversing adjacent conflicting pairs is enough for DPOR —
//! farther reorderings are reached transitively across runs.

use crate::clock::ClockVec;
use crate::event::{Event, EventKind};
use rustc_hash::FxHashMap;
use weft_core::{LockId, ThreadId, VarId};

/// An unordered conflicting pair, referencing the run log by position.
/// `earlier` executed before `later` in this run; the pair is recorded once,
/// in that orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Race {
    pub earlier: usize,
    pub later: usize,
    pub class: RaceClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceClass {
    /// Conflicting variable accesses. `plain` is set when both sides are
    /// non-atomic — the only class reportable as a data-race bug.
    Data { plain: bool },
    /// Reversible mutex acquisition order.
    Lock,
}

impl Race {
    /// Whether this race is a data-race bug candidate.
    pub fn is_plain_data(&self) -> bool {
        matches!(self.class, RaceClass::Data { plain: true })
    }
}

/// A remembered access: log position, owner thread, clock at the event, and
/// whether the access was plain.
#[derive(Debug, Clone)]
struct Access {
    index: usize,
    thread: ThreadId,
    clock: ClockVec,
    plain: bool,
}

#[derive(Debug, Default)]
struct VarHistory {
    last_write: Option<Access>,
    /// Latest read per thread since `last_write`; earlier reads of the same
    /// thread are program-ordered behind it and need no separate candidate
    reads: FxHashMap<ThreadId, Access>,
}

#[derive(Debug, Default)]
struct LockHistory {
    last_acquire: Option<Access>,
    release_clock: Option<ClockVec>,
}

/// Scan a completed run's event log and return its races in log order.
pub fn detect(events: &[Event], thread_count: usize) -> Vec<Race> {
    let mut races = Vec::new();
    let mut clocks: Vec<ClockVec> = (0..thread_count).map(|_| ClockVec::new(thread_count)).collect();
    let mut vars: FxHashMap<VarId, VarHistory> = FxHashMap::default();
    let mut locks: FxHashMap<LockId, LockHistory> = FxHashMap::default();
    let mut exit_clocks: FxHashMap<ThreadId, ClockVec> = FxHashMap::default();

    for (index, event) in events.iter().enumerate() {
        let t = event.thread;
        match &event.kind {
            EventKind::Acquire { lock } => {
                let history = locks.entry(*lock).or_default();
                // Test the previous acquisition against this thread's clock
                // *before* it observes the release: ordering that survives
                // comes from other synchronization, and the pair is then a
                // genuine happens-before edge rather than a reversible race.
                let mut pre = clocks[t.as_usize()].clone();
                pre.tick(t);
                if let Some(prev) = &history.last_acquire {
                    if prev.thread != t && !prev.clock.le(&pre) {
                        races.push(Race {
                            earlier: prev.index,
                            later: index,
                            class: RaceClass::Lock,
                        });
                    }
                }
                if let Some(release) = &history.release_clock {
                    clocks[t.as_usize()].join(release);
                }
                clocks[t.as_usize()].tick(t);
                history.last_acquire = Some(Access {
                    index,
                    thread: t,
                    clock: clocks[t.as_usize()].clone(),
                    plain: false,
                });
            }
            EventKind::Release { lock } => {
                clocks[t.as_usize()].tick(t);
                locks.entry(*lock).or_default().release_clock =
                    Some(clocks[t.as_usize()].clone());
            }
            EventKind::Write { var } | EventKind::Rmw { var } => {
                let plain = event.kind.is_plain_access();
                clocks[t.as_usize()].tick(t);
                let clock = clocks[t.as_usize()].clone();
                let history = vars.entry(*var).or_default();
                if let Some(write) = &history.last_write {
                    if write.thread != t && !write.clock.le(&clock) {
                        races.push(Race {
                            earlier: write.index,
                            later: index,
                            class: RaceClass::Data {
                                plain: write.plain && plain,
                            },
                        });
                    }
                }
                for (reader, read) in &history.reads {
                    if *reader != t && !read.clock.le(&clock) {
                        races.push(Race {
                            earlier: read.index,
                            later: index,
                            class: RaceClass::Data {
                                plain: read.plain && plain,
                            },
                        });
                    }
                }
                history.last_write = Some(Access {
                    index,
                    thread: t,
                    clock,
                    plain,
                });
                history.reads.clear();
            }
            EventKind::Read { var } => {
                clocks[t.as_usize()].tick(t);
                let clock = clocks[t.as_usize()].clone();
                let history = vars.entry(*var).or_default();
                if let Some(write) = &history.last_write {
                    if write.thread != t && !write.clock.le(&clock) {
                        races.push(Race {
                            earlier: write.index,
                            later: index,
                            class: RaceClass::Data { plain: write.plain },
                        });
                    }
                }
                history.reads.insert(
                    t,
                    Access {
                        index,
                        thread: t,
                        clock,
                        plain: true,
                    },
                );
            }
            EventKind::Spawn { child } => {
                clocks[t.as_usize()].tick(t);
                let parent = clocks[t.as_usize()].clone();
                clocks[child.as_usize()].join(&parent);
            }
            EventKind::Join { target } => {
                if let Some(exit) = exit_clocks.get(target) {
                    let exit = exit.clone();
                    clocks[t.as_usize()].join(&exit);
                }
                clocks[t.as_usize()].tick(t);
            }
            EventKind::Exit => {
                clocks[t.as_usize()].tick(t);
                exit_clocks.insert(t, clocks[t.as_usize()].clone());
            }
            EventKind::Fence | EventKind::Assert { .. } | EventKind::Assume { .. } => {
                clocks[t.as_usize()].tick(t);
            }
        }
    }

    // The per-variable read sets iterate in hash order; sort so callers see
    // a deterministic race list regardless.
    races.sort_by_key(|race| (race.later, race.earlier));
    races
}
