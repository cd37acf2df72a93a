//! Built-in execution backend: a sequentially consistent interpreter over
//! the weft-core program form
//!
//! The interpreter owns all target-program state — program counters,
//! registers, shared variables, mutexes — and exposes only the
//! [`ExecutionBackend`] event stream to the engine. Scheduling is entirely
//! external: the interpreter executes exactly the thread it is told to and
//! reports which threads could run next.
//!
//! Determinism is structural: given the same step sequence after a reset,
//! every operation reads and writes the same state in the same order.

use crate::event::{ErrorKind, Event, EventKind};
use crate::exec::{BackendFault, ExecutionBackend, ReadySet};
use weft_core::{Op, Program, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadPhase {
    /// Deferred thread, not yet spawned
    NotStarted,
    /// Has operations left (or the final exit) to execute
    Active,
    /// Exited, or killed by a failed assert/assume
    Finished,
}

#[derive(Debug, Clone)]
struct ThreadState {
    phase: ThreadPhase,
    /// Index of the next operation; `ops.len()` means the exit step is next
    pc: usize,
    regs: Vec<i64>,
}

/// Sequentially consistent interpreter for a [`Program`].
#[derive(Debug, Clone)]
pub struct Interpreter<'p> {
    program: &'p Program,
    threads: Vec<ThreadState>,
    /// Shared variable values, indexed by `VarId`; all start at 0
    vars: Vec<i64>,
    /// Mutex owners, indexed by `LockId`
    locks: Vec<Option<ThreadId>>,
    /// Next run-local sequence number
    seq: u32,
}

impl<'p> Interpreter<'p> {
    /// Build an interpreter at the program's initial state. The program
    /// must already be validated (see [`weft_core::load_str`]).
    pub fn new(program: &'p Program) -> Self {
        let threads = program
            .threads
            .iter()
            .map(|def| ThreadState {
                phase: if def.deferred {
                    ThreadPhase::NotStarted
                } else {
                    ThreadPhase::Active
                },
                pc: 0,
                regs: vec![0; def.regs.len()],
            })
            .collect();
        Interpreter {
            program,
            threads,
            vars: vec![0; program.vars.len()],
            locks: vec![None; program.locks.len()],
            seq: 0,
        }
    }

    /// Current value of a shared variable (test hook).
    #[cfg(test)]
    pub(crate) fn var_value(&self, var: weft_core::VarId) -> i64 {
        self.vars[var.as_usize()]
    }

    fn is_ready(&self, tid: ThreadId) -> bool {
        let state = &self.threads[tid.as_usize()];
        if state.phase != ThreadPhase::Active {
            return false;
        }
        let def = &self.program.threads[tid.as_usize()];
        match def.ops.get(state.pc) {
            // Next op is the implicit exit
            None => true,
            Some(Op::Lock(lock)) => self.locks[lock.as_usize()].is_none(),
            Some(Op::Join(target)) => {
                self.threads[target.as_usize()].phase == ThreadPhase::Finished
            }
            Some(_) => true,
        }
    }
}

impl ExecutionBackend for Interpreter<'_> {
    fn thread_count(&self) -> usize {
        self.threads.len()
    }

    fn ready_threads(&self) -> ReadySet {
        (0..self.threads.len() as u32)
            .map(ThreadId)
            .filter(|&tid| self.is_ready(tid))
            .collect()
    }

    fn step(&mut self, tid: ThreadId) -> Result<Event, BackendFault> {
        if !self.is_ready(tid) {
            return Err(BackendFault(format!("stepped non-ready thread {tid}")));
        }
        let def = &self.program.threads[tid.as_usize()];
        let state = &mut self.threads[tid.as_usize()];

        let kind = match def.ops.get(state.pc) {
            None => {
                state.phase = ThreadPhase::Finished;
                EventKind::Exit
            }
            Some(op) => {
                let kind = match op {
                    Op::Write { var, value } => {
                        self.vars[var.as_usize()] = value.eval(&state.regs);
                        EventKind::Write { var: *var }
                    }
                    Op::Read { dst, var } => {
                        state.regs[dst.as_usize()] = self.vars[var.as_usize()];
                        EventKind::Read { var: *var }
                    }
                    Op::Fadd { dst, var, operand } => {
                        let old = self.vars[var.as_usize()];
                        self.vars[var.as_usize()] = old.wrapping_add(operand.eval(&state.regs));
                        if let Some(dst) = dst {
                            state.regs[dst.as_usize()] = old;
                        }
                        EventKind::Rmw { var: *var }
                    }
                    Op::Fence => EventKind::Fence,
                    Op::Lock(lock) => {
                        self.locks[lock.as_usize()] = Some(tid);
                        EventKind::Acquire { lock: *lock }
                    }
                    Op::Unlock(lock) => {
                        if self.locks[lock.as_usize()] != Some(tid) {
                            return Err(BackendFault(format!(
                                "{} released mutex `{}` it does not hold",
                                self.program.thread_name(tid),
                                self.program.lock_name(*lock)
                            )));
                        }
                        self.locks[lock.as_usize()] = None;
                        EventKind::Release { lock: *lock }
                    }
                    Op::Spawn(child) => {
                        // validate() guarantees the target is deferred and
                        // spawned at most once
                        self.threads[child.as_usize()].phase = ThreadPhase::Active;
                        EventKind::Spawn { child: *child }
                    }
                    Op::Join(target) => EventKind::Join { target: *target },
                    Op::Assert(cond) => {
                        let ok = cond.eval(&state.regs) != 0;
                        if !ok {
                            state.phase = ThreadPhase::Finished;
                        }
                        EventKind::Assert { ok }
                    }
                    Op::Assume(cond) => {
                        let ok = cond.eval(&state.regs) != 0;
                        if !ok {
                            state.phase = ThreadPhase::Finished;
                        }
                        EventKind::Assume { ok }
                    }
                };
                // Spawn/Assert/Assume may have re-borrowed; state is stale
                let state = &mut self.threads[tid.as_usize()];
                state.pc += 1;
                kind
            }
        };

        let seq = self.seq;
        self.seq += 1;
        Ok(Event { thread: tid, seq, kind })
    }

    fn is_finished(&self) -> bool {
        self.threads
            .iter()
            .all(|t| t.phase == ThreadPhase::Finished)
    }

    fn is_error(&self, event: &Event) -> Option<ErrorKind> {
        match event.kind {
            EventKind::Assert { ok: false } => Some(ErrorKind::AssertFailure),
            EventKind::Assume { ok: false } => Some(ErrorKind::AssumeFailure),
            _ => None,
        }
    }

    fn reset(&mut self) {
        for (state, def) in self.threads.iter_mut().zip(&self.program.threads) {
            state.phase = if def.deferred {
                ThreadPhase::NotStarted
            } else {
                ThreadPhase::Active
            };
            state.pc = 0;
            state.regs.iter_mut().for_each(|r| *r = 0);
        }
        self.vars.iter_mut().for_each(|v| *v = 0);
        self.locks.iter_mut().for_each(|l| *l = None);
        self.seq = 0;
    }

    fn thread_name(&self, tid: ThreadId) -> String {
        self.program.thread_name(tid).to_string()
    }

    fn describe_event(&self, event: &Event) -> String {
        match &event.kind {
            EventKind::Write { var } => format!("write {}", self.program.var_name(*var)),
            EventKind::Read { var } => format!("read {}", self.program.var_name(*var)),
            EventKind::Rmw { var } => format!("fadd {}", self.program.var_name(*var)),
            EventKind::Fence => "fence".to_string(),
            EventKind::Acquire { lock } => format!("lock {}", self.program.lock_name(*lock)),
            EventKind::Release { lock } => format!("unlock {}", self.program.lock_name(*lock)),
            EventKind::Spawn { child } => {
                format!("spawn {}", self.program.thread_name(*child))
            }
            EventKind::Join { target } => {
                format!("join {}", self.program.thread_name(*target))
            }
            EventKind::Exit => "exit".to_string(),
            EventKind::Assert { ok: true } => "assert (passed)".to_string(),
            EventKind::Assert { ok: false } => "assert (failed)".to_string(),
            EventKind::Assume { ok: true } => "assume (passed)".to_string(),
            EventKind::Assume { ok: false } => "assume (failed)".to_string(),
        }
    }
}
