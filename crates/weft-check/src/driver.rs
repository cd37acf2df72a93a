//! Exploration driver
//!
//! Depth-first controller over runs: RUNNING drives one run through the
//! scheduler and execution backend to a terminal, ANALYZING turns the run's
//! races into backtrack obligations, SELECTING pops the deepest pending
//! obligation or declares the exploration COMPLETE.
//!
//! All cross-run state — the decision stack and the aggregate counters —
//! lives in one [`Session`] passed through these phases; runs never
//! overlap, and budgets are only checked between runs so counters and the
//! retained error trace stay consistent.

use crate::backtrack::{ChoicePoint, DecisionStack, SleepSet};
use crate::config::{CheckConfig, ErrorPolicy, Reduction};
use crate::error::CheckError;
use crate::event::{ErrorKind, Event};
use crate::exec::ExecutionBackend;
use crate::interp::Interpreter;
use crate::races;
use crate::result::{CheckResult, ErrorTrace};
use crate::sched::{self, Decision};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, trace};
use weft_core::Program;

/// Terminal classification of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    /// All threads exited
    Completed,
    /// The backend classified an event as an error terminal
    Error(ErrorKind),
    /// Ready set empty while unfinished threads remain
    Deadlock,
    /// Per-run step budget reached
    Cut,
    /// Every ready thread was asleep
    SleepsetBlocked,
}

/// Driver state machine. ANALYZING carries the finished run.
enum DriverState {
    Running,
    Analyzing(Vec<Event>, RunOutcome),
    Selecting,
    Complete,
}

/// One exploration session: the only owner of cross-run state.
pub struct Session<'a, B: ExecutionBackend> {
    backend: &'a mut B,
    config: CheckConfig,
    stack: DecisionStack,
    trace_count: u64,
    sleepset_blocked: u64,
    cut: u64,
    runs_started: u64,
    complete: bool,
    error: Option<ErrorTrace>,
}

impl<'a, B: ExecutionBackend> Session<'a, B> {
    /// Set up a session. Fails before any run when the backend has no
    /// threads to schedule.
    pub fn new(backend: &'a mut B, config: CheckConfig) -> Result<Self, CheckError> {
        if backend.thread_count() == 0 {
            return Err(CheckError::EmptyProgram);
        }
        Ok(Session {
            backend,
            config,
            stack: DecisionStack::new(),
            trace_count: 0,
            sleepset_blocked: 0,
            cut: 0,
            runs_started: 0,
            complete: true,
            error: None,
        })
    }

    /// Drive the exploration to COMPLETE and aggregate the result.
    pub fn explore(mut self) -> Result<CheckResult, CheckError> {
        let mut state = DriverState::Running;
        loop {
            state = match state {
                DriverState::Running => {
                    let (events, outcome) = self.run_once()?;
                    DriverState::Analyzing(events, outcome)
                }
                DriverState::Analyzing(events, outcome) => {
                    self.analyze(events, outcome);
                    DriverState::Selecting
                }
                DriverState::Selecting => self.select(),
                DriverState::Complete => break,
            };
        }
        debug!(
            traces = self.trace_count,
            blocked = self.sleepset_blocked,
            complete = self.complete,
            errors = self.error.is_some(),
            "exploration finished"
        );
        Ok(CheckResult {
            trace_count: self.trace_count,
            sleepset_blocked_trace_count: self.sleepset_blocked,
            cut_trace_count: self.cut,
            complete: self.complete,
            policy: self.config.policy,
            error: self.error,
        })
    }

    /// RUNNING: replay the recorded prefix (branch choice included), then
    /// explore fresh until a terminal.
    fn run_once(&mut self) -> Result<(Vec<Event>, RunOutcome), CheckError> {
        self.backend.reset();
        self.runs_started += 1;
        let mut events: Vec<Event> = Vec::new();
        let mut sleep = SleepSet::new();
        let seed_sleep = self.config.reduction == Reduction::Dpor;

        for index in 0..self.stack.len() {
            let point = self.stack.get_mut(index);
            let chosen = point.chosen;
            if seed_sleep {
                // Choices already explored here stay asleep so their races
                // are not rediscovered under the new branch.
                for (tid, pending) in &point.done {
                    if *tid != chosen {
                        sleep.insert(*tid, pending.clone());
                    }
                }
            }
            point.sleep = sleep.clone();
            let expected = point.eligible.clone();

            let ready = self.backend.ready_threads();
            if ready.as_slice() != expected.as_slice() {
                return Err(CheckError::ReplayDivergence {
                    step: index,
                    detail: format!(
                        "ready set {ready:?} does not match recorded eligible set {expected:?}"
                    ),
                });
            }
            if !ready.contains(&chosen) {
                return Err(CheckError::InadmissibleBacktrack {
                    step: index,
                    detail: format!("forced choice {chosen} is not ready"),
                });
            }

            let event = self.backend.step(chosen)?;
            if event.thread != chosen || event.seq as usize != events.len() {
                return Err(CheckError::ReplayDivergence {
                    step: index,
                    detail: format!("backend produced {event:?} for choice {chosen}"),
                });
            }
            sleep.wake(&event.kind);
            self.stack
                .get_mut(index)
                .done
                .insert(chosen, event.kind.clone());
            let error = self.backend.is_error(&event);
            events.push(event);
            if let Some(kind) = error {
                // Only the branch step (the last entry) can introduce a new
                // error; drop any stale deeper entries.
                self.stack.truncate(index + 1);
                return Ok((events, RunOutcome::Error(kind)));
            }
        }

        loop {
            if let Some(max) = self.config.max_steps_per_run {
                if events.len() as u64 >= max {
                    return Ok((events, RunOutcome::Cut));
                }
            }
            let ready = self.backend.ready_threads();
            match sched::decide(&ready, &sleep, self.config.tie_break) {
                Decision::RunOver => {
                    let outcome = if self.backend.is_finished() {
                        RunOutcome::Completed
                    } else {
                        RunOutcome::Deadlock
                    };
                    return Ok((events, outcome));
                }
                Decision::Blocked => return Ok((events, RunOutcome::SleepsetBlocked)),
                Decision::Pick(chosen) => {
                    let event = self.backend.step(chosen)?;
                    if event.thread != chosen || event.seq as usize != events.len() {
                        return Err(CheckError::ReplayDivergence {
                            step: events.len(),
                            detail: format!("backend produced {event:?} for choice {chosen}"),
                        });
                    }
                    let mut done = FxHashMap::default();
                    done.insert(chosen, event.kind.clone());
                    self.stack.push(ChoicePoint {
                        eligible: ready.to_vec(),
                        chosen,
                        done,
                        backtrack: BTreeSet::new(),
                        sleep: sleep.clone(),
                    });
                    sleep.wake(&event.kind);
                    let error = self.backend.is_error(&event);
                    events.push(event);
                    if let Some(kind) = error {
                        return Ok((events, RunOutcome::Error(kind)));
                    }
                }
            }
        }
    }

    /// ANALYZING: update counters, convert races into obligations, retain
    /// the first error trace.
    fn analyze(&mut self, events: Vec<Event>, outcome: RunOutcome) {
        debug!(steps = events.len(), ?outcome, run = self.runs_started, "run finished");

        if outcome == RunOutcome::SleepsetBlocked {
            // Redundant by construction: every event was already analyzed by
            // the run that put the first divergence to sleep.
            self.sleepset_blocked += 1;
            return;
        }
        self.trace_count += 1;
        if outcome == RunOutcome::Cut {
            self.cut += 1;
        }

        let needs_detector =
            self.config.reduction == Reduction::Dpor || self.config.flag_races;
        let race_list = if needs_detector {
            races::detect(&events, self.backend.thread_count())
        } else {
            Vec::new()
        };

        match self.config.reduction {
            Reduction::Dpor => {
                for race in &race_list {
                    let absorbed = self.stack.register_race(race, &events);
                    trace!(
                        earlier = race.earlier,
                        later = race.later,
                        ?absorbed,
                        "race converted to obligation"
                    );
                }
            }
            Reduction::Exhaustive => {
                for index in 0..self.stack.len() {
                    let point = self.stack.get_mut(index);
                    let eligible = point.eligible.clone();
                    for tid in eligible {
                        if !point.done.contains_key(&tid) {
                            point.backtrack.insert(tid);
                        }
                    }
                }
            }
        }

        let kind = match outcome {
            RunOutcome::Error(kind) => Some(kind),
            RunOutcome::Deadlock => Some(ErrorKind::Deadlock),
            _ if self.config.flag_races && race_list.iter().any(|r| r.is_plain_data()) => {
                Some(ErrorKind::DataRace)
            }
            _ => None,
        };
        if let Some(kind) = kind {
            if self.error.is_none() {
                let labels = events
                    .iter()
                    .map(|event| {
                        format!(
                            "{}: {}",
                            self.backend.thread_name(event.thread),
                            self.backend.describe_event(event)
                        )
                    })
                    .collect();
                debug!(%kind, "first error trace retained");
                self.error = Some(ErrorTrace::new(kind, events, labels));
            }
        }
    }

    /// SELECTING: honor the stop policy and the run budget, then pop the
    /// deepest pending branch.
    fn select(&mut self) -> DriverState {
        if self.config.policy == ErrorPolicy::StopOnFirst && self.error.is_some() {
            return DriverState::Complete;
        }
        if let Some(max) = self.config.max_runs {
            if self.runs_started >= max && self.stack.deepest_pending().is_some() {
                debug!(max, "run budget exhausted");
                self.complete = false;
                return DriverState::Complete;
            }
        }
        if self.stack.select_next(self.config.tie_break) {
            DriverState::Running
        } else {
            DriverState::Complete
        }
    }
}

/// Check a program with the built-in interpreter backend.
pub fn check(program: &Program, config: &CheckConfig) -> Result<CheckResult, CheckError> {
    let mut backend = Interpreter::new(program);
    check_with_backend(&mut backend, config)
}

/// Check against any execution backend.
pub fn check_with_backend<B: ExecutionBackend>(
    backend: &mut B,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    Session::new(backend, config.clone())?.explore()
}
