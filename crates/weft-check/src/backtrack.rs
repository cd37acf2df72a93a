//! Backtrack sets, sleep sets, and the decision-point stack
//!
//! This is the cross-run heart of the reduction. The stack mirrors the
//! current run prefix one entry per executed step; race analysis turns
//! conflicting pairs into required alternative choices at the position of
//! the earlier event, and sleep sets prune alternatives whose effect was
//! already explored from an earlier branch.
//!
//! The variant implemented is classic DPOR with sleep sets. A slept thread
//! carries the first operation it performed when it was explored at that
//! point — deterministic replay guarantees it would perform the same
//! operation again — and is woken as soon as a conflicting operation
//! executes.

use crate::config::TieBreak;
use crate::event::{Event, EventKind};
use crate::races::Race;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use weft_core::ThreadId;

/// Sleep set: thread ids proven redundant for the current run, each with
/// the operation it is asleep on.
#[derive(Debug, Clone, Default)]
pub struct SleepSet {
    slept: FxHashMap<ThreadId, EventKind>,
}

impl SleepSet {
    pub fn new() -> Self {
        SleepSet::default()
    }

    pub fn insert(&mut self, tid: ThreadId, pending: EventKind) {
        self.slept.insert(tid, pending);
    }

    pub fn contains(&self, tid: ThreadId) -> bool {
        self.slept.contains_key(&tid)
    }

    pub fn is_empty(&self) -> bool {
        self.slept.is_empty()
    }

    /// Wake every thread whose pending operation conflicts with `executed`.
    /// The woken threads' next operations no longer commute with the run,
    /// so scheduling them can now reach new outcomes.
    pub fn wake(&mut self, executed: &EventKind) {
        self.slept
            .retain(|_, pending| !pending.conflicts_with(executed));
    }
}

/// One entry of the decision stack: the scheduling step at the same index
/// of the current run's event log.
#[derive(Debug, Clone)]
pub struct ChoicePoint {
    /// Ready threads observed at this step, in backend order
    pub eligible: Vec<ThreadId>,
    /// The choice taken when this entry is (re)played
    pub chosen: ThreadId,
    /// Choices already explored here across runs, with the first operation
    /// each performed (the sleep-set payload)
    pub done: FxHashMap<ThreadId, EventKind>,
    /// Alternative choices still required here
    pub backtrack: BTreeSet<ThreadId>,
    /// Sleep set in force on entry, refreshed on every traversal
    pub sleep: SleepSet,
}

impl ChoicePoint {
    /// More than one thread was eligible: this is a decision point proper,
    /// part of the run's reproducing schedule.
    pub fn is_decision_point(&self) -> bool {
        self.eligible.len() > 1
    }
}

/// How a backtrack requirement was absorbed. Ordered so that `max` picks
/// the most progressive outcome when a race fans out over several
/// candidate threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InsertOutcome {
    /// Already explored at this point — the reordering has been visited
    AlreadyExplored,
    /// Asleep at this point: an equivalent class is reached from an
    /// earlier branch
    SleptEquivalent,
    /// Already pending in the backtrack set
    Pending,
    /// Newly required
    Added,
}

/// The cross-run decision-point stack.
#[derive(Debug, Default)]
pub struct DecisionStack {
    points: Vec<ChoicePoint>,
}

impl DecisionStack {
    pub fn new() -> Self {
        DecisionStack::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ChoicePoint {
        &mut self.points[index]
    }

    pub fn points(&self) -> &[ChoicePoint] {
        &self.points
    }

    pub fn push(&mut self, point: ChoicePoint) {
        self.points.push(point);
    }

    pub fn truncate(&mut self, len: usize) {
        self.points.truncate(len);
    }

    /// Require `tid` at `index`, classifying how the requirement lands.
    fn request(&mut self, index: usize, tid: ThreadId) -> InsertOutcome {
        let point = &mut self.points[index];
        if point.done.contains_key(&tid) {
            InsertOutcome::AlreadyExplored
        } else if point.backtrack.contains(&tid) {
            InsertOutcome::Pending
        } else if point.sleep.contains(tid) {
            InsertOutcome::SleptEquivalent
        } else {
            point.backtrack.insert(tid);
            InsertOutcome::Added
        }
    }

    /// Convert one race into scheduling obligations.
    ///
    /// The reversal target is the position of the earlier event: scheduling
    /// the later event's thread there reorders the pair. When that thread
    /// was not eligible at the target, every eligible thread is required
    /// instead (one of them must run before the later thread becomes
    /// eligible — the conservative closure of classic DPOR).
    pub fn register_race(&mut self, race: &Race, events: &[Event]) -> InsertOutcome {
        let position = race.earlier;
        let later_thread = events[race.later].thread;
        debug_assert!(position < self.points.len());
        debug_assert_ne!(events[race.earlier].thread, later_thread);

        if self.points[position].eligible.contains(&later_thread) {
            self.request(position, later_thread)
        } else {
            let candidates = self.points[position].eligible.clone();
            candidates
                .into_iter()
                .map(|tid| self.request(position, tid))
                .max()
                .unwrap_or(InsertOutcome::AlreadyExplored)
        }
    }

    /// Deepest entry with a pending obligation, if any — the depth-first
    /// selection rule.
    pub fn deepest_pending(&self) -> Option<usize> {
        self.points
            .iter()
            .rposition(|point| !point.backtrack.is_empty())
    }

    /// Prepare the next branch: truncate to the deepest pending entry, pop
    /// one obligation from it in tie-break order, and install it as that
    /// entry's forced choice. Returns false when exploration is exhausted.
    pub fn select_next(&mut self, tie_break: TieBreak) -> bool {
        let Some(index) = self.deepest_pending() else {
            return false;
        };
        self.points.truncate(index + 1);
        let point = &mut self.points[index];
        let next = match tie_break {
            TieBreak::LowestFirst => point.backtrack.iter().next().copied(),
            TieBreak::HighestFirst => point.backtrack.iter().next_back().copied(),
        };
        let Some(next) = next else {
            return false;
        };
        point.backtrack.remove(&next);
        point.chosen = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::races::RaceClass;
    use weft_core::VarId;

    fn t(i: u32) -> ThreadId {
        ThreadId(i)
    }

    fn w(var: u32) -> EventKind {
        EventKind::Write { var: VarId(var) }
    }

    fn point(eligible: &[u32], chosen: u32, first_op: EventKind) -> ChoicePoint {
        let mut done = FxHashMap::default();
        done.insert(t(chosen), first_op);
        ChoicePoint {
            eligible: eligible.iter().map(|&i| t(i)).collect(),
            chosen: t(chosen),
            done,
            backtrack: BTreeSet::new(),
            sleep: SleepSet::new(),
        }
    }

    fn ev(seq: u32, thread: u32, kind: EventKind) -> Event {
        Event {
            thread: t(thread),
            seq,
            kind,
        }
    }

    #[test]
    fn test_sleep_wake_on_conflict() {
        let mut sleep = SleepSet::new();
        sleep.insert(t(0), w(0));
        sleep.insert(t(1), w(1));
        sleep.wake(&w(0));
        assert!(!sleep.contains(t(0)));
        assert!(sleep.contains(t(1)));
    }

    #[test]
    fn test_sleep_no_wake_on_independent_op() {
        let mut sleep = SleepSet::new();
        sleep.insert(t(0), w(0));
        sleep.wake(&w(1));
        sleep.wake(&EventKind::Fence);
        assert!(sleep.contains(t(0)));
    }

    #[test]
    fn test_register_race_adds_later_thread() {
        let mut stack = DecisionStack::new();
        stack.push(point(&[0, 1], 0, w(0)));
        stack.push(point(&[0, 1], 1, w(0)));
        let events = vec![ev(0, 0, w(0)), ev(1, 1, w(0))];
        let race = Race {
            earlier: 0,
            later: 1,
            class: RaceClass::Data { plain: true },
        };
        assert_eq!(stack.register_race(&race, &events), InsertOutcome::Added);
        assert!(stack.points()[0].backtrack.contains(&t(1)));
    }

    #[test]
    fn test_register_race_already_explored() {
        let mut stack = DecisionStack::new();
        let mut p = point(&[0, 1], 0, w(0));
        p.done.insert(t(1), w(0));
        stack.push(p);
        stack.push(point(&[0, 1], 1, w(0)));
        let events = vec![ev(0, 0, w(0)), ev(1, 1, w(0))];
        let race = Race {
            earlier: 0,
            later: 1,
            class: RaceClass::Data { plain: true },
        };
        assert_eq!(
            stack.register_race(&race, &events),
            InsertOutcome::AlreadyExplored
        );
        assert!(stack.points()[0].backtrack.is_empty());
    }

    #[test]
    fn test_register_race_pending_not_duplicated() {
        let mut stack = DecisionStack::new();
        let mut p = point(&[0, 1], 0, w(0));
        p.backtrack.insert(t(1));
        stack.push(p);
        stack.push(point(&[0, 1], 1, w(0)));
        let events = vec![ev(0, 0, w(0)), ev(1, 1, w(0))];
        let race = Race {
            earlier: 0,
            later: 1,
            class: RaceClass::Data { plain: true },
        };
        assert_eq!(stack.register_race(&race, &events), InsertOutcome::Pending);
        assert_eq!(stack.points()[0].backtrack.len(), 1);
    }

    #[test]
    fn test_register_race_slept_thread_is_skipped() {
        let mut stack = DecisionStack::new();
        let mut p = point(&[0, 1], 0, w(0));
        p.sleep.insert(t(1), w(0));
        stack.push(p);
        stack.push(point(&[0, 1], 1, w(0)));
        let events = vec![ev(0, 0, w(0)), ev(1, 1, w(0))];
        let race = Race {
            earlier: 0,
            later: 1,
            class: RaceClass::Data { plain: true },
        };
        assert_eq!(
            stack.register_race(&race, &events),
            InsertOutcome::SleptEquivalent
        );
        assert!(stack.points()[0].backtrack.is_empty());
    }

    #[test]
    fn test_register_race_conservative_closure() {
        // Later thread 2 was not eligible at the target; all eligible
        // alternatives become required instead.
        let mut stack = DecisionStack::new();
        stack.push(point(&[0, 1], 0, w(0)));
        for _ in 0..3 {
            stack.push(point(&[0, 1, 2], 1, w(1)));
        }
        let mut events: Vec<Event> = (0..3).map(|i| ev(i, 1, w(1))).collect();
        events.insert(0, ev(0, 0, w(0)));
        events.push(ev(4, 2, w(0)));
        stack.push(point(&[1, 2], 2, w(0)));
        let race = Race {
            earlier: 0,
            later: 4,
            class: RaceClass::Data { plain: true },
        };
        assert_eq!(stack.register_race(&race, &events), InsertOutcome::Added);
        // thread 0 is done; thread 1 was added
        assert!(stack.points()[0].backtrack.contains(&t(1)));
        assert!(!stack.points()[0].backtrack.contains(&t(0)));
    }

    #[test]
    fn test_select_next_depth_first_and_tie_break() {
        let mut stack = DecisionStack::new();
        let mut shallow = point(&[0, 1, 2], 0, w(0));
        shallow.backtrack.insert(t(1));
        stack.push(shallow);
        let mut deep = point(&[0, 1, 2], 0, w(0));
        deep.backtrack.insert(t(2));
        deep.backtrack.insert(t(1));
        stack.push(deep);

        assert!(stack.select_next(TieBreak::LowestFirst));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.points()[1].chosen, t(1));
        assert!(stack.points()[1].backtrack.contains(&t(2)));

        assert!(stack.select_next(TieBreak::HighestFirst));
        assert_eq!(stack.points()[1].chosen, t(2));

        // Deep entry exhausted; falls back to the shallow one, dropping the
        // deeper suffix.
        assert!(stack.select_next(TieBreak::LowestFirst));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.points()[0].chosen, t(1));

        assert!(!stack.select_next(TieBreak::LowestFirst));
    }

    #[test]
    fn test_outcome_ordering() {
        assert!(InsertOutcome::Added > InsertOutcome::Pending);
        assert!(InsertOutcome::Pending > InsertOutcome::SleptEquivalent);
        assert!(InsertOutcome::SleptEquivalent > InsertOutcome::AlreadyExplored);
    }
}
