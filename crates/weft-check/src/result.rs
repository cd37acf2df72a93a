//! Result aggregation
//!
//! Counts of explored schedules plus the first error-producing run,
//! retained as an immutable record with enough structure to render the
//! triggering interleaving.

use crate::config::ErrorPolicy;
use crate::event::{ErrorKind, Event};
use std::fmt;

/// The first error-producing run: full event sequence, classification, and
/// pre-rendered per-event labels (thread and operation names captured from
/// the backend at retention time).
#[derive(Debug, Clone)]
pub struct ErrorTrace {
    /// Error classification of the run terminal
    pub kind: ErrorKind,
    /// The complete event sequence of the run, in execution order
    pub events: Vec<Event>,
    labels: Vec<String>,
}

impl ErrorTrace {
    pub(crate) fn new(kind: ErrorKind, events: Vec<Event>, labels: Vec<String>) -> Self {
        debug_assert_eq!(events.len(), labels.len());
        ErrorTrace {
            kind,
            events,
            labels,
        }
    }

    /// Render the interleaving, one event per line in sequence-number
    /// order, indented by `indent` spaces.
    pub fn render(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{pad}{}:\n", self.kind);
        for (event, label) in self.events.iter().zip(&self.labels) {
            out.push_str(&format!("{pad}  #{:<4} {label}\n", event.seq));
        }
        out
    }
}

/// Aggregate result of one checker invocation.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Runs driven to a proper terminal (completion, error, or deadlock),
    /// including runs cut by the per-run step budget
    pub trace_count: u64,
    /// Runs abandoned because every ready thread was asleep
    pub sleepset_blocked_trace_count: u64,
    /// Runs cut by the per-run step budget (also included in `trace_count`)
    pub cut_trace_count: u64,
    /// False when the global run budget stopped exploration early
    pub complete: bool,
    /// The error-stop policy that was active
    pub policy: ErrorPolicy,
    /// First error-producing run, if any
    pub error: Option<ErrorTrace>,
}

impl CheckResult {
    /// True iff an error-producing run was found.
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trace count: {} (also {} sleepset blocked)",
            self.trace_count, self.sleepset_blocked_trace_count
        )?;
        if self.cut_trace_count > 0 {
            write!(f, " ({} cut by step budget)", self.cut_trace_count)?;
        }
        if !self.complete {
            write!(f, " [incomplete: run budget exhausted]")?;
        }
        if let Some(error) = &self.error {
            write!(f, "\n\n Error detected:\n{}", error.render(2))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use weft_core::{ThreadId, VarId};

    fn trace() -> ErrorTrace {
        ErrorTrace::new(
            ErrorKind::AssertFailure,
            vec![
                Event {
                    thread: ThreadId(0),
                    seq: 0,
                    kind: EventKind::Write { var: VarId(0) },
                },
                Event {
                    thread: ThreadId(1),
                    seq: 1,
                    kind: EventKind::Assert { ok: false },
                },
            ],
            vec!["a: write x".to_string(), "b: assert (failed)".to_string()],
        )
    }

    #[test]
    fn test_render_lists_events_in_sequence_order() {
        let rendered = trace().render(0);
        let first = rendered.find("#0").unwrap();
        let second = rendered.find("#1").unwrap();
        assert!(first < second);
        assert!(rendered.contains("assertion failure"));
        assert!(rendered.contains("a: write x"));
    }

    #[test]
    fn test_render_indent() {
        let rendered = trace().render(4);
        for line in rendered.lines() {
            assert!(line.starts_with("    "));
        }
    }

    #[test]
    fn test_has_errors() {
        let mut result = CheckResult {
            trace_count: 3,
            sleepset_blocked_trace_count: 1,
            cut_trace_count: 0,
            complete: true,
            policy: ErrorPolicy::StopOnFirst,
            error: None,
        };
        assert!(!result.has_errors());
        result.error = Some(trace());
        assert!(result.has_errors());
    }

    #[test]
    fn test_display_counts_line() {
        let result = CheckResult {
            trace_count: 7,
            sleepset_blocked_trace_count: 2,
            cut_trace_count: 0,
            complete: true,
            policy: ErrorPolicy::KeepGoing,
            error: None,
        };
        assert_eq!(
            result.to_string(),
            "Trace count: 7 (also 2 sleepset blocked)"
        );
    }

    #[test]
    fn test_display_incomplete_and_error() {
        let result = CheckResult {
            trace_count: 1,
            sleepset_blocked_trace_count: 0,
            cut_trace_count: 1,
            complete: false,
            policy: ErrorPolicy::StopOnFirst,
            error: Some(trace()),
        };
        let text = result.to_string();
        assert!(text.contains("cut by step budget"));
        assert!(text.contains("incomplete"));
        assert!(text.contains("Error detected:"));
    }
}
