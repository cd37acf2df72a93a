//! DPOR exploration engine for the weft model checker
//!
//! weft-check drives a target program — the built-in interpreter over the
//! weft-core form, or any [`ExecutionBackend`] — through every schedule
//! that can produce a distinct outcome, using dynamic partial order
//! reduction with sleep sets, and reports assertion failures, deadlocks,
//! and data races with the interleaving that triggers them.
//!
//! ```
//! use weft_check::{check, CheckConfig};
//!
//! let program = weft_core::load_str(
//!     "thread a { write x = 1; }\nthread b { write x = 2; }",
//! )
//! .unwrap();
//! let result = check(&program, &CheckConfig::new()).unwrap();
//! assert_eq!(result.trace_count, 2);
//! assert!(!result.has_errors());
//! ```

pub mod backtrack;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod exec;
pub mod interp;
pub mod races;
pub mod result;
pub mod sched;

pub use config::{CheckConfig, ErrorPolicy, Reduction, TieBreak};
pub use driver::{check, check_with_backend, Session};
pub use error::CheckError;
pub use event::{ErrorKind, Event, EventKind};
pub use exec::{BackendFault, ExecutionBackend, ReadySet};
pub use interp::Interpreter;
pub use result::{CheckResult, ErrorTrace};
