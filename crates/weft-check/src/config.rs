//! Checker configuration
//!
//! Everything the exploration recognizes beyond the program itself:
//! reduction variant, error-stop policy, budgets, and the deterministic
//! tie-break order for ready threads.

use serde::{Deserialize, Serialize};

/// Reduction algorithm variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reduction {
    /// Classic DPOR with sleep sets
    #[default]
    Dpor,
    /// No reduction: every eligible alternative at every step is explored.
    /// Exponential; useful as a differential-testing reference.
    Exhaustive,
}

/// What to do when an erroneous run is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Stop exploring after the first error (the default)
    #[default]
    StopOnFirst,
    /// Keep exploring for full trace counts; the first error is retained
    KeepGoing,
}

/// Deterministic tie-break order among admissible ready threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TieBreak {
    /// Lowest thread id first (the default)
    #[default]
    LowestFirst,
    /// Highest thread id first
    HighestFirst,
}

/// Configuration for one checker invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Reduction algorithm variant
    pub reduction: Reduction,
    /// Error-stop policy
    pub policy: ErrorPolicy,
    /// Per-run step budget; a run hitting it is cut and counted separately
    pub max_steps_per_run: Option<u64>,
    /// Global run budget; exploration stops (incomplete) when reached
    pub max_runs: Option<u64>,
    /// Tie-break order for ready threads
    pub tie_break: TieBreak,
    /// Treat unsynchronized conflicting plain accesses as a bug class
    pub flag_races: bool,
}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_steps_per_run(mut self, max: u64) -> Self {
        self.max_steps_per_run = Some(max);
        self
    }

    pub fn with_max_runs(mut self, max: u64) -> Self {
        self.max_runs = Some(max);
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_flag_races(mut self, flag: bool) -> Self {
        self.flag_races = flag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckConfig::new();
        assert_eq!(config.reduction, Reduction::Dpor);
        assert_eq!(config.policy, ErrorPolicy::StopOnFirst);
        assert_eq!(config.tie_break, TieBreak::LowestFirst);
        assert!(config.max_steps_per_run.is_none());
        assert!(config.max_runs.is_none());
        assert!(!config.flag_races);
    }

    #[test]
    fn test_builders() {
        let config = CheckConfig::new()
            .with_reduction(Reduction::Exhaustive)
            .with_policy(ErrorPolicy::KeepGoing)
            .with_max_steps_per_run(100)
            .with_max_runs(1000)
            .with_tie_break(TieBreak::HighestFirst)
            .with_flag_races(true);
        assert_eq!(config.reduction, Reduction::Exhaustive);
        assert_eq!(config.policy, ErrorPolicy::KeepGoing);
        assert_eq!(config.max_steps_per_run, Some(100));
        assert_eq!(config.max_runs, Some(1000));
        assert_eq!(config.tie_break, TieBreak::HighestFirst);
        assert!(config.flag_races);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = CheckConfig::new()
            .with_reduction(Reduction::Exhaustive)
            .with_max_runs(42);
        let json = serde_json::to_string(&config).unwrap();
        let back: CheckConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reduction, config.reduction);
        assert_eq!(back.max_runs, config.max_runs);
    }
}
