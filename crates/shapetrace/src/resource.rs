//! Budget configuration and accounting.
//!
//! The analyzer is exhaustive by construction, so runaway programs are
//! contained by budgets rather than timeouts: a bound on interpreter steps,
//! a bound on simultaneously-live paths, and a bound on loop unrolling.
//! The solver's own per-constraint iteration cap lives next to the linear
//! normalizer.
//!
//! `BudgetTracker` is the accounting trait; `LimitedTracker` enforces
//! `ResourceLimits` and `NoLimitTracker` is the zero-cost opt-out used by
//! small tests.

use std::fmt;

/// Default number of interpreter steps per run.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Default cap on simultaneously-live paths.
pub const DEFAULT_MAX_PATHS: usize = 256;

/// Iterations a `for` loop over a symbolically-sized iterable is unrolled
/// before the continuing path is cut off with a budget warning.
pub const DEFAULT_LOOP_UNROLL: usize = 300;

/// Maximum user-call nesting. The interpreter recurses on the Rust stack,
/// so this bounds it well below stack exhaustion.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Hard limits for one analyzer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    pub max_steps: u64,
    pub max_paths: usize,
    pub loop_unroll: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_paths: DEFAULT_MAX_PATHS,
            loop_unroll: DEFAULT_LOOP_UNROLL,
        }
    }
}

impl ResourceLimits {
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    #[must_use]
    pub fn with_loop_unroll(mut self, loop_unroll: usize) -> Self {
        self.loop_unroll = loop_unroll;
        self
    }
}

/// Which budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BudgetError {
    /// The run-wide step budget is exhausted.
    Steps,
    /// The live-path cap was hit.
    Paths,
}

impl fmt::Debug for NoLimitTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoLimitTracker")
    }
}

/// Accounting interface consumed by the interpreter.
pub trait BudgetTracker {
    /// Records one interpreter step; errors when the budget is exhausted.
    fn step(&mut self) -> Result<(), BudgetError>;

    /// Checks that `paths` live paths are still within bounds.
    fn check_paths(&self, paths: usize) -> Result<(), BudgetError>;

    /// Loop-unroll bound for symbolically-sized iteration.
    fn loop_unroll(&self) -> usize;

    /// Steps consumed so far, for reporting. Unlimited trackers return 0.
    fn steps_taken(&self) -> u64;
}

/// Tracker that never rejects. For tests and small embedded uses.
#[derive(Clone, Copy, Default)]
pub struct NoLimitTracker;

impl BudgetTracker for NoLimitTracker {
    fn step(&mut self) -> Result<(), BudgetError> {
        Ok(())
    }

    fn check_paths(&self, _paths: usize) -> Result<(), BudgetError> {
        Ok(())
    }

    fn loop_unroll(&self) -> usize {
        DEFAULT_LOOP_UNROLL
    }

    fn steps_taken(&self) -> u64 {
        0
    }
}

/// Tracker enforcing `ResourceLimits`.
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    steps: u64,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits, steps: 0 }
    }
}

impl BudgetTracker for LimitedTracker {
    fn step(&mut self) -> Result<(), BudgetError> {
        if self.steps >= self.limits.max_steps {
            return Err(BudgetError::Steps);
        }
        self.steps += 1;
        Ok(())
    }

    fn check_paths(&self, paths: usize) -> Result<(), BudgetError> {
        if paths > self.limits.max_paths {
            return Err(BudgetError::Paths);
        }
        Ok(())
    }

    fn loop_unroll(&self) -> usize {
        self.limits.loop_unroll
    }

    fn steps_taken(&self) -> u64 {
        self.steps
    }
}
