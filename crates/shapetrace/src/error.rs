//! Analyzer error kinds.
//!
//! User-program problems are *data*: they become `Val::Error` placeholders
//! and path-status transitions, and interpretation always runs every path to
//! a terminated state. The `Err` channel below is reserved for the analyzer's
//! own plumbing — invariant violations that indicate a bug in the engine or
//! a corrupted input, never a property of the analyzed program.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::source::SourceRange;

/// Result type alias for operations that can hit an internal error.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Classification of everything that can go wrong during analysis.
///
/// The string representation matches the variant name exactly, via strum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An operation received an unsupported value kind. The path is warned
    /// and continues with a placeholder value.
    TypeMismatch,
    /// An address with no heap entry, or an attribute missing after walking
    /// the full MRO. The path is warned.
    UndefinedAccess,
    /// A precondition proved false against the current constraints. The path
    /// fails.
    ShapeViolation,
    /// A precondition that could not be decided; the constraint is recorded
    /// and the path is classified at termination.
    UnprovenPrecondition,
    /// A step, fork, or loop budget was exhausted; the path is warned and
    /// carries partial state.
    BudgetExceeded,
    /// A library call explicitly declined the operation.
    NotImplemented,
    /// An invariant of the engine itself was violated. Reported to the host
    /// as an analyzer bug, never as a user-program diagnostic.
    Internal,
}

/// An engine-level error with its position, when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<SourceRange>,
}

impl AnalysisError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn at(mut self, source: Option<SourceRange>) -> Self {
        self.source = source;
        self
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AnalysisError {}
