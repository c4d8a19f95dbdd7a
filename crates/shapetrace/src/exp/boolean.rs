//! Symbolic boolean expressions.

use std::{fmt, hash::Hash, rc::Rc};

use crate::{
    exp::{ExpNum, SymExp},
    symbol::SymbolId,
};

/// A boolean symbol: identity and a display name.
#[derive(Debug, Clone)]
pub struct BoolSymbol {
    pub id: SymbolId,
    pub name: Rc<str>,
}

impl BoolSymbol {
    #[must_use]
    pub fn new(id: SymbolId, name: &str) -> Self {
        Self { id, name: Rc::from(name) }
    }
}

impl PartialEq for BoolSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BoolSymbol {}

impl Hash for BoolSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A symbolic boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpBool {
    Const(bool),
    Symbol(BoolSymbol),
    /// Equality of two same-sort expressions.
    Eq { left: SymExp, right: SymExp },
    Ne { left: SymExp, right: SymExp },
    /// Strict numeric less-than.
    Lt { left: Rc<ExpNum>, right: Rc<ExpNum> },
    Le { left: Rc<ExpNum>, right: Rc<ExpNum> },
    Not(Rc<ExpBool>),
    And { left: Rc<ExpBool>, right: Rc<ExpBool> },
    Or { left: Rc<ExpBool>, right: Rc<ExpBool> },
}

impl ExpBool {
    #[must_use]
    pub fn truth(v: bool) -> Self {
        Self::Const(v)
    }

    #[must_use]
    pub fn symbol(sym: BoolSymbol) -> Self {
        Self::Symbol(sym)
    }

    #[must_use]
    pub fn as_const(&self) -> Option<bool> {
        match self {
            Self::Const(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn eq(left: impl Into<SymExp>, right: impl Into<SymExp>) -> Self {
        Self::Eq { left: left.into(), right: right.into() }
    }

    #[must_use]
    pub fn ne(left: impl Into<SymExp>, right: impl Into<SymExp>) -> Self {
        Self::Ne { left: left.into(), right: right.into() }
    }

    #[must_use]
    pub fn lt(left: ExpNum, right: ExpNum) -> Self {
        if let (Some(a), Some(b)) = (left.as_const(), right.as_const())
            && let Some(ord) = a.compare(b)
        {
            return Self::Const(ord == std::cmp::Ordering::Less);
        }
        Self::Lt { left: Rc::new(left), right: Rc::new(right) }
    }

    #[must_use]
    pub fn le(left: ExpNum, right: ExpNum) -> Self {
        if let (Some(a), Some(b)) = (left.as_const(), right.as_const())
            && let Some(ord) = a.compare(b)
        {
            return Self::Const(ord != std::cmp::Ordering::Greater);
        }
        Self::Le { left: Rc::new(left), right: Rc::new(right) }
    }

    #[must_use]
    pub fn not(operand: Self) -> Self {
        match operand {
            Self::Const(v) => Self::Const(!v),
            // Double negation cancels at construction already.
            Self::Not(inner) => inner.as_ref().clone(),
            other => Self::Not(Rc::new(other)),
        }
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        match (left.as_const(), right.as_const()) {
            (Some(false), _) | (_, Some(false)) => Self::Const(false),
            (Some(true), _) => right,
            (_, Some(true)) => left,
            _ => Self::And { left: Rc::new(left), right: Rc::new(right) },
        }
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        match (left.as_const(), right.as_const()) {
            (Some(true), _) | (_, Some(true)) => Self::Const(true),
            (Some(false), _) => right,
            (_, Some(false)) => left,
            _ => Self::Or { left: Rc::new(left), right: Rc::new(right) },
        }
    }
}

impl fmt::Display for ExpBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v}"),
            Self::Symbol(s) => write!(f, "{}", s.name),
            Self::Eq { left, right } => write!(f, "({} == {})", DisplaySym(left), DisplaySym(right)),
            Self::Ne { left, right } => write!(f, "({} != {})", DisplaySym(left), DisplaySym(right)),
            Self::Lt { left, right } => write!(f, "({left} < {right})"),
            Self::Le { left, right } => write!(f, "({left} <= {right})"),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::And { left, right } => write!(f, "({left} and {right})"),
            Self::Or { left, right } => write!(f, "({left} or {right})"),
        }
    }
}

struct DisplaySym<'a>(&'a SymExp);

impl fmt::Display for DisplaySym<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            SymExp::Num(e) => write!(f, "{e}"),
            SymExp::Bool(e) => write!(f, "{e}"),
            SymExp::Str(e) => write!(f, "{e}"),
            SymExp::Shape(e) => write!(f, "{e}"),
        }
    }
}
