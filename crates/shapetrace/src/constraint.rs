//! The constraint algebra.
//!
//! Constraints are immutable trees layered over the expression sorts. They
//! are born unnumbered; a `CtrId` is assigned when a constraint enters a
//! constraint set, so the same tree can be shared by sibling paths with
//! different ids on each.

use std::{fmt, rc::Rc};

use crate::{
    exp::{ExpBool, ExpNum, ExpShape, NumSymbol, SymExp},
    source::SourceRange,
};

/// Position of a constraint inside one constraint set's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CtrId(pub u32);

/// Discriminated constraint forms.
#[derive(Debug, Clone, PartialEq)]
pub enum CtrKind {
    /// Equality of two same-sort expressions.
    Eq { left: SymExp, right: SymExp },
    Ne { left: SymExp, right: SymExp },
    Lt { left: Rc<ExpNum>, right: Rc<ExpNum> },
    Le { left: Rc<ExpNum>, right: Rc<ExpNum> },
    And(Vec<Ctr>),
    Or(Vec<Ctr>),
    Not(Box<Ctr>),
    /// `∀ sym ∈ [lo, hi]. body`
    Forall {
        sym: NumSymbol,
        lo: Rc<ExpNum>,
        hi: Rc<ExpNum>,
        body: Box<Ctr>,
    },
    /// The two shapes can be broadcast together under numpy rules.
    Broadcastable { left: Rc<ExpShape>, right: Rc<ExpShape> },
    /// An arbitrary boolean expression lifted into constraint position.
    Bool(Rc<ExpBool>),
    /// An unconditionally unsatisfiable constraint.
    Fail { reason: Rc<str> },
}

/// One constraint with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Ctr {
    pub kind: Rc<CtrKind>,
    pub source: Option<SourceRange>,
    pub message: Option<Rc<str>>,
}

impl Ctr {
    fn new(kind: CtrKind) -> Self {
        Self { kind: Rc::new(kind), source: None, message: None }
    }

    #[must_use]
    pub fn eq(left: impl Into<SymExp>, right: impl Into<SymExp>) -> Self {
        Self::new(CtrKind::Eq { left: left.into(), right: right.into() })
    }

    #[must_use]
    pub fn ne(left: impl Into<SymExp>, right: impl Into<SymExp>) -> Self {
        Self::new(CtrKind::Ne { left: left.into(), right: right.into() })
    }

    #[must_use]
    pub fn lt(left: ExpNum, right: ExpNum) -> Self {
        Self::new(CtrKind::Lt { left: Rc::new(left), right: Rc::new(right) })
    }

    #[must_use]
    pub fn le(left: ExpNum, right: ExpNum) -> Self {
        Self::new(CtrKind::Le { left: Rc::new(left), right: Rc::new(right) })
    }

    #[must_use]
    pub fn and(ctrs: Vec<Self>) -> Self {
        Self::new(CtrKind::And(ctrs))
    }

    #[must_use]
    pub fn or(ctrs: Vec<Self>) -> Self {
        Self::new(CtrKind::Or(ctrs))
    }

    #[must_use]
    pub fn not(ctr: Self) -> Self {
        Self::new(CtrKind::Not(Box::new(ctr)))
    }

    #[must_use]
    pub fn forall(sym: NumSymbol, lo: ExpNum, hi: ExpNum, body: Self) -> Self {
        Self::new(CtrKind::Forall {
            sym,
            lo: Rc::new(lo),
            hi: Rc::new(hi),
            body: Box::new(body),
        })
    }

    #[must_use]
    pub fn broadcastable(left: ExpShape, right: ExpShape) -> Self {
        Self::new(CtrKind::Broadcastable { left: Rc::new(left), right: Rc::new(right) })
    }

    #[must_use]
    pub fn bool_exp(exp: ExpBool) -> Self {
        Self::new(CtrKind::Bool(Rc::new(exp)))
    }

    #[must_use]
    pub fn fail(reason: &str) -> Self {
        Self::new(CtrKind::Fail { reason: Rc::from(reason) })
    }

    /// Attaches a source position.
    #[must_use]
    pub fn at(mut self, source: Option<SourceRange>) -> Self {
        self.source = source;
        self
    }

    /// Attaches a human-readable message shown when the constraint fails.
    #[must_use]
    pub fn with_msg(mut self, message: &str) -> Self {
        self.message = Some(Rc::from(message));
        self
    }

    /// Attaches an optional message, keeping any existing one when absent.
    #[must_use]
    pub fn with_opt_msg(mut self, message: Option<&str>) -> Self {
        if let Some(message) = message {
            self.message = Some(Rc::from(message));
        }
        self
    }

    /// Lifts a boolean expression into constraint position, mapping boolean
    /// structure onto the matching constraint forms so the solver can
    /// destruct it without a special case per connective.
    #[must_use]
    pub fn lift(exp: &ExpBool) -> Self {
        match exp {
            ExpBool::Eq { left, right } => Self::eq(left.clone(), right.clone()),
            ExpBool::Ne { left, right } => Self::ne(left.clone(), right.clone()),
            ExpBool::Lt { left, right } => Self::lt(left.as_ref().clone(), right.as_ref().clone()),
            ExpBool::Le { left, right } => Self::le(left.as_ref().clone(), right.as_ref().clone()),
            ExpBool::Not(inner) => Self::not(Self::lift(inner)),
            ExpBool::And { left, right } => Self::and(vec![Self::lift(left), Self::lift(right)]),
            ExpBool::Or { left, right } => Self::or(vec![Self::lift(left), Self::lift(right)]),
            ExpBool::Const(_) | ExpBool::Symbol(_) => Self::bool_exp(exp.clone()),
        }
    }

    /// Negation of this constraint, reusing source and message.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            kind: Rc::new(CtrKind::Not(Box::new(self.clone()))),
            source: self.source,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Ctr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            CtrKind::Eq { left, right } => write!(f, "{} == {}", Sym(left), Sym(right)),
            CtrKind::Ne { left, right } => write!(f, "{} != {}", Sym(left), Sym(right)),
            CtrKind::Lt { left, right } => write!(f, "{left} < {right}"),
            CtrKind::Le { left, right } => write!(f, "{left} <= {right}"),
            CtrKind::And(cs) => join(f, cs, " and "),
            CtrKind::Or(cs) => join(f, cs, " or "),
            CtrKind::Not(c) => write!(f, "not ({c})"),
            CtrKind::Forall { sym, lo, hi, body } => {
                write!(f, "forall {} in [{lo}, {hi}]. {body}", sym.name)
            }
            CtrKind::Broadcastable { left, right } => write!(f, "broadcastable({left}, {right})"),
            CtrKind::Bool(b) => write!(f, "{b}"),
            CtrKind::Fail { reason } => write!(f, "fail: {reason}"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, ctrs: &[Ctr], sep: &str) -> fmt::Result {
    for (i, c) in ctrs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "({c})")?;
    }
    Ok(())
}

struct Sym<'a>(&'a SymExp);

impl fmt::Display for Sym<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            SymExp::Num(e) => write!(f, "{e}"),
            SymExp::Bool(e) => write!(f, "{e}"),
            SymExp::Str(e) => write!(f, "{e}"),
            SymExp::Shape(e) => write!(f, "{e}"),
        }
    }
}
