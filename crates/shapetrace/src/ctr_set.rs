//! The per-path constraint set.
//!
//! A `CtrSet` is an ordered log of constraints plus two derived caches: a
//! per-symbol interval (`NumRange`) and a per-shape-symbol concrete dimension
//! list. The set is persistent — every mutation returns a new set sharing
//! structure with the old one — because path forks duplicate it wholesale.
//!
//! `add` is the single write entry point: it assigns the next id, records
//! the constraint, and hands it to the solver, which may refine ranges or
//! latch the whole set as failed. `check_immediate` answers feasibility
//! queries from the caches alone, without touching the log.

use std::fmt;

use crate::{
    constraint::{Ctr, CtrId, CtrKind},
    exp::{Dims, ExpBool, ExpNum, ExpShape, SymExp},
    linear::{self, RangeLookup},
    range::NumRange,
    rational::Rational,
    solver,
    symbol::SymbolId,
};

/// A constraint with the id it received on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCtr {
    pub id: CtrId,
    pub ctr: Ctr,
}

/// Why a set became unsatisfiable.
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub ctr: Ctr,
    pub detail: String,
}

/// The ordered constraint log with its range and shape caches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CtrSet {
    log: im::Vector<LoggedCtr>,
    ranges: im::HashMap<SymbolId, NumRange>,
    shape_dims: im::HashMap<SymbolId, Dims>,
    contradiction: Option<std::rc::Rc<Contradiction>>,
}

impl RangeLookup for CtrSet {
    fn symbol_range(&self, id: SymbolId) -> Option<&NumRange> {
        self.ranges.get(&id)
    }
}

impl CtrSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedCtr> {
        self.log.iter()
    }

    /// True once a contradiction has been latched; a failed set absorbs
    /// further `add`s without solving.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.contradiction.is_some()
    }

    #[must_use]
    pub fn contradiction(&self) -> Option<&Contradiction> {
        self.contradiction.as_deref()
    }

    /// Inserts a constraint: assigns the next id, logs it, and lets the
    /// solver refine the caches. Solver refusal (not-addable) leaves the
    /// log entry in place and the caches untouched.
    #[must_use]
    pub fn add(&self, ctr: Ctr) -> Self {
        if self.is_failed() {
            return self.clone();
        }
        let id = CtrId(self.log.len() as u32);
        let mut next = self.clone();
        next.log.push_back(LoggedCtr { id, ctr: ctr.clone() });
        solver::solve(next, &ctr)
    }

    /// Cached interval for a numeric symbol.
    #[must_use]
    pub fn get_symbol_range(&self, id: SymbolId) -> Option<&NumRange> {
        self.ranges.get(&id)
    }

    /// Replaces a symbol's cached interval.
    #[must_use]
    pub fn set_symbol_range(&self, id: SymbolId, range: NumRange) -> Self {
        let mut next = self.clone();
        next.ranges.insert(id, range);
        next
    }

    /// Concrete dimension list for a shape symbol, once enough equalities
    /// have accumulated to pin it.
    #[must_use]
    pub fn get_cached_shape(&self, id: SymbolId) -> Option<&Dims> {
        self.shape_dims.get(&id)
    }

    #[must_use]
    pub fn set_cached_shape(&self, id: SymbolId, dims: Dims) -> Self {
        let mut next = self.clone();
        next.shape_dims.insert(id, dims);
        next
    }

    pub(crate) fn latch_contradiction(&self, ctr: &Ctr, detail: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.contradiction = Some(std::rc::Rc::new(Contradiction {
            ctr: ctr.clone(),
            detail: detail.into(),
        }));
        next
    }

    /// Iterates the symbol ids with cached ranges, for reporting.
    pub fn ranged_symbols(&self) -> impl Iterator<Item = (SymbolId, &NumRange)> {
        self.ranges.iter().map(|(id, r)| (*id, r))
    }

    // --- immediate decisions -------------------------------------------------

    /// Decides a constraint from the caches alone. `Some(b)` is a definite
    /// verdict valid in every model of the set; `None` means the ranges do
    /// not determine it.
    #[must_use]
    pub fn check_immediate(&self, ctr: &Ctr) -> Option<bool> {
        match ctr.kind.as_ref() {
            CtrKind::Fail { .. } => Some(false),
            CtrKind::Eq { left, right } => self.decide_eq(left, right),
            CtrKind::Ne { left, right } => self.decide_eq(left, right).map(|b| !b),
            CtrKind::Lt { left, right } => self.decide_cmp(left, right, Cmp::Lt),
            CtrKind::Le { left, right } => self.decide_cmp(left, right, Cmp::Le),
            CtrKind::Not(inner) => self.check_immediate(inner).map(|b| !b),
            CtrKind::And(ctrs) => {
                let mut all_true = true;
                for c in ctrs {
                    match self.check_immediate(c) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => all_true = false,
                    }
                }
                all_true.then_some(true)
            }
            CtrKind::Or(ctrs) => {
                let mut all_false = true;
                for c in ctrs {
                    match self.check_immediate(c) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => all_false = false,
                    }
                }
                all_false.then_some(false)
            }
            CtrKind::Bool(b) => self.decide_bool(b),
            CtrKind::Broadcastable { left, right } => self.decide_broadcastable(left, right),
            // The shape sub-solver stores these without judging them.
            CtrKind::Forall { .. } => None,
        }
    }

    /// Truthiness of a boolean expression under the current ranges.
    #[must_use]
    pub fn decide_bool(&self, exp: &ExpBool) -> Option<bool> {
        match exp {
            ExpBool::Const(v) => Some(*v),
            ExpBool::Symbol(_) => None,
            ExpBool::Eq { left, right } => self.decide_eq(left, right),
            ExpBool::Ne { left, right } => self.decide_eq(left, right).map(|b| !b),
            ExpBool::Lt { left, right } => self.decide_cmp(left, right, Cmp::Lt),
            ExpBool::Le { left, right } => self.decide_cmp(left, right, Cmp::Le),
            ExpBool::Not(inner) => self.decide_bool(inner).map(|b| !b),
            ExpBool::And { left, right } => match (self.decide_bool(left), self.decide_bool(right)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            ExpBool::Or { left, right } => match (self.decide_bool(left), self.decide_bool(right)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        }
    }

    /// Decides `left OP right` over numeric operands by interval-evaluating
    /// the linear form of `left - right`.
    pub(crate) fn decide_cmp(&self, left: &ExpNum, right: &ExpNum, cmp: Cmp) -> Option<bool> {
        let diff = linear::normalize(&ExpNum::sub(left.clone(), right.clone()));
        let range = diff.range(self);
        let zero = Rational::zero();
        match cmp {
            Cmp::Lt => range.decide_lt(&zero),
            Cmp::Le => range.decide_le(&zero),
            Cmp::Eq => range.decide_eq(&zero),
        }
    }

    fn decide_eq(&self, left: &SymExp, right: &SymExp) -> Option<bool> {
        if !left.same_sort(right) {
            // Cross-sort equality is always false; the interpreter only
            // produces it from untyped user comparisons.
            return Some(false);
        }
        match (left, right) {
            (SymExp::Num(l), SymExp::Num(r)) => self.decide_cmp(l, r, Cmp::Eq),
            (SymExp::Bool(l), SymExp::Bool(r)) => match (self.decide_bool(l), self.decide_bool(r)) {
                (Some(a), Some(b)) => Some(a == b),
                _ => (l == r).then_some(true),
            },
            (SymExp::Str(l), SymExp::Str(r)) => match (l.as_const(), r.as_const()) {
                (Some(a), Some(b)) => Some(a == b),
                _ => (l == r).then_some(true),
            },
            (SymExp::Shape(l), SymExp::Shape(r)) => self.decide_shape_eq(l, r),
            _ => None,
        }
    }

    fn decide_shape_eq(&self, left: &ExpShape, right: &ExpShape) -> Option<bool> {
        if left == right {
            return Some(true);
        }
        let (Some(l), Some(r)) = (self.resolve_dims(left), self.resolve_dims(right)) else {
            return None;
        };
        if l.len() != r.len() {
            return Some(false);
        }
        let mut all_known = true;
        for (a, b) in l.iter().zip(r.iter()) {
            match self.decide_cmp(a, b, Cmp::Eq) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => all_known = false,
            }
        }
        all_known.then_some(true)
    }

    /// Dimension list of a shape, following the shape-symbol cache.
    #[must_use]
    pub fn resolve_dims(&self, shape: &ExpShape) -> Option<Dims> {
        match shape {
            ExpShape::Const(dims) => Some(dims.clone()),
            ExpShape::Symbol(sym) => self.shape_dims.get(&sym.id).cloned(),
            _ => None,
        }
    }

    // --- broadcast reasoning -------------------------------------------------

    /// Decides numpy broadcastability of two shapes from the caches. Only
    /// fully resolvable dimension lists produce a verdict.
    pub(crate) fn decide_broadcastable(&self, left: &ExpShape, right: &ExpShape) -> Option<bool> {
        let (l, r) = (self.resolve_dims(left)?, self.resolve_dims(right)?);
        let mut all_known = true;
        for (a, b) in align_right(&l, &r) {
            match self.broadcast_axis(&a, &b) {
                BroadcastAxis::Incompatible => return Some(false),
                BroadcastAxis::Known(_) => {}
                BroadcastAxis::Unknown => all_known = false,
            }
        }
        all_known.then_some(true)
    }

    /// Resolves one aligned axis pair under numpy rules.
    pub(crate) fn broadcast_axis(&self, l: &ExpNum, r: &ExpNum) -> BroadcastAxis {
        let one = ExpNum::int(1);
        if self.decide_cmp(l, &one, Cmp::Eq) == Some(true) {
            return BroadcastAxis::Known(r.clone());
        }
        if self.decide_cmp(r, &one, Cmp::Eq) == Some(true) {
            return BroadcastAxis::Known(l.clone());
        }
        match self.decide_cmp(l, r, Cmp::Eq) {
            Some(true) => BroadcastAxis::Known(l.clone()),
            // Neither side is 1 and the dims provably differ.
            Some(false) => {
                let l_not_one = self.decide_cmp(l, &one, Cmp::Eq) == Some(false);
                let r_not_one = self.decide_cmp(r, &one, Cmp::Eq) == Some(false);
                if l_not_one && r_not_one { BroadcastAxis::Incompatible } else { BroadcastAxis::Unknown }
            }
            None => BroadcastAxis::Unknown,
        }
    }
}

/// Verdict for one broadcast axis pair.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BroadcastAxis {
    Known(ExpNum),
    Incompatible,
    Unknown,
}

/// Comparison selector shared by the immediate checker and the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cmp {
    Eq,
    Lt,
    Le,
}

/// Right-aligns two dimension lists, padding the shorter with 1s, and yields
/// the aligned pairs left-to-right.
pub(crate) fn align_right(l: &Dims, r: &Dims) -> Vec<(ExpNum, ExpNum)> {
    let rank = l.len().max(r.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let dim = |dims: &Dims| {
            let pad = rank - dims.len();
            if i < pad { ExpNum::int(1) } else { dims[i - pad].as_ref().clone() }
        };
        out.push((dim(l), dim(r)));
    }
    out
}

impl fmt::Display for CtrSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for logged in &self.log {
            writeln!(f, "#{}: {}", logged.id.0, logged.ctr)?;
        }
        Ok(())
    }
}
