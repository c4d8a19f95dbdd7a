//! Linear normalization of numeric expressions.
//!
//! `NormalExp` is the sum-of-terms form `Σ coeffᵢ·termᵢ + constant` the
//! solver works on. Normalization walks additions, subtractions, negations,
//! and multiplications with a constant factor; any other operator (mod,
//! true division, abs/floor/ceil, shape indexing, numel, min/max, pow) makes
//! its subtree an opaque term occupying a single slot. Like terms merge by
//! structural equality.

use crate::{
    exp::{ExpNum, NumBop, NumSymbol, NumUop},
    range::NumRange,
    rational::Rational,
    symbol::SymbolId,
};

/// Walk budget for one normalization. A run that exceeds it abandons the
/// decomposition and returns the whole expression as one opaque term.
pub const NORMALIZE_STEP_LIMIT: usize = 100;

/// A numeric expression in linear normal form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalExp {
    /// Aggregated terms with non-zero coefficients, in first-seen order.
    pub terms: Vec<(ExpNum, Rational)>,
    pub constant: Rational,
}

/// Source of cached symbol ranges, implemented by the constraint set.
pub trait RangeLookup {
    fn symbol_range(&self, id: SymbolId) -> Option<&NumRange>;
}

impl NormalExp {
    #[must_use]
    pub fn constant(value: Rational) -> Self {
        Self { terms: Vec::new(), constant: value }
    }

    fn opaque(e: &ExpNum) -> Self {
        Self {
            terms: vec![(e.clone(), Rational::one())],
            constant: Rational::zero(),
        }
    }

    /// True when no symbolic terms remain.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// The single `(symbol, coefficient)` pair, when the form is exactly one
    /// bare-symbol term. Any opaque term or second symbol returns `None`.
    #[must_use]
    pub fn single_symbol(&self) -> Option<(&NumSymbol, &Rational)> {
        match self.terms.as_slice() {
            [(ExpNum::Symbol(sym), coeff)] => Some((sym, coeff)),
            _ => None,
        }
    }

    /// True when every term is a bare symbol (the solvable fragment).
    #[must_use]
    pub fn is_pure_linear(&self) -> bool {
        self.terms.iter().all(|(t, _)| matches!(t, ExpNum::Symbol(_)))
    }

    fn push_term(&mut self, term: &ExpNum, coeff: Rational) {
        if coeff.is_zero() {
            return;
        }
        // Terms stay few; a linear scan beats hashing expression trees.
        for (existing, c) in &mut self.terms {
            if existing == term {
                *c = c.clone() + coeff;
                return;
            }
        }
        self.terms.push((term.clone(), coeff));
    }

    fn prune_zeros(&mut self) {
        self.terms.retain(|(_, c)| !c.is_zero());
    }

    /// Interval evaluation against cached symbol ranges: symbols read their
    /// range, opaque terms widen to the full line.
    #[must_use]
    pub fn range(&self, lookup: &impl RangeLookup) -> NumRange {
        let mut acc = NumRange::point(self.constant.clone());
        for (term, coeff) in &self.terms {
            let term_range = match term {
                ExpNum::Symbol(sym) => lookup.symbol_range(sym.id).cloned().unwrap_or_else(NumRange::unbounded),
                _ => NumRange::unbounded(),
            };
            acc = acc.add(&term_range.scale(coeff));
        }
        acc
    }
}

/// Normalizes `e` into linear form.
///
/// The walk is budgeted; pathological towers fall back to a single opaque
/// term, which the solver then reports as not-addable rather than looping.
#[must_use]
pub fn normalize(e: &ExpNum) -> NormalExp {
    let mut out = NormalExp::constant(Rational::zero());
    let mut steps = 0usize;
    if walk(e, &Rational::one(), &mut out, &mut steps).is_err() {
        return NormalExp::opaque(e);
    }
    out.prune_zeros();
    out
}

struct Overflow;

fn walk(e: &ExpNum, coeff: &Rational, out: &mut NormalExp, steps: &mut usize) -> Result<(), Overflow> {
    *steps += 1;
    if *steps > NORMALIZE_STEP_LIMIT {
        return Err(Overflow);
    }
    match e {
        ExpNum::Const(v) => {
            out.constant = out.constant.clone() + v.to_rational() * coeff.clone();
        }
        ExpNum::Symbol(_) => out.push_term(e, coeff.clone()),
        ExpNum::Uop { op: NumUop::Neg, operand } => {
            walk(operand, &-coeff.clone(), out, steps)?;
        }
        ExpNum::Bop { op: NumBop::Add, left, right } => {
            walk(left, coeff, out, steps)?;
            walk(right, coeff, out, steps)?;
        }
        ExpNum::Bop { op: NumBop::Sub, left, right } => {
            walk(left, coeff, out, steps)?;
            walk(right, &-coeff.clone(), out, steps)?;
        }
        ExpNum::Bop { op: NumBop::Mul, left, right } => {
            // Only a constant factor keeps the product linear.
            if let Some(k) = left.as_const() {
                walk(right, &(coeff.clone() * k.to_rational()), out, steps)?;
            } else if let Some(k) = right.as_const() {
                walk(left, &(coeff.clone() * k.to_rational()), out, steps)?;
            } else {
                out.push_term(e, coeff.clone());
            }
        }
        // mod, truediv, pow, abs/floor/ceil, shape indexing, numel, min/max
        // stay opaque: one slot each.
        _ => out.push_term(e, coeff.clone()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::symbol::{IdGen, NumKind};

    fn sym(idg: &IdGen, name: &str) -> ExpNum {
        ExpNum::symbol(NumSymbol::new(idg.fresh_symbol(), NumKind::Int, name))
    }

    #[test]
    fn aggregates_like_terms() {
        let idg = IdGen::new();
        let s = sym(&idg, "s");
        // 2*s + 3 + s - 1  ==>  3*s + 2
        let e = ExpNum::sub(
            ExpNum::add(
                ExpNum::add(ExpNum::mul(ExpNum::int(2), s.clone()), ExpNum::int(3)),
                s.clone(),
            ),
            ExpNum::int(1),
        );
        let n = normalize(&e);
        assert_eq!(n.constant, Rational::from_i64(2));
        assert_eq!(n.terms, vec![(s, Rational::from_i64(3))]);
    }

    #[test]
    fn cancelling_terms_leaves_a_constant() {
        let idg = IdGen::new();
        let s = sym(&idg, "s");
        let e = ExpNum::sub(s.clone(), s);
        let n = normalize(&e);
        assert!(n.is_constant());
        assert_eq!(n.constant, Rational::zero());
    }

    #[test]
    fn nonlinear_subtrees_stay_opaque() {
        let idg = IdGen::new();
        let s = sym(&idg, "s");
        let t = sym(&idg, "t");
        let e = ExpNum::add(ExpNum::mul(s.clone(), t.clone()), ExpNum::int(1));
        let n = normalize(&e);
        assert_eq!(n.constant, Rational::one());
        assert_eq!(n.terms.len(), 1);
        assert!(!n.is_pure_linear());
        assert!(n.single_symbol().is_none());
    }

    #[test]
    fn negation_flips_coefficients() {
        let idg = IdGen::new();
        let s = sym(&idg, "s");
        let e = ExpNum::neg(ExpNum::mul(ExpNum::int(4), s.clone()));
        let n = normalize(&e);
        assert_eq!(n.terms, vec![(s, Rational::from_i64(-4))]);
    }
}
