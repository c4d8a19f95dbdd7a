//! The range-tracking constraint solver.
//!
//! Driven by `CtrSet::add`. Each incoming constraint is destructed into
//! primitive constraints (negations pushed inward, conjunctions split,
//! decided disjunct sides dropped), then every numeric primitive is moved
//! into `lhs - rhs OP 0` form, linear-normalized, and — when exactly one
//! bare symbol remains — turned into an interval that narrows the symbol's
//! cached range.
//!
//! The solver never reports failure to its caller. An unsupported primitive
//! (several symbols, opaque non-linear term, quantifier, symbolic broadcast)
//! simply stays in the log, where termination-time classification re-checks
//! it. Only a *provable* contradiction latches the set as failed.

use crate::{
    constraint::{Ctr, CtrKind},
    ctr_set::{Cmp, CtrSet},
    exp::{ExpBool, ExpNum, ExpShape, SymExp},
    linear,
    range::NumRange,
    rational::Rational,
    symbol::NumKind,
};

/// Refines `set`'s caches with `ctr`. The constraint itself is already in
/// the log; this only updates ranges, shape dims, or the failure latch.
pub(crate) fn solve(set: CtrSet, ctr: &Ctr) -> CtrSet {
    let ctr = crate::simplify::simplify_ctr(&set, ctr);
    let mut prims = Vec::new();
    destruct(&set, &ctr, false, &mut prims);

    let mut set = set;
    for prim in prims {
        match set.check_immediate(&prim) {
            Some(true) => continue,
            Some(false) => {
                let detail = prim
                    .message
                    .as_deref()
                    .map_or_else(|| format!("constraint is unsatisfiable: {prim}"), str::to_owned);
                return set.latch_contradiction(&prim, detail);
            }
            None => {}
        }
        set = apply_primitive(set, &prim);
        if set.is_failed() {
            break;
        }
    }
    set
}

/// Flattens `ctr` (negated when `neg`) into primitive constraints.
fn destruct(set: &CtrSet, ctr: &Ctr, neg: bool, out: &mut Vec<Ctr>) {
    match ctr.kind.as_ref() {
        CtrKind::Not(inner) => destruct(set, inner, !neg, out),
        CtrKind::And(ctrs) if !neg => {
            for c in ctrs {
                destruct(set, c, false, out);
            }
        }
        // ¬(a ∧ b) = ¬a ∨ ¬b
        CtrKind::And(ctrs) => {
            let negated = Ctr::or(ctrs.iter().map(Ctr::negate).collect())
                .at(ctr.source)
                .with_opt_msg(ctr.message.as_deref());
            destruct(set, &negated, false, out);
        }
        CtrKind::Or(ctrs) if neg => {
            for c in ctrs {
                destruct(set, c, true, out);
            }
        }
        CtrKind::Or(ctrs) => {
            // Drop branches the ranges already refute; when a single live
            // branch remains the disjunction collapses onto it.
            let mut live = Vec::new();
            for c in ctrs {
                match set.check_immediate(c) {
                    Some(true) => return,
                    Some(false) => {}
                    None => live.push(c),
                }
            }
            match live.as_slice() {
                [] => out.push(Ctr::fail("all branches of a disjunction are unsatisfiable").at(ctr.source)),
                [only] => destruct(set, only, false, out),
                // A live disjunction is beyond range reasoning; it already
                // sits in the log for query-time re-checking.
                _ => {}
            }
        }
        CtrKind::Eq { left, right } if neg => {
            out.push(carry(ctr, Ctr::ne(left.clone(), right.clone())));
        }
        CtrKind::Ne { left, right } if neg => {
            out.push(carry(ctr, Ctr::eq(left.clone(), right.clone())));
        }
        // ¬(a < b) = b ≤ a
        CtrKind::Lt { left, right } if neg => {
            out.push(carry(ctr, Ctr::le(right.as_ref().clone(), left.as_ref().clone())));
        }
        CtrKind::Le { left, right } if neg => {
            out.push(carry(ctr, Ctr::lt(right.as_ref().clone(), left.as_ref().clone())));
        }
        CtrKind::Bool(b) => destruct_bool(set, ctr, b, neg, out),
        CtrKind::Fail { .. } if neg => {}
        // Negated quantifier / broadcast forms have no primitive shape; they
        // stay logged as-is.
        CtrKind::Forall { .. } | CtrKind::Broadcastable { .. } if neg => {}
        _ => out.push(ctr.clone()),
    }
}

fn destruct_bool(set: &CtrSet, ctr: &Ctr, exp: &ExpBool, neg: bool, out: &mut Vec<Ctr>) {
    match exp {
        ExpBool::Const(v) => {
            if *v == neg {
                out.push(Ctr::fail("boolean constant is false").at(ctr.source));
            }
        }
        // A bare boolean symbol has no numeric footprint; it stays logged.
        ExpBool::Symbol(_) => {}
        _ => {
            let lifted = carry(ctr, Ctr::lift(exp));
            destruct(set, &lifted, neg, out);
        }
    }
}

fn carry(orig: &Ctr, new: Ctr) -> Ctr {
    new.at(orig.source).with_opt_msg(orig.message.as_deref())
}

fn apply_primitive(set: CtrSet, prim: &Ctr) -> CtrSet {
    match prim.kind.as_ref() {
        CtrKind::Fail { reason } => {
            let reason = reason.to_string();
            set.latch_contradiction(prim, reason)
        }
        CtrKind::Eq { left: SymExp::Num(l), right: SymExp::Num(r) } => {
            refine_num(set, prim, l, r, NumRule::Eq)
        }
        CtrKind::Ne { left: SymExp::Num(l), right: SymExp::Num(r) } => {
            refine_num(set, prim, l, r, NumRule::Ne)
        }
        CtrKind::Lt { left, right } => refine_num(set, prim, left, right, NumRule::Lt),
        CtrKind::Le { left, right } => refine_num(set, prim, left, right, NumRule::Le),
        CtrKind::Eq { left: SymExp::Shape(l), right: SymExp::Shape(r) } => refine_shape(set, l, r),
        // Quantifiers, broadcastability, string/bool equalities: the shape
        // sub-solver stores them without deep reasoning.
        _ => set,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumRule {
    Eq,
    Ne,
    Lt,
    Le,
}

/// Narrows a symbol range from `l OP r`, treated as `l - r OP 0`.
fn refine_num(set: CtrSet, prim: &Ctr, l: &ExpNum, r: &ExpNum, rule: NumRule) -> CtrSet {
    let diff = linear::normalize(&ExpNum::sub(l.clone(), r.clone()));
    if diff.is_constant() {
        // check_immediate has already vetted constants; nothing to refine.
        return set;
    }
    let Some((sym, coeff)) = diff.single_symbol() else {
        // More than one symbol or an opaque non-linear term: not addable.
        return set;
    };
    if coeff.is_infinite() || coeff.is_zero() {
        return set;
    }
    let (sym, coeff) = (sym.clone(), coeff.clone());

    // coeff·s + c OP 0  ⇒  s OP' v with v = -c/coeff, flipping on negative.
    let v = -diff.constant.clone() / coeff.clone();
    if v.is_infinite() {
        return set;
    }
    let flipped = coeff.is_negative();

    let current = set
        .get_symbol_range(sym.id)
        .cloned()
        .unwrap_or_else(NumRange::unbounded);

    let narrowed = match rule {
        NumRule::Eq => current.intersect(&NumRange::point(v)),
        NumRule::Ne => {
            // A range cannot carve interior holes; only matching endpoints
            // are removed.
            current.exclude_endpoint(&v)
        }
        NumRule::Lt => {
            let bound = if flipped { NumRange::greater_than(v) } else { NumRange::less_than(v) };
            current.intersect(&bound)
        }
        NumRule::Le => {
            let bound = if flipped { NumRange::at_least(v) } else { NumRange::at_most(v) };
            current.intersect(&bound)
        }
    };

    let narrowed = if sym.kind == NumKind::Int { narrowed.to_int_range() } else { narrowed };

    if narrowed.is_empty() {
        return set.latch_contradiction(
            prim,
            format!("no value of {} satisfies the accumulated bounds", sym.name),
        );
    }
    set.set_symbol_range(sym.id, narrowed)
}

/// Accumulates concrete dimension lists for shape symbols from equalities.
fn refine_shape(set: CtrSet, l: &ExpShape, r: &ExpShape) -> CtrSet {
    match (l, r) {
        (ExpShape::Symbol(sym), other) | (other, ExpShape::Symbol(sym)) => {
            if set.get_cached_shape(sym.id).is_some() {
                return set;
            }
            match set.resolve_dims(other) {
                Some(dims) => {
                    // Rank consistency with the symbol's declared rank.
                    let declared = sym.rank.as_ref();
                    let actual = ExpNum::int(dims.len() as i64);
                    if set.decide_cmp(declared, &actual, Cmp::Eq) == Some(false) {
                        return set.latch_contradiction(
                            &Ctr::eq(ExpShape::Symbol(sym.clone()), other.clone()),
                            format!("rank of {} contradicts an earlier binding", sym.name),
                        );
                    }
                    let rank = Rational::from_i64(dims.len() as i64);
                    let mut set = set.set_cached_shape(sym.id, dims);
                    // Pin the symbolic rank too when it is itself a symbol.
                    if let ExpNum::Symbol(rank_sym) = declared {
                        set = set.set_symbol_range(rank_sym.id, NumRange::point(rank));
                    }
                    set
                }
                None => set,
            }
        }
        _ => set,
    }
}
