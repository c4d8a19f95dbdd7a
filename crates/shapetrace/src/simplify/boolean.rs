//! Boolean simplification rules.

use crate::{
    ctr_set::CtrSet,
    exp::{ExpBool, SymExp},
};

use super::simplify_operand;
use super::num::simplify_num;

/// Simplifies a boolean expression bottom-up against a constraint set.
#[must_use]
pub fn simplify_bool(set: &CtrSet, e: &ExpBool) -> ExpBool {
    match e {
        ExpBool::Const(_) | ExpBool::Symbol(_) => e.clone(),
        ExpBool::Eq { left, right } => {
            let (left, right) = (simplify_operand(set, left), simplify_operand(set, right));
            fold_eq(set, left, right, false)
        }
        ExpBool::Ne { left, right } => {
            let (left, right) = (simplify_operand(set, left), simplify_operand(set, right));
            fold_eq(set, left, right, true)
        }
        ExpBool::Lt { left, right } => ExpBool::lt(simplify_num(set, left), simplify_num(set, right)),
        ExpBool::Le { left, right } => ExpBool::le(simplify_num(set, left), simplify_num(set, right)),
        ExpBool::Not(inner) => {
            let inner = simplify_bool(set, inner);
            push_not(inner)
        }
        ExpBool::And { left, right } => ExpBool::and(simplify_bool(set, left), simplify_bool(set, right)),
        ExpBool::Or { left, right } => ExpBool::or(simplify_bool(set, left), simplify_bool(set, right)),
    }
}

fn fold_eq(set: &CtrSet, left: SymExp, right: SymExp, negated: bool) -> ExpBool {
    let probe = ExpBool::Eq { left: left.clone(), right: right.clone() };
    match set.decide_bool(&probe) {
        Some(b) => ExpBool::Const(b != negated),
        None if negated => ExpBool::Ne { left, right },
        None => probe,
    }
}

/// Pushes a negation one level down: `not (<)` becomes `(≥)`, `not (=)`
/// becomes `(≠)`, and constants flip.
fn push_not(inner: ExpBool) -> ExpBool {
    match inner {
        ExpBool::Const(v) => ExpBool::Const(!v),
        ExpBool::Lt { left, right } => ExpBool::Le { left: right, right: left },
        ExpBool::Le { left, right } => ExpBool::Lt { left: right, right: left },
        ExpBool::Eq { left, right } => ExpBool::Ne { left, right },
        ExpBool::Ne { left, right } => ExpBool::Eq { left, right },
        ExpBool::Not(e) => e.as_ref().clone(),
        other => ExpBool::not(other),
    }
}
