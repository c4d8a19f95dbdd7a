//! The symbolic expression simplifier.
//!
//! One entry point per sort, each a purely functional bottom-up rewrite.
//! Children are simplified first, then a fixed rule table fires at the node;
//! a single pass suffices because every rule either folds to a constant or
//! strictly shrinks the non-constant structure, so the pass is terminating
//! and idempotent.
//!
//! Simplification is relative to a constraint set: the range cache turns a
//! symbol whose interval collapsed to a point into a constant, and broadcast
//! folding asks the set whether axis pairs are provably compatible.

mod boolean;
mod num;
mod shape;
mod string;

pub use boolean::simplify_bool;
pub use num::simplify_num;
pub use shape::simplify_shape;
pub use string::simplify_string;

use std::rc::Rc;

use crate::{
    constraint::{Ctr, CtrKind},
    ctr_set::CtrSet,
    exp::SymExp,
};

/// Simplifies every expression inside a constraint, preserving its shape,
/// source, and message.
#[must_use]
pub fn simplify_ctr(set: &CtrSet, ctr: &Ctr) -> Ctr {
    let kind = match ctr.kind.as_ref() {
        CtrKind::Eq { left, right } => CtrKind::Eq {
            left: simplify_operand(set, left),
            right: simplify_operand(set, right),
        },
        CtrKind::Ne { left, right } => CtrKind::Ne {
            left: simplify_operand(set, left),
            right: simplify_operand(set, right),
        },
        CtrKind::Lt { left, right } => CtrKind::Lt {
            left: Rc::new(simplify_num(set, left)),
            right: Rc::new(simplify_num(set, right)),
        },
        CtrKind::Le { left, right } => CtrKind::Le {
            left: Rc::new(simplify_num(set, left)),
            right: Rc::new(simplify_num(set, right)),
        },
        CtrKind::And(ctrs) => CtrKind::And(ctrs.iter().map(|c| simplify_ctr(set, c)).collect()),
        CtrKind::Or(ctrs) => CtrKind::Or(ctrs.iter().map(|c| simplify_ctr(set, c)).collect()),
        CtrKind::Not(inner) => CtrKind::Not(Box::new(simplify_ctr(set, inner))),
        CtrKind::Forall { sym, lo, hi, body } => CtrKind::Forall {
            sym: sym.clone(),
            lo: Rc::new(simplify_num(set, lo)),
            hi: Rc::new(simplify_num(set, hi)),
            body: Box::new(simplify_ctr(set, body)),
        },
        CtrKind::Broadcastable { left, right } => CtrKind::Broadcastable {
            left: Rc::new(simplify_shape(set, left)),
            right: Rc::new(simplify_shape(set, right)),
        },
        CtrKind::Bool(b) => CtrKind::Bool(Rc::new(simplify_bool(set, b))),
        CtrKind::Fail { reason } => CtrKind::Fail { reason: reason.clone() },
    };
    Ctr {
        kind: Rc::new(kind),
        source: ctr.source,
        message: ctr.message.clone(),
    }
}

pub(crate) fn simplify_operand(set: &CtrSet, operand: &SymExp) -> SymExp {
    match operand {
        SymExp::Num(e) => SymExp::Num(Rc::new(simplify_num(set, e))),
        SymExp::Bool(e) => SymExp::Bool(Rc::new(simplify_bool(set, e))),
        SymExp::Str(e) => SymExp::Str(Rc::new(simplify_string(set, e))),
        SymExp::Shape(e) => SymExp::Shape(Rc::new(simplify_shape(set, e))),
    }
}
