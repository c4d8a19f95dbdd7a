//! Shape simplification rules.

use smallvec::SmallVec;

use crate::{
    ctr_set::{BroadcastAxis, CtrSet, align_right},
    exp::{Dims, ExpShape},
};

use super::num::simplify_num;

/// Simplifies a shape expression bottom-up against a constraint set.
#[must_use]
pub fn simplify_shape(set: &CtrSet, e: &ExpShape) -> ExpShape {
    match e {
        ExpShape::Const(dims) => {
            let dims: Dims = dims
                .iter()
                .map(|d| std::rc::Rc::new(simplify_num(set, d)))
                .collect();
            ExpShape::Const(dims)
        }
        ExpShape::Symbol(sym) => {
            // Accumulated equalities may have pinned the symbol's dims.
            if let Some(dims) = set.get_cached_shape(sym.id) {
                return ExpShape::Const(dims.clone());
            }
            e.clone()
        }
        ExpShape::Concat { left, right } => {
            ExpShape::concat(simplify_shape(set, left), simplify_shape(set, right))
        }
        ExpShape::Broadcast { left, right } => {
            let left = simplify_shape(set, left);
            let right = simplify_shape(set, right);
            fold_broadcast(set, left, right)
        }
        ExpShape::SetDim { base, axis, dim } => ExpShape::set_dim(
            simplify_shape(set, base),
            simplify_num(set, axis),
            simplify_num(set, dim),
        ),
        ExpShape::Slice { base, start, end } => ExpShape::slice(
            simplify_shape(set, base),
            start.as_ref().map(|s| simplify_num(set, s)),
            end.as_ref().map(|s| simplify_num(set, s)),
        ),
    }
}

/// Folds a broadcast of two known-rank shapes when every aligned axis pair
/// is provably compatible under the current ranges.
fn fold_broadcast(set: &CtrSet, left: ExpShape, right: ExpShape) -> ExpShape {
    let pairs = match (&left, &right) {
        (ExpShape::Const(l), ExpShape::Const(r)) => align_right(l, r),
        _ => return ExpShape::broadcast(left, right),
    };
    let mut out: Dims = SmallVec::new();
    for (a, b) in pairs {
        match set.broadcast_axis(&a, &b) {
            BroadcastAxis::Known(dim) => out.push(std::rc::Rc::new(dim)),
            // An incompatible or undecided axis leaves the node intact;
            // feasibility is the solver's verdict, not the rewriter's.
            BroadcastAxis::Incompatible | BroadcastAxis::Unknown => {
                return ExpShape::broadcast(left, right);
            }
        }
    }
    ExpShape::Const(out)
}
