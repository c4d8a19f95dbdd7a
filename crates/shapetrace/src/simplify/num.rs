//! Numeric simplification rules.

use std::rc::Rc;

use crate::{
    ctr_set::CtrSet,
    exp::{ExpNum, ExpShape, NumBop, NumUop, NumVal, abs_index_by_len},
    linear::{self, NormalExp},
    rational::Rational,
    symbol::NumKind,
};

use super::shape::simplify_shape;

/// Simplifies a numeric expression bottom-up against a constraint set.
#[must_use]
pub fn simplify_num(set: &CtrSet, e: &ExpNum) -> ExpNum {
    match e {
        ExpNum::Const(_) => e.clone(),
        ExpNum::Symbol(sym) => {
            // A symbol pinned to a single value by the ranges is a constant.
            if let Some(range) = set.get_symbol_range(sym.id)
                && let Some(v) = range.as_const()
            {
                return ExpNum::rat(v.clone());
            }
            e.clone()
        }
        ExpNum::Uop { op, operand } => {
            let operand = simplify_num(set, operand);
            simplify_uop(set, *op, operand)
        }
        ExpNum::Bop { op, left, right } => {
            let left = simplify_num(set, left);
            let right = simplify_num(set, right);
            simplify_bop(*op, left, right)
        }
        ExpNum::Index { shape, index } => {
            let shape = simplify_shape(set, shape);
            let index = simplify_num(set, index);
            simplify_index(set, shape, index)
        }
        ExpNum::Numel { shape } => {
            let shape = simplify_shape(set, shape);
            match simplify_numel(shape) {
                out @ ExpNum::Numel { .. } => out,
                // The distributed product can fold further (1·d, const dims).
                out => simplify_num(set, &out),
            }
        }
        ExpNum::MinMax { op, args } => {
            let args = args.iter().map(|a| simplify_num(set, a)).collect();
            ExpNum::extremum(*op, args)
        }
    }
}

fn simplify_uop(set: &CtrSet, op: NumUop, operand: ExpNum) -> ExpNum {
    if let Some(v) = operand.as_const() {
        return ExpNum::Const(v.apply_uop(op));
    }
    match op {
        NumUop::Neg => {
            // Double negation cancels.
            if let ExpNum::Uop { op: NumUop::Neg, operand: inner } = &operand {
                return inner.as_ref().clone();
            }
            rebuild_linear(&linear::normalize(&ExpNum::neg(operand.clone()))).unwrap_or_else(|| ExpNum::neg(operand))
        }
        NumUop::Abs => {
            // abs drops when the sign is already known from the ranges.
            let range = linear::normalize(&operand).range(set);
            if range.decide_lt(&Rational::zero()) == Some(false) {
                return operand;
            }
            if range.decide_le(&Rational::zero()) == Some(true) {
                return ExpNum::neg(operand);
            }
            ExpNum::abs(operand)
        }
        NumUop::Floor | NumUop::Ceil => {
            if is_structurally_int(&operand) {
                return operand;
            }
            if op == NumUop::Floor { ExpNum::floor(operand) } else { ExpNum::ceil(operand) }
        }
    }
}

fn simplify_bop(op: NumBop, left: ExpNum, right: ExpNum) -> ExpNum {
    // Constructors fold two constants, including exact rational division.
    if left.as_const().is_some() && right.as_const().is_some() {
        return match op {
            NumBop::Add => ExpNum::add(left, right),
            NumBop::Sub => ExpNum::sub(left, right),
            NumBop::Mul => ExpNum::mul(left, right),
            NumBop::FloorDiv => ExpNum::floor_div(left, right),
            NumBop::TrueDiv => ExpNum::true_div(left, right),
            NumBop::Mod => ExpNum::modulo(left, right),
            NumBop::Pow => ExpNum::pow(left, right),
        };
    }
    match op {
        // Linear re-association: fold the whole sum into normal form and
        // rebuild it canonically. This subsumes 0 + x, x - x, and constant
        // aggregation through add/sub chains.
        NumBop::Add | NumBop::Sub => {
            let node = if op == NumBop::Add {
                ExpNum::add(left.clone(), right.clone())
            } else {
                ExpNum::sub(left.clone(), right.clone())
            };
            rebuild_linear(&linear::normalize(&node)).unwrap_or(node)
        }
        NumBop::Mul => {
            if let Some(k) = left.as_const().or_else(|| right.as_const()) {
                if k.is_zero() {
                    return ExpNum::int(0);
                }
                if k.is_one() {
                    return if left.as_const().is_some() { right } else { left };
                }
                let node = ExpNum::mul(left.clone(), right.clone());
                return rebuild_linear(&linear::normalize(&node)).unwrap_or(node);
            }
            ExpNum::mul(left, right)
        }
        NumBop::TrueDiv => {
            if let Some(k) = right.as_const()
                && k.is_one()
            {
                return left;
            }
            ExpNum::true_div(left, right)
        }
        NumBop::FloorDiv => ExpNum::floor_div(left, right),
        NumBop::Mod => ExpNum::modulo(left, right),
        NumBop::Pow => {
            if let Some(k) = right.as_const() {
                if k.is_one() {
                    return left;
                }
                if k.is_zero() {
                    return ExpNum::int(1);
                }
            }
            ExpNum::pow(left, right)
        }
    }
}

/// `shape[i]` resolution: constants fold, concat routes by rank, setdim
/// matches the axis.
fn simplify_index(set: &CtrSet, shape: ExpShape, index: ExpNum) -> ExpNum {
    let index = abs_index_by_len(&index, &shape.rank());
    let Some(i) = index.as_i64() else {
        return ExpNum::index(shape, index);
    };
    match &shape {
        ExpShape::Const(dims) => {
            if let Ok(i) = usize::try_from(i)
                && let Some(dim) = dims.get(i)
            {
                return dim.as_ref().clone();
            }
            ExpNum::index(shape, index)
        }
        ExpShape::Concat { left, right } => {
            // Rank-directed routing into the operand that owns the axis.
            if let Some(left_rank) = left.known_rank() {
                let left_rank = left_rank as i64;
                let routed = if i < left_rank {
                    ExpNum::index(left.as_ref().clone(), ExpNum::int(i))
                } else {
                    ExpNum::index(right.as_ref().clone(), ExpNum::int(i - left_rank))
                };
                return simplify_num(set, &routed);
            }
            ExpNum::index(shape, index)
        }
        ExpShape::SetDim { base, axis, dim } => {
            if let Some(a) = axis.as_i64() {
                if a == i {
                    return dim.as_ref().clone();
                }
                let routed = ExpNum::index(base.as_ref().clone(), ExpNum::int(i));
                return simplify_num(set, &routed);
            }
            ExpNum::index(shape, index)
        }
        _ => ExpNum::index(shape, index),
    }
}

/// `numel` distribution: constants fold to Π dims, concat splits into a
/// product of the two sides.
fn simplify_numel(shape: ExpShape) -> ExpNum {
    match &shape {
        ExpShape::Const(dims) => {
            let mut acc = ExpNum::int(1);
            for d in dims {
                acc = ExpNum::mul(acc, d.as_ref().clone());
            }
            acc
        }
        ExpShape::Concat { left, right } => ExpNum::mul(
            ExpNum::numel(left.as_ref().clone()),
            ExpNum::numel(right.as_ref().clone()),
        ),
        _ => ExpNum::numel(shape),
    }
}

/// Rebuilds a linear normal form into a canonical left-nested sum. Returns
/// `None` when an infinity sentinel leaked into a coefficient, in which case
/// the caller keeps the original node.
fn rebuild_linear(n: &NormalExp) -> Option<ExpNum> {
    if n.constant.is_infinite() || n.terms.iter().any(|(_, c)| c.is_infinite()) {
        return None;
    }
    if n.terms.len() == 1 && n.constant.is_zero() && n.terms[0].1 == Rational::one() {
        return Some(n.terms[0].0.clone());
    }
    let mut acc: Option<ExpNum> = None;
    for (term, coeff) in &n.terms {
        let piece = if coeff == &Rational::one() {
            term.clone()
        } else if coeff == &-Rational::one() {
            ExpNum::Uop { op: NumUop::Neg, operand: Rc::new(term.clone()) }
        } else {
            ExpNum::Bop {
                op: NumBop::Mul,
                left: Rc::new(ExpNum::rat(coeff.clone())),
                right: Rc::new(term.clone()),
            }
        };
        acc = Some(match acc {
            None => piece,
            Some(prev) => ExpNum::Bop { op: NumBop::Add, left: Rc::new(prev), right: Rc::new(piece) },
        });
    }
    match acc {
        None => Some(ExpNum::rat(n.constant.clone())),
        Some(sum) if n.constant.is_zero() => Some(sum),
        Some(sum) => Some(ExpNum::Bop {
            op: NumBop::Add,
            left: Rc::new(sum),
            right: Rc::new(ExpNum::rat(n.constant.clone())),
        }),
    }
}

/// True when the expression is integer-valued by construction, so floor and
/// ceil are identities on it.
fn is_structurally_int(e: &ExpNum) -> bool {
    match e {
        ExpNum::Const(NumVal::Rat(r)) => r.is_integer(),
        ExpNum::Const(NumVal::Float(_)) => false,
        ExpNum::Symbol(sym) => sym.kind == NumKind::Int,
        ExpNum::Uop { op: NumUop::Floor | NumUop::Ceil, .. } => true,
        ExpNum::Uop { op: NumUop::Neg | NumUop::Abs, operand } => is_structurally_int(operand),
        ExpNum::Bop { op, left, right } => match op {
            NumBop::Add | NumBop::Sub | NumBop::Mul | NumBop::FloorDiv | NumBop::Mod => {
                is_structurally_int(left) && is_structurally_int(right)
            }
            NumBop::TrueDiv | NumBop::Pow => false,
        },
        // Dimensions and element counts are integers by construction.
        ExpNum::Index { .. } | ExpNum::Numel { .. } => true,
        ExpNum::MinMax { args, .. } => args.iter().all(|a| is_structurally_int(a)),
    }
}
