//! String simplification rules.

use std::rc::Rc;

use crate::{ctr_set::CtrSet, exp::ExpStr};

use super::num::simplify_num;

/// Simplifies a string expression bottom-up against a constraint set.
#[must_use]
pub fn simplify_string(set: &CtrSet, e: &ExpStr) -> ExpStr {
    match e {
        ExpStr::Const(_) | ExpStr::Symbol(_) => e.clone(),
        ExpStr::Concat { left, right } => {
            ExpStr::concat(simplify_string(set, left), simplify_string(set, right))
        }
        ExpStr::Slice { base, start, end } => {
            let base = simplify_string(set, base);
            let start = start.as_ref().map(|s| simplify_num(set, s));
            let end = end.as_ref().map(|s| simplify_num(set, s));
            fold_slice(base, start, end)
        }
    }
}

fn fold_slice(
    base: ExpStr,
    start: Option<crate::exp::ExpNum>,
    end: Option<crate::exp::ExpNum>,
) -> ExpStr {
    if let Some(s) = base.as_const() {
        let len = s.chars().count() as i64;
        let lo = match &start {
            None => Some(0),
            Some(e) => e.as_i64().map(|i| clamp_index(i, len)),
        };
        let hi = match &end {
            None => Some(len),
            Some(e) => e.as_i64().map(|i| clamp_index(i, len)),
        };
        if let (Some(lo), Some(hi)) = (lo, hi) {
            let taken: String = if lo < hi {
                s.chars().skip(lo as usize).take((hi - lo) as usize).collect()
            } else {
                String::new()
            };
            return ExpStr::Const(Rc::from(taken.as_str()));
        }
    }
    ExpStr::slice(base, start, end)
}

/// Normalizes a possibly-negative slice bound against the string length and
/// clamps it into `0..=len`.
fn clamp_index(i: i64, len: i64) -> i64 {
    let i = if i < 0 { len + i } else { i };
    i.clamp(0, len)
}
