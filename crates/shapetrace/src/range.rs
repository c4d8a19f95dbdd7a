//! Real intervals cached per numeric symbol.
//!
//! A `NumRange` is a possibly-unbounded interval over the rationals with
//! independently open or closed endpoints. The constraint set keeps one per
//! symbol; the solver narrows them and the simplifier reads them back to
//! collapse pinned symbols into constants.

use std::fmt;

use crate::rational::Rational;

/// One endpoint of an interval.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Endpoint {
    /// No bound in this direction.
    Unbounded,
    /// Bound excluded from the interval.
    Open(Rational),
    /// Bound included in the interval.
    Closed(Rational),
}

impl Endpoint {
    fn value(&self) -> Option<&Rational> {
        match self {
            Self::Unbounded => None,
            Self::Open(v) | Self::Closed(v) => Some(v),
        }
    }
}

/// A (possibly half-open, possibly unbounded) interval over the rationals.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NumRange {
    lo: Endpoint,
    hi: Endpoint,
}

impl NumRange {
    #[must_use]
    pub fn new(lo: Endpoint, hi: Endpoint) -> Self {
        Self { lo, hi }
    }

    /// The full real line.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { lo: Endpoint::Unbounded, hi: Endpoint::Unbounded }
    }

    /// The single point `v`.
    #[must_use]
    pub fn point(v: Rational) -> Self {
        Self { lo: Endpoint::Closed(v.clone()), hi: Endpoint::Closed(v) }
    }

    /// `[v, +∞)`
    #[must_use]
    pub fn at_least(v: Rational) -> Self {
        Self { lo: Endpoint::Closed(v), hi: Endpoint::Unbounded }
    }

    /// `(-∞, v]`
    #[must_use]
    pub fn at_most(v: Rational) -> Self {
        Self { lo: Endpoint::Unbounded, hi: Endpoint::Closed(v) }
    }

    /// `(v, +∞)`
    #[must_use]
    pub fn greater_than(v: Rational) -> Self {
        Self { lo: Endpoint::Open(v), hi: Endpoint::Unbounded }
    }

    /// `(-∞, v)`
    #[must_use]
    pub fn less_than(v: Rational) -> Self {
        Self { lo: Endpoint::Unbounded, hi: Endpoint::Open(v) }
    }

    #[must_use]
    pub fn lo(&self) -> &Endpoint {
        &self.lo
    }

    #[must_use]
    pub fn hi(&self) -> &Endpoint {
        &self.hi
    }

    /// True when no rational satisfies the interval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // An infinite endpoint value makes the bound meaningless in that
        // direction; the solver produces those from unknown-sentinel math.
        match (&self.lo, &self.hi) {
            (Endpoint::Closed(a), Endpoint::Closed(b)) => a > b,
            (Endpoint::Closed(a) | Endpoint::Open(a), Endpoint::Closed(b) | Endpoint::Open(b)) => a >= b,
            _ => false,
        }
    }

    /// Returns the single value of the interval, when it is a point.
    #[must_use]
    pub fn as_const(&self) -> Option<&Rational> {
        match (&self.lo, &self.hi) {
            (Endpoint::Closed(a), Endpoint::Closed(b)) if a == b && !a.is_infinite() => Some(a),
            _ => None,
        }
    }

    /// Intersection of two intervals.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            lo: tighter_lo(&self.lo, &other.lo).clone(),
            hi: tighter_hi(&self.hi, &other.hi).clone(),
        }
    }

    /// Definite truth of `every x in self < c` / `> c` / `<= c` / `>= c`.
    ///
    /// Returns `Some(true)` when every member satisfies the comparison,
    /// `Some(false)` when no member does, `None` otherwise.
    #[must_use]
    pub fn decide_lt(&self, c: &Rational) -> Option<bool> {
        match self.hi.value() {
            Some(hi) if hi < c || (hi == c && matches!(self.hi, Endpoint::Open(_))) => return Some(true),
            _ => {}
        }
        match self.lo.value() {
            Some(lo) if lo >= c => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn decide_le(&self, c: &Rational) -> Option<bool> {
        match self.hi.value() {
            Some(hi) if hi <= c => return Some(true),
            _ => {}
        }
        match self.lo.value() {
            Some(lo) if lo > c || (lo == c && matches!(self.lo, Endpoint::Open(_))) => Some(false),
            _ => None,
        }
    }

    /// Definite truth of `every x in self == c`.
    #[must_use]
    pub fn decide_eq(&self, c: &Rational) -> Option<bool> {
        if let Some(v) = self.as_const() {
            return Some(v == c);
        }
        if !self.contains(c) { Some(false) } else { None }
    }

    /// Membership test for a single rational.
    #[must_use]
    pub fn contains(&self, v: &Rational) -> bool {
        let lo_ok = match &self.lo {
            Endpoint::Unbounded => true,
            Endpoint::Open(lo) => v > lo,
            Endpoint::Closed(lo) => v >= lo,
        };
        let hi_ok = match &self.hi {
            Endpoint::Unbounded => true,
            Endpoint::Open(hi) => v < hi,
            Endpoint::Closed(hi) => v <= hi,
        };
        lo_ok && hi_ok
    }

    /// Truthiness of a scalar constrained to this interval: `Some(false)`
    /// when the interval is exactly {0}, `Some(true)` when 0 is excluded.
    #[must_use]
    pub fn decide_truthy(&self) -> Option<bool> {
        let zero = Rational::zero();
        if let Some(v) = self.as_const() {
            return Some(!v.is_zero());
        }
        if !self.contains(&zero) { Some(true) } else { None }
    }

    /// Removes `v` if it sits exactly on a closed endpoint (used when a
    /// `≠ v` constraint arrives for a symbol whose range touches `v`).
    #[must_use]
    pub fn exclude_endpoint(&self, v: &Rational) -> Self {
        let lo = match &self.lo {
            Endpoint::Closed(lo) if lo == v => Endpoint::Open(lo.clone()),
            other => other.clone(),
        };
        let hi = match &self.hi {
            Endpoint::Closed(hi) if hi == v => Endpoint::Open(hi.clone()),
            other => other.clone(),
        };
        Self { lo, hi }
    }

    /// Coerces to the integer sub-interval: the lower bound rounds up, the
    /// upper bound rounds down, and both become closed. Idempotent.
    #[must_use]
    pub fn to_int_range(&self) -> Self {
        let lo = match &self.lo {
            Endpoint::Unbounded => Endpoint::Unbounded,
            Endpoint::Closed(v) => Endpoint::Closed(v.ceil()),
            Endpoint::Open(v) => {
                // Smallest integer strictly above v.
                let c = v.ceil();
                Endpoint::Closed(if &c == v { c + Rational::one() } else { c })
            }
        };
        let hi = match &self.hi {
            Endpoint::Unbounded => Endpoint::Unbounded,
            Endpoint::Closed(v) => Endpoint::Closed(v.floor()),
            Endpoint::Open(v) => {
                let f = v.floor();
                Endpoint::Closed(if &f == v { f - Rational::one() } else { f })
            }
        };
        Self { lo, hi }
    }

    /// Interval addition, used by the immediate checker to evaluate linear
    /// combinations of cached ranges.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            lo: add_endpoints(&self.lo, &other.lo),
            hi: add_endpoints(&self.hi, &other.hi),
        }
    }

    /// Interval scaling by a finite rational; a negative factor swaps ends.
    #[must_use]
    pub fn scale(&self, factor: &Rational) -> Self {
        if factor.is_zero() {
            return Self::point(Rational::zero());
        }
        let lo = scale_endpoint(&self.lo, factor);
        let hi = scale_endpoint(&self.hi, factor);
        if factor.is_negative() { Self { lo: hi, hi: lo } } else { Self { lo, hi } }
    }

    /// Interval shift by a constant.
    #[must_use]
    pub fn shift(&self, offset: &Rational) -> Self {
        self.add(&Self::point(offset.clone()))
    }
}

fn add_endpoints(a: &Endpoint, b: &Endpoint) -> Endpoint {
    match (a, b) {
        (Endpoint::Unbounded, _) | (_, Endpoint::Unbounded) => Endpoint::Unbounded,
        (Endpoint::Closed(x), Endpoint::Closed(y)) => Endpoint::Closed(x.clone() + y.clone()),
        (Endpoint::Open(x) | Endpoint::Closed(x), Endpoint::Open(y) | Endpoint::Closed(y)) => {
            Endpoint::Open(x.clone() + y.clone())
        }
    }
}

fn scale_endpoint(e: &Endpoint, factor: &Rational) -> Endpoint {
    match e {
        Endpoint::Unbounded => Endpoint::Unbounded,
        Endpoint::Open(v) => Endpoint::Open(v.clone() * factor.clone()),
        Endpoint::Closed(v) => Endpoint::Closed(v.clone() * factor.clone()),
    }
}

fn tighter_lo<'a>(a: &'a Endpoint, b: &'a Endpoint) -> &'a Endpoint {
    match (a.value(), b.value()) {
        (None, _) => b,
        (_, None) => a,
        (Some(x), Some(y)) => {
            if x > y || (x == y && matches!(a, Endpoint::Open(_))) { a } else { b }
        }
    }
}

fn tighter_hi<'a>(a: &'a Endpoint, b: &'a Endpoint) -> &'a Endpoint {
    match (a.value(), b.value()) {
        (None, _) => b,
        (_, None) => a,
        (Some(x), Some(y)) => {
            if x < y || (x == y && matches!(a, Endpoint::Open(_))) { a } else { b }
        }
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lo {
            Endpoint::Unbounded => write!(f, "(-inf")?,
            Endpoint::Open(v) => write!(f, "({v}")?,
            Endpoint::Closed(v) => write!(f, "[{v}")?,
        }
        match &self.hi {
            Endpoint::Unbounded => write!(f, ", inf)"),
            Endpoint::Open(v) => write!(f, ", {v})"),
            Endpoint::Closed(v) => write!(f, ", {v}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn r(v: i64) -> Rational {
        Rational::from_i64(v)
    }

    #[test]
    fn intersection_keeps_the_tighter_bounds() {
        let a = NumRange::at_least(r(0));
        let b = NumRange::at_most(r(10));
        let both = a.intersect(&b);
        assert_eq!(both, NumRange::new(Endpoint::Closed(r(0)), Endpoint::Closed(r(10))));
        assert!(!both.is_empty());
        assert!(both.intersect(&NumRange::greater_than(r(10))).is_empty());
    }

    #[test]
    fn point_ranges_are_constants() {
        let p = NumRange::point(r(4));
        assert_eq!(p.as_const(), Some(&r(4)));
        assert_eq!(p.decide_truthy(), Some(true));
        assert_eq!(NumRange::point(r(0)).decide_truthy(), Some(false));
    }

    #[test]
    fn comparison_decisions() {
        let nonneg = NumRange::at_least(r(0));
        assert_eq!(nonneg.decide_lt(&r(0)), Some(false));
        assert_eq!(nonneg.decide_lt(&r(5)), None);
        assert_eq!(NumRange::at_most(r(3)).decide_le(&r(3)), Some(true));
        assert_eq!(NumRange::greater_than(r(3)).decide_le(&r(3)), Some(false));
    }

    #[test]
    fn int_coercion_rounds_inward_and_is_idempotent() {
        let open = NumRange::new(Endpoint::Open(Rational::ratio(1, 2)), Endpoint::Open(Rational::ratio(7, 2)));
        let ints = open.to_int_range();
        assert_eq!(ints, NumRange::new(Endpoint::Closed(r(1)), Endpoint::Closed(r(3))));
        assert_eq!(ints.to_int_range(), ints);

        // Open integer endpoints step one whole unit inward.
        let open_int = NumRange::new(Endpoint::Open(r(2)), Endpoint::Open(r(5)));
        assert_eq!(
            open_int.to_int_range(),
            NumRange::new(Endpoint::Closed(r(3)), Endpoint::Closed(r(4)))
        );
    }

    #[test]
    fn scaling_by_a_negative_swaps_ends() {
        let pos = NumRange::new(Endpoint::Closed(r(1)), Endpoint::Closed(r(3)));
        let neg = pos.scale(&r(-2));
        assert_eq!(neg, NumRange::new(Endpoint::Closed(r(-6)), Endpoint::Closed(r(-2))));
    }

    #[test]
    fn excluding_an_endpoint_opens_it() {
        let range = NumRange::new(Endpoint::Closed(r(0)), Endpoint::Closed(r(5)));
        let cut = range.exclude_endpoint(&r(0));
        assert_eq!(cut, NumRange::new(Endpoint::Open(r(0)), Endpoint::Closed(r(5))));
    }
}
