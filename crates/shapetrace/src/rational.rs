//! Exact rational arithmetic for the linear solver.
//!
//! Rationals are always stored in normalized form:
//! - The denominator is positive, or zero for the infinity sentinels
//! - Numerator and denominator have no common factors (GCD = 1)
//! - Zero is represented as 0/1
//!
//! Division by zero does not panic: it produces a signed infinity sentinel
//! (`n/0` with `n` normalized to ±1) that downstream range logic treats as
//! "unbounded in that direction". Arithmetic involving an infinity that has
//! no well-defined result (`∞ - ∞`, `0 · ∞`, `∞ / ∞`) collapses to `+∞`,
//! which the solver reads as "unknown" and refuses to refine with.

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// A rational number `num / den` in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rational {
    num: BigInt,
    den: BigInt,
}

impl Rational {
    /// Builds a normalized rational. A zero denominator yields the signed
    /// infinity sentinel, taking the sign from the numerator (`0/0` is `+∞`).
    #[must_use]
    pub fn new(num: BigInt, den: BigInt) -> Self {
        let (num, den) = normalize(num, den);
        Self { num, den }
    }

    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self { num: BigInt::from(value), den: BigInt::one() }
    }

    #[must_use]
    pub fn ratio(num: i64, den: i64) -> Self {
        Self::new(BigInt::from(num), BigInt::from(den))
    }

    /// Converts a finite float to the exact dyadic rational it denotes.
    /// NaN and infinite inputs map to the matching infinity sentinel.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() || value.is_infinite() {
            return if value < 0.0 { Self::neg_infinity() } else { Self::infinity() };
        }
        // Decompose the IEEE bits: mantissa * 2^exponent, sign applied last.
        let bits = value.to_bits();
        let negative = bits >> 63 != 0;
        let raw_exp = ((bits >> 52) & 0x7ff) as i32;
        let mantissa = if raw_exp == 0 {
            (bits & 0xf_ffff_ffff_ffff) << 1
        } else {
            (bits & 0xf_ffff_ffff_ffff) | 0x10_0000_0000_0000
        };
        let exponent = raw_exp - 1023 - 52;
        let mut num = BigInt::from(mantissa);
        let mut den = BigInt::one();
        if exponent > 0 {
            num <<= exponent as u32;
        } else if exponent < 0 {
            den <<= exponent.unsigned_abs();
        }
        if negative {
            num = -num;
        }
        Self::new(num, den)
    }

    #[must_use]
    pub fn zero() -> Self {
        Self { num: BigInt::zero(), den: BigInt::one() }
    }

    #[must_use]
    pub fn one() -> Self {
        Self { num: BigInt::one(), den: BigInt::one() }
    }

    #[must_use]
    pub fn infinity() -> Self {
        Self { num: BigInt::one(), den: BigInt::zero() }
    }

    #[must_use]
    pub fn neg_infinity() -> Self {
        Self { num: -BigInt::one(), den: BigInt::zero() }
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.den.is_zero()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.num.is_zero() && !self.den.is_zero()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.num.is_negative()
    }

    /// True when the value is a finite integer (denominator 1).
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.den.is_one()
    }

    /// Returns the numerator of the normalized form.
    #[must_use]
    pub fn numerator(&self) -> &BigInt {
        &self.num
    }

    /// Returns the denominator of the normalized form (zero for infinities).
    #[must_use]
    pub fn denominator(&self) -> &BigInt {
        &self.den
    }

    /// Largest integer not greater than `self`. Infinities floor to themselves.
    #[must_use]
    pub fn floor(&self) -> Self {
        if self.is_infinite() {
            return self.clone();
        }
        Self { num: self.num.div_floor(&self.den), den: BigInt::one() }
    }

    /// Smallest integer not less than `self`. Infinities ceil to themselves.
    #[must_use]
    pub fn ceil(&self) -> Self {
        if self.is_infinite() {
            return self.clone();
        }
        Self { num: self.num.div_ceil(&self.den), den: BigInt::one() }
    }

    #[must_use]
    pub fn abs(&self) -> Self {
        Self { num: self.num.abs(), den: self.den.clone() }
    }

    /// Truncated-toward-negative integer division: `floor(self / rhs)`.
    #[must_use]
    pub fn floor_div(&self, rhs: &Self) -> Self {
        (self.clone() / rhs.clone()).floor()
    }

    /// Python-style modulo: `self - floor(self / rhs) * rhs`. The result has
    /// the sign of `rhs` for finite operands; infinities propagate.
    #[must_use]
    pub fn modulo(&self, rhs: &Self) -> Self {
        if self.is_infinite() || rhs.is_infinite() || rhs.is_zero() {
            return Self::infinity();
        }
        self.clone() - self.floor_div(rhs) * rhs.clone()
    }

    /// Lossy conversion to f64 for display and float folding.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        if self.den.is_zero() {
            return if self.num.is_negative() { f64::NEG_INFINITY } else { f64::INFINITY };
        }
        match (self.num.to_f64(), self.den.to_f64()) {
            (Some(n), Some(d)) => n / d,
            _ => f64::NAN,
        }
    }

    /// Exact i64 value when the rational is an integer fitting in i64.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() { self.num.to_i64() } else { None }
    }

    /// Multiplicative inverse. The inverse of zero is `+∞`, and the inverse
    /// of either infinity is zero.
    #[must_use]
    pub fn recip(&self) -> Self {
        Self::new(self.den.clone(), self.num.clone())
    }
}

/// Reduce by GCD and canonicalize the sign onto the numerator.
fn normalize(num: BigInt, den: BigInt) -> (BigInt, BigInt) {
    if den.is_zero() {
        // Infinity sentinel: keep only the sign of the numerator.
        let sign = if num.is_negative() { -BigInt::one() } else { BigInt::one() };
        return (sign, BigInt::zero());
    }
    if num.is_zero() {
        return (BigInt::zero(), BigInt::one());
    }
    let gcd = num.gcd(&den);
    let (mut num, mut den) = (num / &gcd, den / gcd);
    if den.is_negative() {
        num = -num;
        den = -den;
    }
    (num, den)
}

impl Add for Rational {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_infinite() || rhs.is_infinite() {
            // ∞ + -∞ has no value; collapse to the unknown sentinel.
            if self.is_infinite() && rhs.is_infinite() && self.num != rhs.num {
                return Self::infinity();
            }
            return if self.is_infinite() { self } else { rhs };
        }
        Self::new(&self.num * &rhs.den + &rhs.num * &self.den, self.den * rhs.den)
    }
}

impl Sub for Rational {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_infinite() || rhs.is_infinite() {
            if self.is_zero() || rhs.is_zero() {
                return Self::infinity();
            }
            let negative = self.is_negative() != rhs.is_negative();
            return if negative { Self::neg_infinity() } else { Self::infinity() };
        }
        Self::new(self.num * rhs.num, self.den * rhs.den)
    }
}

impl Div for Rational {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        if self.is_infinite() && rhs.is_infinite() {
            return Self::infinity();
        }
        Self::new(self.num * rhs.den, self.den * rhs.num)
    }
}

impl Neg for Rational {
    type Output = Self;

    fn neg(self) -> Self {
        Self { num: -self.num, den: self.den }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_infinite(), other.is_infinite()) {
            (true, true) => self.num.cmp(&other.num),
            (true, false) => {
                if self.num.is_negative() { Ordering::Less } else { Ordering::Greater }
            }
            (false, true) => {
                if other.num.is_negative() { Ordering::Greater } else { Ordering::Less }
            }
            // Cross-multiplication is safe: denominators are positive.
            (false, false) => (&self.num * &other.den).cmp(&(&other.num * &self.den)),
        }
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den.is_zero() {
            return write!(f, "{}inf", if self.num.is_negative() { "-" } else { "" });
        }
        if self.den.is_one() {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalization_reduces_and_fixes_sign() {
        let r = Rational::ratio(6, -4);
        assert_eq!(r, Rational::ratio(-3, 2));
        assert_eq!(r.to_string(), "-3/2");
    }

    #[test]
    fn division_by_zero_is_signed_infinity() {
        let pos = Rational::one() / Rational::zero();
        let neg = Rational::from_i64(-3) / Rational::zero();
        assert!(pos.is_infinite());
        assert!(!pos.is_negative());
        assert!(neg.is_infinite());
        assert!(neg.is_negative());
    }

    #[test]
    fn floor_and_ceil_round_toward_the_right_direction() {
        assert_eq!(Rational::ratio(7, 2).floor(), Rational::from_i64(3));
        assert_eq!(Rational::ratio(7, 2).ceil(), Rational::from_i64(4));
        assert_eq!(Rational::ratio(-7, 2).floor(), Rational::from_i64(-4));
        assert_eq!(Rational::ratio(-7, 2).ceil(), Rational::from_i64(-3));
    }

    #[test]
    fn modulo_matches_floored_division() {
        assert_eq!(
            Rational::from_i64(7).modulo(&Rational::from_i64(3)),
            Rational::from_i64(1)
        );
        assert_eq!(
            Rational::from_i64(-7).modulo(&Rational::from_i64(3)),
            Rational::from_i64(2)
        );
    }

    #[test]
    fn ordering_crosses_denominators() {
        assert!(Rational::ratio(1, 3) < Rational::ratio(1, 2));
        assert!(Rational::neg_infinity() < Rational::from_i64(i64::MIN));
        assert!(Rational::infinity() > Rational::from_i64(i64::MAX));
    }

    #[test]
    fn float_round_trip_is_exact_for_dyadics() {
        assert_eq!(Rational::from_f64(0.25), Rational::ratio(1, 4));
        assert_eq!(Rational::from_f64(-1.5), Rational::ratio(-3, 2));
        assert_eq!(Rational::from_f64(3.0).to_i64(), Some(3));
    }
}
