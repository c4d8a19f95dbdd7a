//! Symbolic numeric expressions.

use std::{fmt, hash::Hash, rc::Rc};

use crate::{
    exp::ExpShape,
    rational::Rational,
    symbol::{NumKind, SymbolId},
};

/// A numeric constant: exact rational or IEEE float.
///
/// Integer and rational literals stay exact so the linear solver can reason
/// about divisibility; float literals keep their IEEE identity so folding
/// reproduces what concrete execution would print.
#[derive(Debug, Clone, PartialEq)]
pub enum NumVal {
    Rat(Rational),
    Float(f64),
}

impl NumVal {
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::Rat(Rational::from_i64(v))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Rat(r) => r.is_zero(),
            Self::Float(f) => *f == 0.0,
        }
    }

    #[must_use]
    pub fn is_one(&self) -> bool {
        match self {
            Self::Rat(r) => r == &Rational::one(),
            Self::Float(f) => *f == 1.0,
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Rat(r) => r.is_negative(),
            Self::Float(f) => *f < 0.0,
        }
    }

    /// Exact rational view; floats convert to their dyadic value.
    #[must_use]
    pub fn to_rational(&self) -> Rational {
        match self {
            Self::Rat(r) => r.clone(),
            Self::Float(f) => Rational::from_f64(*f),
        }
    }

    #[must_use]
    pub fn to_f64(&self) -> f64 {
        match self {
            Self::Rat(r) => r.to_f64(),
            Self::Float(f) => *f,
        }
    }

    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Rat(r) => r.to_i64(),
            Self::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() { Some(*f as i64) } else { None }
            }
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Applies a binary operator on two constants. Total: rational division
    /// by zero yields the infinity sentinel, float edge cases follow IEEE.
    /// A float on either side folds in floats; two rationals stay exact,
    /// including true division.
    #[must_use]
    pub fn apply_bop(&self, op: NumBop, rhs: &Self) -> Self {
        if self.is_float() || rhs.is_float() {
            let (a, b) = (self.to_f64(), rhs.to_f64());
            return Self::Float(match op {
                NumBop::Add => a + b,
                NumBop::Sub => a - b,
                NumBop::Mul => a * b,
                NumBop::TrueDiv => a / b,
                NumBop::FloorDiv => (a / b).floor(),
                NumBop::Mod => a - (a / b).floor() * b,
                NumBop::Pow => a.powf(b),
            });
        }
        let (a, b) = (self.to_rational(), rhs.to_rational());
        match op {
            NumBop::Add => Self::Rat(a + b),
            NumBop::Sub => Self::Rat(a - b),
            NumBop::Mul => Self::Rat(a * b),
            NumBop::TrueDiv => Self::Rat(a / b),
            NumBop::FloorDiv => Self::Rat(a.floor_div(&b)),
            NumBop::Mod => Self::Rat(a.modulo(&b)),
            NumBop::Pow => pow_rational(&a, &b),
        }
    }

    #[must_use]
    pub fn apply_uop(&self, op: NumUop) -> Self {
        match (op, self) {
            (NumUop::Neg, Self::Rat(r)) => Self::Rat(-r.clone()),
            (NumUop::Neg, Self::Float(f)) => Self::Float(-f),
            (NumUop::Abs, Self::Rat(r)) => Self::Rat(r.abs()),
            (NumUop::Abs, Self::Float(f)) => Self::Float(f.abs()),
            (NumUop::Floor, Self::Rat(r)) => Self::Rat(r.floor()),
            (NumUop::Floor, Self::Float(f)) => Self::Float(f.floor()),
            (NumUop::Ceil, Self::Rat(r)) => Self::Rat(r.ceil()),
            (NumUop::Ceil, Self::Float(f)) => Self::Float(f.ceil()),
        }
    }

    /// Total comparison used by constant folding. Floats compare by value;
    /// a NaN refuses to compare.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.is_float() || other.is_float() {
            self.to_f64().partial_cmp(&other.to_f64())
        } else {
            Some(self.to_rational().cmp(&other.to_rational()))
        }
    }
}

fn pow_rational(base: &Rational, exp: &Rational) -> NumVal {
    // Keep exactness for small integer exponents, fall back to floats
    // otherwise (fractional powers leave the rationals anyway).
    if let Some(e) = exp.to_i64()
        && e.unsigned_abs() <= 64
    {
        let mut acc = Rational::one();
        for _ in 0..e.unsigned_abs() {
            acc = acc * base.clone();
        }
        return NumVal::Rat(if e < 0 { acc.recip() } else { acc });
    }
    NumVal::Float(base.to_f64().powf(exp.to_f64()))
}

impl fmt::Display for NumVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rat(r) => write!(f, "{r}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A numeric symbol: identity, sort, and a display name.
#[derive(Debug, Clone)]
pub struct NumSymbol {
    pub id: SymbolId,
    pub kind: NumKind,
    pub name: Rc<str>,
}

impl NumSymbol {
    #[must_use]
    pub fn new(id: SymbolId, kind: NumKind, name: &str) -> Self {
        Self { id, kind, name: Rc::from(name) }
    }
}

impl PartialEq for NumSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

impl Eq for NumSymbol {}

impl Hash for NumSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Unary numeric operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NumUop {
    Neg,
    Abs,
    Floor,
    Ceil,
}

/// Binary numeric operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NumBop {
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
}

/// Extremum selector for `MinMax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Extremum {
    Min,
    Max,
}

/// A symbolic numeric expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpNum {
    Const(NumVal),
    Symbol(NumSymbol),
    Uop { op: NumUop, operand: Rc<ExpNum> },
    Bop { op: NumBop, left: Rc<ExpNum>, right: Rc<ExpNum> },
    /// `shape[index]`
    Index { shape: Rc<ExpShape>, index: Rc<ExpNum> },
    /// `Π shape[i]`
    Numel { shape: Rc<ExpShape> },
    MinMax { op: Extremum, args: Vec<Rc<ExpNum>> },
}

impl ExpNum {
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::Const(NumVal::int(v))
    }

    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::Const(NumVal::Float(v))
    }

    #[must_use]
    pub fn rat(v: Rational) -> Self {
        Self::Const(NumVal::Rat(v))
    }

    #[must_use]
    pub fn symbol(sym: NumSymbol) -> Self {
        Self::Symbol(sym)
    }

    #[must_use]
    pub fn as_const(&self) -> Option<&NumVal> {
        match self {
            Self::Const(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_const().and_then(NumVal::to_i64)
    }

    fn bop(op: NumBop, left: Self, right: Self) -> Self {
        if let (Some(a), Some(b)) = (left.as_const(), right.as_const()) {
            return Self::Const(a.apply_bop(op, b));
        }
        Self::Bop { op, left: Rc::new(left), right: Rc::new(right) }
    }

    fn uop(op: NumUop, operand: Self) -> Self {
        if let Some(v) = operand.as_const() {
            return Self::Const(v.apply_uop(op));
        }
        Self::Uop { op, operand: Rc::new(operand) }
    }

    #[must_use]
    pub fn add(left: Self, right: Self) -> Self {
        Self::bop(NumBop::Add, left, right)
    }

    #[must_use]
    pub fn sub(left: Self, right: Self) -> Self {
        Self::bop(NumBop::Sub, left, right)
    }

    #[must_use]
    pub fn mul(left: Self, right: Self) -> Self {
        Self::bop(NumBop::Mul, left, right)
    }

    #[must_use]
    pub fn floor_div(left: Self, right: Self) -> Self {
        Self::bop(NumBop::FloorDiv, left, right)
    }

    #[must_use]
    pub fn true_div(left: Self, right: Self) -> Self {
        Self::bop(NumBop::TrueDiv, left, right)
    }

    #[must_use]
    pub fn modulo(left: Self, right: Self) -> Self {
        Self::bop(NumBop::Mod, left, right)
    }

    #[must_use]
    pub fn pow(left: Self, right: Self) -> Self {
        Self::bop(NumBop::Pow, left, right)
    }

    #[must_use]
    pub fn neg(operand: Self) -> Self {
        Self::uop(NumUop::Neg, operand)
    }

    #[must_use]
    pub fn abs(operand: Self) -> Self {
        Self::uop(NumUop::Abs, operand)
    }

    #[must_use]
    pub fn floor(operand: Self) -> Self {
        Self::uop(NumUop::Floor, operand)
    }

    #[must_use]
    pub fn ceil(operand: Self) -> Self {
        Self::uop(NumUop::Ceil, operand)
    }

    /// `shape[index]`; a constant index into a constant shape folds here.
    #[must_use]
    pub fn index(shape: ExpShape, index: Self) -> Self {
        if let (ExpShape::Const(dims), Some(i)) = (&shape, index.as_i64())
            && let Ok(i) = usize::try_from(i)
            && let Some(dim) = dims.get(i)
        {
            return dim.as_ref().clone();
        }
        Self::Index { shape: Rc::new(shape), index: Rc::new(index) }
    }

    /// Product of all dims; folds for a fully constant shape.
    #[must_use]
    pub fn numel(shape: ExpShape) -> Self {
        if let ExpShape::Const(dims) = &shape
            && dims.iter().all(|d| d.as_const().is_some())
        {
            let mut acc = NumVal::int(1);
            for d in dims {
                if let Some(v) = d.as_const() {
                    acc = acc.apply_bop(NumBop::Mul, v);
                }
            }
            return Self::Const(acc);
        }
        Self::Numel { shape: Rc::new(shape) }
    }

    /// `min`/`max` over a non-empty list; all-constant lists fold.
    #[must_use]
    pub fn extremum(op: Extremum, args: Vec<Self>) -> Self {
        if args.len() == 1 {
            return args.into_iter().next().unwrap_or(Self::int(0));
        }
        if args.iter().all(|a| a.as_const().is_some()) {
            let mut best: Option<NumVal> = None;
            for a in &args {
                let Some(v) = a.as_const() else { continue };
                best = Some(match best {
                    None => v.clone(),
                    Some(b) => match v.compare(&b) {
                        Some(std::cmp::Ordering::Greater) if op == Extremum::Max => v.clone(),
                        Some(std::cmp::Ordering::Less) if op == Extremum::Min => v.clone(),
                        _ => b,
                    },
                });
            }
            if let Some(v) = best {
                return Self::Const(v);
            }
        }
        Self::MinMax { op, args: args.into_iter().map(Rc::new).collect() }
    }

    #[must_use]
    pub fn max(args: Vec<Self>) -> Self {
        Self::extremum(Extremum::Max, args)
    }

    #[must_use]
    pub fn min(args: Vec<Self>) -> Self {
        Self::extremum(Extremum::Min, args)
    }
}

impl fmt::Display for ExpNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v}"),
            Self::Symbol(s) => write!(f, "{}", s.name),
            Self::Uop { op, operand } => write!(f, "{op}({operand})"),
            Self::Bop { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Index { shape, index } => write!(f, "{shape}[{index}]"),
            Self::Numel { shape } => write!(f, "numel({shape})"),
            Self::MinMax { op, args } => {
                write!(f, "{op}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}
