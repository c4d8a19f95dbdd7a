//! Symbolic shape expressions.
//!
//! A shape is an ordered list of dimension expressions. The rank of a
//! constant shape is its list length; shape symbols carry a symbolic rank
//! expression instead. Broadcast follows numpy semantics: align from the
//! right, a dimension of 1 stretches to the other operand's dimension, and
//! anything else must match.

use std::{fmt, hash::Hash, rc::Rc};

use smallvec::SmallVec;

use crate::{
    exp::{ExpNum, num::Extremum},
    symbol::SymbolId,
};

/// Dimension list of a constant shape. Tensor ranks are short in practice.
pub type Dims = SmallVec<[Rc<ExpNum>; 4]>;

/// A shape symbol: identity, symbolic rank, and a display name.
#[derive(Debug, Clone)]
pub struct ShapeSymbol {
    pub id: SymbolId,
    pub rank: Rc<ExpNum>,
    pub name: Rc<str>,
}

impl ShapeSymbol {
    #[must_use]
    pub fn new(id: SymbolId, rank: ExpNum, name: &str) -> Self {
        Self { id, rank: Rc::new(rank), name: Rc::from(name) }
    }
}

impl PartialEq for ShapeSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShapeSymbol {}

impl Hash for ShapeSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A symbolic shape expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpShape {
    /// Known rank, each dimension itself possibly symbolic.
    Const(Dims),
    Symbol(ShapeSymbol),
    Concat { left: Rc<ExpShape>, right: Rc<ExpShape> },
    Broadcast { left: Rc<ExpShape>, right: Rc<ExpShape> },
    /// `base` with dimension `axis` replaced by `dim`.
    SetDim {
        base: Rc<ExpShape>,
        axis: Rc<ExpNum>,
        dim: Rc<ExpNum>,
    },
    /// `base[start..end]`, a contiguous sub-shape.
    Slice {
        base: Rc<ExpShape>,
        start: Option<Rc<ExpNum>>,
        end: Option<Rc<ExpNum>>,
    },
}

impl ExpShape {
    /// Builds a constant shape from dimension expressions.
    #[must_use]
    pub fn from_dims(dims: impl IntoIterator<Item = ExpNum>) -> Self {
        Self::Const(dims.into_iter().map(Rc::new).collect())
    }

    /// Builds a constant shape from integer dimensions.
    #[must_use]
    pub fn from_ints(dims: impl IntoIterator<Item = i64>) -> Self {
        Self::from_dims(dims.into_iter().map(ExpNum::int))
    }

    #[must_use]
    pub fn scalar() -> Self {
        Self::Const(Dims::new())
    }

    #[must_use]
    pub fn symbol(sym: ShapeSymbol) -> Self {
        Self::Symbol(sym)
    }

    #[must_use]
    pub fn as_const(&self) -> Option<&Dims> {
        match self {
            Self::Const(dims) => Some(dims),
            _ => None,
        }
    }

    /// Symbolic rank of the shape.
    #[must_use]
    pub fn rank(&self) -> ExpNum {
        match self {
            Self::Const(dims) => ExpNum::int(dims.len() as i64),
            Self::Symbol(sym) => sym.rank.as_ref().clone(),
            Self::Concat { left, right } => ExpNum::add(left.rank(), right.rank()),
            // Broadcast aligns from the right; the result has the longer rank.
            Self::Broadcast { left, right } => ExpNum::extremum(Extremum::Max, vec![left.rank(), right.rank()]),
            Self::SetDim { base, .. } => base.rank(),
            Self::Slice { base, start, end } => {
                let start = start.as_ref().map_or_else(|| ExpNum::int(0), |s| s.as_ref().clone());
                let end = end.as_ref().map_or_else(|| base.rank(), |e| e.as_ref().clone());
                ExpNum::sub(end, start)
            }
        }
    }

    /// Rank as a plain integer when statically known.
    #[must_use]
    pub fn known_rank(&self) -> Option<usize> {
        self.rank().as_i64().and_then(|r| usize::try_from(r).ok())
    }

    #[must_use]
    pub fn concat(left: Self, right: Self) -> Self {
        if let (Self::Const(a), Self::Const(b)) = (&left, &right) {
            let mut dims = a.clone();
            dims.extend(b.iter().cloned());
            return Self::Const(dims);
        }
        Self::Concat { left: Rc::new(left), right: Rc::new(right) }
    }

    #[must_use]
    pub fn broadcast(left: Self, right: Self) -> Self {
        // A scalar broadcasts to the other operand unchanged.
        if let Self::Const(dims) = &left
            && dims.is_empty()
        {
            return right;
        }
        if let Self::Const(dims) = &right
            && dims.is_empty()
        {
            return left;
        }
        Self::Broadcast { left: Rc::new(left), right: Rc::new(right) }
    }

    #[must_use]
    pub fn set_dim(base: Self, axis: ExpNum, dim: ExpNum) -> Self {
        if let (Self::Const(dims), Some(i)) = (&base, axis.as_i64())
            && let Ok(i) = usize::try_from(i)
            && i < dims.len()
        {
            let mut dims = dims.clone();
            dims[i] = Rc::new(dim);
            return Self::Const(dims);
        }
        Self::SetDim { base: Rc::new(base), axis: Rc::new(axis), dim: Rc::new(dim) }
    }

    #[must_use]
    pub fn slice(base: Self, start: Option<ExpNum>, end: Option<ExpNum>) -> Self {
        if let Self::Const(dims) = &base {
            let lo = start.as_ref().and_then(ExpNum::as_i64);
            let hi = end.as_ref().and_then(ExpNum::as_i64);
            let resolved_lo = match (&start, lo) {
                (None, _) => Some(0),
                (Some(_), Some(v)) => Some(v),
                (Some(_), None) => None,
            };
            let resolved_hi = match (&end, hi) {
                (None, _) => Some(dims.len() as i64),
                (Some(_), Some(v)) => Some(v),
                (Some(_), None) => None,
            };
            if let (Some(lo), Some(hi)) = (resolved_lo, resolved_hi) {
                let lo = clamp_axis(lo, dims.len());
                let hi = clamp_axis(hi, dims.len());
                if lo <= hi {
                    return Self::Const(dims[lo..hi].iter().cloned().collect());
                }
            }
        }
        Self::Slice {
            base: Rc::new(base),
            start: start.map(Rc::new),
            end: end.map(Rc::new),
        }
    }
}

/// Clamps a possibly-negative axis index into `0..=rank`.
fn clamp_axis(i: i64, rank: usize) -> usize {
    let rank = rank as i64;
    let i = if i < 0 { rank + i } else { i };
    usize::try_from(i.clamp(0, rank)).unwrap_or(0)
}

impl fmt::Display for ExpShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(dims) => {
                write!(f, "(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                if dims.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Self::Symbol(s) => write!(f, "{}", s.name),
            Self::Concat { left, right } => write!(f, "concat({left}, {right})"),
            Self::Broadcast { left, right } => write!(f, "broadcast({left}, {right})"),
            Self::SetDim { base, axis, dim } => write!(f, "setdim({base}, {axis}, {dim})"),
            Self::Slice { base, start, end } => {
                write!(f, "{base}[")?;
                if let Some(s) = start {
                    write!(f, "{s}")?;
                }
                write!(f, ":")?;
                if let Some(e) = end {
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
        }
    }
}
