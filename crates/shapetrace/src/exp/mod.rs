//! The four symbolic expression sorts.
//!
//! Each sort is an immutable tagged tree with `Rc`-shared children: numbers
//! (`ExpNum`), booleans (`ExpBool`), strings (`ExpStr`), and shapes
//! (`ExpShape`). Constructors flatten only trivially-known identities (for
//! example, concatenation of two constant shapes); all deeper rewriting is
//! the simplifier's job so construction stays cheap on hot interpreter paths.
//!
//! Structural equality compares sorts, operator kinds, children, and symbol
//! ids. Symbol display names are presentation only and never participate in
//! equality.

mod boolean;
mod num;
mod shape;
mod string;

use std::rc::Rc;

pub use boolean::{BoolSymbol, ExpBool};
pub use num::{ExpNum, Extremum, NumBop, NumSymbol, NumUop, NumVal};
pub use shape::{Dims, ExpShape, ShapeSymbol};
pub use string::{ExpStr, StrSymbol};

/// An expression of any sort, used where two same-sort operands meet a
/// sort-agnostic context (equality constraints, value rendering).
#[derive(Debug, Clone, PartialEq)]
pub enum SymExp {
    Num(Rc<ExpNum>),
    Bool(Rc<ExpBool>),
    Str(Rc<ExpStr>),
    Shape(Rc<ExpShape>),
}

impl SymExp {
    /// Name of the sort, for diagnostics.
    #[must_use]
    pub fn sort(&self) -> &'static str {
        match self {
            Self::Num(_) => "num",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Shape(_) => "shape",
        }
    }

    /// True when both operands belong to the same sort.
    #[must_use]
    pub fn same_sort(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<ExpNum> for SymExp {
    fn from(e: ExpNum) -> Self {
        Self::Num(Rc::new(e))
    }
}

impl From<ExpBool> for SymExp {
    fn from(e: ExpBool) -> Self {
        Self::Bool(Rc::new(e))
    }
}

impl From<ExpStr> for SymExp {
    fn from(e: ExpStr) -> Self {
        Self::Str(Rc::new(e))
    }
}

impl From<ExpShape> for SymExp {
    fn from(e: ExpShape) -> Self {
        Self::Shape(Rc::new(e))
    }
}

/// Normalizes a possibly-negative index against a length expression.
///
/// A constant negative index folds to `len + index`; a constant non-negative
/// index passes through unchanged. A symbolic index is returned as-is — the
/// caller is responsible for bounding it with constraints.
#[must_use]
pub fn abs_index_by_len(index: &ExpNum, len: &ExpNum) -> ExpNum {
    if let Some(v) = index.as_const()
        && v.is_negative()
    {
        return ExpNum::add(len.clone(), index.clone());
    }
    index.clone()
}
