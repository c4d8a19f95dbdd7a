//! Symbolic string expressions.

use std::{fmt, hash::Hash, rc::Rc};

use crate::{exp::ExpNum, symbol::SymbolId};

/// A string symbol: identity and a display name.
#[derive(Debug, Clone)]
pub struct StrSymbol {
    pub id: SymbolId,
    pub name: Rc<str>,
}

impl StrSymbol {
    #[must_use]
    pub fn new(id: SymbolId, name: &str) -> Self {
        Self { id, name: Rc::from(name) }
    }
}

impl PartialEq for StrSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StrSymbol {}

impl Hash for StrSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A symbolic string expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpStr {
    Const(Rc<str>),
    Symbol(StrSymbol),
    Concat { left: Rc<ExpStr>, right: Rc<ExpStr> },
    /// `base[start..end]` with char offsets; either bound may be absent.
    Slice {
        base: Rc<ExpStr>,
        start: Option<Rc<ExpNum>>,
        end: Option<Rc<ExpNum>>,
    },
}

impl ExpStr {
    #[must_use]
    pub fn literal(s: &str) -> Self {
        Self::Const(Rc::from(s))
    }

    #[must_use]
    pub fn symbol(sym: StrSymbol) -> Self {
        Self::Symbol(sym)
    }

    #[must_use]
    pub fn as_const(&self) -> Option<&str> {
        match self {
            Self::Const(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn concat(left: Self, right: Self) -> Self {
        if let (Some(a), Some(b)) = (left.as_const(), right.as_const()) {
            return Self::Const(Rc::from(format!("{a}{b}")));
        }
        Self::Concat { left: Rc::new(left), right: Rc::new(right) }
    }

    #[must_use]
    pub fn slice(base: Self, start: Option<ExpNum>, end: Option<ExpNum>) -> Self {
        Self::Slice {
            base: Rc::new(base),
            start: start.map(Rc::new),
            end: end.map(Rc::new),
        }
    }

    /// Char count of the string, when it is statically known.
    #[must_use]
    pub fn known_len(&self) -> Option<i64> {
        match self {
            Self::Const(s) => Some(s.chars().count() as i64),
            Self::Concat { left, right } => Some(left.known_len()? + right.known_len()?),
            _ => None,
        }
    }
}

impl fmt::Display for ExpStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "{}", s.name),
            Self::Concat { left, right } => write!(f, "({left} + {right})"),
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
