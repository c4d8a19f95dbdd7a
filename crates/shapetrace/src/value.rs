//! Runtime values of the symbolic interpreter.
//!
//! `Val` is a tagged union: scalar values carry symbolic expressions rather
//! than concrete numbers, addresses point into the persistent heap, and
//! structured values (`Obj`, `Func`) use persistent maps so path forks share
//! them at zero cost.
//!
//! There is no runtime subclassing anywhere in the analyzer: every dispatch
//! goes through the discriminant, which keeps matching exhaustive.

use std::{fmt, rc::Rc};

use crate::{
    env::Env,
    exp::{ExpBool, ExpNum, ExpShape, ExpStr},
    ir::IrStmt,
};

/// A heap address. Negative addresses are reserved for the preloaded
/// builtins and become immutable once the prelude is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Addr(pub i64);

impl Addr {
    /// True for the builtin (negative) address space.
    #[must_use]
    pub fn is_builtin(self) -> bool {
        self.0 < 0
    }

    /// Shifts a user-space address by `offset`; builtin addresses are shared
    /// between heaps and never move.
    #[must_use]
    pub fn relocate(self, offset: i64) -> Self {
        if self.is_builtin() { self } else { Self(self.0 + offset) }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Severity attached to an error placeholder value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrLevel {
    Warning,
    Error,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    /// Pointer into the heap.
    Addr(Addr),
    /// Integer scalar, possibly symbolic.
    Int(ExpNum),
    /// Float scalar, possibly symbolic.
    Float(ExpNum),
    Bool(ExpBool),
    Str(ExpStr),
    None,
    /// Returned by binary dunder methods to signal that the operation is not
    /// supported for the operand pair; the interpreter then tries the
    /// reflected method on the other operand.
    NotImpl,
    /// Placeholder produced by a failed operation. Carrying the message in
    /// the value lets interpretation continue past local errors.
    Error(ErrLevel, Rc<str>),
    Obj(Obj),
    Func(Rc<Func>),
}

impl Val {
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::Int(ExpNum::int(v))
    }

    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::Float(ExpNum::float(v))
    }

    #[must_use]
    pub fn truth(v: bool) -> Self {
        Self::Bool(ExpBool::truth(v))
    }

    #[must_use]
    pub fn str_lit(s: &str) -> Self {
        Self::Str(ExpStr::literal(s))
    }

    #[must_use]
    pub fn warning(msg: &str) -> Self {
        Self::Error(ErrLevel::Warning, Rc::from(msg))
    }

    /// Static name of the value's kind, for diagnostics and heap stats.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Addr(_) => "Addr",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Bool(_) => "Bool",
            Self::Str(_) => "Str",
            Self::None => "None",
            Self::NotImpl => "NotImpl",
            Self::Error(..) => "Error",
            Self::Obj(_) => "Obj",
            Self::Func(_) => "Func",
        }
    }

    /// The numeric payload of an Int or Float value.
    #[must_use]
    pub fn as_num(&self) -> Option<&ExpNum> {
        match self {
            Self::Int(e) | Self::Float(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(..))
    }
}

/// A structured object: attributes, an indexed element map, a keyed element
/// map, and an optional tensor shape.
///
/// All three maps are persistent; a mutated object is a new `Obj` sharing
/// structure with its ancestor, which the copy-on-write heap then stores
/// under the same address in a new heap.
#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
    /// Run-unique object identity, stable across heap rewrites.
    pub id: u64,
    attrs: im::HashMap<Rc<str>, Val>,
    indices: im::HashMap<i64, Val>,
    keys: im::HashMap<Rc<str>, Val>,
    pub shape: Option<ExpShape>,
}

impl Obj {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            attrs: im::HashMap::new(),
            indices: im::HashMap::new(),
            keys: im::HashMap::new(),
            shape: None,
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Val> {
        self.attrs.get(name)
    }

    #[must_use]
    pub fn with_attr(&self, name: &str, val: Val) -> Self {
        let mut next = self.clone();
        next.attrs.insert(Rc::from(name), val);
        next
    }

    #[must_use]
    pub fn index(&self, i: i64) -> Option<&Val> {
        self.indices.get(&i)
    }

    #[must_use]
    pub fn with_index(&self, i: i64, val: Val) -> Self {
        let mut next = self.clone();
        next.indices.insert(i, val);
        next
    }

    /// Number of indexed elements (the dense prefix is not enforced; this is
    /// the map's size).
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn key(&self, k: &str) -> Option<&Val> {
        self.keys.get(k)
    }

    #[must_use]
    pub fn with_key(&self, k: &str, val: Val) -> Self {
        let mut next = self.clone();
        next.keys.insert(Rc::from(k), val);
        next
    }

    #[must_use]
    pub fn with_shape(&self, shape: ExpShape) -> Self {
        let mut next = self.clone();
        next.shape = Some(shape);
        next
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&Rc<str>, &Val)> {
        self.attrs.iter()
    }

    pub fn indices(&self) -> impl Iterator<Item = (&i64, &Val)> {
        self.indices.iter()
    }

    pub fn keyed(&self) -> impl Iterator<Item = (&Rc<str>, &Val)> {
        self.keys.iter()
    }
}

/// A function value: parameters, defaults, an IR body, and the environment
/// captured at definition time.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub id: u64,
    pub name: Rc<str>,
    /// Ordered positional parameter names.
    pub params: Vec<Rc<str>>,
    /// Name collecting surplus positional arguments, when declared.
    pub vararg: Option<Rc<str>>,
    /// Name collecting surplus keyword arguments, when declared.
    pub kwarg: Option<Rc<str>>,
    /// Default values by parameter name.
    pub defaults: im::HashMap<Rc<str>, Val>,
    pub body: Rc<IrStmt>,
    pub captured: Env,
    /// True once a receiver has been bound: the original first parameter is
    /// pre-bound through the captured environment.
    pub bound: bool,
}

impl Func {
    /// Binds `receiver` as the function's first parameter, producing the
    /// method-style bound form: the parameter list loses its head and the
    /// captured environment gains the receiver under that name.
    #[must_use]
    pub fn bind(&self, receiver: Addr) -> Option<Self> {
        if self.bound {
            return Some(self.clone());
        }
        let (head, rest) = self.params.split_first()?;
        Some(Self {
            id: self.id,
            name: self.name.clone(),
            params: rest.to_vec(),
            vararg: self.vararg.clone(),
            kwarg: self.kwarg.clone(),
            defaults: self.defaults.clone(),
            body: self.body.clone(),
            captured: self.captured.set(head, receiver),
            bound: true,
        })
    }
}
