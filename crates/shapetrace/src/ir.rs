//! The intermediate representation consumed by the interpreter.
//!
//! The parser collaborator delivers programs in memory as these trees. Every
//! node may carry a source reference; the interpreter threads it into
//! constraints and log entries so diagnostics point back into user code.

use std::rc::Rc;

use crate::source::SourceRange;

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    None,
}

/// Binary operators, including comparisons and boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOpKind {
    /// Dunder method pair `(forward, reflected)` for object dispatch, when
    /// the operator supports it.
    #[must_use]
    pub fn dunder(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Add => Some(("__add__", "__radd__")),
            Self::Sub => Some(("__sub__", "__rsub__")),
            Self::Mul => Some(("__mul__", "__rmul__")),
            Self::FloorDiv => Some(("__floordiv__", "__rfloordiv__")),
            Self::TrueDiv => Some(("__truediv__", "__rtruediv__")),
            Self::Mod => Some(("__mod__", "__rmod__")),
            Self::Pow => Some(("__pow__", "__rpow__")),
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::And | Self::Or => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOpKind {
    Neg,
    Not,
}

/// An expression with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct IrExpr {
    pub kind: Rc<ExprKind>,
    pub source: Option<SourceRange>,
}

/// Expression forms.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Const(Literal),
    Name(Rc<str>),
    /// Allocates a fresh empty object.
    Object,
    Tuple(Vec<IrExpr>),
    Attr { target: Box<IrExpr>, name: Rc<str> },
    Subscr { target: Box<IrExpr>, index: Box<IrExpr> },
    Call {
        callee: Box<IrExpr>,
        args: Vec<IrExpr>,
        kwargs: Vec<(Rc<str>, IrExpr)>,
    },
    /// Dispatch into the library-call registry by string path.
    LibCall { path: Rc<str>, args: Vec<IrExpr> },
    BinOp {
        op: BinOpKind,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    UnaryOp { op: UnaryOpKind, operand: Box<IrExpr> },
}

impl IrExpr {
    fn new(kind: ExprKind) -> Self {
        Self { kind: Rc::new(kind), source: None }
    }

    #[must_use]
    pub fn at(mut self, source: SourceRange) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::new(ExprKind::Const(Literal::Int(v)))
    }

    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::new(ExprKind::Const(Literal::Float(v)))
    }

    #[must_use]
    pub fn truth(v: bool) -> Self {
        Self::new(ExprKind::Const(Literal::Bool(v)))
    }

    #[must_use]
    pub fn str_lit(s: &str) -> Self {
        Self::new(ExprKind::Const(Literal::Str(Rc::from(s))))
    }

    #[must_use]
    pub fn none() -> Self {
        Self::new(ExprKind::Const(Literal::None))
    }

    #[must_use]
    pub fn name(n: &str) -> Self {
        Self::new(ExprKind::Name(Rc::from(n)))
    }

    #[must_use]
    pub fn object() -> Self {
        Self::new(ExprKind::Object)
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::new(ExprKind::Tuple(items))
    }

    #[must_use]
    pub fn attr(target: Self, name: &str) -> Self {
        Self::new(ExprKind::Attr { target: Box::new(target), name: Rc::from(name) })
    }

    #[must_use]
    pub fn subscr(target: Self, index: Self) -> Self {
        Self::new(ExprKind::Subscr { target: Box::new(target), index: Box::new(index) })
    }

    #[must_use]
    pub fn call(callee: Self, args: Vec<Self>) -> Self {
        Self::new(ExprKind::Call { callee: Box::new(callee), args, kwargs: Vec::new() })
    }

    #[must_use]
    pub fn call_kw(callee: Self, args: Vec<Self>, kwargs: Vec<(&str, Self)>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
            kwargs: kwargs.into_iter().map(|(k, v)| (Rc::from(k), v)).collect(),
        })
    }

    #[must_use]
    pub fn libcall(path: &str, args: Vec<Self>) -> Self {
        Self::new(ExprKind::LibCall { path: Rc::from(path), args })
    }

    #[must_use]
    pub fn binop(op: BinOpKind, left: Self, right: Self) -> Self {
        Self::new(ExprKind::BinOp { op, left: Box::new(left), right: Box::new(right) })
    }

    #[must_use]
    pub fn unary(op: UnaryOpKind, operand: Self) -> Self {
        Self::new(ExprKind::UnaryOp { op, operand: Box::new(operand) })
    }
}

/// A statement with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct IrStmt {
    pub kind: Rc<StmtKind>,
    pub source: Option<SourceRange>,
}

/// Statement forms.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Pass,
    Seq(Vec<IrStmt>),
    Expr(IrExpr),
    /// Assignment to a Name, Attr, or Subscr target.
    Assign { target: IrExpr, value: IrExpr },
    /// Allocates a fresh cell, binds `name` for the duration of `body`, then
    /// restores the outer binding. The cell itself survives.
    Let {
        name: Rc<str>,
        init: Option<IrExpr>,
        body: Box<IrStmt>,
    },
    /// Defines a function capturing the current environment, binds it under
    /// `name`, and evaluates `scope` with the binding in place.
    FunDef {
        name: Rc<str>,
        params: Vec<Rc<str>>,
        vararg: Option<Rc<str>>,
        kwarg: Option<Rc<str>>,
        defaults: Vec<(Rc<str>, IrExpr)>,
        body: Rc<IrStmt>,
        scope: Box<IrStmt>,
    },
    If {
        cond: IrExpr,
        then: Box<IrStmt>,
        orelse: Box<IrStmt>,
    },
    ForIn {
        name: Rc<str>,
        iter: IrExpr,
        body: Box<IrStmt>,
    },
    Return(Option<IrExpr>),
    Break,
    Continue,
}

impl IrStmt {
    fn new(kind: StmtKind) -> Self {
        Self { kind: Rc::new(kind), source: None }
    }

    #[must_use]
    pub fn at(mut self, source: SourceRange) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    #[must_use]
    pub fn seq(stmts: Vec<Self>) -> Self {
        Self::new(StmtKind::Seq(stmts))
    }

    #[must_use]
    pub fn expr(e: IrExpr) -> Self {
        Self::new(StmtKind::Expr(e))
    }

    #[must_use]
    pub fn assign(target: IrExpr, value: IrExpr) -> Self {
        Self::new(StmtKind::Assign { target, value })
    }

    #[must_use]
    pub fn let_in(name: &str, init: Option<IrExpr>, body: Self) -> Self {
        Self::new(StmtKind::Let { name: Rc::from(name), init, body: Box::new(body) })
    }

    #[must_use]
    pub fn fundef(name: &str, params: &[&str], body: Self, scope: Self) -> Self {
        Self::new(StmtKind::FunDef {
            name: Rc::from(name),
            params: params.iter().map(|p| Rc::from(*p)).collect(),
            vararg: None,
            kwarg: None,
            defaults: Vec::new(),
            body: Rc::new(body),
            scope: Box::new(scope),
        })
    }

    #[must_use]
    pub fn if_else(cond: IrExpr, then: Self, orelse: Self) -> Self {
        Self::new(StmtKind::If { cond, then: Box::new(then), orelse: Box::new(orelse) })
    }

    #[must_use]
    pub fn for_in(name: &str, iter: IrExpr, body: Self) -> Self {
        Self::new(StmtKind::ForIn { name: Rc::from(name), iter, body: Box::new(body) })
    }

    #[must_use]
    pub fn ret(value: Option<IrExpr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    #[must_use]
    pub fn brk() -> Self {
        Self::new(StmtKind::Break)
    }

    #[must_use]
    pub fn cont() -> Self {
        Self::new(StmtKind::Continue)
    }
}
