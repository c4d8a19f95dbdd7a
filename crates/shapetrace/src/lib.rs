//! shapetrace — a static shape-and-constraint analyzer core.
//!
//! Given a parsed program for a tensor-oriented scripting language,
//! shapetrace explores every feasible execution path symbolically. Values
//! are symbolic expressions over shapes, integers, floats, strings, and
//! booleans; tensor-operation preconditions become constraints; a
//! range-tracking solver discharges what it can and the first precondition
//! that cannot hold is localized to its source position.
//!
//! The crate is the engine only: the source-language parser, the full
//! library of tensor-operation wrappers, and any CLI or reporting surface
//! are collaborators that feed IR in (`ir`), extend the registry
//! (`libcall`), and consume structured reports (`service`).

mod constraint;
mod ctr_set;
mod ctx;
mod env;
mod error;
mod exp;
mod heap;
mod interp;
mod ir;
mod libcall;
mod linear;
mod prelude;
mod range;
mod rational;
mod resource;
mod service;
mod simplify;
mod solver;
mod source;
mod symbol;
pub mod tracer;
mod value;

pub use crate::{
    constraint::{Ctr, CtrId, CtrKind},
    ctr_set::{Contradiction, CtrSet, LoggedCtr},
    ctx::{Ctx, CtxSet, CtxStatus, Flow, Frame, LogEntry, LogLevel},
    env::Env,
    error::{AnalysisError, AnalysisResult, ErrorKind},
    exp::{
        BoolSymbol, Dims, ExpBool, ExpNum, ExpShape, ExpStr, Extremum, NumBop, NumSymbol, NumUop,
        NumVal, ShapeSymbol, StrSymbol, SymExp, abs_index_by_len,
    },
    heap::{Heap, HeapStats},
    interp::Interp,
    ir::{BinOpKind, ExprKind, IrExpr, IrStmt, Literal, StmtKind, UnaryOpKind},
    libcall::{LibCallFn, LibCallInput, LibCallRegistry},
    linear::{NormalExp, RangeLookup, normalize},
    prelude::{Prelude, bootstrap},
    range::{Endpoint, NumRange},
    rational::Rational,
    resource::{
        BudgetError, BudgetTracker, DEFAULT_LOOP_UNROLL, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_PATHS,
        DEFAULT_MAX_STEPS, LimitedTracker, NoLimitTracker, ResourceLimits,
    },
    service::{
        Analysis, AnalysisReport, Analyzer, CtrReport, LogReport, PathOutcome, PathReport, analyze,
        analyze_with_budget, merge_paths,
    },
    simplify::{simplify_bool, simplify_ctr, simplify_num, simplify_shape, simplify_string},
    source::{FileId, SourceRange},
    symbol::{IdGen, NumKind, SymbolId},
    value::{Addr, ErrLevel, Func, Obj, Val},
};
