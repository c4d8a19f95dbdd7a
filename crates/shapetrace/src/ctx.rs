//! Per-path execution state.
//!
//! A `Ctx<T>` bundles everything one execution path knows: environment,
//! heap, constraint set, the value produced so far, the call stack, and its
//! log. A `CtxSet<T>` is the bag of currently-live paths. Both are immutable;
//! every operation returns new state, so a branch fork is two cheap clones
//! that diverge from identical prior state.
//!
//! A warned path keeps executing; a failed path stops. `Flow` carries the
//! pending control transfer (return / break / continue) that the enclosing
//! construct consumes.

use std::rc::Rc;

use crate::{
    constraint::Ctr,
    ctr_set::CtrSet,
    env::Env,
    error::ErrorKind,
    heap::Heap,
    source::SourceRange,
    value::Val,
};

/// Lifecycle state of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize)]
pub enum CtxStatus {
    Active,
    /// A recoverable problem was logged; execution continues.
    Warned,
    /// A precondition proved false; execution on this path has stopped.
    Failed,
}

/// Pending non-local control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Returned,
    Broke,
    Continued,
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
pub enum LogLevel {
    Info,
    Warn,
    Fail,
}

/// One diagnostic line attached to a path.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Error classification, when the entry reports a problem rather than
    /// free-form progress.
    pub kind: Option<ErrorKind>,
    pub message: Rc<str>,
    pub source: Option<SourceRange>,
}

/// One call-stack frame, for diagnostics only.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: Rc<str>,
    pub source: Option<SourceRange>,
}

/// The state of a single execution path.
#[derive(Debug, Clone, PartialEq)]
pub struct Ctx<T> {
    pub env: Env,
    pub heap: Heap,
    pub ctr_set: CtrSet,
    pub ret_val: T,
    pub call_stack: im::Vector<Frame>,
    pub logs: im::Vector<LogEntry>,
    pub status: CtxStatus,
    pub flow: Flow,
}

impl<T: Clone> Ctx<T> {
    #[must_use]
    pub fn new(env: Env, heap: Heap, ctr_set: CtrSet, ret_val: T) -> Self {
        Self {
            env,
            heap,
            ctr_set,
            ret_val,
            call_stack: im::Vector::new(),
            logs: im::Vector::new(),
            status: CtxStatus::Active,
            flow: Flow::Normal,
        }
    }

    /// True while the path should keep executing statements.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status != CtxStatus::Failed && self.flow == Flow::Normal
    }

    /// Replaces the carried value, keeping everything else.
    #[must_use]
    pub fn with_ret<U: Clone>(&self, ret_val: U) -> Ctx<U> {
        Ctx {
            env: self.env.clone(),
            heap: self.heap.clone(),
            ctr_set: self.ctr_set.clone(),
            ret_val,
            call_stack: self.call_stack.clone(),
            logs: self.logs.clone(),
            status: self.status,
            flow: self.flow,
        }
    }

    #[must_use]
    pub fn set_ret_val(mut self, ret_val: T) -> Self {
        self.ret_val = ret_val;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_heap(mut self, heap: Heap) -> Self {
        self.heap = heap;
        self
    }

    #[must_use]
    pub fn with_ctr_set(mut self, ctr_set: CtrSet) -> Self {
        self.ctr_set = ctr_set;
        self
    }

    #[must_use]
    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    #[must_use]
    pub fn log_info(mut self, message: &str, source: Option<SourceRange>) -> Self {
        self.logs.push_back(LogEntry {
            level: LogLevel::Info,
            kind: None,
            message: Rc::from(message),
            source,
        });
        self
    }

    /// Logs a warning and downgrades an active path to warned.
    #[must_use]
    pub fn warn_with_msg(self, message: &str, source: Option<SourceRange>) -> Self {
        self.warn_kind(None, message, source)
    }

    /// Logs a classified warning and downgrades an active path to warned.
    #[must_use]
    pub fn warn_kind(mut self, kind: impl Into<Option<ErrorKind>>, message: &str, source: Option<SourceRange>) -> Self {
        self.logs.push_back(LogEntry {
            level: LogLevel::Warn,
            kind: kind.into(),
            message: Rc::from(message),
            source,
        });
        if self.status == CtxStatus::Active {
            self.status = CtxStatus::Warned;
        }
        self
    }

    /// Logs a failure and stops the path.
    #[must_use]
    pub fn fail_with_msg(self, message: &str, source: Option<SourceRange>) -> Self {
        self.fail_kind(ErrorKind::ShapeViolation, message, source)
    }

    /// Logs a classified failure and stops the path.
    #[must_use]
    pub fn fail_kind(mut self, kind: ErrorKind, message: &str, source: Option<SourceRange>) -> Self {
        self.logs.push_back(LogEntry {
            level: LogLevel::Fail,
            kind: Some(kind),
            message: Rc::from(message),
            source,
        });
        self.status = CtxStatus::Failed;
        self
    }

    #[must_use]
    pub fn push_frame(mut self, name: &str, source: Option<SourceRange>) -> Self {
        self.call_stack.push_back(Frame { name: Rc::from(name), source });
        self
    }

    #[must_use]
    pub fn pop_frame(mut self) -> Self {
        self.call_stack.pop_back();
        self
    }

    /// Discharges a list of preconditions on this path.
    ///
    /// Each constraint is triaged: definitely true against the ranges is a
    /// no-op, definitely false fails the path with `message`, and undecided
    /// constraints are added to the set (where the solver may still latch a
    /// contradiction, which also fails the path).
    #[must_use]
    pub fn require(self, ctrs: Vec<Ctr>, message: &str, source: Option<SourceRange>) -> Self {
        let mut ctx = self;
        for ctr in ctrs {
            if ctx.status == CtxStatus::Failed {
                return ctx;
            }
            match ctx.ctr_set.check_immediate(&ctr) {
                Some(true) => {}
                Some(false) => {
                    return ctx.fail_with_msg(message, source);
                }
                None => {
                    let added = ctx.ctr_set.add(ctr);
                    if added.is_failed() {
                        let detail = added
                            .contradiction()
                            .map_or_else(|| message.to_owned(), |c| format!("{message}: {}", c.detail));
                        return ctx.with_ctr_set(added).fail_with_msg(&detail, source);
                    }
                    ctx = ctx.with_ctr_set(added);
                }
            }
        }
        ctx
    }
}

/// A bag of live paths.
///
/// The set may be transiently empty (e.g. one side of a decided branch);
/// interpretation keeps at least one terminated context overall.
#[derive(Debug, Clone, PartialEq)]
pub struct CtxSet<T> {
    ctxs: Vec<Ctx<T>>,
}

impl<T: Clone> CtxSet<T> {
    #[must_use]
    pub fn single(ctx: Ctx<T>) -> Self {
        Self { ctxs: vec![ctx] }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { ctxs: Vec::new() }
    }

    #[must_use]
    pub fn from_vec(ctxs: Vec<Ctx<T>>) -> Self {
        Self { ctxs }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ctxs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ctxs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ctx<T>> {
        self.ctxs.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Ctx<T>> {
        self.ctxs
    }

    /// Applies `f` to every path.
    #[must_use]
    pub fn map<U: Clone>(self, mut f: impl FnMut(Ctx<T>) -> Ctx<U>) -> CtxSet<U> {
        CtxSet { ctxs: self.ctxs.into_iter().map(&mut f).collect() }
    }

    /// Explores new forks: `f` may return several successors per path.
    #[must_use]
    pub fn flat_map<U: Clone>(self, mut f: impl FnMut(Ctx<T>) -> CtxSet<U>) -> CtxSet<U> {
        let mut out = Vec::new();
        for ctx in self.ctxs {
            out.extend(f(ctx).ctxs);
        }
        CtxSet { ctxs: out }
    }

    /// Unions two sets.
    #[must_use]
    pub fn join(mut self, other: Self) -> Self {
        self.ctxs.extend(other.ctxs);
        self
    }

    /// Discharges preconditions on every live path (see `Ctx::require`).
    /// Already-failed paths pass through untouched.
    #[must_use]
    pub fn require(self, ctrs: &[Ctr], message: &str, source: Option<SourceRange>) -> Self {
        self.map(|ctx| {
            if ctx.status == CtxStatus::Failed {
                ctx
            } else {
                ctx.require(ctrs.to_vec(), message, source)
            }
        })
    }
}

impl CtxSet<Val> {
    /// Splits every path on a condition: the left set carries `cond`, the
    /// right carries its negation. A path whose ranges already decide the
    /// condition lands entirely on one side; a side whose constraint proves
    /// contradictory is dropped as infeasible.
    #[must_use]
    pub fn if_then_else(self, cond: &Ctr, source: Option<SourceRange>) -> (Self, Self) {
        let mut then_ctxs = Vec::new();
        let mut else_ctxs = Vec::new();
        for ctx in self.ctxs {
            if ctx.status == CtxStatus::Failed {
                // A dead path belongs to neither branch; keep it on the left
                // so it is not lost from the terminated set.
                then_ctxs.push(ctx);
                continue;
            }
            match ctx.ctr_set.check_immediate(cond) {
                Some(true) => then_ctxs.push(ctx),
                Some(false) => else_ctxs.push(ctx),
                None => {
                    let pos = ctx.ctr_set.add(cond.clone().at(source.or(cond.source)));
                    if !pos.is_failed() {
                        then_ctxs.push(ctx.clone().with_ctr_set(pos));
                    }
                    let neg = ctx.ctr_set.add(cond.negate().at(source.or(cond.source)));
                    if !neg.is_failed() {
                        else_ctxs.push(ctx.with_ctr_set(neg));
                    }
                }
            }
        }
        (Self { ctxs: then_ctxs }, Self { ctxs: else_ctxs })
    }
}

impl<T> IntoIterator for CtxSet<T> {
    type Item = Ctx<T>;
    type IntoIter = std::vec::IntoIter<Ctx<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ctxs.into_iter()
    }
}
