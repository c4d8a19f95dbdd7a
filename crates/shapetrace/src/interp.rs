//! The path-splitting interpreter.
//!
//! Walks IR statements over a set of live contexts. Control flow never
//! throws: branch conditions fork the context set, failed preconditions stop
//! individual paths, and every local error degrades into an `Error` value
//! plus a warned status so interpretation always drives each path to a
//! terminated state.
//!
//! Execution is single-threaded and cooperative; all parallelism lives in
//! the path space, drained depth-first and deterministically.

use std::rc::Rc;

use crate::{
    constraint::Ctr,
    ctx::{Ctx, CtxSet, CtxStatus, Flow},
    error::ErrorKind,
    exp::{ExpBool, ExpNum, ExpStr, SymExp},
    ir::{BinOpKind, ExprKind, IrExpr, IrStmt, Literal, StmtKind, UnaryOpKind},
    libcall::{LibCallInput, LibCallRegistry},
    resource::{BudgetTracker, DEFAULT_MAX_CALL_DEPTH},
    simplify::simplify_bool,
    source::SourceRange,
    symbol::IdGen,
    tracer::AnalysisTracer,
    value::{Addr, Func, Obj, Val},
};

/// The interpreter over one IR program.
pub struct Interp<'a, Tr: AnalysisTracer, B: BudgetTracker> {
    idg: &'a IdGen,
    registry: &'a LibCallRegistry,
    tracer: &'a mut Tr,
    budget: &'a mut B,
    budget_hit: bool,
}

/// Truthiness verdict for a value.
enum Truth {
    Decided(bool),
    /// The condition reduces to a constraint; the caller forks on it.
    Constraint(Ctr),
    /// Nothing is known; both branches are explored unconstrained.
    Unknown,
}

impl<'a, Tr: AnalysisTracer, B: BudgetTracker> Interp<'a, Tr, B> {
    pub fn new(idg: &'a IdGen, registry: &'a LibCallRegistry, tracer: &'a mut Tr, budget: &'a mut B) -> Self {
        Self { idg, registry, tracer, budget, budget_hit: false }
    }

    /// True once a budget was exhausted during this run.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.budget_hit
    }

    /// Runs a statement over every live path. Paths that already stopped
    /// (failed, or carrying a pending return/break/continue) pass through.
    pub fn exec_stmt(&mut self, set: CtxSet<Val>, stmt: &IrStmt) -> CtxSet<Val> {
        if self.budget_hit {
            return set;
        }
        if self.budget.step().is_err() {
            self.budget_hit = true;
            return set.map(|ctx| {
                if ctx.status == CtxStatus::Failed {
                    ctx
                } else {
                    ctx.warn_kind(ErrorKind::BudgetExceeded, "step budget exceeded; partial results", stmt.source)
                }
            });
        }

        let (live, parked): (Vec<_>, Vec<_>) = set.into_vec().into_iter().partition(Ctx::is_running);
        if live.is_empty() {
            return CtxSet::from_vec(parked);
        }
        self.tracer.on_stmt(stmt_desc(stmt), live.len());
        let out = self.exec_live(CtxSet::from_vec(live), stmt);
        let out = self.enforce_path_cap(out, stmt.source);
        out.join(CtxSet::from_vec(parked))
    }

    /// Collapses surplus paths into a budget warning when the path cap is hit.
    fn enforce_path_cap(&mut self, set: CtxSet<Val>, source: Option<SourceRange>) -> CtxSet<Val> {
        if self.budget.check_paths(set.len()).is_ok() {
            return set;
        }
        self.budget_hit = true;
        let mut ctxs = set.into_vec();
        ctxs.truncate(1);
        CtxSet::from_vec(ctxs)
            .map(|ctx| ctx.warn_kind(ErrorKind::BudgetExceeded, "path budget exceeded; sibling paths collapsed", source))
    }

    fn exec_live(&mut self, set: CtxSet<Val>, stmt: &IrStmt) -> CtxSet<Val> {
        match stmt.kind.as_ref() {
            StmtKind::Pass => set,
            StmtKind::Seq(stmts) => {
                let mut set = set;
                for s in stmts {
                    set = self.exec_stmt(set, s);
                }
                set
            }
            StmtKind::Expr(e) => set.flat_map(|ctx| self.eval_expr(ctx, e)),
            StmtKind::Assign { target, value } => {
                let source = stmt.source;
                set.flat_map(|ctx| {
                    self.eval_expr(ctx, value)
                        .flat_map(|ctx| self.assign(ctx, target, source))
                })
            }
            StmtKind::Let { name, init, body } => self.exec_let(set, name, init.as_ref(), body),
            StmtKind::FunDef { name, params, vararg, kwarg, defaults, body, scope } => {
                self.exec_fundef(set, name, params, vararg.as_ref(), kwarg.as_ref(), defaults, body, scope)
            }
            StmtKind::If { cond, then, orelse } => self.exec_if(set, cond, then, orelse, stmt.source),
            StmtKind::ForIn { name, iter, body } => self.exec_for(set, name, iter, body, stmt.source),
            StmtKind::Return(value) => match value {
                Some(e) => set.flat_map(|ctx| {
                    self.eval_expr(ctx, e).map(|ctx| ctx.with_flow(Flow::Returned))
                }),
                None => set.map(|ctx| ctx.set_ret_val(Val::None).with_flow(Flow::Returned)),
            },
            StmtKind::Break => set.map(|ctx| ctx.with_flow(Flow::Broke)),
            StmtKind::Continue => set.map(|ctx| ctx.with_flow(Flow::Continued)),
        }
    }

    // --- statements ----------------------------------------------------------

    /// Stores the context's carried value through an assignment target.
    fn assign(&mut self, ctx: Ctx<Val>, target: &IrExpr, source: Option<SourceRange>) -> CtxSet<Val> {
        let value = ctx.ret_val.clone();
        match target.kind.as_ref() {
            ExprKind::Name(name) => CtxSet::single(bind_name(ctx, name, value, source)),
            ExprKind::Attr { target: obj_expr, name } => {
                let name = name.clone();
                self.eval_expr(ctx, obj_expr).map(move |obj_ctx| {
                    let receiver = obj_ctx.ret_val.clone();
                    set_attr(obj_ctx.set_ret_val(value.clone()), &receiver, &name, source)
                })
            }
            ExprKind::Subscr { target: obj_expr, index } => {
                self.eval_expr(ctx, obj_expr).flat_map(|obj_ctx| {
                    let receiver = obj_ctx.ret_val.clone();
                    let value = value.clone();
                    self.eval_expr(obj_ctx.with_ret(Val::None), index).map(move |idx_ctx| {
                        let index_val = idx_ctx.ret_val.clone();
                        set_index(idx_ctx.set_ret_val(value.clone()), &receiver, &index_val, source)
                    })
                })
            }
            _ => CtxSet::single(
                ctx.set_ret_val(Val::warning("unsupported assignment target"))
                    .warn_kind(ErrorKind::TypeMismatch, "unsupported assignment target", source),
            ),
        }
    }

    fn exec_let(
        &mut self,
        set: CtxSet<Val>,
        name: &Rc<str>,
        init: Option<&IrExpr>,
        body: &IrStmt,
    ) -> CtxSet<Val> {
        let name = name.clone();
        set.flat_map(|ctx| {
            // The outer binding is restored after the body; the cell itself
            // survives (closures may have captured it).
            let saved = ctx.env.get(&name);
            let evaluated = match init {
                Some(e) => self.eval_expr(ctx, e),
                None => CtxSet::single(ctx.set_ret_val(Val::None)),
            };
            let name_inner = name.clone();
            let bound = evaluated.map(move |ctx| {
                let value = ctx.ret_val.clone();
                let (addr, heap) = ctx.heap.alloc_with(value);
                let env = ctx.env.set(&name_inner, addr);
                ctx.with_heap(heap).with_env(env).set_ret_val(Val::None)
            });
            let out = self.exec_stmt(bound, body);
            let name_outer = name.clone();
            out.map(move |ctx| {
                let env = match saved {
                    Some(addr) => ctx.env.set(&name_outer, addr),
                    None => ctx.env.remove(&name_outer),
                };
                ctx.with_env(env)
            })
        })
    }

    #[expect(clippy::too_many_arguments, reason = "mirrors the FunDef node fields")]
    fn exec_fundef(
        &mut self,
        set: CtxSet<Val>,
        name: &Rc<str>,
        params: &[Rc<str>],
        vararg: Option<&Rc<str>>,
        kwarg: Option<&Rc<str>>,
        defaults: &[(Rc<str>, IrExpr)],
        body: &Rc<IrStmt>,
        scope: &IrStmt,
    ) -> CtxSet<Val> {
        // Evaluate default expressions left to right in the defining scope.
        let default_exprs: Vec<IrExpr> = defaults.iter().map(|(_, e)| e.clone()).collect();
        let default_names: Vec<Rc<str>> = defaults.iter().map(|(n, _)| n.clone()).collect();
        let with_defaults = set.flat_map(|ctx| self.eval_list(ctx, &default_exprs));

        let name = name.clone();
        let params = params.to_vec();
        let vararg = vararg.cloned();
        let kwarg = kwarg.cloned();
        let body = body.clone();
        let idg = self.idg;
        let defined = with_defaults.map(move |ctx| {
            let default_vals = ctx.ret_val.clone();
            let (addr, heap) = ctx.heap.alloc();
            // The function's own binding is visible to its body: capture the
            // environment after installing it, so recursion resolves.
            let env = ctx.env.set(&name, addr);
            let func = Func {
                id: idg.fresh(),
                name: name.clone(),
                params: params.clone(),
                vararg: vararg.clone(),
                kwarg: kwarg.clone(),
                defaults: default_names
                    .iter()
                    .cloned()
                    .zip(default_vals.iter().cloned())
                    .collect(),
                body: body.clone(),
                captured: env.clone(),
                bound: false,
            };
            let heap = heap.set(addr, Val::Func(Rc::new(func))).unwrap_or(heap);
            ctx.with_heap(heap).with_env(env).with_ret(Val::None)
        });
        self.exec_stmt(defined, scope)
    }

    fn exec_if(
        &mut self,
        set: CtxSet<Val>,
        cond: &IrExpr,
        then: &IrStmt,
        orelse: &IrStmt,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let evaluated = set.flat_map(|ctx| self.eval_expr(ctx, cond));
        let mut then_set: Vec<Ctx<Val>> = Vec::new();
        let mut else_set: Vec<Ctx<Val>> = Vec::new();
        for ctx in evaluated {
            if ctx.status == CtxStatus::Failed {
                then_set.push(ctx);
                continue;
            }
            let cond_val = ctx.ret_val.clone();
            match self.truth_of(&ctx, &cond_val) {
                Truth::Decided(true) => then_set.push(ctx),
                Truth::Decided(false) => else_set.push(ctx),
                Truth::Constraint(ctr) => {
                    let (t, e) = CtxSet::single(ctx).if_then_else(&ctr, source);
                    then_set.extend(t.into_vec());
                    else_set.extend(e.into_vec());
                }
                Truth::Unknown => {
                    let warned = ctx.warn_with_msg("condition truth value is unknown; exploring both branches", source);
                    then_set.push(warned.clone());
                    else_set.push(warned);
                }
            }
        }
        self.tracer.on_fork(then_set.len(), else_set.len());
        let then_out = self.exec_stmt(CtxSet::from_vec(then_set), then);
        let else_out = self.exec_stmt(CtxSet::from_vec(else_set), orelse);
        then_out.join(else_out)
    }

    fn exec_for(
        &mut self,
        set: CtxSet<Val>,
        name: &Rc<str>,
        iter: &IrExpr,
        body: &IrStmt,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let evaluated = set.flat_map(|ctx| self.eval_expr(ctx, iter));
        let mut done: Vec<Ctx<Val>> = Vec::new();
        let unroll = self.budget.loop_unroll();
        for ctx in evaluated {
            if ctx.status == CtxStatus::Failed {
                done.push(ctx);
                continue;
            }
            let iter_val = ctx.ret_val.clone();
            let Some(Val::Obj(obj)) = ctx.heap.fetch(&iter_val).cloned() else {
                done.push(
                    ctx.set_ret_val(Val::warning("for-in target is not iterable"))
                        .warn_kind(ErrorKind::TypeMismatch, "for-in target is not iterable", source),
                );
                continue;
            };
            let len = obj.attr("$length").and_then(Val::as_num).cloned();
            let out = match len.as_ref().and_then(ExpNum::as_i64) {
                // Constant length: plain unrolling.
                Some(n) => self.run_loop_const(ctx, &obj, n, name, body, source),
                // Symbolic length: unroll with a terminated/continuing fork
                // per iteration, bounded by the unroll budget.
                None => match len {
                    Some(len) => self.run_loop_symbolic(ctx, &obj, &len, unroll, name, body, source),
                    None => CtxSet::single(
                        ctx.set_ret_val(Val::warning("iterable has no length"))
                            .warn_kind(ErrorKind::TypeMismatch, "iterable has no length", source),
                    ),
                },
            };
            done.extend(out.into_vec());
        }
        CtxSet::from_vec(done)
    }

    fn run_loop_const(
        &mut self,
        ctx: Ctx<Val>,
        obj: &Obj,
        n: i64,
        name: &Rc<str>,
        body: &IrStmt,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let mut exited: Vec<Ctx<Val>> = Vec::new();
        let mut continuing = CtxSet::single(ctx);
        for i in 0..n {
            if continuing.is_empty() {
                break;
            }
            let element = obj.index(i).cloned().unwrap_or_else(|| {
                Val::warning("iterable has no element at a statically-known index")
            });
            let bound = continuing.map(|ctx| bind_name(ctx, name, element.clone(), source));
            let after = self.exec_stmt(bound, body);
            let (next, out) = split_loop_flow(after);
            exited.extend(out);
            continuing = CtxSet::from_vec(next);
        }
        CtxSet::from_vec(exited).join(continuing)
    }

    #[expect(clippy::too_many_arguments, reason = "loop state is explicit")]
    fn run_loop_symbolic(
        &mut self,
        ctx: Ctx<Val>,
        obj: &Obj,
        len: &ExpNum,
        unroll: usize,
        name: &Rc<str>,
        body: &IrStmt,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let mut exited: Vec<Ctx<Val>> = Vec::new();
        let mut continuing = CtxSet::single(ctx);
        for i in 0..unroll {
            if continuing.is_empty() {
                break;
            }
            // Terminated side: len <= i. Continuing side: i < len.
            let ended = Ctr::le(len.clone(), ExpNum::int(i as i64)).at(source);
            let (stop, go) = continuing.if_then_else(&ended, source);
            exited.extend(stop.into_vec());
            if go.is_empty() {
                continuing = CtxSet::empty();
                break;
            }
            let element = obj
                .index(i as i64)
                .cloned()
                .unwrap_or_else(|| Val::warning("iterable has no element for a symbolic index"));
            let bound = go.map(|ctx| bind_name(ctx, name, element.clone(), source));
            let after = self.exec_stmt(bound, body);
            let (next, out) = split_loop_flow(after);
            exited.extend(out);
            continuing = CtxSet::from_vec(next);
        }
        // Whatever is still continuing outlived the unroll budget.
        exited.extend(
            continuing
                .map(|ctx| ctx.warn_kind(ErrorKind::BudgetExceeded, "loop unroll budget exceeded; remaining iterations skipped", source))
                .into_vec(),
        );
        CtxSet::from_vec(exited)
    }

    // --- expressions ---------------------------------------------------------

    /// Evaluates an expression on one path, possibly forking.
    pub fn eval_expr(&mut self, ctx: Ctx<Val>, e: &IrExpr) -> CtxSet<Val> {
        if ctx.status == CtxStatus::Failed {
            return CtxSet::single(ctx);
        }
        let source = e.source;
        match e.kind.as_ref() {
            ExprKind::Const(lit) => CtxSet::single(ctx.set_ret_val(literal_val(lit))),
            ExprKind::Name(name) => CtxSet::single(eval_name(ctx, name, source)),
            ExprKind::Object => {
                let obj = Obj::new(self.idg.fresh());
                let (addr, heap) = ctx.heap.alloc_with(Val::Obj(obj));
                CtxSet::single(ctx.with_heap(heap).with_ret(Val::Addr(addr)))
            }
            ExprKind::Tuple(items) => {
                let idg = self.idg;
                self.eval_list(ctx, items).map(move |ctx| {
                    let items = ctx.ret_val.clone();
                    let mut obj = Obj::new(idg.fresh());
                    for (i, item) in items.iter().enumerate() {
                        obj = obj.with_index(i as i64, item.clone());
                    }
                    obj = obj.with_attr("$length", Val::int(items.len() as i64));
                    let (addr, heap) = ctx.heap.alloc_with(Val::Obj(obj));
                    ctx.with_heap(heap).with_ret(Val::Addr(addr))
                })
            }
            ExprKind::Attr { target, name } => {
                let name = name.clone();
                self.eval_expr(ctx, target)
                    .map(move |ctx| eval_attr(ctx, &name, source))
            }
            ExprKind::Subscr { target, index } => self.eval_subscr(ctx, target, index, source),
            ExprKind::Call { callee, args, kwargs } => self.eval_call(ctx, callee, args, kwargs, source),
            ExprKind::LibCall { path, args } => self.eval_libcall(ctx, path, args, source),
            ExprKind::BinOp { op, left, right } => self.eval_binop(ctx, *op, left, right, source),
            ExprKind::UnaryOp { op, operand } => {
                let op = *op;
                self.eval_expr(ctx, operand)
                    .map(move |ctx| eval_unary(ctx, op, source))
            }
        }
    }

    /// Evaluates a list of expressions left to right, threading forks.
    fn eval_list(&mut self, ctx: Ctx<Val>, exprs: &[IrExpr]) -> CtxSet<Vec<Val>> {
        let mut acc: CtxSet<Vec<Val>> = CtxSet::single(ctx.with_ret(Vec::new()));
        for e in exprs {
            acc = acc.flat_map(|c| {
                let vals = c.ret_val.clone();
                self.eval_expr(c.with_ret(Val::None), e).map(move |c2| {
                    let mut vals = vals.clone();
                    vals.push(c2.ret_val.clone());
                    c2.with_ret(vals)
                })
            });
        }
        acc
    }

    fn eval_subscr(
        &mut self,
        ctx: Ctx<Val>,
        target: &IrExpr,
        index: &IrExpr,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        self.eval_expr(ctx, target).flat_map(|ctx| {
            let target_val = ctx.ret_val.clone();
            self.eval_expr(ctx.with_ret(Val::None), index).flat_map(|ctx| {
                let index_val = ctx.ret_val.clone();
                self.subscript(ctx, &target_val, &index_val, source)
            })
        })
    }

    fn subscript(
        &mut self,
        ctx: Ctx<Val>,
        target: &Val,
        index: &Val,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        if ctx.status == CtxStatus::Failed {
            return CtxSet::single(ctx);
        }
        let fetched = ctx.heap.fetch(target).cloned();
        match fetched {
            Some(Val::Obj(obj)) => {
                if let Val::Int(i_exp) = index
                    && let Some(i) = i_exp.as_i64()
                {
                    // Negative constant indices count from the back when the
                    // length is known.
                    let len = obj.attr("$length").and_then(Val::as_num).and_then(ExpNum::as_i64);
                    let i = if i < 0 { len.map_or(i, |n| n + i) } else { i };
                    if let Some(v) = obj.index(i) {
                        let v = ctx.heap.sanitize(v);
                        return CtxSet::single(ctx.set_ret_val(v));
                    }
                }
                if let Val::Str(s) = index
                    && let Some(k) = s.as_const()
                    && let Some(v) = obj.key(k)
                {
                    let v = ctx.heap.sanitize(v);
                    return CtxSet::single(ctx.set_ret_val(v));
                }
                // Anything else defers to the object's __getitem__.
                if let Some(Val::Func(func)) = self.mro_lookup(&ctx, target, &obj, "__getitem__") {
                    return self.call_func(ctx, &func, vec![index.clone()], &[], source);
                }
                let msg = "subscript target has no matching element";
                CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::UndefinedAccess, msg, source))
            }
            Some(Val::Str(s)) => {
                if let (Some(text), Val::Int(i_exp)) = (s.as_const(), index)
                    && let Some(i) = i_exp.as_i64()
                {
                    let chars: Vec<char> = text.chars().collect();
                    let i = if i < 0 { chars.len() as i64 + i } else { i };
                    if let Ok(i) = usize::try_from(i)
                        && let Some(c) = chars.get(i)
                    {
                        return CtxSet::single(ctx.set_ret_val(Val::Str(ExpStr::literal(&c.to_string()))));
                    }
                }
                let msg = "string index is out of bounds or not constant";
                CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::UndefinedAccess, msg, source))
            }
            _ => {
                let msg = "value does not support subscripting";
                CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::TypeMismatch, msg, source))
            }
        }
    }

    fn eval_libcall(
        &mut self,
        ctx: Ctx<Val>,
        path: &str,
        args: &[IrExpr],
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let Some(f) = self.registry.get(path) else {
            let msg = format!("unknown library call: {path}");
            return CtxSet::single(ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::NotImplemented, &msg, source));
        };
        self.tracer.on_libcall(path);
        let idg = self.idg;
        self.eval_list(ctx, args).flat_map(move |ctx| {
            let input = LibCallInput { idg, source };
            f(&input, ctx)
        })
    }

    fn eval_call(
        &mut self,
        ctx: Ctx<Val>,
        callee: &IrExpr,
        args: &[IrExpr],
        kwargs: &[(Rc<str>, IrExpr)],
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let kw_names: Vec<Rc<str>> = kwargs.iter().map(|(n, _)| n.clone()).collect();
        let kw_exprs: Vec<IrExpr> = kwargs.iter().map(|(_, e)| e.clone()).collect();
        self.eval_expr(ctx, callee).flat_map(|ctx| {
            let callee_val = ctx.ret_val.clone();
            self.eval_list(ctx.with_ret(Val::None), args).flat_map(|args_ctx| {
                let arg_vals = args_ctx.ret_val.clone();
                let callee_val = callee_val.clone();
                self.eval_list(args_ctx.with_ret(Val::None), &kw_exprs).flat_map(|kw_ctx| {
                    let kw_vals: Vec<(Rc<str>, Val)> = kw_names
                        .iter()
                        .cloned()
                        .zip(kw_ctx.ret_val.iter().cloned())
                        .collect();
                    self.apply_callable(
                        kw_ctx.with_ret(Val::None),
                        &callee_val,
                        arg_vals.clone(),
                        &kw_vals,
                        source,
                    )
                })
            })
        })
    }

    /// Dispatches a call on an evaluated callee.
    fn apply_callable(
        &mut self,
        ctx: Ctx<Val>,
        callee: &Val,
        args: Vec<Val>,
        kwargs: &[(Rc<str>, Val)],
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        if ctx.status == CtxStatus::Failed {
            return CtxSet::single(ctx);
        }
        match ctx.heap.fetch(callee).cloned() {
            Some(Val::Func(func)) => self.call_func(ctx, &func, args, kwargs, source),
            Some(Val::Obj(obj)) => {
                // An object with __call__ is invoked through it; an object
                // with an MRO is a class and a call instantiates it.
                if let Some(Val::Func(call)) = self.mro_lookup(&ctx, callee, &obj, "__call__") {
                    return self.call_func(ctx, &call, args, kwargs, source);
                }
                if obj.attr("__mro__").is_some()
                    && let Val::Addr(class_addr) = ctx.heap.sanitize(callee)
                {
                    return self.instantiate(ctx, class_addr, args, kwargs, source);
                }
                let msg = "object is not callable";
                CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::TypeMismatch, msg, source))
            }
            _ => {
                let msg = "value is not callable";
                CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::TypeMismatch, msg, source))
            }
        }
    }

    /// `__new__` equivalent: allocates an instance bound to its class, then
    /// runs `__init__` when the MRO provides one.
    fn instantiate(
        &mut self,
        ctx: Ctx<Val>,
        class_addr: Addr,
        args: Vec<Val>,
        kwargs: &[(Rc<str>, Val)],
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        let instance = Obj::new(self.idg.fresh()).with_attr("__class__", Val::Addr(class_addr));
        let (inst_addr, heap) = ctx.heap.alloc_with(Val::Obj(instance.clone()));
        let ctx = ctx.with_heap(heap);
        match self.mro_lookup(&ctx, &Val::Addr(inst_addr), &instance, "__init__") {
            Some(Val::Func(init)) => self
                .call_func(ctx, &init, args, kwargs, source)
                .map(move |ctx| ctx.set_ret_val(Val::Addr(inst_addr))),
            _ => CtxSet::single(ctx.with_ret(Val::Addr(inst_addr))),
        }
    }

    /// Calls a function value: binds parameters into a fresh scope derived
    /// from the captured environment, interprets the body, and restores the
    /// caller's environment around the result.
    fn call_func(
        &mut self,
        ctx: Ctx<Val>,
        func: &Rc<Func>,
        args: Vec<Val>,
        kwargs: &[(Rc<str>, Val)],
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        if ctx.status == CtxStatus::Failed {
            return CtxSet::single(ctx);
        }
        if ctx.call_stack.len() >= DEFAULT_MAX_CALL_DEPTH {
            let msg = "call depth budget exceeded";
            return CtxSet::single(ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::BudgetExceeded, msg, source));
        }

        let caller_env = ctx.env.clone();
        let mut heap = ctx.heap.clone();
        let mut env = func.captured.clone();

        // Positional parameters, then keywords, then defaults.
        let mut bound: Vec<Rc<str>> = Vec::new();
        for (param, val) in func.params.iter().zip(args.iter()) {
            let (addr, h) = heap.alloc_with(val.clone());
            heap = h;
            env = env.set(param, addr);
            bound.push(param.clone());
        }
        if let Some(vararg) = &func.vararg {
            let mut rest = Obj::new(self.idg.fresh());
            let mut count = 0i64;
            for val in args.iter().skip(func.params.len()) {
                rest = rest.with_index(count, val.clone());
                count += 1;
            }
            rest = rest.with_attr("$length", Val::int(count));
            let (addr, h) = heap.alloc_with(Val::Obj(rest));
            heap = h;
            env = env.set(vararg, addr);
        }
        let mut kw_rest: Vec<(Rc<str>, Val)> = Vec::new();
        for (name, val) in kwargs {
            if func.params.iter().any(|p| p == name) {
                if !bound.iter().any(|p| p == name) {
                    let (addr, h) = heap.alloc_with(val.clone());
                    heap = h;
                    env = env.set(name, addr);
                    bound.push(name.clone());
                }
            } else {
                kw_rest.push((name.clone(), val.clone()));
            }
        }
        if let Some(kwarg) = &func.kwarg {
            let mut rest = Obj::new(self.idg.fresh());
            for (name, val) in &kw_rest {
                rest = rest.with_key(name, val.clone());
            }
            let (addr, h) = heap.alloc_with(Val::Obj(rest));
            heap = h;
            env = env.set(kwarg, addr);
        }
        for param in &func.params {
            if !bound.iter().any(|p| p == param) {
                match func.defaults.get(param) {
                    Some(default) => {
                        let (addr, h) = heap.alloc_with(default.clone());
                        heap = h;
                        env = env.set(param, addr);
                    }
                    None => {
                        let msg = format!("missing argument for parameter '{param}'");
                        return CtxSet::single(
                            ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::TypeMismatch, &msg, source),
                        );
                    }
                }
            }
        }

        let entry = ctx
            .with_heap(heap)
            .with_env(env)
            .push_frame(&func.name, source)
            .set_ret_val(Val::None);
        let out = self.exec_stmt(CtxSet::single(entry), &func.body);
        out.map(move |ctx| {
            let ret = if ctx.flow == Flow::Returned { ctx.ret_val.clone() } else { Val::None };
            ctx.with_env(caller_env.clone())
                .with_flow(Flow::Normal)
                .pop_frame()
                .set_ret_val(ret)
        })
    }

    fn eval_binop(
        &mut self,
        ctx: Ctx<Val>,
        op: BinOpKind,
        left: &IrExpr,
        right: &IrExpr,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        self.eval_expr(ctx, left).flat_map(|ctx| {
            let left_val = ctx.ret_val.clone();
            self.eval_expr(ctx.with_ret(Val::None), right).flat_map(|ctx| {
                let right_val = ctx.ret_val.clone();
                self.binop(ctx, op, &left_val, &right_val, source)
            })
        })
    }

    fn binop(
        &mut self,
        ctx: Ctx<Val>,
        op: BinOpKind,
        left: &Val,
        right: &Val,
        source: Option<SourceRange>,
    ) -> CtxSet<Val> {
        if ctx.status == CtxStatus::Failed {
            return CtxSet::single(ctx);
        }
        if let Some(result) = scalar_binop(&ctx, op, left, right) {
            return CtxSet::single(ctx.set_ret_val(result));
        }
        // Object operands dispatch through __op__ then the reflected __rop__.
        if let Some((fwd, rev)) = op.dunder() {
            if let Some(out) = self.try_dunder(&ctx, left, right, fwd, source) {
                return out;
            }
            if let Some(out) = self.try_dunder(&ctx, right, left, rev, source) {
                return out;
            }
        }
        let msg = format!(
            "unsupported operand kinds for {op}: {} and {}",
            left.kind_name(),
            right.kind_name()
        );
        CtxSet::single(ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::TypeMismatch, &msg, source))
    }

    /// Attempts one dunder dispatch; `None` when the receiver has no such
    /// method or every resulting path said NotImplemented, so the caller can
    /// try the reflected side.
    fn try_dunder(
        &mut self,
        ctx: &Ctx<Val>,
        receiver: &Val,
        arg: &Val,
        method: &str,
        source: Option<SourceRange>,
    ) -> Option<CtxSet<Val>> {
        let Some(Val::Obj(obj)) = ctx.heap.fetch(receiver).cloned() else {
            return None;
        };
        let Some(Val::Func(func)) = self.mro_lookup(ctx, receiver, &obj, method) else {
            return None;
        };
        let out = self.call_func(ctx.clone(), &func, vec![arg.clone()], &[], source);
        if out.iter().all(|c| matches!(c.ret_val, Val::NotImpl)) {
            return None;
        }
        Some(out)
    }

    /// Resolves an attribute by walking the target's MRO chain: own
    /// attributes first, then each class in `__mro__` order. Function
    /// attributes found on the chain bind the receiver.
    fn mro_lookup(&mut self, ctx: &Ctx<Val>, target: &Val, obj: &Obj, name: &str) -> Option<Val> {
        mro_lookup_in(ctx, target, obj, name)
    }

    // --- truthiness ----------------------------------------------------------

    fn truth_of(&mut self, ctx: &Ctx<Val>, val: &Val) -> Truth {
        match ctx.heap.fetch(val) {
            None => Truth::Unknown,
            Some(Val::None) => Truth::Decided(false),
            Some(Val::NotImpl | Val::Func(_)) => Truth::Decided(true),
            Some(Val::Bool(b)) => {
                let b = simplify_bool(&ctx.ctr_set, b);
                match ctx.ctr_set.decide_bool(&b) {
                    Some(v) => Truth::Decided(v),
                    None => Truth::Constraint(Ctr::lift(&b)),
                }
            }
            Some(Val::Int(e) | Val::Float(e)) => {
                let truthy = ExpBool::ne(e.clone(), ExpNum::int(0));
                match ctx.ctr_set.decide_bool(&truthy) {
                    Some(v) => Truth::Decided(v),
                    None => Truth::Constraint(Ctr::lift(&truthy)),
                }
            }
            Some(Val::Str(s)) => match s.known_len() {
                Some(n) => Truth::Decided(n != 0),
                None => Truth::Constraint(Ctr::ne(
                    SymExp::from(s.clone()),
                    SymExp::from(ExpStr::literal("")),
                )),
            },
            Some(Val::Obj(obj)) => match obj.attr("$length").and_then(Val::as_num) {
                Some(len) => {
                    let truthy = ExpBool::ne(len.clone(), ExpNum::int(0));
                    match ctx.ctr_set.decide_bool(&truthy) {
                        Some(v) => Truth::Decided(v),
                        None => Truth::Constraint(Ctr::lift(&truthy)),
                    }
                }
                // Plain objects are truthy.
                None => Truth::Decided(true),
            },
            Some(Val::Error(..) | Val::Addr(_)) => Truth::Unknown,
        }
    }
}

// --- free helpers ------------------------------------------------------------

fn literal_val(lit: &Literal) -> Val {
    match lit {
        Literal::Int(v) => Val::int(*v),
        Literal::Float(v) => Val::float(*v),
        Literal::Bool(v) => Val::truth(*v),
        Literal::Str(s) => Val::Str(ExpStr::literal(s)),
        Literal::None => Val::None,
    }
}

fn eval_name(ctx: Ctx<Val>, name: &str, source: Option<SourceRange>) -> Ctx<Val> {
    match ctx.env.get(name) {
        Some(addr) => {
            let v = ctx.heap.sanitize(&Val::Addr(addr));
            ctx.set_ret_val(v)
        }
        None => {
            let msg = format!("undefined name: {name}");
            ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::UndefinedAccess, &msg, source)
        }
    }
}

/// Binds `name` to `value`: reuses the existing cell when the name is bound,
/// allocates a fresh one otherwise.
fn bind_name(ctx: Ctx<Val>, name: &str, value: Val, source: Option<SourceRange>) -> Ctx<Val> {
    if ctx.status == CtxStatus::Failed {
        return ctx;
    }
    match ctx.env.get(name) {
        Some(addr) if !addr.is_builtin() => match ctx.heap.set(addr, value) {
            Ok(heap) => ctx.with_heap(heap).with_ret(Val::None),
            Err(err) => {
                let msg = err.message;
                ctx.set_ret_val(Val::warning(&msg)).warn_with_msg(&msg, source)
            }
        },
        _ => {
            let (addr, heap) = ctx.heap.alloc_with(value);
            let env = ctx.env.set(name, addr);
            ctx.with_heap(heap).with_env(env).with_ret(Val::None)
        }
    }
}

fn set_attr(ctx: Ctx<Val>, receiver: &Val, name: &str, source: Option<SourceRange>) -> Ctx<Val> {
    if ctx.status == CtxStatus::Failed {
        return ctx;
    }
    let value = ctx.ret_val.clone();
    let Val::Addr(addr) = ctx.heap.sanitize(receiver) else {
        let msg = "attribute assignment target is not an object";
        return ctx.set_ret_val(Val::warning(msg)).warn_with_msg(msg, source);
    };
    let Some(Val::Obj(obj)) = ctx.heap.get(addr).cloned() else {
        let msg = "attribute assignment target is not an object";
        return ctx.set_ret_val(Val::warning(msg)).warn_with_msg(msg, source);
    };
    match ctx.heap.set(addr, Val::Obj(obj.with_attr(name, value))) {
        Ok(heap) => ctx.with_heap(heap).with_ret(Val::None),
        Err(err) => {
            let msg = err.message;
            ctx.set_ret_val(Val::warning(&msg)).warn_with_msg(&msg, source)
        }
    }
}

fn set_index(ctx: Ctx<Val>, receiver: &Val, index: &Val, source: Option<SourceRange>) -> Ctx<Val> {
    if ctx.status == CtxStatus::Failed {
        return ctx;
    }
    let value = ctx.ret_val.clone();
    let Val::Addr(addr) = ctx.heap.sanitize(receiver) else {
        let msg = "subscript assignment target is not an object";
        return ctx.set_ret_val(Val::warning(msg)).warn_with_msg(msg, source);
    };
    let Some(Val::Obj(obj)) = ctx.heap.get(addr).cloned() else {
        let msg = "subscript assignment target is not an object";
        return ctx.set_ret_val(Val::warning(msg)).warn_with_msg(msg, source);
    };
    let updated = match index {
        Val::Int(i_exp) => i_exp.as_i64().map(|i| obj.with_index(i, value)),
        Val::Str(s) => s.as_const().map(|k| obj.with_key(k, value)),
        _ => None,
    };
    match updated {
        Some(obj) => match ctx.heap.set(addr, Val::Obj(obj)) {
            Ok(heap) => ctx.with_heap(heap).with_ret(Val::None),
            Err(err) => {
                let msg = err.message;
                ctx.set_ret_val(Val::warning(&msg)).warn_with_msg(&msg, source)
            }
        },
        None => {
            let msg = "subscript assignment index must be a constant int or string";
            ctx.set_ret_val(Val::warning(msg)).warn_with_msg(msg, source)
        }
    }
}

fn eval_attr(ctx: Ctx<Val>, name: &str, source: Option<SourceRange>) -> Ctx<Val> {
    let target = ctx.ret_val.clone();
    let Some(Val::Obj(obj)) = ctx.heap.fetch(&target).cloned() else {
        let msg = format!("attribute access on a non-object value: {name}");
        return ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::TypeMismatch, &msg, source);
    };
    match mro_lookup_in(&ctx, &target, &obj, name) {
        Some(v) => ctx.set_ret_val(v),
        None => {
            let msg = format!("attribute not found after MRO walk: {name}");
            ctx.set_ret_val(Val::warning(&msg)).warn_kind(ErrorKind::UndefinedAccess, &msg, source)
        }
    }
}

/// MRO attribute resolution shared by expression evaluation and dispatch:
/// own attributes first, then every class in the `__mro__` tuple (reached
/// directly for classes, through `__class__` for instances). Unbound
/// function attributes found on the chain bind the receiver.
fn mro_lookup_in(ctx: &Ctx<Val>, target: &Val, obj: &Obj, name: &str) -> Option<Val> {
    if let Some(v) = obj.attr(name) {
        return Some(bind_if_method(ctx, target, v));
    }
    // Classes carry `__mro__` directly; instances reach it through their
    // `__class__`. Either may be stored inline or behind an address.
    let mro = match obj.attr("__mro__").and_then(|v| obj_behind(ctx, v)) {
        Some(mro) => Some(mro),
        None => obj
            .attr("__class__")
            .and_then(|c| obj_behind(ctx, c))
            .and_then(|class| class.attr("__mro__").and_then(|v| obj_behind(ctx, v))),
    }?;
    let mut i = 0i64;
    while let Some(entry) = mro.index(i) {
        if let Some(class) = obj_behind(ctx, entry)
            && let Some(v) = class.attr(name)
        {
            return Some(bind_if_method(ctx, target, v));
        }
        i += 1;
    }
    None
}

/// The object a value denotes, chasing addresses.
fn obj_behind(ctx: &Ctx<Val>, v: &Val) -> Option<Obj> {
    match ctx.heap.fetch(v)? {
        Val::Obj(obj) => Some(obj.clone()),
        _ => None,
    }
}

fn bind_if_method(ctx: &Ctx<Val>, target: &Val, v: &Val) -> Val {
    if let Val::Func(func) = v
        && !func.bound
        && let Val::Addr(receiver) = ctx.heap.sanitize(target)
        && let Some(bound) = func.bind(receiver)
    {
        return Val::Func(Rc::new(bound));
    }
    v.clone()
}

/// Literal/symbolic fast path for scalar operands. `None` defers to dunder
/// dispatch.
fn scalar_binop(ctx: &Ctx<Val>, op: BinOpKind, left: &Val, right: &Val) -> Option<Val> {
    let l = ctx.heap.fetch(left)?.clone();
    let r = ctx.heap.fetch(right)?.clone();
    match op {
        BinOpKind::And | BinOpKind::Or => {
            let lb = bool_view(&l)?;
            let rb = bool_view(&r)?;
            let out = if op == BinOpKind::And { ExpBool::and(lb, rb) } else { ExpBool::or(lb, rb) };
            Some(Val::Bool(out))
        }
        BinOpKind::Add => match (&l, &r) {
            (Val::Str(a), Val::Str(b)) => Some(Val::Str(ExpStr::concat(a.clone(), b.clone()))),
            _ => num_binop(op, &l, &r),
        },
        BinOpKind::Sub | BinOpKind::Mul | BinOpKind::FloorDiv | BinOpKind::TrueDiv | BinOpKind::Mod | BinOpKind::Pow => {
            num_binop(op, &l, &r)
        }
        BinOpKind::Eq | BinOpKind::Ne => {
            let eq = match (&l, &r) {
                (Val::Int(a) | Val::Float(a), Val::Int(b) | Val::Float(b)) => {
                    ExpBool::eq(a.clone(), b.clone())
                }
                (Val::Str(a), Val::Str(b)) => ExpBool::eq(a.clone(), b.clone()),
                (Val::Bool(a), Val::Bool(b)) => ExpBool::eq(a.clone(), b.clone()),
                (Val::None, Val::None) => ExpBool::truth(true),
                (Val::None, _) | (_, Val::None) => ExpBool::truth(false),
                // Object equality without dunders is identity.
                (Val::Obj(a), Val::Obj(b)) => ExpBool::truth(a.id == b.id),
                _ => return None,
            };
            Some(Val::Bool(if op == BinOpKind::Ne { ExpBool::not(eq) } else { eq }))
        }
        BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
            let (a, b) = match (&l, &r) {
                (Val::Int(a) | Val::Float(a), Val::Int(b) | Val::Float(b)) => (a.clone(), b.clone()),
                _ => return None,
            };
            let out = match op {
                BinOpKind::Lt => ExpBool::lt(a, b),
                BinOpKind::Le => ExpBool::le(a, b),
                BinOpKind::Gt => ExpBool::lt(b, a),
                _ => ExpBool::le(b, a),
            };
            Some(Val::Bool(out))
        }
    }
}

fn bool_view(v: &Val) -> Option<ExpBool> {
    match v {
        Val::Bool(b) => Some(b.clone()),
        Val::Int(e) | Val::Float(e) => Some(ExpBool::ne(e.clone(), ExpNum::int(0))),
        Val::None => Some(ExpBool::truth(false)),
        _ => None,
    }
}

fn num_binop(op: BinOpKind, l: &Val, r: &Val) -> Option<Val> {
    let (a, b) = match (l, r) {
        (Val::Int(a) | Val::Float(a), Val::Int(b) | Val::Float(b)) => (a.clone(), b.clone()),
        _ => return None,
    };
    let float_out = matches!(l, Val::Float(_)) || matches!(r, Val::Float(_)) || op == BinOpKind::TrueDiv;
    let out = match op {
        BinOpKind::Add => ExpNum::add(a, b),
        BinOpKind::Sub => ExpNum::sub(a, b),
        BinOpKind::Mul => ExpNum::mul(a, b),
        BinOpKind::FloorDiv => ExpNum::floor_div(a, b),
        BinOpKind::TrueDiv => ExpNum::true_div(a, b),
        BinOpKind::Mod => ExpNum::modulo(a, b),
        BinOpKind::Pow => ExpNum::pow(a, b),
        _ => return None,
    };
    Some(if float_out { Val::Float(out) } else { Val::Int(out) })
}

fn eval_unary(ctx: Ctx<Val>, op: UnaryOpKind, source: Option<SourceRange>) -> Ctx<Val> {
    let operand = ctx.ret_val.clone();
    let fetched = ctx.heap.fetch(&operand).cloned();
    match (op, fetched) {
        (UnaryOpKind::Neg, Some(Val::Int(e))) => ctx.set_ret_val(Val::Int(ExpNum::neg(e))),
        (UnaryOpKind::Neg, Some(Val::Float(e))) => ctx.set_ret_val(Val::Float(ExpNum::neg(e))),
        (UnaryOpKind::Not, Some(v)) => match bool_view(&v) {
            Some(b) => ctx.set_ret_val(Val::Bool(ExpBool::not(b))),
            None => {
                let msg = "operand does not support boolean negation";
                ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::TypeMismatch, msg, source)
            }
        },
        _ => {
            let msg = "unsupported unary operand";
            ctx.set_ret_val(Val::warning(msg)).warn_kind(ErrorKind::TypeMismatch, msg, source)
        }
    }
}

/// Splits paths after one loop iteration: continued paths resume (flow
/// reset), broken and failed paths leave the loop, returns propagate out.
fn split_loop_flow(set: CtxSet<Val>) -> (Vec<Ctx<Val>>, Vec<Ctx<Val>>) {
    let mut continuing = Vec::new();
    let mut exited = Vec::new();
    for ctx in set {
        if ctx.status == CtxStatus::Failed {
            exited.push(ctx);
            continue;
        }
        match ctx.flow {
            Flow::Normal => continuing.push(ctx),
            Flow::Continued => continuing.push(ctx.with_flow(Flow::Normal)),
            Flow::Broke => exited.push(ctx.with_flow(Flow::Normal).set_ret_val(Val::None)),
            Flow::Returned => exited.push(ctx),
        }
    }
    (continuing, exited)
}

fn stmt_desc(stmt: &IrStmt) -> &'static str {
    match stmt.kind.as_ref() {
        StmtKind::Pass => "pass",
        StmtKind::Seq(_) => "seq",
        StmtKind::Expr(_) => "expr",
        StmtKind::Assign { .. } => "assign",
        StmtKind::Let { .. } => "let",
        StmtKind::FunDef { .. } => "fundef",
        StmtKind::If { .. } => "if",
        StmtKind::ForIn { .. } => "forin",
        StmtKind::Return(_) => "return",
        StmtKind::Break => "break",
        StmtKind::Continue => "continue",
    }
}
