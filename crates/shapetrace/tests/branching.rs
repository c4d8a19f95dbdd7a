//! Path forking: symbolic branches, loop unrolling, break/continue flow,
//! and the loop-unroll budget on symbolically-sized iterables.

use pretty_assertions::assert_eq;
use shapetrace::{
    Analyzer, BinOpKind, Ctr, CtxSet, ExpNum, IrExpr, IrStmt, LibCallInput, LibCallRegistry,
    NumKind, NumSymbol, Obj, PathOutcome, ResourceLimits, Val,
};

// =============================================================================
// 1. A Symbolic Condition Forks the Path
// =============================================================================

/// An if on a symbolic boolean terminates in two paths, one carrying the
/// condition and one carrying its negation.
#[test]
fn symbolic_branch_forks_two_paths() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("b"), IrExpr::libcall("symbolic.bool", vec![IrExpr::str_lit("b")])),
        IrStmt::if_else(
            IrExpr::name("b"),
            IrStmt::assign(IrExpr::name("x"), IrExpr::int(1)),
            IrStmt::assign(IrExpr::name("x"), IrExpr::int(2)),
        ),
        IrStmt::expr(IrExpr::name("x")),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 2);

    let rets: Vec<&Val> = analysis.paths.iter().map(|c| &c.ret_val).collect();
    assert!(rets.contains(&&Val::int(1)));
    assert!(rets.contains(&&Val::int(2)));

    // Each path logged exactly one branch constraint, and they are the
    // negation of one another.
    let rendered: Vec<String> = analysis
        .report
        .paths
        .iter()
        .map(|p| {
            assert_eq!(p.constraints.len(), 1);
            p.constraints[0].rendered.clone()
        })
        .collect();
    assert!(rendered.iter().any(|r| r == "b"));
    assert!(rendered.iter().any(|r| r.contains("not")));
}

/// A condition the ranges already decide does not fork at all.
#[test]
fn decided_condition_takes_one_branch() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("x"), IrExpr::int(3)),
        IrStmt::if_else(
            IrExpr::binop(BinOpKind::Lt, IrExpr::name("x"), IrExpr::int(10)),
            IrStmt::assign(IrExpr::name("y"), IrExpr::str_lit("small")),
            IrStmt::assign(IrExpr::name("y"), IrExpr::str_lit("big")),
        ),
        IrStmt::expr(IrExpr::name("y")),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 1);
    assert_eq!(analysis.paths[0].ret_val, Val::str_lit("small"));
    assert_eq!(analysis.report.success, 1);
}

// =============================================================================
// 2. Loops Over Known-Length Iterables Unroll
// =============================================================================

/// Summing a constant list unrolls the loop fully on a single path.
#[test]
fn constant_loop_unrolls() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("acc"), IrExpr::int(0)),
        IrStmt::for_in(
            "x",
            IrExpr::libcall(
                "builtins.list",
                vec![IrExpr::int(1), IrExpr::int(2), IrExpr::int(3)],
            ),
            IrStmt::assign(
                IrExpr::name("acc"),
                IrExpr::binop(BinOpKind::Add, IrExpr::name("acc"), IrExpr::name("x")),
            ),
        ),
        IrStmt::expr(IrExpr::name("acc")),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 1);
    assert_eq!(analysis.paths[0].ret_val, Val::int(6));
}

/// `break` leaves the loop without touching the remaining elements;
/// `continue` skips to the next iteration.
#[test]
fn break_and_continue_flow() {
    // acc = 0; for x in [1, 2, 3]: if x == 2: break; acc = acc + x
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("acc"), IrExpr::int(0)),
        IrStmt::for_in(
            "x",
            IrExpr::libcall(
                "builtins.list",
                vec![IrExpr::int(1), IrExpr::int(2), IrExpr::int(3)],
            ),
            IrStmt::seq(vec![
                IrStmt::if_else(
                    IrExpr::binop(BinOpKind::Eq, IrExpr::name("x"), IrExpr::int(2)),
                    IrStmt::brk(),
                    IrStmt::pass(),
                ),
                IrStmt::assign(
                    IrExpr::name("acc"),
                    IrExpr::binop(BinOpKind::Add, IrExpr::name("acc"), IrExpr::name("x")),
                ),
            ]),
        ),
        IrStmt::expr(IrExpr::name("acc")),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 1);
    assert_eq!(analysis.paths[0].ret_val, Val::int(1));
}

// =============================================================================
// 3. Symbolic-Length Loops Fork Terminated/Continuing Paths
// =============================================================================

/// Library call used by the tests below: an empty iterable whose length is
/// a fresh non-negative integer symbol.
fn lib_symbolic_list(input: &LibCallInput<'_>, ctx: shapetrace::Ctx<Vec<Val>>) -> CtxSet<Val> {
    let sym = NumSymbol::new(input.idg.fresh_symbol(), NumKind::Int, "n");
    let len = ExpNum::symbol(sym);
    let ctx = ctx.require(
        vec![Ctr::le(ExpNum::int(0), len.clone())],
        "length must be non-negative",
        input.source,
    );
    let obj = Obj::new(input.idg.fresh()).with_attr("$length", Val::Int(len));
    let (addr, heap) = ctx.heap.alloc_with(Val::Obj(obj));
    CtxSet::single(ctx.with_heap(heap).with_ret(Val::Addr(addr)))
}

/// Iterating a symbolically-sized iterable forks one exit path per unrolled
/// iteration and cuts the still-continuing path off at the unroll budget.
#[test]
fn symbolic_loop_forks_and_hits_the_unroll_budget() {
    let mut registry = LibCallRegistry::with_defaults();
    registry.register("test.symbolic_list", lib_symbolic_list);
    let limits = ResourceLimits::default().with_loop_unroll(5);
    let analyzer = Analyzer::with_parts(registry, limits).unwrap();

    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("xs"), IrExpr::libcall("test.symbolic_list", vec![])),
        IrStmt::for_in("x", IrExpr::name("xs"), IrStmt::pass()),
        IrStmt::expr(IrExpr::int(0)),
    ]);
    let analysis = analyzer.run(&program);

    // Five exits (len = 0..4 decided per path) plus one budget-capped path.
    assert_eq!(analysis.paths.len(), 6);
    let budget_warned = analysis
        .report
        .paths
        .iter()
        .filter(|p| p.logs.iter().any(|l| l.message.contains("unroll budget")))
        .count();
    assert_eq!(budget_warned, 1);
    // Every non-capped path pinned the length to a distinct constant.
    let pinned: Vec<&String> = analysis
        .report
        .paths
        .iter()
        .filter(|p| p.outcome != PathOutcome::Warning || !p.logs.iter().any(|l| l.message.contains("unroll")))
        .flat_map(|p| p.ranges.values())
        .collect();
    assert!(!pinned.is_empty());
}

// =============================================================================
// 4. Branch Sides Are Mutually Exclusive
// =============================================================================

/// After a fork on `n < 3`, re-checking the opposite comparison on each
/// side is definitely false: no model satisfies both sides at once.
#[test]
fn forked_constraint_sets_are_disjoint() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("n"), IrExpr::libcall("symbolic.int", vec![IrExpr::str_lit("n")])),
        IrStmt::if_else(
            IrExpr::binop(BinOpKind::Lt, IrExpr::name("n"), IrExpr::int(3)),
            IrStmt::assign(IrExpr::name("side"), IrExpr::str_lit("lt")),
            IrStmt::assign(IrExpr::name("side"), IrExpr::str_lit("ge")),
        ),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 2);

    // The ranges of n on the two sides cannot intersect: one is capped at 2,
    // the other starts at 3 (integer coercion applied).
    let mut rendered: Vec<String> = analysis
        .report
        .paths
        .iter()
        .flat_map(|p| p.ranges.values().cloned())
        .collect();
    rendered.sort();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].contains("2]"), "lt side should cap at 2: {rendered:?}");
    assert!(rendered[1].contains("[3"), "ge side should start at 3: {rendered:?}");
}
