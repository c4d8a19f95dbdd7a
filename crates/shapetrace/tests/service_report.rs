//! The driver surface: report structure and serialization, tracer events,
//! budget behavior, and merging of terminated paths.

use pretty_assertions::assert_eq;
use shapetrace::{
    Analyzer, BinOpKind, IrExpr, IrStmt, NoLimitTracker, PathOutcome, ResourceLimits, Val,
    analyze, analyze_with_budget, merge_paths,
    tracer::{RecordingTracer, TraceEvent},
};

fn forking_program() -> IrStmt {
    IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("b"), IrExpr::libcall("symbolic.bool", vec![IrExpr::str_lit("b")])),
        IrStmt::if_else(
            IrExpr::name("b"),
            IrStmt::assign(IrExpr::name("x"), IrExpr::int(1)),
            IrStmt::assign(IrExpr::name("x"), IrExpr::int(2)),
        ),
        IrStmt::expr(IrExpr::name("x")),
    ])
}

// =============================================================================
// 1. Structured Reports Serialize
// =============================================================================

/// The report renders to JSON with per-path outcomes, constraints, and logs.
#[test]
fn report_serializes_to_json() {
    let analysis = Analyzer::new().unwrap().run(&forking_program());
    let json = analysis.report.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed["paths"].as_array().unwrap().len(), 2);
    assert!(parsed["budget_exhausted"].as_bool() == Some(false));
    let first = &parsed["paths"][0];
    assert!(first["outcome"].is_string());
    assert!(first["constraints"].as_array().is_some());
    assert!(first["ranges"].is_object());
}

/// `paths_with` pairs raw contexts with their reported outcome.
#[test]
fn paths_filter_by_outcome() {
    let program = IrStmt::expr(IrExpr::binop(BinOpKind::Add, IrExpr::int(1), IrExpr::int(2)));
    let analysis = Analyzer::new().unwrap().run(&program);
    let succeeded: Vec<_> = analysis.paths_with(PathOutcome::Success).collect();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].ret_val, Val::int(3));
    assert_eq!(analysis.paths_with(PathOutcome::Failure).count(), 0);
}

/// The one-shot `analyze` helper produces the same counts as a hand-built
/// analyzer.
#[test]
fn analyze_convenience_matches_explicit_driver() {
    let program = forking_program();
    let via_helper = analyze(&program).unwrap();
    let via_driver = Analyzer::new().unwrap().run(&program).report;
    assert_eq!(via_helper.success, via_driver.success);
    assert_eq!(via_helper.warning, via_driver.warning);
    assert_eq!(via_helper.failure, via_driver.failure);
    assert_eq!(via_helper.paths.len(), via_driver.paths.len());
}

// =============================================================================
// 2. Tracer Events
// =============================================================================

/// A recording tracer observes statements, the branch fork, and both path
/// terminations.
#[test]
fn recording_tracer_sees_the_run() {
    let analyzer = Analyzer::new().unwrap();
    let mut tracer = RecordingTracer::default();
    let analysis = analyzer.run_traced(&forking_program(), &mut tracer);
    assert_eq!(analysis.paths.len(), 2);

    assert!(tracer.events.iter().any(|e| matches!(e, TraceEvent::Stmt { .. })));
    assert!(
        tracer
            .events
            .iter()
            .any(|e| matches!(e, TraceEvent::Fork { then_paths: 1, else_paths: 1 })),
        "expected a 1/1 fork, got {:?}",
        tracer.events
    );
    assert!(tracer.events.iter().any(|e| matches!(e, TraceEvent::LibCall { .. })));
    assert_eq!(
        tracer
            .events
            .iter()
            .filter(|e| matches!(e, TraceEvent::PathEnd { .. }))
            .count(),
        2
    );
}

// =============================================================================
// 3. Budgets
// =============================================================================

/// Exhausting the step budget stops the run with warned partial results
/// instead of looping.
#[test]
fn step_budget_degrades_to_partial_results() {
    let program = IrStmt::seq(
        (0..50)
            .map(|i| IrStmt::assign(IrExpr::name("x"), IrExpr::int(i)))
            .collect(),
    );
    let analyzer = Analyzer::with_limits(ResourceLimits::default().with_max_steps(5)).unwrap();
    let analysis = analyzer.run(&program);
    assert!(analysis.report.budget_exhausted);
    assert_eq!(analysis.report.warning, 1);
    assert!(
        analysis.report.paths[0]
            .logs
            .iter()
            .any(|l| l.message.contains("step budget")),
        "expected a step-budget log entry"
    );
}

/// An explicit unlimited tracker drives the interpreter without a report.
#[test]
fn explicit_budget_tracker_runs_to_completion() {
    let program = IrStmt::expr(IrExpr::binop(BinOpKind::Mul, IrExpr::int(6), IrExpr::int(7)));
    let mut budget = NoLimitTracker;
    let paths = analyze_with_budget(&program, &mut budget).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].ret_val, Val::int(42));
}

// =============================================================================
// 4. Merging Terminated Paths
// =============================================================================

/// Two sibling paths merge into one heap/env view: the right side's
/// addresses relocate past the left side's high-water mark and both sides'
/// values remain reachable.
#[test]
fn sibling_paths_merge_with_relocation() {
    let analysis = Analyzer::new().unwrap().run(&forking_program());
    assert_eq!(analysis.paths.len(), 2);
    let (left, right) = (&analysis.paths[0], &analysis.paths[1]);

    let (heap, env) = merge_paths(left, right);
    // The merged environment resolves x; the binding comes from the right
    // side (right-biased union) and its cell must exist in the merged heap.
    let x = env.get("x").expect("x should stay bound after the merge");
    assert!(heap.get(x).is_some(), "merged heap should hold the relocated cell");
    // Left-side bindings survive at their original addresses.
    let x_left = left.env.get("x").unwrap();
    assert_eq!(heap.get(x_left), left.heap.get(x_left));
}
