//! Tensor-operation preconditions: broadcast, matmul, and view, over both
//! constant and symbolic shapes.

use pretty_assertions::assert_eq;
use shapetrace::{Analyzer, ExpShape, IrExpr, IrStmt, PathOutcome, Val};

fn result_shape(analysis: &shapetrace::Analysis) -> ExpShape {
    let ctx = &analysis.paths[0];
    let Val::Addr(addr) = ctx.ret_val else {
        panic!("tensor result should be an address, got {:?}", ctx.ret_val);
    };
    let Some(Val::Obj(obj)) = ctx.heap.get(addr) else {
        panic!("tensor address should hold an object");
    };
    obj.shape.clone().expect("tensor object should carry a shape")
}

// =============================================================================
// 1. Broadcast of Compatible Constant Shapes Succeeds
// =============================================================================

/// Broadcasting `(3, 1, 4)` against `(1, 5, 4)` yields one success path
/// with output shape `(3, 5, 4)`.
#[test]
fn broadcast_of_compatible_shapes() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("a"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(3), IrExpr::int(1), IrExpr::int(4)]),
        ),
        IrStmt::assign(
            IrExpr::name("b"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(1), IrExpr::int(5), IrExpr::int(4)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.broadcast",
            vec![IrExpr::name("a"), IrExpr::name("b")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(analysis.paths.len(), 1);
    assert_eq!(result_shape(&analysis), ExpShape::from_ints([3, 5, 4]));
}

/// Ranks differ: `(5, 4)` against `(4,)` right-aligns before comparing.
#[test]
fn broadcast_aligns_from_the_right() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("a"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(5), IrExpr::int(4)]),
        ),
        IrStmt::assign(IrExpr::name("b"), IrExpr::libcall("tensor.full", vec![IrExpr::int(4)])),
        IrStmt::expr(IrExpr::libcall(
            "shape.broadcast",
            vec![IrExpr::name("a"), IrExpr::name("b")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(result_shape(&analysis), ExpShape::from_ints([5, 4]));
}

/// Incompatible constant shapes fail the path immediately.
#[test]
fn broadcast_of_incompatible_shapes_fails() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("a"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(3), IrExpr::int(2)]),
        ),
        IrStmt::assign(
            IrExpr::name("b"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(3), IrExpr::int(5)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.broadcast",
            vec![IrExpr::name("a"), IrExpr::name("b")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.failure, 1);
}

// =============================================================================
// 2. Matmul Dimension Matching
// =============================================================================

/// Matmul on `(2, 3)` and `(4, 5)` fails with a dimension mismatch pinned
/// to the call.
#[test]
fn matmul_mismatch_fails_with_message() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("a"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(2), IrExpr::int(3)]),
        ),
        IrStmt::assign(
            IrExpr::name("b"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(4), IrExpr::int(5)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.matmul",
            vec![IrExpr::name("a"), IrExpr::name("b")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.failure, 1);
    let failure = analysis.report.paths[0].failure.as_ref().expect("failed path should carry a message");
    assert!(
        failure.message.contains("dimension mismatch"),
        "unexpected failure message: {}",
        failure.message
    );
}

/// Matmul on `(2, 3)` and `(3, 5)` succeeds with result `(2, 5)`.
#[test]
fn matmul_of_matching_matrices() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("a"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(2), IrExpr::int(3)]),
        ),
        IrStmt::assign(
            IrExpr::name("b"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(3), IrExpr::int(5)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.matmul",
            vec![IrExpr::name("a"), IrExpr::name("b")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(result_shape(&analysis), ExpShape::from_ints([2, 5]));
}

/// Vector-matrix matmul drops the contracted axis: `(3,) @ (3, 7) = (7,)`.
#[test]
fn matmul_vector_matrix() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("v"), IrExpr::libcall("tensor.full", vec![IrExpr::int(3)])),
        IrStmt::assign(
            IrExpr::name("m"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(3), IrExpr::int(7)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.matmul",
            vec![IrExpr::name("v"), IrExpr::name("m")],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(result_shape(&analysis), ExpShape::from_ints([7]));
}

// =============================================================================
// 3. View With an Inferred Dimension
// =============================================================================

/// Viewing a tensor of symbolic shape `(s,)` as `(2, -1)` succeeds under a
/// recorded divisibility constraint, with the range of `s` already
/// intersected with non-negativity from tensor creation.
#[test]
fn view_with_inferred_dimension_records_divisibility() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("s"), IrExpr::libcall("symbolic.int", vec![IrExpr::str_lit("s")])),
        IrStmt::assign(IrExpr::name("t"), IrExpr::libcall("tensor.full", vec![IrExpr::name("s")])),
        IrStmt::expr(IrExpr::libcall(
            "shape.view",
            vec![IrExpr::name("t"), IrExpr::int(2), IrExpr::int(-1)],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 1);
    let path = &analysis.report.paths[0];
    // Not failed: the divisibility constraint is recorded, not refuted.
    assert_eq!(path.outcome, PathOutcome::Warning);
    assert!(
        path.constraints.iter().any(|c| c.rendered.contains("mod")),
        "expected a mod-divisibility constraint, got {:?}",
        path.constraints
    );
    // Non-negativity from tensor creation narrowed the symbol's range.
    let ranges: Vec<&String> = path.ranges.values().collect();
    assert_eq!(ranges.len(), 1);
    assert!(ranges[0].starts_with("[0"), "range of s should start at 0: {ranges:?}");
}

/// A constant-shape view that cannot preserve the element count fails.
#[test]
fn view_that_breaks_the_element_count_fails() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("t"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(2), IrExpr::int(3)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.view",
            vec![IrExpr::name("t"), IrExpr::int(4), IrExpr::int(2)],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.failure, 1);
}

/// A constant-shape view that matches the element count folds cleanly.
#[test]
fn view_with_matching_element_count() {
    let program = IrStmt::seq(vec![
        IrStmt::assign(
            IrExpr::name("t"),
            IrExpr::libcall("tensor.full", vec![IrExpr::int(2), IrExpr::int(6)]),
        ),
        IrStmt::expr(IrExpr::libcall(
            "shape.view",
            vec![IrExpr::name("t"), IrExpr::int(3), IrExpr::int(4)],
        )),
    ]);
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(result_shape(&analysis), ExpShape::from_ints([3, 4]));
}
