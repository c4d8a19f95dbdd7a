//! Attribute resolution through MRO chains: classes built from plain
//! objects, instantiation, method binding, and inherited lookups.

use pretty_assertions::assert_eq;
use shapetrace::{Analyzer, BinOpKind, IrExpr, IrStmt, Val};

/// Builds the class scaffolding shared by the tests:
/// `B` with method `m` returning 42, `C` inheriting from `B`.
fn with_classes(tail: IrStmt) -> IrStmt {
    IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("B"), IrExpr::object()),
        IrStmt::assign(IrExpr::name("C"), IrExpr::object()),
        IrStmt::fundef(
            "m",
            &["self"],
            IrStmt::ret(Some(IrExpr::int(42))),
            IrStmt::seq(vec![
                IrStmt::assign(IrExpr::attr(IrExpr::name("B"), "m"), IrExpr::name("m")),
                IrStmt::assign(
                    IrExpr::attr(IrExpr::name("B"), "__mro__"),
                    IrExpr::tuple(vec![IrExpr::name("B"), IrExpr::name("object")]),
                ),
                IrStmt::assign(
                    IrExpr::attr(IrExpr::name("C"), "__mro__"),
                    IrExpr::tuple(vec![IrExpr::name("C"), IrExpr::name("B"), IrExpr::name("object")]),
                ),
                tail,
            ]),
        ),
    ])
}

// =============================================================================
// 1. Inherited Method Resolution
// =============================================================================

/// `C().m()` resolves `m` on base `B` through `C`'s MRO and returns the
/// method's value.
#[test]
fn method_on_base_resolves_through_mro() {
    let program = with_classes(IrStmt::expr(IrExpr::call(
        IrExpr::attr(IrExpr::call(IrExpr::name("C"), vec![]), "m"),
        vec![],
    )));
    let analysis = Analyzer::new().unwrap().run(&program);
    assert_eq!(analysis.paths.len(), 1);
    assert_eq!(analysis.report.success, 1);
    assert_eq!(analysis.paths[0].ret_val, Val::int(42));
}

/// An attribute present on the instance itself wins over the class chain.
#[test]
fn own_attribute_shadows_the_chain() {
    let tail = IrStmt::seq(vec![
        IrStmt::assign(IrExpr::name("inst"), IrExpr::call(IrExpr::name("C"), vec![])),
        IrStmt::assign(IrExpr::attr(IrExpr::name("inst"), "m"), IrExpr::int(7)),
        IrStmt::expr(IrExpr::attr(IrExpr::name("inst"), "m")),
    ]);
    let analysis = Analyzer::new().unwrap().run(&with_classes(tail));
    assert_eq!(analysis.paths[0].ret_val, Val::int(7));
}

/// A lookup that exhausts the whole chain warns and yields an error value.
#[test]
fn missing_attribute_warns_after_full_walk() {
    let tail = IrStmt::expr(IrExpr::attr(IrExpr::call(IrExpr::name("C"), vec![]), "absent"));
    let analysis = Analyzer::new().unwrap().run(&with_classes(tail));
    assert_eq!(analysis.report.warning, 1);
    assert!(analysis.paths[0].ret_val.is_error());
}

// =============================================================================
// 2. Bound Methods See Their Receiver
// =============================================================================

/// A method reads attributes of `self`: binding threads the receiver
/// through the captured environment.
#[test]
fn bound_method_reads_receiver_state() {
    // def get(self): return self.payload
    // inst = C(); inst.payload = 9; inst.get()
    let tail = IrStmt::fundef(
        "get",
        &["self"],
        IrStmt::ret(Some(IrExpr::attr(IrExpr::name("self"), "payload"))),
        IrStmt::seq(vec![
            IrStmt::assign(IrExpr::attr(IrExpr::name("B"), "get"), IrExpr::name("get")),
            IrStmt::assign(IrExpr::name("inst"), IrExpr::call(IrExpr::name("C"), vec![])),
            IrStmt::assign(IrExpr::attr(IrExpr::name("inst"), "payload"), IrExpr::int(9)),
            IrStmt::expr(IrExpr::call(IrExpr::attr(IrExpr::name("inst"), "get"), vec![])),
        ]),
    );
    let analysis = Analyzer::new().unwrap().run(&with_classes(tail));
    assert_eq!(analysis.report.success, 1);
    assert_eq!(analysis.paths[0].ret_val, Val::int(9));
}

// =============================================================================
// 3. __init__ Runs on Instantiation
// =============================================================================

/// A class with `__init__` initializes instance state from call arguments.
#[test]
fn init_populates_the_instance() {
    let tail = IrStmt::fundef(
        "__init__",
        &["self", "v"],
        IrStmt::assign(IrExpr::attr(IrExpr::name("self"), "v"), IrExpr::name("v")),
        IrStmt::seq(vec![
            IrStmt::assign(IrExpr::attr(IrExpr::name("C"), "__init__"), IrExpr::name("__init__")),
            IrStmt::assign(
                IrExpr::name("inst"),
                IrExpr::call(IrExpr::name("C"), vec![IrExpr::int(5)]),
            ),
            IrStmt::expr(IrExpr::binop(
                BinOpKind::Add,
                IrExpr::attr(IrExpr::name("inst"), "v"),
                IrExpr::int(1),
            )),
        ]),
    );
    let analysis = Analyzer::new().unwrap().run(&with_classes(tail));
    assert_eq!(analysis.report.success, 1);
    assert_eq!(analysis.paths[0].ret_val, Val::int(6));
}

// =============================================================================
// 4. Dunder Dispatch Through the Chain
// =============================================================================

/// Binary operators on objects dispatch to `__add__` found via the MRO.
#[test]
fn binop_dispatches_to_dunder() {
    let tail = IrStmt::fundef(
        "__add__",
        &["self", "other"],
        IrStmt::ret(Some(IrExpr::str_lit("added"))),
        IrStmt::seq(vec![
            IrStmt::assign(IrExpr::attr(IrExpr::name("B"), "__add__"), IrExpr::name("__add__")),
            IrStmt::assign(IrExpr::name("inst"), IrExpr::call(IrExpr::name("C"), vec![])),
            IrStmt::expr(IrExpr::binop(
                BinOpKind::Add,
                IrExpr::name("inst"),
                IrExpr::int(1),
            )),
        ]),
    );
    let analysis = Analyzer::new().unwrap().run(&with_classes(tail));
    assert_eq!(analysis.report.success, 1);
    assert_eq!(analysis.paths[0].ret_val, Val::str_lit("added"));
}
