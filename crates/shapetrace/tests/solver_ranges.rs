//! The constraint set and range solver: narrowing, monotonicity,
//! immediate checks, contradiction latching, and shape caching.

use pretty_assertions::assert_eq;
use shapetrace::{
    Ctr, CtrSet, Dims, ExpNum, ExpShape, IdGen, NumKind, NumRange, NumSymbol, Rational,
    ShapeSymbol, SymbolId,
};

fn int_sym(idg: &IdGen, name: &str) -> (NumSymbol, SymbolId) {
    let sym = NumSymbol::new(idg.fresh_symbol(), NumKind::Int, name);
    let id = sym.id;
    (sym, id)
}

// =============================================================================
// 1. Linear Constraints Narrow Symbol Ranges
// =============================================================================

/// `0 <= s` then `s < 10` narrows the cached range to the integer interval
/// `[0, 9]`.
#[test]
fn bounds_accumulate_with_integer_coercion() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new()
        .add(Ctr::le(ExpNum::int(0), s.clone()))
        .add(Ctr::lt(s.clone(), ExpNum::int(10)));
    let range = set.get_symbol_range(id).expect("range should be cached");
    assert_eq!(
        *range,
        NumRange::new(
            shapetrace::Endpoint::Closed(Rational::from_i64(0)),
            shapetrace::Endpoint::Closed(Rational::from_i64(9)),
        )
    );
}

/// Coefficients divide through with a sign flip: `-2*s <= -6` means
/// `s >= 3`.
#[test]
fn negative_coefficient_flips_the_comparison() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let lhs = ExpNum::mul(ExpNum::int(-2), s);
    let set = CtrSet::new().add(Ctr::le(lhs, ExpNum::int(-6)));
    let range = set.get_symbol_range(id).expect("range should be cached");
    assert_eq!(*range, NumRange::at_least(Rational::from_i64(3)));
}

/// An equality pins the symbol to a point; the simplifier can then fold it.
#[test]
fn equality_narrows_to_a_point() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new().add(Ctr::eq(s.clone(), ExpNum::int(4)));
    assert_eq!(
        set.get_symbol_range(id).and_then(NumRange::as_const),
        Some(&Rational::from_i64(4))
    );
    assert_eq!(shapetrace::simplify_num(&set, &s), ExpNum::int(4));
}

// =============================================================================
// 2. Monotonicity: Adding Constraints Only Shrinks Model Sets
// =============================================================================

/// Every range snapshot after an `add` is contained in the one before it.
#[test]
fn ranges_only_narrow() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let steps = [
        Ctr::le(ExpNum::int(0), s.clone()),
        Ctr::lt(s.clone(), ExpNum::int(100)),
        Ctr::le(s.clone(), ExpNum::int(50)),
        Ctr::ne(s.clone(), ExpNum::int(0)),
    ];
    let mut set = CtrSet::new();
    let mut previous: Option<NumRange> = None;
    for ctr in steps {
        set = set.add(ctr);
        let current = set.get_symbol_range(id).cloned().unwrap_or_else(NumRange::unbounded);
        if let Some(prev) = previous {
            assert_eq!(
                current.intersect(&prev),
                current,
                "narrowing must stay inside the previous range"
            );
        }
        previous = Some(current);
    }
}

/// A `!=` on a closed endpoint opens it.
#[test]
fn inequality_erases_a_matching_endpoint() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new()
        .add(Ctr::le(ExpNum::int(0), s.clone()))
        .add(Ctr::ne(s.clone(), ExpNum::int(0)));
    let range = set.get_symbol_range(id).expect("range should be cached");
    // Integer coercion turns the open endpoint into the next integer.
    assert_eq!(range.to_int_range(), NumRange::at_least(Rational::from_i64(1)));
}

// =============================================================================
// 3. Immediate Checks and Contradictions
// =============================================================================

/// Once the range decides a comparison, `check_immediate` answers without
/// touching the solver.
#[test]
fn immediate_checks_read_the_cache() {
    let idg = IdGen::new();
    let (sym, _) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new().add(Ctr::eq(s.clone(), ExpNum::int(4)));
    assert_eq!(set.check_immediate(&Ctr::lt(s.clone(), ExpNum::int(5))), Some(true));
    assert_eq!(set.check_immediate(&Ctr::lt(s.clone(), ExpNum::int(4))), Some(false));
    assert_eq!(set.check_immediate(&Ctr::ne(s.clone(), ExpNum::int(9))), Some(true));
    // Unrelated symbols stay undecided.
    let (other, _) = int_sym(&idg, "t");
    let t = ExpNum::symbol(other);
    assert_eq!(set.check_immediate(&Ctr::lt(t, ExpNum::int(0))), None);
}

/// Contradictory bounds latch the set as failed; later adds are absorbed.
#[test]
fn contradiction_latches_the_set() {
    let idg = IdGen::new();
    let (sym, _) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new()
        .add(Ctr::eq(s.clone(), ExpNum::int(4)))
        .add(Ctr::eq(s.clone(), ExpNum::int(5)));
    assert!(set.is_failed());
    assert!(set.contradiction().is_some());
    let after = set.add(Ctr::le(ExpNum::int(0), s));
    assert!(after.is_failed());
}

/// Non-linear primitives are not addable: they stay in the log without
/// poisoning the set or inventing ranges.
#[test]
fn nonlinear_constraints_stay_unsolved() {
    let idg = IdGen::new();
    let (a_sym, a_id) = int_sym(&idg, "a");
    let (b_sym, b_id) = int_sym(&idg, "b");
    let product = ExpNum::mul(ExpNum::symbol(a_sym), ExpNum::symbol(b_sym));

    let set = CtrSet::new().add(Ctr::eq(product, ExpNum::int(12)));
    assert!(!set.is_failed());
    assert_eq!(set.len(), 1);
    assert!(set.get_symbol_range(a_id).is_none());
    assert!(set.get_symbol_range(b_id).is_none());
}

// =============================================================================
// 4. Conjunctions, Disjunctions, and Negations Destruct
// =============================================================================

/// A conjunction splits into primitives that each refine the range.
#[test]
fn conjunction_splits_into_primitives() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let both = Ctr::and(vec![
        Ctr::le(ExpNum::int(2), s.clone()),
        Ctr::le(s.clone(), ExpNum::int(8)),
    ]);
    let set = CtrSet::new().add(both);
    let range = set.get_symbol_range(id).expect("range should be cached");
    assert_eq!(range.decide_lt(&Rational::from_i64(2)), Some(false));
    assert_eq!(range.decide_le(&Rational::from_i64(8)), Some(true));
}

/// De Morgan: `not (a < b or a == b)` refines like `b <= a and a != b`.
#[test]
fn negation_pushes_inward() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let negated = Ctr::not(Ctr::or(vec![
        Ctr::lt(s.clone(), ExpNum::int(5)),
        Ctr::eq(s.clone(), ExpNum::int(5)),
    ]));
    let set = CtrSet::new().add(negated);
    let range = set.get_symbol_range(id).expect("range should be cached");
    assert_eq!(*range, NumRange::at_least(Rational::from_i64(6)));
}

/// A disjunction with one refuted side collapses onto the other.
#[test]
fn refuted_disjunct_is_dropped() {
    let idg = IdGen::new();
    let (sym, id) = int_sym(&idg, "s");
    let s = ExpNum::symbol(sym);

    let set = CtrSet::new().add(Ctr::eq(s.clone(), ExpNum::int(3)));
    // s == 3 refutes the first side, so the second must hold.
    let (other, other_id) = int_sym(&idg, "t");
    let t = ExpNum::symbol(other);
    let either = Ctr::or(vec![
        Ctr::lt(s.clone(), ExpNum::int(0)),
        Ctr::le(ExpNum::int(7), t),
    ]);
    let set = set.add(either);
    assert_eq!(set.get_symbol_range(id).and_then(NumRange::as_const), Some(&Rational::from_i64(3)));
    assert_eq!(
        set.get_symbol_range(other_id).cloned(),
        Some(NumRange::at_least(Rational::from_i64(7)))
    );
}

// =============================================================================
// 5. Shape Equalities Fill the Shape Cache
// =============================================================================

/// Equating a shape symbol with a constant shape caches its dimensions and
/// pins a symbolic rank.
#[test]
fn shape_equality_caches_dimensions() {
    let idg = IdGen::new();
    let (rank_sym, rank_id) = int_sym(&idg, "r");
    let shape_sym = ShapeSymbol::new(idg.fresh_symbol(), ExpNum::symbol(rank_sym), "S");
    let sym_id = shape_sym.id;

    let concrete = ExpShape::from_ints([2, 3, 4]);
    let set = CtrSet::new().add(Ctr::eq(ExpShape::symbol(shape_sym.clone()), concrete));
    let dims: &Dims = set.get_cached_shape(sym_id).expect("dims should be cached");
    assert_eq!(dims.len(), 3);
    assert_eq!(
        set.get_symbol_range(rank_id).and_then(NumRange::as_const),
        Some(&Rational::from_i64(3))
    );
    // The simplifier now resolves the symbol to its concrete shape.
    assert_eq!(
        shapetrace::simplify_shape(&set, &ExpShape::symbol(shape_sym)),
        ExpShape::from_ints([2, 3, 4])
    );
}

/// Broadcastable over fully-constant shapes is decided immediately; the
/// symbolic case stays open.
#[test]
fn broadcastable_decides_only_constant_shapes() {
    let idg = IdGen::new();
    let set = CtrSet::new();
    assert_eq!(
        set.check_immediate(&Ctr::broadcastable(
            ExpShape::from_ints([3, 1]),
            ExpShape::from_ints([1, 5]),
        )),
        Some(true)
    );
    assert_eq!(
        set.check_immediate(&Ctr::broadcastable(
            ExpShape::from_ints([3, 2]),
            ExpShape::from_ints([3, 5]),
        )),
        Some(false)
    );
    let (sym, _) = int_sym(&idg, "d");
    let symbolic = ExpShape::from_dims([ExpNum::symbol(sym)]);
    assert_eq!(
        set.check_immediate(&Ctr::broadcastable(symbolic, ExpShape::from_ints([4]))),
        None
    );
}
