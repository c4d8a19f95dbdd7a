//! The library-call registry.
//!
//! Library calls are the extension point for tensor-operation semantics:
//! a table from string paths (`torch.matmul`-style) to functions from a
//! context carrying evaluated arguments to a set of result contexts. The
//! full operator corpus is assembled by collaborators at startup; the
//! entries registered here are the ones the engine's own semantics and test
//! suite rely on (list construction, length, tensor creation, broadcast,
//! matmul, view).

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    constraint::Ctr,
    ctx::{Ctx, CtxSet},
    exp::{BoolSymbol, ExpBool, ExpNum, ExpShape, NumSymbol},
    simplify::simplify_shape,
    source::SourceRange,
    symbol::{IdGen, NumKind},
    value::{Obj, Val},
};

/// Host facilities available to a library call.
pub struct LibCallInput<'a> {
    /// Fresh symbol/object identity source.
    pub idg: &'a IdGen,
    /// Source position of the call site.
    pub source: Option<SourceRange>,
}

/// One library-call implementation: evaluated arguments in, forked result
/// contexts out.
pub type LibCallFn = fn(&LibCallInput<'_>, Ctx<Vec<Val>>) -> CtxSet<Val>;

/// Registry keyed by dotted path. Registration order is preserved so hosts
/// can introspect the table deterministically.
#[derive(Default)]
pub struct LibCallRegistry {
    entries: IndexMap<Rc<str>, LibCallFn>,
}

impl std::fmt::Debug for LibCallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibCallRegistry")
            .field("paths", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LibCallRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the engine's default entries.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("builtins.list", lib_gen_list);
        registry.register("builtins.len", lib_len);
        registry.register("symbolic.int", lib_sym_int);
        registry.register("symbolic.bool", lib_sym_bool);
        registry.register("tensor.full", lib_tensor_full);
        registry.register("shape.broadcast", lib_broadcast);
        registry.register("shape.matmul", lib_matmul);
        registry.register("shape.view", lib_view);
        registry
    }

    /// Adds or replaces an entry.
    pub fn register(&mut self, path: &str, f: LibCallFn) {
        self.entries.insert(Rc::from(path), f);
    }

    /// Merges another collaborator-provided table into this one; the
    /// incoming entries win on path clashes.
    pub fn extend(&mut self, other: Self) {
        for (path, f) in other.entries {
            self.entries.insert(path, f);
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<LibCallFn> {
        self.entries.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(AsRef::as_ref)
    }
}

// --- default entries ---------------------------------------------------------

/// `builtins.list(*items)`: allocates an indexed object holding the items,
/// with `$length` carrying the (constant) element count.
fn lib_gen_list(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let args = ctx.ret_val.clone();
    let mut obj = Obj::new(input.idg.fresh());
    for (i, item) in args.iter().enumerate() {
        obj = obj.with_index(i as i64, item.clone());
    }
    obj = obj.with_attr("$length", Val::int(args.len() as i64));
    let (addr, heap) = ctx.heap.alloc_with(Val::Obj(obj));
    CtxSet::single(ctx.with_heap(heap).with_ret(Val::Addr(addr)))
}

/// `builtins.len(x)`: the `$length` attribute for indexed objects, the char
/// count for constant strings.
fn lib_len(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let [arg] = ctx.ret_val.as_slice() else {
        return CtxSet::single(
            ctx.clone()
                .with_ret(Val::warning("len expects exactly one argument"))
                .warn_with_msg("len expects exactly one argument", input.source),
        );
    };
    let fetched = ctx.heap.fetch(arg).cloned();
    let result = match fetched {
        Some(Val::Obj(obj)) => obj.attr("$length").cloned(),
        Some(Val::Str(s)) => s.known_len().map(Val::int),
        _ => None,
    };
    match result {
        Some(len) => CtxSet::single(ctx.with_ret(len)),
        None => {
            let msg = "object has no known length";
            CtxSet::single(ctx.with_ret(Val::warning(msg)).warn_with_msg(msg, input.source))
        }
    }
}

/// `symbolic.int(name?)`: mints a fresh integer unknown. Library wrappers
/// use this for values the analyzed program cannot pin down (batch sizes,
/// input dimensions).
fn lib_sym_int(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let name = arg_name(&ctx, "n");
    let sym = NumSymbol::new(input.idg.fresh_symbol(), NumKind::Int, &name);
    CtxSet::single(ctx.with_ret(Val::Int(ExpNum::symbol(sym))))
}

/// `symbolic.bool(name?)`: mints a fresh boolean unknown.
fn lib_sym_bool(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let name = arg_name(&ctx, "b");
    let sym = BoolSymbol::new(input.idg.fresh_symbol(), &name);
    CtxSet::single(ctx.with_ret(Val::Bool(ExpBool::symbol(sym))))
}

fn arg_name(ctx: &Ctx<Vec<Val>>, fallback: &str) -> String {
    match ctx.ret_val.first() {
        Some(Val::Str(s)) => s.as_const().map_or_else(|| fallback.to_owned(), str::to_owned),
        _ => fallback.to_owned(),
    }
}

/// Shape of a tensor-like argument, chasing one address hop.
fn tensor_shape(ctx: &Ctx<Vec<Val>>, val: &Val) -> Option<ExpShape> {
    match ctx.heap.fetch(val)? {
        Val::Obj(obj) => obj.shape.clone(),
        _ => None,
    }
}

/// Allocates a tensor object with the given shape and returns its address.
fn alloc_tensor(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>, shape: ExpShape) -> Ctx<Val> {
    let shape = simplify_shape(&ctx.ctr_set, &shape);
    let obj = Obj::new(input.idg.fresh()).with_shape(shape);
    let (addr, heap) = ctx.heap.alloc_with(Val::Obj(obj));
    ctx.with_heap(heap).with_ret(Val::Addr(addr))
}

fn warn_val(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>, msg: &str) -> CtxSet<Val> {
    CtxSet::single(ctx.with_ret(Val::warning(msg)).warn_with_msg(msg, input.source))
}

/// `tensor.full(*dims)`: a tensor of the given dimensions. Symbolic
/// dimensions pick up a non-negativity constraint.
fn lib_tensor_full(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let args = ctx.ret_val.clone();
    let mut dims = Vec::with_capacity(args.len());
    let mut bounds = Vec::new();
    for arg in &args {
        let Some(dim) = arg.as_num().cloned() else {
            return warn_val(input, ctx, "tensor dimensions must be integers");
        };
        if dim.as_const().is_none() {
            bounds.push(Ctr::le(ExpNum::int(0), dim.clone()).at(input.source));
        }
        dims.push(dim);
    }
    let ctx = ctx.require(bounds, "tensor dimension must be non-negative", input.source);
    CtxSet::single(alloc_tensor(input, ctx, ExpShape::from_dims(dims)))
}

/// `shape.broadcast(a, b)`: the numpy broadcast of two tensors. Adds the
/// broadcastability precondition and produces the combined shape.
fn lib_broadcast(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let [a, b] = ctx.ret_val.as_slice() else {
        return warn_val(input, ctx, "broadcast expects two tensors");
    };
    let (Some(l), Some(r)) = (tensor_shape(&ctx, a), tensor_shape(&ctx, b)) else {
        return warn_val(input, ctx, "broadcast expects two tensors");
    };
    let ctx = ctx.require(
        vec![Ctr::broadcastable(l.clone(), r.clone()).at(input.source)],
        "shapes are not broadcastable",
        input.source,
    );
    if ctx.status == crate::ctx::CtxStatus::Failed {
        return CtxSet::single(ctx.with_ret(Val::None));
    }
    CtxSet::single(alloc_tensor(input, ctx, ExpShape::broadcast(l, r)))
}

/// `shape.matmul(a, b)`: matrix product preconditions per torch semantics
/// for ranks 1 and 2, with broadcast batching for higher known ranks.
fn lib_matmul(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let [a, b] = ctx.ret_val.as_slice() else {
        return warn_val(input, ctx, "matmul expects two tensors");
    };
    let (Some(l), Some(r)) = (tensor_shape(&ctx, a), tensor_shape(&ctx, b)) else {
        return warn_val(input, ctx, "matmul expects two tensors");
    };
    let (Some(lrank), Some(rrank)) = (l.known_rank(), r.known_rank()) else {
        return warn_val(input, ctx, "matmul on tensors of unknown rank is not supported");
    };
    if lrank == 0 || rrank == 0 {
        return warn_val(input, ctx, "matmul does not accept scalar operands");
    }

    let dim = |shape: &ExpShape, i: i64| ExpNum::index(shape.clone(), ExpNum::int(i));

    // Inner contraction: last axis of the left against the second-to-last of
    // the right (or the only axis of a vector).
    let inner_l = dim(&l, lrank as i64 - 1);
    let inner_r = if rrank == 1 { dim(&r, 0) } else { dim(&r, rrank as i64 - 2) };
    let ctx = ctx.require(
        vec![Ctr::eq(inner_l, inner_r).at(input.source).with_msg("dimension mismatch")],
        "dimension mismatch between matmul operands",
        input.source,
    );
    if ctx.status == crate::ctx::CtxStatus::Failed {
        return CtxSet::single(ctx.with_ret(Val::None));
    }

    // Result shape: batch dims broadcast, then the surviving outer axes.
    let l_batch = ExpShape::slice(l.clone(), None, Some(ExpNum::int(lrank as i64 - 2)));
    let r_batch = ExpShape::slice(r.clone(), None, Some(ExpNum::int(rrank as i64 - 2)));
    let out = match (lrank, rrank) {
        (1, 1) => ExpShape::scalar(),
        (1, _) => {
            // Vector-matrix: the contracted axis disappears.
            ExpShape::concat(r_batch, ExpShape::from_dims([dim(&r, rrank as i64 - 1)]))
        }
        (_, 1) => ExpShape::concat(l_batch, ExpShape::from_dims([dim(&l, lrank as i64 - 2)])),
        _ => {
            let tail = ExpShape::from_dims([dim(&l, lrank as i64 - 2), dim(&r, rrank as i64 - 1)]);
            if lrank > 2 || rrank > 2 {
                let batch = ExpShape::broadcast(l_batch.clone(), r_batch.clone());
                let ctx2 = ctx.clone().require(
                    vec![Ctr::broadcastable(l_batch, r_batch).at(input.source)],
                    "matmul batch dimensions are not broadcastable",
                    input.source,
                );
                if ctx2.status == crate::ctx::CtxStatus::Failed {
                    return CtxSet::single(ctx2.with_ret(Val::None));
                }
                return CtxSet::single(alloc_tensor(input, ctx2, ExpShape::concat(batch, tail)));
            }
            tail
        }
    };
    CtxSet::single(alloc_tensor(input, ctx, out))
}

/// `shape.view(tensor, *dims)`: reshape with element-count preservation.
/// One dimension may be `-1` and is inferred, which introduces a
/// divisibility precondition on the element count.
fn lib_view(input: &LibCallInput<'_>, ctx: Ctx<Vec<Val>>) -> CtxSet<Val> {
    let (tensor, dims) = match ctx.ret_val.as_slice() {
        [tensor, dims @ ..] if !dims.is_empty() => (tensor.clone(), dims.to_vec()),
        _ => return warn_val(input, ctx, "view expects a tensor and target dimensions"),
    };
    let Some(base) = tensor_shape(&ctx, &tensor) else {
        return warn_val(input, ctx, "view expects a tensor argument");
    };

    let numel = ExpNum::numel(base);
    let mut target: Vec<ExpNum> = Vec::with_capacity(dims.len());
    let mut known = ExpNum::int(1);
    let mut infer_at: Option<usize> = None;
    for (i, dim) in dims.iter().enumerate() {
        let Some(d) = dim.as_num().cloned() else {
            return warn_val(input, ctx, "view dimensions must be integers");
        };
        if d.as_i64() == Some(-1) {
            if infer_at.is_some() {
                return warn_val(input, ctx, "view accepts at most one inferred dimension");
            }
            infer_at = Some(i);
            target.push(d);
        } else {
            known = ExpNum::mul(known, d.clone());
            target.push(d);
        }
    }

    let ctx = match infer_at {
        Some(i) => {
            // numel must divide evenly by the known axes; the quotient fills
            // the inferred slot.
            let ctx = ctx.require(
                vec![
                    Ctr::eq(
                        ExpNum::modulo(numel.clone(), known.clone()),
                        ExpNum::int(0),
                    )
                    .at(input.source)
                    .with_msg("view size must divide the element count"),
                ],
                "view size must divide the element count",
                input.source,
            );
            target[i] = ExpNum::floor_div(numel, known);
            ctx
        }
        None => ctx.require(
            vec![Ctr::eq(known, numel)
                .at(input.source)
                .with_msg("view must preserve the element count")],
            "view must preserve the element count",
            input.source,
        ),
    };
    if ctx.status == crate::ctx::CtxStatus::Failed {
        return CtxSet::single(ctx.with_ret(Val::None));
    }
    CtxSet::single(alloc_tensor(input, ctx, ExpShape::from_dims(target)))
}
