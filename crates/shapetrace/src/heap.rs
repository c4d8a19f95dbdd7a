//! The persistent heap.
//!
//! An arena of values indexed by integer address. Updates copy only the
//! touched nodes: the address map is a HAMT shared across path forks, so a
//! fork costs O(1) and each side's writes stay invisible to the other.
//!
//! Two address spaces coexist. Non-negative addresses belong to the analyzed
//! program and grow monotonically; negative addresses hold the preloaded
//! builtin objects, are shared read-only by every run, and reject writes
//! once `freeze_builtins` has been called.
//!
//! Objects reference each other through addresses, so cyclic graphs
//! (closures, MRO chains) are fine: there are no owning pointers between
//! values. Reclamation is a mark-and-sweep over explicit roots and runs
//! between tasks only, never while a path is executing.

use std::collections::BTreeMap;

use ahash::AHashSet;

use crate::{
    error::{AnalysisError, AnalysisResult},
    value::{Addr, Obj, Val},
};

/// Follow-limit for address chains. The engine never builds chains remotely
/// this deep; hitting the limit means a corrupted heap.
const MAX_ADDR_HOPS: usize = 128;

/// Snapshot of heap occupancy, for host-side monitoring and tests.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Number of live user-space entries.
    pub live_values: usize,
    /// Number of builtin (negative-address) entries.
    pub builtin_values: usize,
    /// Breakdown of user-space entries by value kind name. `BTreeMap` keeps
    /// iteration deterministic for display and comparison.
    pub values_by_kind: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heap {
    values: im::HashMap<Addr, Val>,
    /// Next user-space address.
    next: i64,
    /// Next builtin address (grows downward).
    next_builtin: i64,
    builtins_frozen: bool,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: im::HashMap::new(),
            next: 0,
            next_builtin: -1,
            builtins_frozen: false,
        }
    }

    /// Reserves a fresh user-space address without storing a value.
    #[must_use]
    pub fn alloc(&self) -> (Addr, Self) {
        let addr = Addr(self.next);
        let mut next = self.clone();
        next.next += 1;
        (addr, next)
    }

    /// Allocates and stores in one step.
    #[must_use]
    pub fn alloc_with(&self, val: Val) -> (Addr, Self) {
        let (addr, mut heap) = self.alloc();
        heap.values.insert(addr, val);
        (addr, heap)
    }

    /// Allocates in the builtin address space. Fails once the prelude has
    /// been frozen: builtins are immutable after initial load.
    pub fn alloc_builtin(&self, val: Val) -> AnalysisResult<(Addr, Self)> {
        if self.builtins_frozen {
            return Err(AnalysisError::internal("builtin allocation after prelude freeze"));
        }
        let addr = Addr(self.next_builtin);
        let mut next = self.clone();
        next.next_builtin -= 1;
        next.values.insert(addr, val);
        Ok((addr, next))
    }

    /// Marks the builtin address space read-only.
    #[must_use]
    pub fn freeze_builtins(&self) -> Self {
        let mut next = self.clone();
        next.builtins_frozen = true;
        next
    }

    #[must_use]
    pub fn get(&self, addr: Addr) -> Option<&Val> {
        self.values.get(&addr)
    }

    /// Stores `val` at `addr`, producing a new heap. Writing to a frozen
    /// builtin address is an engine invariant violation.
    pub fn set(&self, addr: Addr, val: Val) -> AnalysisResult<Self> {
        if addr.is_builtin() && self.builtins_frozen {
            return Err(AnalysisError::internal(format!(
                "write to frozen builtin address {addr}"
            )));
        }
        let mut next = self.clone();
        next.values.insert(addr, val);
        Ok(next)
    }

    /// Removes the entry at `addr`. Builtin entries are never freed.
    #[must_use]
    pub fn free(&self, addr: Addr) -> Self {
        if addr.is_builtin() {
            return self.clone();
        }
        let mut next = self.clone();
        next.values.remove(&addr);
        next
    }

    /// High-water mark of the user address space.
    #[must_use]
    pub fn high_water(&self) -> i64 {
        self.next
    }

    /// Chases an address chain to its first non-address value. Returns
    /// `None` when the chain dead-ends in an undefined address (or exceeds
    /// the hop limit, which only a corrupted heap can produce).
    #[must_use]
    pub fn fetch<'a>(&'a self, val: &'a Val) -> Option<&'a Val> {
        let mut current = val;
        for _ in 0..MAX_ADDR_HOPS {
            match current {
                Val::Addr(addr) => current = self.values.get(addr)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Chases an address chain like `fetch`, but keeps the final address
    /// when it points at an object: object identity lives in the address,
    /// and collapsing it would merge distinct instances.
    #[must_use]
    pub fn sanitize(&self, val: &Val) -> Val {
        let mut current = val.clone();
        for _ in 0..MAX_ADDR_HOPS {
            let Val::Addr(addr) = current else {
                return current;
            };
            match self.values.get(&addr) {
                Some(Val::Obj(_)) | None => return Val::Addr(addr),
                Some(Val::Addr(next)) => current = Val::Addr(*next),
                Some(other) => return other.clone(),
            }
        }
        current
    }

    /// Merges two independently-grown heaps: the right heap's user-space
    /// addresses shift up by the left heap's high-water mark, then the value
    /// maps union. Returns the merged heap and the applied offset so the
    /// caller can relocate envs and values from the right side.
    #[must_use]
    pub fn merge(&self, right: &Self) -> (Self, i64) {
        let offset = self.next;
        let mut values = self.values.clone();
        for (addr, val) in right.values.iter() {
            if addr.is_builtin() {
                // Both sides share the preloaded builtins; keep the left copy.
                continue;
            }
            values.insert(addr.relocate(offset), relocate_val(val, offset));
        }
        let merged = Self {
            values,
            next: self.next + right.next,
            next_builtin: self.next_builtin.min(right.next_builtin),
            builtins_frozen: self.builtins_frozen || right.builtins_frozen,
        };
        (merged, offset)
    }

    /// Mark-and-sweep over the given roots. Builtin entries always survive.
    /// Runs between tasks only; callers must not invoke it mid-path.
    #[must_use]
    pub fn collect(&self, roots: impl IntoIterator<Item = Addr>) -> Self {
        let mut marked: AHashSet<Addr> = AHashSet::new();
        let mut worklist: Vec<Addr> = roots.into_iter().collect();
        while let Some(addr) = worklist.pop() {
            if addr.is_builtin() || !marked.insert(addr) {
                continue;
            }
            if let Some(val) = self.values.get(&addr) {
                trace_val(val, &mut worklist);
            }
        }
        let values = self
            .values
            .iter()
            .filter(|(addr, _)| addr.is_builtin() || marked.contains(addr))
            .map(|(addr, val)| (*addr, val.clone()))
            .collect();
        Self {
            values,
            next: self.next,
            next_builtin: self.next_builtin,
            builtins_frozen: self.builtins_frozen,
        }
    }

    /// Occupancy snapshot, deterministic across runs.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut values_by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut live_values = 0;
        let mut builtin_values = 0;
        for (addr, val) in self.values.iter() {
            if addr.is_builtin() {
                builtin_values += 1;
            } else {
                live_values += 1;
                *values_by_kind.entry(val.kind_name()).or_insert(0) += 1;
            }
        }
        HeapStats { live_values, builtin_values, values_by_kind }
    }
}

/// Rewrites every user-space address inside a value by `offset`.
fn relocate_val(val: &Val, offset: i64) -> Val {
    match val {
        Val::Addr(addr) => Val::Addr(addr.relocate(offset)),
        Val::Obj(obj) => {
            let mut next = Obj::new(obj.id);
            for (name, v) in obj.attrs() {
                next = next.with_attr(name, relocate_val(v, offset));
            }
            for (i, v) in obj.indices() {
                next = next.with_index(*i, relocate_val(v, offset));
            }
            for (k, v) in obj.keyed() {
                next = next.with_key(k, relocate_val(v, offset));
            }
            if let Some(shape) = &obj.shape {
                next = next.with_shape(shape.clone());
            }
            Val::Obj(next)
        }
        Val::Func(func) => {
            let mut relocated = func.as_ref().clone();
            relocated.captured = func.captured.relocate(offset);
            relocated.defaults = func
                .defaults
                .iter()
                .map(|(name, v)| (name.clone(), relocate_val(v, offset)))
                .collect();
            Val::Func(std::rc::Rc::new(relocated))
        }
        other => other.clone(),
    }
}

/// Pushes every address reachable from `val` onto the mark worklist.
fn trace_val(val: &Val, worklist: &mut Vec<Addr>) {
    match val {
        Val::Addr(addr) => worklist.push(*addr),
        Val::Obj(obj) => {
            for (_, v) in obj.attrs() {
                trace_val(v, worklist);
            }
            for (_, v) in obj.indices() {
                trace_val(v, worklist);
            }
            for (_, v) in obj.keyed() {
                trace_val(v, worklist);
            }
        }
        Val::Func(func) => {
            for (_, addr) in func.captured.iter() {
                worklist.push(addr);
            }
            for (_, v) in func.defaults.iter() {
                trace_val(v, worklist);
            }
        }
        _ => {}
    }
}
