//! The builtin preload.
//!
//! Interpreting any program starts from a prelude environment holding the
//! builtin classes (object, int, float, bool, str, list, dict, tuple, slice,
//! tensor). The prelude is built once per analyzer, stored at negative heap
//! addresses, frozen, and then shared read-only by every run: path forks
//! never copy it and user code can never write through it.

use crate::{
    env::Env,
    error::AnalysisResult,
    heap::Heap,
    symbol::IdGen,
    value::{Addr, Obj, Val},
};

/// The frozen builtin environment and heap.
#[derive(Debug, Clone)]
pub struct Prelude {
    pub env: Env,
    pub heap: Heap,
}

/// Builtin class table: name and base-chain (single inheritance only).
const CLASSES: &[(&str, &[&str])] = &[
    ("object", &[]),
    ("int", &["object"]),
    ("float", &["object"]),
    ("bool", &["int", "object"]),
    ("str", &["object"]),
    ("list", &["object"]),
    ("dict", &["object"]),
    ("tuple", &["object"]),
    ("slice", &["object"]),
    ("tensor", &["object"]),
];

/// Runs the fixed prelude: allocates every builtin class with its MRO chain
/// and freezes the builtin address space.
pub fn bootstrap(idg: &IdGen) -> AnalysisResult<Prelude> {
    let mut heap = Heap::new();
    let mut env = Env::new();
    let mut addrs: Vec<(&str, Addr)> = Vec::with_capacity(CLASSES.len());

    // First pass: allocate the class objects so every address exists before
    // any MRO tuple references it.
    for (name, _) in CLASSES {
        let class = Obj::new(idg.fresh()).with_attr("__name__", Val::str_lit(name));
        let (addr, next) = heap.alloc_builtin(Val::Obj(class))?;
        heap = next;
        env = env.set(name, addr);
        addrs.push((name, addr));
    }

    let lookup = |name: &str| -> Addr {
        addrs
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(Addr(0), |(_, addr)| *addr)
    };

    // Second pass: attach `__mro__` tuples (class itself, then its bases).
    for (name, bases) in CLASSES {
        let addr = lookup(name);
        let mut mro = Obj::new(idg.fresh());
        mro = mro.with_index(0, Val::Addr(addr));
        for (i, base) in bases.iter().enumerate() {
            mro = mro.with_index(i as i64 + 1, Val::Addr(lookup(base)));
        }
        mro = mro.with_attr("$length", Val::int(bases.len() as i64 + 1));
        let Some(Val::Obj(class)) = heap.get(addr).cloned() else {
            continue;
        };
        heap = heap.set(addr, Val::Obj(class.with_attr("__mro__", Val::Obj(mro))))?;
    }

    Ok(Prelude { env, heap: heap.freeze_builtins() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_class_is_bound_at_a_negative_address() {
        let idg = IdGen::new();
        let prelude = bootstrap(&idg).unwrap();
        for (name, _) in CLASSES {
            let addr = prelude.env.get(name).unwrap();
            assert!(addr.is_builtin(), "{name} should live in builtin space");
            assert!(matches!(prelude.heap.get(addr), Some(Val::Obj(_))));
        }
    }

    #[test]
    fn mro_chains_start_with_the_class_itself() {
        let idg = IdGen::new();
        let prelude = bootstrap(&idg).unwrap();
        let bool_addr = prelude.env.get("bool").unwrap();
        let Some(Val::Obj(class)) = prelude.heap.get(bool_addr) else {
            panic!("bool should be an object");
        };
        let Some(Val::Obj(mro)) = class.attr("__mro__") else {
            panic!("bool should carry an __mro__ tuple");
        };
        assert_eq!(mro.index(0), Some(&Val::Addr(bool_addr)));
        // bool -> int -> object
        assert_eq!(mro.index(1), Some(&Val::Addr(prelude.env.get("int").unwrap())));
        assert_eq!(mro.index(2), Some(&Val::Addr(prelude.env.get("object").unwrap())));
    }

    #[test]
    fn prelude_is_frozen_after_bootstrap() {
        let idg = IdGen::new();
        let prelude = bootstrap(&idg).unwrap();
        let addr = prelude.env.get("int").unwrap();
        assert!(prelude.heap.set(addr, Val::None).is_err());
    }
}
