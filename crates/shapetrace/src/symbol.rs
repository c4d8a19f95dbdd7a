//! Symbol identity and the per-run id generator.
//!
//! Every symbolic unknown (numeric, boolean, string, or shape) carries a
//! `SymbolId` drawn from a single monotone counter shared with object and
//! function ids. Ids are unique within one analyzer run; equality of symbols
//! is equality of ids, never of display names.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a symbol within one analyzer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SymbolId(pub u64);

/// Sort of a numeric symbol.
///
/// Integer symbols get their cached ranges coerced to integer intervals
/// (inward rounding); float symbols keep real intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display)]
pub enum NumKind {
    Int,
    Float,
}

/// Monotone id source for symbols, objects, and functions.
///
/// Single-threaded exploration never contends on this counter, but it is an
/// atomic so the generator can be shared behind `&self` from the driver, the
/// interpreter, and library calls alike.
#[derive(Debug, Default)]
pub struct IdGen {
    next: AtomicU64,
}

impl IdGen {
    #[must_use]
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    /// Returns the next raw id. Used for object and function identity.
    pub fn fresh(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns a fresh symbol id.
    pub fn fresh_symbol(&self) -> SymbolId {
        SymbolId(self.fresh())
    }
}
