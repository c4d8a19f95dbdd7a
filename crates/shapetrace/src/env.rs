//! The persistent name environment.
//!
//! Maps variable names to heap addresses. Every update produces a new
//! environment sharing structure with the old one, so forked paths and
//! captured closures duplicate it for free.

use std::rc::Rc;

use crate::value::Addr;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    vars: im::HashMap<Rc<str>, Addr>,
}

impl Env {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Addr> {
        self.vars.get(name).copied()
    }

    #[must_use]
    pub fn set(&self, name: &str, addr: Addr) -> Self {
        let mut next = self.clone();
        next.vars.insert(Rc::from(name), addr);
        next
    }

    #[must_use]
    pub fn remove(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.vars.remove(name);
        next
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, Addr)> {
        self.vars.iter().map(|(name, addr)| (name, *addr))
    }

    /// Shifts every user-space address by `offset` (heap merge support).
    #[must_use]
    pub fn relocate(&self, offset: i64) -> Self {
        Self {
            vars: self
                .vars
                .iter()
                .map(|(name, addr)| (name.clone(), addr.relocate(offset)))
                .collect(),
        }
    }

    /// Right-biased union: bindings of `other` win on name clashes.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut vars = self.vars.clone();
        for (name, addr) in other.vars.iter() {
            vars.insert(name.clone(), *addr);
        }
        Self { vars }
    }
}
