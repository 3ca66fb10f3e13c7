//! Per-function symbol table

use std::collections::HashMap;

use crate::ir::{SlotRef, Value};

/// What a name refers to inside a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Mutable storage; reads emit a `load`, writes a `store`.
    Slot(SlotRef),
    /// An immutable value used as-is. Reads yield the value and assignment
    /// is rejected. Nothing in lowering binds one yet; every local and
    /// parameter is a `Slot`.
    Value(Value),
}

/// Variables visible in the function being lowered. A fresh table is
/// created at function entry; nothing survives across functions.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any earlier binding of the same name.
    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
