//! Module-wide string constant pool
//!
//! Every distinct literal content becomes exactly one `@.str.N` global,
//! numbered in creation order. The pool lives for the whole module.

use std::collections::HashMap;

use tracing::trace;

use crate::ir::GlobalString;

/// A handle to an interned global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternedString {
    /// Global symbol name (`.str.N`)
    pub name: String,
    /// Array length including the NUL terminator
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct StringInterner {
    globals: Vec<GlobalString>,
    index: HashMap<String, usize>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a raw literal as it appears in source, processing escapes first.
    pub fn intern_literal(&mut self, raw: &str) -> InternedString {
        self.intern(&unescape(raw))
    }

    /// Intern already-processed content, reusing the existing global when
    /// the same content was seen before.
    pub fn intern(&mut self, content: &str) -> InternedString {
        if let Some(&slot) = self.index.get(content) {
            return self.handle(slot);
        }

        let name = format!(".str.{}", self.globals.len());
        let mut bytes = content.as_bytes().to_vec();
        bytes.push(0);
        trace!(global = %name, bytes = bytes.len(), "interned string");

        self.globals.push(GlobalString { name, bytes });
        let slot = self.globals.len() - 1;
        self.index.insert(content.to_string(), slot);
        self.handle(slot)
    }

    fn handle(&self, slot: usize) -> InternedString {
        let global = &self.globals[slot];
        InternedString {
            name: global.name.clone(),
            len: global.bytes.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    pub fn into_globals(self) -> Vec<GlobalString> {
        self.globals
    }
}

/// Replace `\n`, `\t` and `\\` with the characters they denote. Any other
/// backslash sequence is kept verbatim.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    out
}
