//! Global string interner.
//!
//! Identifiers, parameter names, and string-literal contents all flow
//! through here so that repeated lexemes (`X`, `Y`, a parameter name used
//! on every line) compare in O(1) instead of carrying an owned `String`
//! around on every token and AST node.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::RwLock;

/// An interned string.
///
/// Two `Symbol`s compare equal iff the strings they were interned from are
/// equal; comparison and hashing are O(1) over the underlying `u32` index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern `s`, returning the symbol for it. Interning the same string
    /// twice returns the same `Symbol`.
    pub fn intern(s: &str) -> Self {
        INTERNER.with_table(|table| table.intern(s))
    }

    /// The string this symbol was interned from.
    pub fn as_str(&self) -> &'static str {
        INTERNER.with_table(|table| table.get(self.0))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct StringTable {
    strings: Vec<&'static str>,
    ids: FxHashMap<&'static str, u32>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            strings: Vec::new(),
            ids: FxHashMap::default(),
        }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&id) = self.ids.get(s) {
            return Symbol(id);
        }
        // Strings are immutable and live for the process lifetime, so
        // leaking them and handing out `'static` slices is sound and avoids
        // an Arc/refcount per lookup.
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let id = self.strings.len() as u32;
        self.strings.push(leaked);
        self.ids.insert(leaked, id);
        Symbol(id)
    }

    fn get(&self, id: u32) -> &'static str {
        self.strings[id as usize]
    }
}

struct Interner(RwLock<StringTable>);

impl Interner {
    fn with_table<R>(&self, f: impl FnOnce(&mut StringTable) -> R) -> R {
        f(&mut self.0.write().expect("symbol table poisoned"))
    }
}

static INTERNER: Lazy<Interner> = Lazy::new(|| Interner(RwLock::new(StringTable::new())));

#[cfg(test)]
mod tests {
    use super::Symbol;

    #[test]
    fn interning_is_idempotent() {
        let a = Symbol::intern("SPEED");
        let b = Symbol::intern("SPEED");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "SPEED");
    }

    #[test]
    fn distinct_strings_are_distinct_symbols() {
        assert_ne!(Symbol::intern("X"), Symbol::intern("Y"));
    }
}
