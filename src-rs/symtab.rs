/*
Copyright 2025 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Interned strings for file names and lowercased command names. Both are
//! compared and hashed far more often than they are printed.

use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    num::NonZeroUsize,
    sync::{Arc, LazyLock},
};

use parking_lot::Mutex;

static SYMTAB: LazyLock<Mutex<Symtab>> = LazyLock::new(|| Mutex::new(Symtab::new()));

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(NonZeroUsize);

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self.as_str(), self.0.get())
    }
}

impl Symbol {
    pub fn as_str(&self) -> Arc<str> {
        let r = SYMTAB.lock();
        r.symbols[self.0.get()].clone()
    }
}

struct Symtab {
    symbols: Vec<Arc<str>>,
    symtab: HashMap<Arc<str>, Symbol>,
}

impl Symtab {
    fn new() -> Self {
        // Index zero is never handed out so that `Symbol` can be NonZero.
        Self {
            symbols: vec![Arc::from("")],
            symtab: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(sym) = self.symtab.get(s) {
            return *sym;
        }
        let s: Arc<str> = Arc::from(s);
        let idx = NonZeroUsize::new(self.symbols.len()).unwrap_or(NonZeroUsize::MIN);
        let sym = Symbol(idx);
        self.symbols.push(s.clone());
        self.symtab.insert(s, sym);
        sym
    }
}

pub fn intern(s: &str) -> Symbol {
    let mut w = SYMTAB.lock();
    w.intern(s)
}

pub fn symbol_count() -> usize {
    let s = SYMTAB.lock();
    s.symbols.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern() {
        let sym = intern("foo");
        let sym2 = intern("bar");
        let sym3 = intern("foo");
        assert_ne!(sym, sym2);
        assert_eq!(sym, sym3);
    }

    #[test]
    fn test_symbol_to_string() {
        let sym = intern("CMakeLists.txt");
        assert_eq!(sym.to_string(), "CMakeLists.txt");
        assert_eq!(&*sym.as_str(), "CMakeLists.txt");
    }

    #[test]
    fn test_empty_string_is_not_index_zero() {
        let sym = intern("");
        assert_ne!(sym.0.get(), 0);
        assert_eq!(sym.to_string(), "");
    }
}
