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

//! Dynamically scoped variable storage. Function calls and directories push
//! a new scope; lookups fall through to enclosing scopes until a binding (or
//! an explicit unset) is found.

use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Directory,
    Function,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    // None shadows a binding in an enclosing scope.
    vars: HashMap<String, Option<String>>,
}

#[derive(Debug)]
pub struct Vars {
    scopes: Vec<Scope>,
    initialized: HashSet<String>,
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

impl Vars {
    pub fn new() -> Self {
        Vars {
            scopes: vec![Scope {
                kind: ScopeKind::Directory,
                vars: HashMap::new(),
            }],
            initialized: HashSet::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            vars: HashMap::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scopes
            .last()
            .map_or(ScopeKind::Directory, |s| s.kind)
    }

    fn lookup_from(&self, top: usize, name: &str) -> Option<&str> {
        self.scopes[..top]
            .iter()
            .rev()
            .find_map(|s| s.vars.get(name))
            .and_then(|v| v.as_deref())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.lookup_from(self.scopes.len(), name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether the variable was ever given a value, even an empty one. Used
    /// to tell "never set" from "set to empty" for uninitialized warnings.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.initialized.insert(name.to_string());
        if let Some(top) = self.scopes.last_mut() {
            top.vars.insert(name.to_string(), Some(value.to_string()));
        }
    }

    pub fn unset(&mut self, name: &str) {
        let depth = self.scopes.len();
        let shadows = depth > 1 && self.lookup_from(depth - 1, name).is_some();
        if let Some(top) = self.scopes.last_mut() {
            if shadows {
                top.vars.insert(name.to_string(), None);
            } else {
                top.vars.remove(name);
            }
        }
    }

    /// Binds `name` in the scope enclosing the current one. Returns false
    /// when there is no enclosing scope.
    pub fn set_parent(&mut self, name: &str, value: Option<&str>) -> bool {
        let depth = self.scopes.len();
        if depth < 2 {
            return false;
        }
        let shadows = depth > 2 && self.lookup_from(depth - 2, name).is_some();
        let parent = &mut self.scopes[depth - 2];
        match value {
            Some(v) => {
                parent.vars.insert(name.to_string(), Some(v.to_string()));
                self.initialized.insert(name.to_string());
            }
            None if shadows => {
                parent.vars.insert(name.to_string(), None);
            }
            None => {
                parent.vars.remove(name);
            }
        }
        true
    }

    /// Names of every variable visible from the current scope, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut seen: HashMap<&str, bool> = HashMap::new();
        for scope in self.scopes.iter().rev() {
            for (k, v) in &scope.vars {
                seen.entry(k.as_str()).or_insert(v.is_some());
            }
        }
        seen.into_iter()
            .filter(|(_, visible)| *visible)
            .map(|(k, _)| k.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_falls_through() {
        let mut v = Vars::new();
        v.set("A", "1");
        v.push_scope(ScopeKind::Function);
        assert_eq!(v.get("A"), Some("1"));
        v.set("A", "2");
        assert_eq!(v.get("A"), Some("2"));
        v.pop_scope();
        assert_eq!(v.get("A"), Some("1"));
    }

    #[test]
    fn test_unset_shadows_parent() {
        let mut v = Vars::new();
        v.set("A", "1");
        v.push_scope(ScopeKind::Function);
        v.unset("A");
        assert_eq!(v.get("A"), None);
        assert!(!v.names().contains(&"A".to_string()));
        v.pop_scope();
        assert_eq!(v.get("A"), Some("1"));
    }

    #[test]
    fn test_set_parent() {
        let mut v = Vars::new();
        assert!(!v.set_parent("X", Some("1")));
        v.push_scope(ScopeKind::Function);
        assert!(v.set_parent("X", Some("1")));
        // The current scope still sees the parent's value.
        assert_eq!(v.get("X"), Some("1"));
        v.set("X", "local");
        v.pop_scope();
        assert_eq!(v.get("X"), Some("1"));
    }

    #[test]
    fn test_set_parent_unset() {
        let mut v = Vars::new();
        v.set("X", "1");
        v.push_scope(ScopeKind::Function);
        v.push_scope(ScopeKind::Function);
        assert!(v.set_parent("X", None));
        v.pop_scope();
        assert_eq!(v.get("X"), None);
        v.pop_scope();
        assert_eq!(v.get("X"), Some("1"));
    }

    #[test]
    fn test_empty_is_set() {
        let mut v = Vars::new();
        v.set("E", "");
        assert!(v.is_set("E"));
        assert!(v.is_initialized("E"));
        assert!(!v.is_initialized("F"));
    }
}
