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

//! A persistent call stack. Pushing returns a new stack that shares its tail
//! with the old one, so every message and every deferred command can hold on
//! to the exact context it was issued from.

use std::{fmt::Display, sync::Arc};

use crate::loc::Loc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub loc: Loc,
    /// Command name as written, or None for a frame that marks entering a
    /// file.
    pub name: Option<String>,
}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.loc),
            None => write!(f, "{}", self.loc.filename),
        }
    }
}

#[derive(Debug)]
struct Node {
    frame: Frame,
    parent: Option<Arc<Node>>,
}

#[derive(Debug, Clone, Default)]
pub struct Backtrace(Option<Arc<Node>>);

impl Backtrace {
    pub fn empty() -> Self {
        Backtrace(None)
    }

    pub fn push(&self, frame: Frame) -> Backtrace {
        Backtrace(Some(Arc::new(Node {
            frame,
            parent: self.0.clone(),
        })))
    }

    pub fn push_file(&self, filename: &str) -> Backtrace {
        self.push(Frame {
            loc: Loc::new(filename, 0),
            name: None,
        })
    }

    pub fn push_command(&self, loc: Loc, name: &str) -> Backtrace {
        self.push(Frame {
            loc,
            name: Some(name.to_string()),
        })
    }

    pub fn pop(&self) -> Backtrace {
        Backtrace(self.0.as_ref().and_then(|n| n.parent.clone()))
    }

    pub fn top(&self) -> Option<&Frame> {
        self.0.as_ref().map(|n| &n.frame)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        let mut cur = self.0.as_deref();
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.parent.as_deref();
            Some(&node.frame)
        })
    }

    /// The innermost command frame, which is where a message is attributed.
    pub fn top_command(&self) -> Option<&Frame> {
        self.iter().find(|f| f.name.is_some())
    }

    /// The files being read, outermost first.
    pub fn file_stack(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .iter()
            .filter(|f| f.name.is_none())
            .map(|f| f.loc.filename.to_string())
            .collect();
        files.reverse();
        files
    }

    /// Formats the outer command frames, skipping the innermost one which is
    /// already shown in the message title.
    pub fn call_stack(&self) -> Vec<String> {
        self.iter()
            .filter(|f| f.name.is_some())
            .skip(1)
            .map(|f| f.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_shares_tail() {
        let root = Backtrace::empty().push_file("CMakeLists.txt");
        let a = root.push_command(Loc::new("CMakeLists.txt", 3), "foo");
        let b = root.push_command(Loc::new("CMakeLists.txt", 4), "bar");
        assert_eq!(a.depth(), 2);
        assert_eq!(b.depth(), 2);
        assert_eq!(a.pop().top(), root.top());
        assert_eq!(a.top().and_then(|f| f.name.as_deref()), Some("foo"));
        assert!(Backtrace::empty().pop().is_empty());
    }

    #[test]
    fn test_call_stack() {
        let bt = Backtrace::empty()
            .push_file("CMakeLists.txt")
            .push_command(Loc::new("CMakeLists.txt", 10), "f")
            .push_command(Loc::new("CMakeLists.txt", 2), "message");
        assert_eq!(bt.top_command().map(|f| f.loc.line), Some(2));
        assert_eq!(bt.call_stack(), vec!["CMakeLists.txt:10 (f)".to_string()]);
    }
}
