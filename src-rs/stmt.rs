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

//! The parsed form of a list file: a flat sequence of command invocations.

use std::{fmt::Display, sync::Arc};

use crate::loc::Loc;

pub type Stmt = Arc<CommandRecord>;

/// How an argument was written in the source. It decides whether the
/// argument is expanded and whether it may split into several arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Unquoted,
    Quoted,
    Bracket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub value: String,
    pub delim: Delimiter,
    pub line: i32,
}

impl Argument {
    pub fn new(value: impl Into<String>, delim: Delimiter, line: i32) -> Self {
        Argument {
            value: value.into(),
            delim,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub name: String,
    /// Command lookup is case-insensitive, so this is computed once at parse
    /// time.
    pub lower_name: String,
    pub loc: Loc,
    pub args: Vec<Argument>,
}

impl CommandRecord {
    pub fn new(name: impl Into<String>, loc: Loc, args: Vec<Argument>) -> Self {
        let name = name.into();
        let lower_name = name.to_ascii_lowercase();
        CommandRecord {
            name,
            lower_name,
            loc,
            args,
        }
    }

    pub fn line(&self) -> i32 {
        self.loc.line
    }
}

/// Prints the record the way `--trace` shows it.
impl Display for CommandRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for arg in &self.args {
            match arg.delim {
                Delimiter::Quoted => write!(f, "\"{}\" ", arg.value)?,
                _ => write!(f, "{} ", arg.value)?,
            }
        }
        write!(f, ")")
    }
}

/// An argument after variable expansion and list splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedArgument {
    pub value: String,
    pub quoted: bool,
}

impl ExpandedArgument {
    pub fn new(value: impl Into<String>, quoted: bool) -> Self {
        ExpandedArgument {
            value: value.into(),
            quoted,
        }
    }

    pub fn unquoted(value: impl Into<String>) -> Self {
        Self::new(value, false)
    }
}

impl AsRef<str> for ExpandedArgument {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

pub fn argument_values(args: &[ExpandedArgument]) -> Vec<String> {
    args.iter().map(|a| a.value.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_name() {
        let rec = CommandRecord::new("Add_Executable", Loc::default(), vec![]);
        assert_eq!(rec.lower_name, "add_executable");
        assert_eq!(rec.name, "Add_Executable");
    }

    #[test]
    fn test_display() {
        let rec = CommandRecord::new(
            "message",
            Loc::default(),
            vec![
                Argument::new("STATUS", Delimiter::Unquoted, 1),
                Argument::new("a b", Delimiter::Quoted, 1),
            ],
        );
        assert_eq!(rec.to_string(), "message(STATUS \"a b\" )");
    }
}
