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

//! Pending blocks. An opening `if`, `foreach`, `while`, `function` or
//! `macro` pushes a [`Pending`] that swallows every following record until
//! its matching close, then replays or registers the recorded body.

use std::sync::Arc;

use anyhow::Result;

use crate::backtrace::Frame;
use crate::command::{Command, ScriptedDef};
use crate::cond::{Condition, ConditionEvaluator, if_error_prefix, while_error_prefix};
use crate::error;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::message::MessageType;
use crate::stmt::{Argument, CommandRecord, Delimiter, ExpandedArgument, Stmt};
use crate::{collect_stats_with_slow_report, log};

/// The records captured between an opener and its close.
#[derive(Debug)]
pub struct Body {
    pub start: Frame,
    pub stmts: Vec<Stmt>,
    // Nested openers of the same kind that are still open.
    depth: usize,
}

impl Body {
    pub fn new(start: Frame) -> Self {
        Body {
            start,
            stmts: Vec::new(),
            depth: 0,
        }
    }
}

#[derive(Debug)]
pub struct IfBlock {
    pub body: Body,
    /// The arguments of the `if` as written, for matching `endif(...)`.
    pub args: Vec<Argument>,
    /// The first branch was false.
    pub is_blocking: bool,
    pub has_run: bool,
}

#[derive(Debug)]
pub struct ForEachBlock {
    pub body: Body,
    /// The loop variable followed by the items.
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct WhileBlock {
    pub body: Body,
    pub args: Vec<Argument>,
}

#[derive(Debug)]
pub struct DefBlock {
    pub body: Body,
    /// The name followed by the formal parameters.
    pub args: Vec<String>,
}

#[derive(Debug)]
pub enum Pending {
    If(IfBlock),
    ForEach(ForEachBlock),
    While(WhileBlock),
    Function(DefBlock),
    Macro(DefBlock),
}

impl Pending {
    fn body(&self) -> &Body {
        match self {
            Pending::If(b) => &b.body,
            Pending::ForEach(b) => &b.body,
            Pending::While(b) => &b.body,
            Pending::Function(b) | Pending::Macro(b) => &b.body,
        }
    }

    fn body_mut(&mut self) -> &mut Body {
        match self {
            Pending::If(b) => &mut b.body,
            Pending::ForEach(b) => &mut b.body,
            Pending::While(b) => &mut b.body,
            Pending::Function(b) | Pending::Macro(b) => &mut b.body,
        }
    }

    fn keywords(&self) -> (&'static str, &'static str) {
        match self {
            Pending::If(_) => ("if", "endif"),
            Pending::ForEach(_) => ("foreach", "endforeach"),
            Pending::While(_) => ("while", "endwhile"),
            Pending::Function(_) => ("function", "endfunction"),
            Pending::Macro(_) => ("macro", "endmacro"),
        }
    }

    pub fn start(&self) -> &Frame {
        &self.body().start
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Pending::ForEach(_) | Pending::While(_))
    }

    /// Records `stmt`, or returns true if it is the matching close.
    fn feed(&mut self, stmt: &Stmt) -> bool {
        let (open, close) = self.keywords();
        let body = self.body_mut();
        if stmt.lower_name == open {
            body.depth += 1;
        } else if stmt.lower_name == close {
            if body.depth == 0 {
                return true;
            }
            body.depth -= 1;
        }
        body.stmts.push(stmt.clone());
        false
    }
}

fn same_raw_args(a: &[Argument], b: &[Argument]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.value == y.value && x.delim == y.delim)
}

/// What a body asked its enclosing loop to do.
enum LoopControl {
    Next,
    Stop,
}

impl Evaluator {
    /// Offers `stmt` to the innermost pending block. Returns true if the
    /// block took it, in which case it must not be dispatched.
    pub(crate) fn is_function_blocked(&mut self, stmt: &Stmt, status: &mut ExecutionStatus) -> bool {
        let closes = match self.top_pending_mut() {
            Some(p) => p.feed(stmt),
            None => return false,
        };
        if !closes {
            return true;
        }
        let Some(pending) = self.pop_pending() else {
            return true;
        };
        if !self.closes_with_matching_args(&pending, stmt) {
            let text = format!(
                "A logical block opening on the line\n  {}\ncloses on the line\n  {} ({})\nwith \
                 mis-matching arguments.",
                pending.start(),
                stmt.loc,
                stmt.name
            );
            self.issue_message(MessageType::AuthorWarning, &text);
        }
        self.replay(&pending, status);
        self.end_pending(&pending);
        true
    }

    fn closes_with_matching_args(&mut self, pending: &Pending, close: &Stmt) -> bool {
        match pending {
            Pending::If(b) => close.args.is_empty() || same_raw_args(&close.args, &b.args),
            Pending::While(b) => close.args.is_empty() || same_raw_args(&close.args, &b.args),
            Pending::ForEach(ForEachBlock { args, .. })
            | Pending::Function(DefBlock { args, .. })
            | Pending::Macro(DefBlock { args, .. }) => {
                let filename = close.loc.filename.as_str();
                let expanded = self
                    .expand_arguments(&close.args, &filename)
                    .unwrap_or_default();
                expanded.is_empty() || args.first() == Some(&expanded[0].value)
            }
        }
    }

    fn replay(&mut self, pending: &Pending, status: &mut ExecutionStatus) {
        match pending {
            Pending::If(b) => self.replay_if(b, status),
            Pending::ForEach(b) => self.replay_foreach(b, status),
            Pending::While(b) => self.replay_while(b, status),
            Pending::Function(b) => self.define_scripted(b, false),
            Pending::Macro(b) => self.define_scripted(b, true),
        }
    }

    fn replay_if(&mut self, block: &IfBlock, status: &mut ExecutionStatus) {
        let mut scope_depth = 0i32;
        let mut is_blocking = block.is_blocking;
        let mut has_run = block.has_run;
        let mut else_seen = false;
        for stmt in &block.body.stmts {
            match stmt.lower_name.as_str() {
                "if" => scope_depth += 1,
                "endif" => scope_depth -= 1,
                _ => {}
            }
            if scope_depth == 0 && stmt.lower_name == "else" {
                if else_seen {
                    self.push_command_frame(stmt.loc, &stmt.name);
                    self.issue_message(
                        MessageType::FatalError,
                        "A duplicate ELSE command was found inside an IF block.",
                    );
                    self.pop_frame();
                    return;
                }
                is_blocking = has_run;
                has_run = true;
                else_seen = true;
                if !is_blocking && self.trace {
                    self.print_command_trace(stmt);
                }
            } else if scope_depth == 0 && stmt.lower_name == "elseif" {
                if else_seen {
                    self.push_command_frame(stmt.loc, &stmt.name);
                    self.issue_message(
                        MessageType::FatalError,
                        "An ELSEIF command was found after an ELSE command.",
                    );
                    self.pop_frame();
                    return;
                }
                if has_run {
                    is_blocking = true;
                    continue;
                }
                if self.trace {
                    self.print_command_trace(stmt);
                }
                self.push_command_frame(stmt.loc, &stmt.name);
                let filename = stmt.loc.filename.as_str();
                let value = match self.expand_arguments(&stmt.args, &filename) {
                    Some(args) => {
                        let cond = ConditionEvaluator::new(self, stmt.loc).is_true(&args);
                        if let Some((t, msg)) = &cond.message {
                            let text = format!("{}{msg}", if_error_prefix(&args));
                            self.issue_message(*t, &text);
                            if *t == MessageType::FatalError {
                                self.pop_frame();
                                return;
                            }
                        }
                        cond.value
                    }
                    None => false,
                };
                self.pop_frame();
                if value {
                    is_blocking = false;
                    has_run = true;
                }
            } else if !is_blocking {
                if self.fatal_error_occurred() {
                    return;
                }
                let mut inner = ExecutionStatus::new();
                self.execute_command(stmt, &mut inner);
                if inner.return_invoked {
                    status.return_invoked = true;
                    return;
                }
                if inner.break_invoked {
                    status.break_invoked = true;
                    return;
                }
                if inner.continue_invoked {
                    status.continue_invoked = true;
                    return;
                }
            }
        }
    }

    /// Runs one pass over a loop body.
    fn run_loop_body(&mut self, stmts: &[Stmt], status: &mut ExecutionStatus) -> LoopControl {
        for stmt in stmts {
            let mut inner = ExecutionStatus::new();
            self.execute_command(stmt, &mut inner);
            if inner.return_invoked {
                status.return_invoked = true;
                return LoopControl::Stop;
            }
            if inner.break_invoked {
                return LoopControl::Stop;
            }
            if inner.continue_invoked {
                break;
            }
            if self.fatal_error_occurred() {
                return LoopControl::Stop;
            }
        }
        LoopControl::Next
    }

    fn replay_foreach(&mut self, block: &ForEachBlock, status: &mut ExecutionStatus) {
        let Some((var, items)) = block.args.split_first() else {
            return;
        };
        let saved = self.vars.get(var).map(str::to_string);
        for item in items {
            self.add_definition(var, item);
            if let LoopControl::Stop = self.run_loop_body(&block.body.stmts, status) {
                break;
            }
        }
        if self.fatal_error_occurred() {
            return;
        }
        match saved {
            Some(v) => self.add_definition(var, &v),
            None => self.remove_definition(var),
        }
    }

    fn while_condition(&mut self, block: &WhileBlock) -> Option<Condition> {
        let start = &block.body.start;
        let filename = start.loc.filename.as_str();
        let args = self.expand_arguments(&block.args, &filename)?;
        Some(ConditionEvaluator::new(self, start.loc).is_true(&args))
    }

    fn replay_while(&mut self, block: &WhileBlock, status: &mut ExecutionStatus) {
        let start = block.body.start.clone();
        let name = start.name.clone().unwrap_or_else(|| "while".to_string());
        self.push_command_frame(start.loc, &name);
        let mut next = self.while_condition(block);
        self.pop_frame();
        while let Some(cond) = next {
            if !cond.value {
                break;
            }
            if let Some((t, msg)) = &cond.message {
                let text = format!("{}({msg}).", while_error_prefix(&block.args));
                self.push_command_frame(start.loc, &name);
                self.issue_message(*t, &text);
                self.pop_frame();
                if *t == MessageType::FatalError {
                    return;
                }
            }
            if let LoopControl::Stop = self.run_loop_body(&block.body.stmts, status) {
                return;
            }
            self.push_command_frame(start.loc, &name);
            next = self.while_condition(block);
            self.pop_frame();
        }
    }

    fn define_scripted(&mut self, block: &DefBlock, is_macro: bool) {
        let Some((name, params)) = block.args.split_first() else {
            return;
        };
        log!("define {} {name}", if is_macro { "macro" } else { "function" });
        let def = Arc::new(ScriptedDef {
            name: name.clone(),
            params: params.to_vec(),
            body: block.body.stmts.clone(),
            policies: self.policies.record(),
            file: block.body.start.loc.filename.to_string(),
        });
        let cmd = if is_macro {
            Command::Macro(def)
        } else {
            Command::Function(def)
        };
        self.commands.add_scripted(name, cmd);
    }

    pub(crate) fn call_function(
        &mut self,
        def: &ScriptedDef,
        args: &[ExpandedArgument],
        status: &mut ExecutionStatus,
    ) -> Result<()> {
        if args.len() < def.params.len() {
            error!(
                "Function invoked with incorrect arguments for function named: {}",
                def.name
            );
        }
        collect_stats_with_slow_report!("function call time", &def.name);
        self.push_function_scope(&def.policies);

        self.add_definition("ARGC", &args.len().to_string());
        for (i, arg) in args.iter().enumerate() {
            self.add_definition(&format!("ARGV{i}"), &arg.value);
        }
        for (param, arg) in def.params.iter().zip(args) {
            self.add_definition(param, &arg.value);
        }
        self.add_definition("ARGV", &join_values(args));
        self.add_definition("ARGN", &join_values(&args[def.params.len()..]));

        let mut report = true;
        for stmt in &def.body {
            let mut inner = ExecutionStatus::new();
            if !self.execute_command(stmt, &mut inner) || inner.nested_error {
                report = false;
                status.nested_error = true;
                break;
            }
            if inner.return_invoked || self.fatal_error_occurred() {
                break;
            }
        }
        let report = report && !self.fatal_error_occurred();
        self.pop_function_scope(report);
        Ok(())
    }

    pub(crate) fn call_macro(
        &mut self,
        def: &ScriptedDef,
        args: &[ExpandedArgument],
        status: &mut ExecutionStatus,
    ) -> Result<()> {
        if args.len() < def.params.len() {
            error!("Macro invoked with incorrect arguments for macro named: {}", def.name);
        }
        collect_stats_with_slow_report!("macro call time", &def.name);
        self.push_macro_scope(&def.policies);

        let subst = MacroSubstitution::new(&def.params, args);
        let mut report = true;
        for stmt in &def.body {
            let record: Stmt = Arc::new(CommandRecord {
                name: stmt.name.clone(),
                lower_name: stmt.lower_name.clone(),
                loc: stmt.loc,
                args: stmt
                    .args
                    .iter()
                    .map(|a| match a.delim {
                        Delimiter::Bracket => a.clone(),
                        _ => Argument::new(subst.apply(&a.value), a.delim, a.line),
                    })
                    .collect(),
            });
            let mut inner = ExecutionStatus::new();
            if !self.execute_command(&record, &mut inner) || inner.nested_error {
                report = false;
                status.nested_error = true;
                break;
            }
            if inner.return_invoked {
                status.return_invoked = true;
                break;
            }
            if inner.break_invoked {
                status.break_invoked = true;
                break;
            }
            if inner.continue_invoked {
                status.continue_invoked = true;
                break;
            }
            if self.fatal_error_occurred() {
                break;
            }
        }
        let report = report && !self.fatal_error_occurred();
        self.pop_macro_scope(report);
        Ok(())
    }
}

fn join_values(args: &[ExpandedArgument]) -> String {
    args.iter()
        .map(|a| a.value.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

/// Textual replacement of `${param}`, `${ARGC}`, `${ARGV}`, `${ARGN}` and
/// `${ARGV<n>}` in a macro body.
struct MacroSubstitution {
    replacements: Vec<(String, String)>,
    indexed: Vec<(String, String)>,
}

impl MacroSubstitution {
    fn new(params: &[String], args: &[ExpandedArgument]) -> Self {
        let mut replacements: Vec<(String, String)> = params
            .iter()
            .zip(args)
            .map(|(p, a)| (format!("${{{p}}}"), a.value.clone()))
            .collect();
        replacements.push(("${ARGC}".to_string(), args.len().to_string()));
        replacements.push((
            "${ARGN}".to_string(),
            join_values(&args[params.len()..]),
        ));
        replacements.push(("${ARGV}".to_string(), join_values(args)));
        // Highest index first.
        let indexed = args
            .iter()
            .enumerate()
            .rev()
            .map(|(i, a)| (format!("${{ARGV{i}}}"), a.value.clone()))
            .collect();
        MacroSubstitution {
            replacements,
            indexed,
        }
    }

    fn apply(&self, value: &str) -> String {
        if !value.contains("${") {
            return value.to_string();
        }
        let mut out = value.to_string();
        for (from, to) in &self.replacements {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        if out.contains("${ARGV") {
            for (from, to) in &self.indexed {
                if out.contains(from.as_str()) {
                    out = out.replace(from.as_str(), to);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};

    #[test]
    fn test_if_branches() {
        let ev = run(
            "set(A 2)\nif(A EQUAL 1)\n message(one)\nelseif(A EQUAL 2)\n message(two)\n\
             else()\n message(other)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["two"]);
    }

    #[test]
    fn test_nested_if_in_false_branch() {
        let ev = run("if(FALSE)\n if(TRUE)\n message(a)\n else()\n message(b)\n endif()\nelse()\n message(c)\nendif()\n");
        assert_eq!(output(&ev), vec!["c"]);
    }

    #[test]
    fn test_duplicate_else() {
        let ev = run("if(FALSE)\nelse()\nelse()\nendif()\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["A duplicate ELSE command was found inside an IF block."]
        );
    }

    #[test]
    fn test_mismatched_endif_warns() {
        let ev = run("if(TRUE)\nmessage(x)\nendif(FALSE)\n");
        assert_eq!(output(&ev), vec!["x"]);
        let warnings = ev.messenger.texts(MessageType::AuthorWarning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("with mis-matching arguments."));
    }

    #[test]
    fn test_foreach_range() {
        let ev = run("foreach(x RANGE 5)\n message(${x})\nendforeach()\n");
        assert_eq!(output(&ev), vec!["0", "1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_foreach_restores_variable() {
        let ev = run(
            "set(x keep)\nforeach(x a b)\nendforeach()\nmessage(${x})\n\
             foreach(y a b)\nendforeach()\nif(NOT DEFINED y)\n message(gone)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["keep", "gone"]);
    }

    #[test]
    fn test_nested_foreach_same_variable() {
        let ev = run(
            "foreach(i 1 2)\n foreach(i a b)\n  message(${i})\n endforeach(i)\n message(${i})\n\
             endforeach(i)\n",
        );
        assert_eq!(output(&ev), vec!["a", "b", "1", "a", "b", "2"]);
    }

    #[test]
    fn test_break_and_continue() {
        let ev = run(
            "foreach(i 1 2 3 4)\n if(i EQUAL 2)\n  continue()\n endif()\n if(i EQUAL 4)\n  \
             break()\n endif()\n message(${i})\nendforeach()\n",
        );
        assert_eq!(output(&ev), vec!["1", "3"]);
    }

    #[test]
    fn test_while_loop() {
        let ev = run(
            "set(i 0)\nwhile(i LESS 3)\n message(${i})\n math(EXPR i \"${i} + 1\")\nendwhile()\n",
        );
        assert_eq!(output(&ev), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_function_scope() {
        let ev = run(
            "function(f a)\n set(inner ${a})\n set(out ${ARGN} PARENT_SCOPE)\n \
             message(\"${ARGC} ${ARGV0} ${ARGV}\")\nendfunction()\nf(x y z)\n\
             message(\"${inner}|${out}\")\n",
        );
        assert_eq!(output(&ev), vec!["3 x x;y;z", "|y;z"]);
    }

    #[test]
    fn test_function_too_few_arguments() {
        let ev = run("function(f a b)\nendfunction()\nf(1)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["f Function invoked with incorrect arguments for function named: f"]
        );
    }

    #[test]
    fn test_macro_substitutes_text() {
        let ev = run(
            "macro(m a)\n set(${a} \"${ARGN}\")\n message(\"${ARGV1} ${ARGC}\")\nendmacro()\n\
             m(v 1 2)\nmessage(\"${v}\")\n",
        );
        assert_eq!(output(&ev), vec!["1 3", "1;2"]);
    }

    #[test]
    fn test_macro_override_calls_previous() {
        let ev = run(
            "macro(foo)\n message(first)\nendmacro()\nmacro(foo)\n _foo()\n message(second)\n\
             endmacro()\nfoo()\n",
        );
        assert_eq!(output(&ev), vec!["first", "second"]);
    }

    #[test]
    fn test_return_from_macro_leaves_caller() {
        let ev = run(
            "macro(m)\n return()\nendmacro()\nfunction(f)\n m()\n message(unreachable)\n\
             endfunction()\nf()\nmessage(done)\n",
        );
        assert_eq!(output(&ev), vec!["done"]);
    }

    #[test]
    fn test_error_inside_function_is_reported_once() {
        let ev = run("function(f)\n unset()\nendfunction()\nf()\nmessage(after)\n");
        assert!(output(&ev).is_empty());
        assert_eq!(ev.messenger.texts(MessageType::FatalError).len(), 1);
    }

    #[test]
    fn test_macro_substitution_order() {
        let args = vec![
            ExpandedArgument::unquoted("a"),
            ExpandedArgument::unquoted("b"),
        ];
        let s = MacroSubstitution::new(&["p".to_string()], &args);
        assert_eq!(s.apply("${p}-${ARGN}-${ARGV1}-${ARGV}"), "a-b-b-a;b");
        assert_eq!(s.apply("plain"), "plain");
    }
}
