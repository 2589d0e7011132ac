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

//! Evaluation of `if()`, `elseif()` and `while()` conditions.
//!
//! The arguments are reduced in place, one precedence level at a time:
//! parentheses, unary predicates, binary comparisons, `NOT`, then `AND` and
//! `OR`. Each level sweeps left to right and repeats until nothing more
//! reduces. A reduced operation is replaced by a quoted "1" or "0".

use std::cmp::Ordering;
use std::path::Path;

use regex::Regex;

use crate::eval::Evaluator;
use crate::expand::expand_list_argument;
use crate::fileutil::get_timestamp;
use crate::loc::Loc;
use crate::message::MessageType;
use crate::policy::{
    CMP0012, CMP0054, CMP0057, CMP0064, PolicyId, PolicyStatus, policy_warning,
    required_policy_error,
};
use crate::stmt::{Argument, Delimiter, ExpandedArgument};
use crate::strutil::{
    is_full_path, is_off, is_on, parse_c_double, parse_leading_int, scan_double_prefix,
    version_compare,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub value: bool,
    /// A diagnostic the caller reports with its own prefix. A FatalError
    /// aborts the command.
    pub message: Option<(MessageType, String)>,
}

const UNARY_PREDICATES: &[&str] = &[
    "EXISTS",
    "IS_DIRECTORY",
    "IS_SYMLINK",
    "IS_ABSOLUTE",
    "COMMAND",
    "POLICY",
    "TARGET",
    "TEST",
    "DEFINED",
];

const NUMERIC_OPS: &[&str] = &["LESS", "LESS_EQUAL", "GREATER", "GREATER_EQUAL", "EQUAL"];
const STRING_OPS: &[&str] = &[
    "STRLESS",
    "STRLESS_EQUAL",
    "STRGREATER",
    "STRGREATER_EQUAL",
    "STREQUAL",
];
const VERSION_OPS: &[&str] = &[
    "VERSION_LESS",
    "VERSION_LESS_EQUAL",
    "VERSION_GREATER",
    "VERSION_GREATER_EQUAL",
    "VERSION_EQUAL",
];

fn bool_arg(value: bool) -> ExpandedArgument {
    ExpandedArgument::new(if value { "1" } else { "0" }, true)
}

/// Whether `ord` satisfies the comparison named by `op`, given its suffix.
fn ordering_matches(op: &str, ord: Ordering) -> bool {
    if op.ends_with("LESS_EQUAL") {
        ord != Ordering::Greater
    } else if op.ends_with("GREATER_EQUAL") {
        ord != Ordering::Less
    } else if op.ends_with("LESS") {
        ord == Ordering::Less
    } else if op.ends_with("GREATER") {
        ord == Ordering::Greater
    } else {
        ord == Ordering::Equal
    }
}

/// Quotes a value so that it reads back as the same single argument.
fn escape_for_cmake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// The start of the message `if()` reports for a condition error.
pub fn if_error_prefix(args: &[ExpandedArgument]) -> String {
    let mut err = "given arguments:\n ".to_string();
    for arg in args {
        err.push(' ');
        err.push_str(&escape_for_cmake(&arg.value));
    }
    err.push('\n');
    err
}

/// The start of the message `while()` reports for a condition error.
pub fn while_error_prefix(args: &[Argument]) -> String {
    let mut err = "had incorrect arguments: ".to_string();
    for arg in args {
        let quote = if arg.delim == Delimiter::Unquoted { "" } else { "\"" };
        err.push_str(quote);
        err.push_str(&arg.value);
        err.push_str(quote);
        err.push(' ');
    }
    err
}

pub struct ConditionEvaluator<'a> {
    ev: &'a mut Evaluator,
    loc: Loc,
    policy12: PolicyStatus,
    policy54: PolicyStatus,
    policy57: PolicyStatus,
    policy64: PolicyStatus,
    message: Option<(MessageType, String)>,
}

impl<'a> ConditionEvaluator<'a> {
    /// `loc` identifies the command for once-per-site diagnostics.
    pub fn new(ev: &'a mut Evaluator, loc: Loc) -> Self {
        let policy12 = ev.policy_status(CMP0012);
        let policy54 = ev.policy_status(CMP0054);
        let policy57 = ev.policy_status(CMP0057);
        let policy64 = ev.policy_status(CMP0064);
        ConditionEvaluator {
            ev,
            loc,
            policy12,
            policy54,
            policy57,
            policy64,
            message: None,
        }
    }

    pub fn is_true(mut self, args: &[ExpandedArgument]) -> Condition {
        let value = self.evaluate(args.to_vec());
        Condition {
            value,
            message: self.message,
        }
    }

    fn set_message(&mut self, t: MessageType, text: impl Into<String>) {
        self.message = Some((t, text.into()));
    }

    fn evaluate(&mut self, mut args: Vec<ExpandedArgument>) -> bool {
        if args.is_empty() {
            return false;
        }
        if !self.handle_parentheses(&mut args)
            || !self.handle_predicates(&mut args)
            || !self.handle_binary_ops(&mut args)
        {
            return false;
        }
        self.handle_not(&mut args);
        self.handle_and_or(&mut args);
        if args.len() != 1 {
            self.set_message(MessageType::FatalError, "Unknown arguments specified");
            return false;
        }
        self.boolean_with_auto_deref(&args[0], true)
    }

    fn warn_cmp0054(&mut self, text: String) {
        if self.ev.should_report_cmp0054(self.loc) {
            let text = format!("{}\n{text}", policy_warning(CMP0054));
            self.ev.issue_message(MessageType::AuthorWarning, &text);
        }
    }

    fn quoted_is_literal(&self) -> bool {
        !matches!(self.policy54, PolicyStatus::Warn | PolicyStatus::Old)
    }

    fn is_keyword(&mut self, keyword: &str, arg: &ExpandedArgument) -> bool {
        if arg.value != keyword {
            return false;
        }
        if !arg.quoted {
            return true;
        }
        if self.policy54 == PolicyStatus::Warn {
            self.warn_cmp0054(format!(
                "Quoted keywords like \"{keyword}\" will no longer be interpreted as keywords \
                 when the policy is set to NEW.  Since the policy is not set the OLD behavior \
                 will be used."
            ));
        }
        !self.quoted_is_literal()
    }

    fn keyword_among(&mut self, keywords: &[&'static str], arg: &ExpandedArgument) -> Option<&'static str> {
        for kw in keywords {
            if self.is_keyword(kw, arg) {
                return Some(kw);
            }
        }
        None
    }

    /// The variable named by `arg`, unless quoting forbids the lookup.
    fn definition_if_unquoted(&mut self, arg: &ExpandedArgument) -> Option<String> {
        if arg.quoted && self.quoted_is_literal() {
            return None;
        }
        let def = self.ev.get_definition(&arg.value).map(str::to_string);
        if def.is_some() && arg.quoted && self.policy54 == PolicyStatus::Warn {
            self.warn_cmp0054(format!(
                "Quoted variables like \"{}\" will no longer be dereferenced when the policy is \
                 set to NEW.  Since the policy is not set the OLD behavior will be used.",
                arg.value
            ));
        }
        def
    }

    fn variable_or_string(&mut self, arg: &ExpandedArgument) -> String {
        self.definition_if_unquoted(arg)
            .unwrap_or_else(|| arg.value.clone())
    }

    fn boolean_value(&mut self, arg: &ExpandedArgument) -> bool {
        let v = arg.value.as_str();
        if v == "0" {
            return false;
        }
        if v == "1" {
            return true;
        }
        if is_on(v) {
            return true;
        }
        if is_off(v) {
            return false;
        }
        if let Some(d) = parse_c_double(v) {
            return d != 0.0;
        }
        !self.definition_if_unquoted(arg).as_deref().is_none_or(is_off)
    }

    fn boolean_value_old(&mut self, arg: &ExpandedArgument, one_arg: bool) -> bool {
        if one_arg {
            if arg.value == "0" {
                return false;
            }
            if arg.value == "1" {
                return true;
            }
            return !self.definition_if_unquoted(arg).as_deref().is_none_or(is_off);
        }
        let mut def = self.definition_if_unquoted(arg);
        if def.is_none() && parse_leading_int(&arg.value) != 0 {
            def = Some(arg.value.clone());
        }
        !def.as_deref().is_none_or(is_off)
    }

    fn boolean_with_auto_deref(&mut self, arg: &ExpandedArgument, one_arg: bool) -> bool {
        let new_result = self.boolean_value(arg);
        if self.policy12 == PolicyStatus::New {
            return new_result;
        }
        let old_result = self.boolean_value_old(arg, one_arg);
        if new_result == old_result {
            return new_result;
        }
        let intro = format!(
            "An argument named \"{}\" appears in a conditional statement.  ",
            arg.value
        );
        match self.policy12 {
            PolicyStatus::Warn => {
                self.set_message(
                    MessageType::AuthorWarning,
                    format!("{intro}{}", policy_warning(CMP0012)),
                );
                old_result
            }
            PolicyStatus::Old => old_result,
            PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => {
                self.set_message(
                    MessageType::FatalError,
                    format!("{intro}{}", required_policy_error(CMP0012)),
                );
                new_result
            }
            PolicyStatus::New => new_result,
        }
    }

    fn reduce_unary(args: &mut Vec<ExpandedArgument>, i: usize, value: bool) {
        args[i] = bool_arg(value);
        args.remove(i + 1);
    }

    fn reduce_binary(args: &mut Vec<ExpandedArgument>, i: usize, value: bool) {
        args[i] = bool_arg(value);
        args.drain(i + 1..i + 3);
    }

    fn handle_parentheses(&mut self, args: &mut Vec<ExpandedArgument>) -> bool {
        let mut i = 0;
        while i < args.len() {
            if self.is_keyword("(", &args[i].clone()) {
                let mut close = i + 1;
                let mut depth = 1;
                while close < args.len() && depth > 0 {
                    let arg = args[close].clone();
                    if self.is_keyword("(", &arg) {
                        depth += 1;
                    }
                    if self.is_keyword(")", &arg) {
                        depth -= 1;
                    }
                    close += 1;
                }
                if depth > 0 {
                    self.set_message(MessageType::FatalError, "mismatched parenthesis in condition");
                    return false;
                }
                let inner = args[i + 1..close - 1].to_vec();
                let value = self.evaluate(inner);
                args[i] = bool_arg(value);
                args.drain(i + 1..close);
            }
            i += 1;
        }
        true
    }

    fn predicate(&mut self, keyword: &str, operand: &str) -> bool {
        match keyword {
            "EXISTS" => !operand.is_empty() && Path::new(operand).exists(),
            "IS_DIRECTORY" => !operand.is_empty() && Path::new(operand).is_dir(),
            "IS_SYMLINK" => std::fs::symlink_metadata(operand).is_ok_and(|m| m.file_type().is_symlink()),
            "IS_ABSOLUTE" => is_full_path(operand),
            "COMMAND" => self.ev.commands.contains(operand),
            "POLICY" => PolicyId::parse(operand).is_some_and(|id| crate::policy::policy_info(id).is_some()),
            "TARGET" => self.ev.build.find_target(operand).is_some(),
            "TEST" => self.ev.build.has_test_in(&self.ev.current_source_dir(), operand),
            "DEFINED" => match operand.strip_prefix("ENV{").and_then(|s| s.strip_suffix('}')) {
                Some(env) if operand.len() > 4 => std::env::var_os(env).is_some(),
                _ => self.ev.is_definition_set(operand),
            },
            _ => false,
        }
    }

    fn handle_predicates(&mut self, args: &mut Vec<ExpandedArgument>) -> bool {
        loop {
            let mut reducible = false;
            let mut i = 0;
            while i < args.len() {
                for kw in UNARY_PREDICATES {
                    if i >= args.len() {
                        break;
                    }
                    let arg = args[i].clone();
                    if *kw == "TEST" && self.policy64.is_old_behavior() {
                        if self.policy64 == PolicyStatus::Warn && self.is_keyword("TEST", &arg) {
                            let text = format!(
                                "{}\nTEST will be interpreted as an operator when the policy is \
                                 set to NEW.  Since the policy is not set the OLD behavior will \
                                 be used.",
                                policy_warning(CMP0064)
                            );
                            self.ev.issue_message(MessageType::AuthorWarning, &text);
                        }
                        continue;
                    }
                    if self.is_keyword(kw, &arg) && i + 1 < args.len() {
                        let operand = args[i + 1].value.clone();
                        let value = self.predicate(kw, &operand);
                        Self::reduce_unary(args, i, value);
                        reducible = true;
                    }
                }
                i += 1;
            }
            if !reducible {
                return true;
            }
        }
    }

    fn handle_binary_ops(&mut self, args: &mut Vec<ExpandedArgument>) -> bool {
        loop {
            let mut reducible = false;
            let mut i = 0;
            while i < args.len() {
                if i + 2 < args.len() && self.is_keyword("MATCHES", &args[i + 1].clone()) {
                    let subject = self.variable_or_string(&args[i].clone());
                    let pattern = args[i + 2].value.clone();
                    self.ev.clear_matches();
                    let Ok(re) = Regex::new(&pattern) else {
                        self.set_message(
                            MessageType::FatalError,
                            format!("Regular expression \"{pattern}\" cannot compile"),
                        );
                        return false;
                    };
                    let matched = match re.captures(&subject) {
                        Some(caps) => {
                            self.ev.store_matches(&caps);
                            true
                        }
                        None => false,
                    };
                    Self::reduce_binary(args, i, matched);
                    reducible = true;
                }

                if i + 1 < args.len() && self.is_keyword("MATCHES", &args[i].clone()) {
                    Self::reduce_unary(args, i, false);
                    reducible = true;
                }

                if i + 2 < args.len() {
                    if let Some(op) = self.keyword_among(NUMERIC_OPS, &args[i + 1].clone()) {
                        let lhs = self.variable_or_string(&args[i].clone());
                        let rhs = self.variable_or_string(&args[i + 2].clone());
                        let result = match (scan_double_prefix(&lhs), scan_double_prefix(&rhs)) {
                            (Some(l), Some(r)) => match l.partial_cmp(&r) {
                                Some(ord) => ordering_matches(op, ord),
                                None => false,
                            },
                            _ => false,
                        };
                        Self::reduce_binary(args, i, result);
                        reducible = true;
                    }
                }

                if i + 2 < args.len() {
                    if let Some(op) = self.keyword_among(STRING_OPS, &args[i + 1].clone()) {
                        let lhs = self.variable_or_string(&args[i].clone());
                        let rhs = self.variable_or_string(&args[i + 2].clone());
                        let result = ordering_matches(op, lhs.as_bytes().cmp(rhs.as_bytes()));
                        Self::reduce_binary(args, i, result);
                        reducible = true;
                    }
                }

                if i + 2 < args.len() {
                    if let Some(op) = self.keyword_among(VERSION_OPS, &args[i + 1].clone()) {
                        let lhs = self.variable_or_string(&args[i].clone());
                        let rhs = self.variable_or_string(&args[i + 2].clone());
                        let result = ordering_matches(op, version_compare(&lhs, &rhs));
                        Self::reduce_binary(args, i, result);
                        reducible = true;
                    }
                }

                if i + 2 < args.len() && self.is_keyword("IS_NEWER_THAN", &args[i + 1].clone()) {
                    let newer = match (get_timestamp(&args[i].value), get_timestamp(&args[i + 2].value)) {
                        (Some(a), Some(b)) => a >= b,
                        _ => true,
                    };
                    Self::reduce_binary(args, i, newer);
                    reducible = true;
                }

                if i + 2 < args.len() && self.is_keyword("IN_LIST", &args[i + 1].clone()) {
                    if !self.policy57.is_old_behavior() {
                        let needle = self.variable_or_string(&args[i].clone());
                        let found = self
                            .ev
                            .get_definition(&args[i + 2].value)
                            .is_some_and(|list| {
                                expand_list_argument(list, true).contains(&needle)
                            });
                        Self::reduce_binary(args, i, found);
                        reducible = true;
                    } else if self.policy57 == PolicyStatus::Warn {
                        let text = format!(
                            "{}\nIN_LIST will be interpreted as an operator when the policy is \
                             set to NEW.  Since the policy is not set the OLD behavior will be \
                             used.",
                            policy_warning(CMP0057)
                        );
                        self.ev.issue_message(MessageType::AuthorWarning, &text);
                    }
                }
                i += 1;
            }
            if !reducible {
                return true;
            }
        }
    }

    fn handle_not(&mut self, args: &mut Vec<ExpandedArgument>) {
        loop {
            let mut reducible = false;
            let mut i = 0;
            while i < args.len() {
                if i + 1 < args.len() && self.is_keyword("NOT", &args[i].clone()) {
                    let rhs = self.boolean_with_auto_deref(&args[i + 1].clone(), false);
                    Self::reduce_unary(args, i, !rhs);
                    reducible = true;
                }
                i += 1;
            }
            if !reducible {
                return;
            }
        }
    }

    fn handle_and_or(&mut self, args: &mut Vec<ExpandedArgument>) {
        loop {
            let mut reducible = false;
            let mut i = 0;
            while i < args.len() {
                for op in ["AND", "OR"] {
                    if i + 2 < args.len() && self.is_keyword(op, &args[i + 1].clone()) {
                        let lhs = self.boolean_with_auto_deref(&args[i].clone(), false);
                        let rhs = self.boolean_with_auto_deref(&args[i + 2].clone(), false);
                        let value = if op == "AND" { lhs && rhs } else { lhs || rhs };
                        Self::reduce_binary(args, i, value);
                        reducible = true;
                    }
                }
                i += 1;
            }
            if !reducible {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run, script_evaluator};

    fn eval_with(ev: &mut Evaluator, args: &[(&str, bool)]) -> Condition {
        let args: Vec<ExpandedArgument> = args
            .iter()
            .map(|(v, q)| ExpandedArgument::new(*v, *q))
            .collect();
        ConditionEvaluator::new(ev, Loc::default()).is_true(&args)
    }

    fn eval(args: &[&str]) -> bool {
        let mut ev = script_evaluator();
        ev.set_policy_version("3.13");
        let args: Vec<(&str, bool)> = args.iter().map(|a| (*a, false)).collect();
        eval_with(&mut ev, &args).value
    }

    #[test]
    fn test_constants() {
        assert!(eval(&["ON"]));
        assert!(eval(&["y"]));
        assert!(eval(&["2.5"]));
        assert!(!eval(&["0.0"]));
        assert!(!eval(&["foo-NOTFOUND"]));
        assert!(!eval(&["IGNORE"]));
        assert!(!eval(&[]));
        assert!(!eval(&["undefined_variable"]));
    }

    #[test]
    fn test_precedence() {
        assert!(eval(&["NOT", "0", "AND", "1"]));
        assert!(eval(&["0", "OR", "1", "AND", "1"]));
        assert!(!eval(&["NOT", "(", "1", "OR", "0", ")"]));
        assert!(eval(&["(", "(", "1", ")", ")"]));
    }

    #[test]
    fn test_and_or_reduce_left_to_right() {
        assert!(!eval(&["1", "OR", "1", "AND", "0"]));
        assert!(eval(&["0", "AND", "0", "OR", "1"]));
    }

    #[test]
    fn test_comparisons() {
        assert!(eval(&["10", "GREATER", "9"]));
        assert!(eval(&["1.5", "LESS_EQUAL", "1.5"]));
        assert!(!eval(&["abc", "EQUAL", "abc"]));
        assert!(eval(&["abc", "STRLESS", "abd"]));
        assert!(eval(&["1.10", "VERSION_GREATER", "1.9"]));
        assert!(eval(&["1.0", "VERSION_EQUAL", "1"]));
        assert!(eval(&["a", "STREQUAL", "a", "AND", "NOT", "b", "STREQUAL", "a"]));
    }

    #[test]
    fn test_errors() {
        let mut ev = script_evaluator();
        let c = eval_with(&mut ev, &[("(", false), ("1", false)]);
        assert_eq!(
            c.message,
            Some((
                MessageType::FatalError,
                "mismatched parenthesis in condition".to_string()
            ))
        );
        let c = eval_with(&mut ev, &[("1", false), ("2", false)]);
        assert_eq!(
            c.message,
            Some((MessageType::FatalError, "Unknown arguments specified".to_string()))
        );
        let c = eval_with(&mut ev, &[("a", false), ("MATCHES", false), ("(", false)]);
        assert!(!c.value);
        assert_eq!(
            c.message.map(|m| m.1),
            Some("Regular expression \"(\" cannot compile".to_string())
        );
    }

    #[test]
    fn test_defined() {
        let ev = run(
            "if(NOT DEFINED X)\n message(undef)\nendif()\nset(X 1)\nif(NOT DEFINED X)\n \
             message(still)\nendif()\nif(DEFINED ENV{PATH})\n message(env)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["undef", "env"]);
    }

    #[test]
    fn test_matches_stores_groups() {
        let ev = run(
            "if(\"abc123\" MATCHES \"([a-z]+)([0-9]+)\")\n \
             message(\"${CMAKE_MATCH_1} ${CMAKE_MATCH_2} ${CMAKE_MATCH_COUNT}\")\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["abc 123 2"]);
    }

    #[test]
    fn test_quoted_variable_dereference_follows_cmp0054() {
        let mut ev = script_evaluator();
        ev.add_definition("V", "x");
        ev.policies.set(CMP0054, PolicyStatus::Old);
        assert!(eval_with(&mut ev, &[("V", true), ("STREQUAL", false), ("x", false)]).value);
        ev.policies.set(CMP0054, PolicyStatus::New);
        assert!(!eval_with(&mut ev, &[("V", true), ("STREQUAL", false), ("x", false)]).value);
    }

    #[test]
    fn test_cmp0054_warns_once_per_site() {
        let mut ev = script_evaluator();
        ev.add_definition("V", "x");
        ev.policies.set(CMP0054, PolicyStatus::Warn);
        eval_with(&mut ev, &[("V", true), ("STREQUAL", false), ("x", false)]);
        eval_with(&mut ev, &[("V", true), ("STREQUAL", false), ("x", false)]);
        assert_eq!(ev.messenger.texts(MessageType::AuthorWarning).len(), 1);
    }

    #[test]
    fn test_cmp0012_warning() {
        let mut ev = script_evaluator();
        ev.policies.set(CMP0012, PolicyStatus::Warn);
        // Old behavior looks up a variable named "2", new treats it as a
        // number.
        let c = eval_with(&mut ev, &[("2", false)]);
        assert!(!c.value);
        assert_eq!(c.message.map(|m| m.0), Some(MessageType::AuthorWarning));
    }

    #[test]
    fn test_in_list() {
        let mut ev = script_evaluator();
        ev.set_policy_version("3.13");
        ev.add_definition("L", "a;b;c");
        assert!(eval_with(&mut ev, &[("b", false), ("IN_LIST", false), ("L", false)]).value);
        assert!(!eval_with(&mut ev, &[("d", false), ("IN_LIST", false), ("L", false)]).value);
    }

    #[test]
    fn test_error_prefixes() {
        let args = vec![ExpandedArgument::new("a\"b", true), ExpandedArgument::unquoted("$x")];
        assert_eq!(if_error_prefix(&args), "given arguments:\n  \"a\\\"b\" \"\\$x\"\n");
        let raw = vec![
            Argument::new("a", Delimiter::Quoted, 1),
            Argument::new("b", Delimiter::Unquoted, 1),
        ];
        assert_eq!(while_error_prefix(&raw), "had incorrect arguments: \"a\" b ");
    }
}
