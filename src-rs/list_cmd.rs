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

//! `list()`.

use anyhow::Result;
use regex::Regex;

use crate::error;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::expand::expand_list_argument;
use crate::message::MessageType;
use crate::policy::{CMP0007, PolicyStatus, policy_warning, required_policy_error};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::string_cmd::{genex_strip, regex_replace_storing};
use crate::strutil::{filename_name, parse_leading_int};

/// Reads the list stored in `name`. None when the variable is not set.
fn get_list(ev: &mut Evaluator, name: &str) -> Option<Vec<String>> {
    let value = ev.get_definition(name)?.to_string();
    if value.is_empty() {
        return Some(Vec::new());
    }
    let list = expand_list_argument(&value, true);
    if !list.iter().any(String::is_empty) {
        return Some(list);
    }
    match ev.policy_status(CMP0007) {
        PolicyStatus::New => Some(list),
        PolicyStatus::Old => Some(expand_list_argument(&value, false)),
        PolicyStatus::Warn => {
            let text = format!("{} List has value = [{value}].", policy_warning(CMP0007));
            ev.issue_message(MessageType::AuthorWarning, &text);
            Some(expand_list_argument(&value, false))
        }
        PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => {
            ev.issue_message(MessageType::FatalError, &required_policy_error(CMP0007));
            None
        }
    }
}

/// Resolves a possibly negative index into `0..len`.
fn normalize_index(index: i64, len: usize) -> Result<usize> {
    let n = len as i64;
    let i = if index < 0 { n + index } else { index };
    if i < 0 || i >= n {
        error!("index: {i} out of range (-{len}, {})", n - 1);
    }
    Ok(i as usize)
}

pub fn list_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("must be called with at least two arguments.");
    }
    match args[0].as_str() {
        "LENGTH" => length(ev, &args),
        "GET" => get(ev, &args),
        "APPEND" => append(ev, &args, false),
        "PREPEND" => append(ev, &args, true),
        "FIND" => find(ev, &args),
        "INSERT" => insert(ev, &args),
        "JOIN" => join(ev, &args),
        "REMOVE_AT" => remove_at(ev, &args),
        "REMOVE_ITEM" => remove_item(ev, &args),
        "REMOVE_DUPLICATES" => remove_duplicates(ev, &args),
        "REVERSE" => reverse(ev, &args),
        "SORT" => sort(ev, &args),
        "SUBLIST" => sublist(ev, &args),
        "FILTER" => filter(ev, &args),
        "TRANSFORM" => transform(ev, &args),
        other => error!("does not recognize sub-command {other}"),
    }
}

fn length(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 3 {
        error!("sub-command LENGTH requires two arguments.");
    }
    let n = get_list(ev, &args[1]).map_or(0, |l| l.len());
    ev.add_definition(&args[2], &n.to_string());
    Ok(())
}

fn get(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 4 {
        error!("sub-command GET requires at least three arguments.");
    }
    let var = &args[args.len() - 1];
    let Some(list) = get_list(ev, &args[1]) else {
        ev.add_definition(var, "NOTFOUND");
        return Ok(());
    };
    if list.is_empty() {
        error!("GET given empty list");
    }
    let mut values = Vec::new();
    for index in &args[2..args.len() - 1] {
        let i = normalize_index(parse_leading_int(index), list.len())?;
        values.push(list[i].as_str());
    }
    ev.add_definition(var, &values.join(";"));
    Ok(())
}

fn append(ev: &mut Evaluator, args: &[String], prepend: bool) -> Result<()> {
    if args.len() < 3 {
        return Ok(());
    }
    let name = &args[1];
    let current = ev.get_safe_definition(name);
    let added = args[2..].join(";");
    let value = match (current.is_empty(), prepend) {
        (true, _) => added,
        (false, false) => format!("{current};{added}"),
        (false, true) => format!("{added};{current}"),
    };
    ev.add_definition(name, &value);
    Ok(())
}

fn find(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 4 {
        error!("sub-command FIND requires three arguments.");
    }
    let index = get_list(ev, &args[1])
        .and_then(|l| l.iter().position(|v| *v == args[2]))
        .map_or(-1, |i| i as i64);
    ev.add_definition(&args[3], &index.to_string());
    Ok(())
}

fn insert(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 4 {
        error!("sub-command INSERT requires at least three arguments.");
    }
    let name = &args[1];
    let index = parse_leading_int(&args[2]);
    let mut list = get_list(ev, name).unwrap_or_default();
    if list.is_empty() && index != 0 {
        error!("index: {index} out of range (0, 0)");
    }
    let len = list.len() as i64;
    let at = if index < 0 { len + index } else { index };
    if !list.is_empty() && (at < 0 || at > len) {
        error!("index: {at} out of range (-{len}, {len})");
    }
    let at = at as usize;
    list.splice(at..at, args[3..].iter().cloned());
    ev.add_definition(name, &list.join(";"));
    Ok(())
}

fn join(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 4 {
        error!("sub-command JOIN requires three arguments ({} found).", args.len() - 1);
    }
    let value = get_list(ev, &args[1]).map_or_else(String::new, |l| l.join(&args[2]));
    ev.add_definition(&args[3], &value);
    Ok(())
}

fn remove_at(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("sub-command REMOVE_AT requires at least two arguments.");
    }
    let name = &args[1];
    let Some(list) = get_list(ev, name) else {
        error!("sub-command REMOVE_AT requires list to be present.");
    };
    if list.is_empty() {
        error!("REMOVE_AT given empty list");
    }
    let mut removed = Vec::new();
    for index in &args[2..] {
        removed.push(normalize_index(parse_leading_int(index), list.len())?);
    }
    let kept: Vec<&str> = list
        .iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, v)| v.as_str())
        .collect();
    ev.add_definition(name, &kept.join(";"));
    Ok(())
}

fn remove_item(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("sub-command REMOVE_ITEM requires two or more arguments.");
    }
    let name = &args[1];
    let Some(mut list) = get_list(ev, name) else {
        error!("sub-command REMOVE_ITEM requires list to be present.");
    };
    list.retain(|v| !args[2..].contains(v));
    ev.add_definition(name, &list.join(";"));
    Ok(())
}

fn present_list(ev: &mut Evaluator, args: &[String], sub: &str) -> Result<Vec<String>> {
    if args.len() > 2 {
        error!("sub-command {sub} only takes one argument.");
    }
    match get_list(ev, &args[1]) {
        Some(list) => Ok(list),
        None => error!("sub-command {sub} requires list to be present."),
    }
}

fn remove_duplicates(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    let list = present_list(ev, args, "REMOVE_DUPLICATES")?;
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<&str> = list
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .map(String::as_str)
        .collect();
    ev.add_definition(&args[1], &unique.join(";"));
    Ok(())
}

fn reverse(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    let mut list = present_list(ev, args, "REVERSE")?;
    list.reverse();
    ev.add_definition(&args[1], &list.join(";"));
    Ok(())
}

fn sort(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() > 8 {
        error!("sub-command SORT only takes up to six arguments.");
    }
    let mut compare: Option<&str> = None;
    let mut case: Option<&str> = None;
    let mut order: Option<&str> = None;
    let mut i = 2;
    while i < args.len() {
        let option = args[i].as_str();
        i += 1;
        let (slot, allowed): (&mut Option<&str>, &[&str]) = match option {
            "COMPARE" => (&mut compare, &["STRING", "FILE_BASENAME"]),
            "CASE" => (&mut case, &["SENSITIVE", "INSENSITIVE"]),
            "ORDER" => (&mut order, &["ASCENDING", "DESCENDING"]),
            _ => error!("sub-command SORT option \"{option}\" is unknown."),
        };
        if slot.is_some() {
            error!("sub-command SORT option \"{option}\" has been specified multiple times.");
        }
        let Some(value) = args.get(i) else {
            error!("sub-command SORT missing argument for option \"{option}\".");
        };
        i += 1;
        if !allowed.contains(&value.as_str()) {
            error!("sub-command SORT value \"{value}\" for option \"{option}\" is invalid.");
        }
        *slot = Some(value.as_str());
    }

    let Some(mut list) = get_list(ev, &args[1]) else {
        error!("sub-command SORT requires list to be present.");
    };
    let key = |s: &String| -> String {
        let s = if compare == Some("FILE_BASENAME") { filename_name(s) } else { s.as_str() };
        if case == Some("INSENSITIVE") { s.to_lowercase() } else { s.to_string() }
    };
    list.sort_by_cached_key(key);
    if order == Some("DESCENDING") {
        list.reverse();
    }
    ev.add_definition(&args[1], &list.join(";"));
    Ok(())
}

fn sublist(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 5 {
        error!("sub-command SUBLIST requires four arguments ({} found).", args.len() - 1);
    }
    let var = &args[4];
    let list = get_list(ev, &args[1]).unwrap_or_default();
    if list.is_empty() {
        ev.add_definition(var, "");
        return Ok(());
    }
    let start = parse_leading_int(&args[2]);
    let length = parse_leading_int(&args[3]);
    if start < 0 || start as usize >= list.len() {
        error!("begin index: {start} is out of range 0 - {}", list.len() - 1);
    }
    if length < -1 {
        error!("length: {length} should be -1 or greater");
    }
    let start = start as usize;
    let end = if length == -1 {
        list.len()
    } else {
        (start + length as usize).min(list.len())
    };
    ev.add_definition(var, &list[start..end].join(";"));
    Ok(())
}

fn filter(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("sub-command FILTER requires an operator to be specified.");
    }
    if args.len() < 4 {
        error!("sub-command FILTER requires a mode to be specified.");
    }
    let name = &args[1];
    let Some(mut list) = get_list(ev, name) else {
        error!("sub-command FILTER requires list to be present.");
    };
    let include = match args[2].as_str() {
        "INCLUDE" => true,
        "EXCLUDE" => false,
        op => error!("sub-command FILTER does not recognize operator {op}"),
    };
    if args[3] != "REGEX" {
        error!("sub-command FILTER does not recognize mode {}", args[3]);
    }
    if args.len() != 5 {
        error!("sub-command FILTER, mode REGEX requires five arguments.");
    }
    let Ok(re) = Regex::new(&args[4]) else {
        error!("sub-command FILTER, mode REGEX failed to compile regex \"{}\".", args[4]);
    };
    list.retain(|v| re.is_match(v) == include);
    ev.add_definition(name, &list.join(";"));
    Ok(())
}

enum Action {
    Append(String),
    Prepend(String),
    ToLower,
    ToUpper,
    Strip,
    GenexStrip,
    Replace(Regex, String),
}

impl Action {
    fn apply(&self, ev: &mut Evaluator, s: &str) -> Result<String> {
        Ok(match self {
            Action::Append(suffix) => format!("{s}{suffix}"),
            Action::Prepend(prefix) => format!("{prefix}{s}"),
            Action::ToLower => s.to_ascii_lowercase(),
            Action::ToUpper => s.to_ascii_uppercase(),
            Action::Strip => s.trim_matches(|c: char| c.is_ascii_whitespace()).to_string(),
            Action::GenexStrip => genex_strip(s),
            Action::Replace(re, with) => match regex_replace_storing(ev, re, s, with) {
                Ok(out) => out,
                Err(e) => error!("sub-command TRANSFORM, action REPLACE: {}.", e.describe(re, with)),
            },
        })
    }
}

enum Selector {
    At(Vec<i64>),
    For { start: i64, stop: i64, step: i64 },
    Regex(Regex),
}

impl Selector {
    fn tag(&self) -> &'static str {
        match self {
            Selector::At(_) => "AT",
            Selector::For { .. } => "FOR",
            Selector::Regex(_) => "REGEX",
        }
    }

    fn index(&self, index: i64, len: usize) -> Result<usize> {
        let n = len as i64;
        let i = if index < 0 { n + index } else { index };
        if i < 0 || i >= n {
            error!(
                "sub-command TRANSFORM, selector {}, index: {i} out of range (-{len}, {}).",
                self.tag(),
                n - 1
            );
        }
        Ok(i as usize)
    }

    /// Marks the elements of `list` the action applies to.
    fn select(&self, list: &[String]) -> Result<Vec<bool>> {
        let mut picked = vec![false; list.len()];
        match self {
            Selector::At(indexes) => {
                for &i in indexes {
                    let i = self.index(i, list.len())?;
                    picked[i] = true;
                }
            }
            Selector::For { start, stop, step } => {
                let start = self.index(*start, list.len())?;
                let stop = self.index(*stop, list.len())?;
                if start > stop {
                    error!(
                        "sub-command TRANSFORM, selector FOR expects <start> to be less than or \
                         equal to <stop> ({start} > {stop})."
                    );
                }
                for i in (start..=stop).step_by(*step as usize) {
                    picked[i] = true;
                }
            }
            Selector::Regex(re) => {
                for (p, v) in picked.iter_mut().zip(list) {
                    *p = re.is_match(v);
                }
            }
        }
        Ok(picked)
    }
}

fn parse_whole_int(s: &str) -> Option<i64> {
    s.parse::<i64>().ok()
}

fn transform(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    let Some(action_name) = args.get(2) else {
        error!("sub-command TRANSFORM requires an action to be specified.");
    };
    let arity = match action_name.as_str() {
        "APPEND" | "PREPEND" => 1,
        "REPLACE" => 2,
        "TOLOWER" | "TOUPPER" | "STRIP" | "GENEX_STRIP" => 0,
        other => error!(" sub-command TRANSFORM, {other} invalid action."),
    };
    if args.len() < 3 + arity {
        error!("sub-command TRANSFORM, action {action_name} expects {arity} argument(s).");
    }
    let params = &args[3..3 + arity];
    let action = match action_name.as_str() {
        "APPEND" => Action::Append(params[0].clone()),
        "PREPEND" => Action::Prepend(params[0].clone()),
        "TOLOWER" => Action::ToLower,
        "TOUPPER" => Action::ToUpper,
        "STRIP" => Action::Strip,
        "GENEX_STRIP" => Action::GenexStrip,
        _ => {
            ev.clear_matches();
            let Ok(re) = Regex::new(&params[0]) else {
                error!(
                    "sub-command TRANSFORM, action REPLACE: Failed to compile regex \"{}\".",
                    params[0]
                );
            };
            Action::Replace(re, params[1].clone())
        }
    };

    let mut selector: Option<Selector> = None;
    let mut output = args[1].clone();
    let mut i = 3 + arity;
    while i < args.len() {
        let word = args[i].as_str();
        if matches!(word, "REGEX" | "AT" | "FOR") {
            if let Some(s) = &selector {
                error!("sub-command TRANSFORM, selector already specified ({}).", s.tag());
            }
        }
        match word {
            "REGEX" => {
                let Some(pattern) = args.get(i + 1) else {
                    error!("sub-command TRANSFORM, selector REGEX expects 'regular expression' argument.");
                };
                let Ok(re) = Regex::new(pattern) else {
                    error!("sub-command TRANSFORM, selector REGEX failed to compile regex \"{pattern}\".");
                };
                selector = Some(Selector::Regex(re));
                i += 2;
            }
            "AT" => {
                i += 1;
                let mut indexes = Vec::new();
                while let Some(n) = args.get(i).and_then(|a| parse_whole_int(a)) {
                    indexes.push(n);
                    i += 1;
                }
                if indexes.is_empty() {
                    error!("sub-command TRANSFORM, selector AT expects at least one numeric value.");
                }
                selector = Some(Selector::At(indexes));
            }
            "FOR" => {
                if args.len() <= i + 2 {
                    error!("sub-command TRANSFORM, selector FOR expects, at least, two arguments.");
                }
                let (Some(start), Some(stop)) = (parse_whole_int(&args[i + 1]), parse_whole_int(&args[i + 2]))
                else {
                    error!("sub-command TRANSFORM, selector FOR expects, at least, two numeric values.");
                };
                i += 3;
                let mut step = 1;
                if let Some(n) = args.get(i).and_then(|a| parse_whole_int(a)) {
                    step = n;
                    i += 1;
                }
                if step <= 0 {
                    error!("sub-command TRANSFORM, selector FOR expects non negative numeric value for <step>.");
                }
                selector = Some(Selector::For { start, stop, step });
            }
            "OUTPUT_VARIABLE" => {
                let Some(var) = args.get(i + 1) else {
                    error!("sub-command TRANSFORM, OUTPUT_VARIABLE expects variable name argument.");
                };
                output = var.clone();
                i += 2;
            }
            _ => error!("sub-command TRANSFORM, '{}': unexpected argument(s).", args[i..].join(" ")),
        }
    }

    let Some(mut list) = get_list(ev, &args[1]) else {
        ev.add_definition(&output, "");
        return Ok(());
    };
    let picked = match &selector {
        Some(selector) => selector.select(&list)?,
        None => vec![true; list.len()],
    };
    for (item, pick) in list.iter_mut().zip(picked) {
        if pick {
            *item = action.apply(ev, item)?;
        }
    }
    ev.add_definition(&output, &list.join(";"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::eval::testutil::{output, run};
    use crate::message::MessageType;

    fn errors(ev: &crate::eval::Evaluator) -> Vec<&str> {
        ev.messenger.texts(MessageType::FatalError)
    }

    #[test]
    fn test_append_creates_list() {
        let ev = run("list(APPEND L a)\nlist(APPEND L b c)\nlist(PREPEND L z)\nmessage(\"${L}\")\n");
        assert_eq!(output(&ev), vec!["z;a;b;c"]);
    }

    #[test]
    fn test_append_then_remove_item() {
        let ev = run(
            "set(L a b a c)\nlist(APPEND L d)\nlist(REMOVE_ITEM L a)\nmessage(\"${L}\")\n\
             list(REMOVE_DUPLICATES L)\nlist(LENGTH L n)\nmessage(${n})\n",
        );
        assert_eq!(output(&ev), vec!["b;c;d", "3"]);
    }

    #[test]
    fn test_get_and_find() {
        let ev = run(
            "set(L a b c)\nlist(GET L 0 -1 out)\nmessage(\"${out}\")\nlist(FIND L c i)\n\
             list(FIND L x j)\nmessage(\"${i} ${j}\")\nlist(GET U 0 nf)\nmessage(${nf})\n",
        );
        assert_eq!(output(&ev), vec!["a;c", "2 -1", "NOTFOUND"]);
    }

    #[test]
    fn test_get_out_of_range() {
        let ev = run("set(L a b)\nlist(GET L 2 out)\n");
        assert_eq!(errors(&ev), vec!["list index: 2 out of range (-2, 1)"]);
    }

    #[test]
    fn test_insert_remove_at_reverse_sort() {
        let ev = run(
            "set(L c a b)\nlist(INSERT L 1 x y)\nmessage(\"${L}\")\nlist(REMOVE_AT L 0 -1)\n\
             message(\"${L}\")\nlist(REVERSE L)\nmessage(\"${L}\")\nlist(SORT L)\n\
             message(\"${L}\")\nlist(SORT L ORDER DESCENDING)\nmessage(\"${L}\")\n",
        );
        assert_eq!(output(&ev), vec!["c;x;y;a;b", "x;y;a", "a;y;x", "a;x;y", "y;x;a"]);
    }

    #[test]
    fn test_sort_options() {
        let ev = run("set(L b A c)\nlist(SORT L CASE INSENSITIVE)\nmessage(\"${L}\")\n");
        assert_eq!(output(&ev), vec!["A;b;c"]);
        let ev = run("set(L b)\nlist(SORT L COMPARE NATURAL)\n");
        assert_eq!(
            errors(&ev),
            vec!["list sub-command SORT value \"NATURAL\" for option \"COMPARE\" is invalid."]
        );
    }

    #[test]
    fn test_join_sublist_filter() {
        let ev = run(
            "set(L a1 b2 a3 c4)\nlist(JOIN L \"-\" j)\nmessage(${j})\nlist(SUBLIST L 1 2 s)\n\
             message(\"${s}\")\nlist(SUBLIST L 2 -1 t)\nmessage(\"${t}\")\n\
             list(FILTER L INCLUDE REGEX \"^a\")\nmessage(\"${L}\")\n",
        );
        assert_eq!(output(&ev), vec!["a1-b2-a3-c4", "b2;a3", "a3;c4", "a1;a3"]);
    }

    #[test]
    fn test_transform() {
        let ev = run(
            "set(L a b c)\nlist(TRANSFORM L TOUPPER AT 0 2)\nmessage(\"${L}\")\n\
             list(TRANSFORM L APPEND .o OUTPUT_VARIABLE O)\nmessage(\"${O}\")\n\
             list(TRANSFORM L REPLACE \"([A-Z])\" \"<\\\\1>\" REGEX \"^[AC]$\")\nmessage(\"${L}\")\n",
        );
        assert_eq!(output(&ev), vec!["A;b;C", "A.o;b.o;C.o", "<A>;b;<C>"]);
    }

    #[test]
    fn test_transform_for_reversed_range() {
        let ev = run("set(L a b c d)\nlist(TRANSFORM L TOUPPER FOR 3 1)\nmessage(\"${L}\")\n");
        assert_eq!(
            errors(&ev),
            vec![
                "list sub-command TRANSFORM, selector FOR expects <start> to be less than or \
                 equal to <stop> (3 > 1)."
            ]
        );
    }

    #[test]
    fn test_empty_elements_follow_cmp0007() {
        let ev = run("cmake_policy(SET CMP0007 NEW)\nset(L \"a;;b\")\nlist(LENGTH L n)\nmessage(${n})\n");
        assert_eq!(output(&ev), vec!["3"]);
        let ev = run("set(L \"a;;b\")\nlist(LENGTH L n)\nmessage(${n})\n");
        assert_eq!(output(&ev), vec!["2"]);
        assert_eq!(ev.messenger.texts(MessageType::AuthorWarning).len(), 1);
    }

    #[test]
    fn test_unknown_subcommand() {
        let ev = run("list(FOO L)\n");
        assert_eq!(errors(&ev), vec!["list does not recognize sub-command FOO"]);
    }
}
