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

//! Built-in commands for control flow, variables, policies and file
//! inclusion.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::blocker::{Body, DefBlock, ForEachBlock, IfBlock, Pending, WhileBlock};
use crate::cache::CacheEntryType;
use crate::cond::if_error_prefix;
use crate::error;
use crate::eval::{CMAKE_VERSION, Evaluator, ExecutionStatus};
use crate::expand::expand_list_argument;
use crate::fileutil::host_system_info;
use crate::log;
use crate::message::MessageType;
use crate::policy::{CMP0055, CMP0077, PolicyId, PolicyStatus, parse_status, policy_warning};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::strutil::{collapse_full_path, is_full_path, is_on, parse_leading_int, version_compare};

const CMP0014: PolicyId = PolicyId(14);

fn bool_value(b: bool) -> &'static str {
    if b { "ON" } else { "OFF" }
}

/// The name inside `ENV{...}`, if `var` has that form.
fn env_var_name(var: &str) -> Option<&str> {
    let inner = var.strip_prefix("ENV{")?;
    if var.len() <= 5 {
        return None;
    }
    // The closing brace is assumed, not checked.
    let (last, _) = inner.char_indices().last()?;
    Some(&inner[..last])
}

fn put_env(name: &str, value: Option<&str>) {
    log!("env {name}={value:?}");
    // SAFETY: commands execute on the one interpreter thread, and child
    // processes are only spawned from that thread.
    unsafe {
        match value {
            Some(v) => std::env::set_var(name, v),
            None => std::env::remove_var(name),
        }
    }
}

fn raw_args(ev: &Evaluator) -> Vec<crate::stmt::Argument> {
    ev.current_command().map(|s| s.args.clone()).unwrap_or_default()
}

// Blocks.

pub fn if_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let cond = ev.evaluate_condition(args);
    if let Some((t, msg)) = &cond.message {
        let text = format!("if {}{msg}", if_error_prefix(args));
        ev.issue_message(*t, &text);
        if *t == MessageType::FatalError {
            return Ok(());
        }
    }
    let block = IfBlock {
        body: Body::new(ev.current_frame()),
        args: raw_args(ev),
        is_blocking: !cond.value,
        has_run: cond.value,
    };
    ev.add_pending(Pending::If(block));
    Ok(())
}

/// Expands `RANGE [start] stop [step]` into the loop items.
fn foreach_range(args: &[String]) -> Result<Vec<String>> {
    let nums: Vec<i64> = args[2..].iter().map(|a| parse_leading_int(a)).collect();
    let (start, stop, mut step) = match nums.as_slice() {
        [stop] => (0, *stop, 0),
        [start, stop] => (*start, *stop, 0),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 0),
    };
    if step == 0 {
        step = if start > stop { -1 } else { 1 };
    }
    if (start > stop && step > 0) || (start < stop && step < 0) {
        error!("called with incorrect range specification: start {start}, stop {stop}, step {step}");
    }
    let mut items = Vec::new();
    let mut i = start;
    loop {
        if (step > 0 && i > stop) || (step < 0 && i < stop) {
            break;
        }
        items.push(i.to_string());
        if i == stop {
            break;
        }
        match i.checked_add(step) {
            Some(n) => i = n,
            None => break,
        }
    }
    Ok(items)
}

pub fn foreach_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let mut items = vec![args[0].clone()];
    if args.len() > 1 && args[1] == "IN" {
        #[derive(PartialEq)]
        enum Doing {
            None,
            Lists,
            Items,
        }
        let mut doing = Doing::None;
        for arg in &args[2..] {
            if doing == Doing::Items {
                items.push(arg.clone());
            } else if arg == "LISTS" {
                doing = Doing::Lists;
            } else if arg == "ITEMS" {
                doing = Doing::Items;
            } else if doing == Doing::Lists {
                if let Some(value) = ev.get_definition(arg).filter(|v| !v.is_empty()) {
                    items.extend(expand_list_argument(value, true));
                }
            } else {
                ev.issue_message(MessageType::FatalError, &format!("Unknown argument:\n  {arg}\n"));
                return Ok(());
            }
        }
    } else if args.len() > 1 && args[1] == "RANGE" {
        items.extend(foreach_range(&args)?);
    } else {
        items.extend(args[1..].iter().cloned());
    }
    let block = ForEachBlock {
        body: Body::new(ev.current_frame()),
        args: items,
    };
    ev.add_pending(Pending::ForEach(block));
    Ok(())
}

pub fn while_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let block = WhileBlock {
        body: Body::new(ev.current_frame()),
        args: raw_args(ev),
    };
    ev.add_pending(Pending::While(block));
    Ok(())
}

fn definition_block(ev: &Evaluator, args: &[ExpandedArgument]) -> Result<DefBlock> {
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    Ok(DefBlock {
        body: Body::new(ev.current_frame()),
        args: argument_values(args),
    })
}

pub fn function_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let block = definition_block(ev, args)?;
    ev.add_pending(Pending::Function(block));
    Ok(())
}

pub fn macro_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let block = definition_block(ev, args)?;
    ev.add_pending(Pending::Macro(block));
    Ok(())
}

/// Reports misuse of `break()` as CMP0055 dictates. Returns false if the
/// command must fail.
fn report_break_misuse(ev: &mut Evaluator, text: &str) -> bool {
    let (t, prefix) = match ev.policy_status(CMP0055) {
        PolicyStatus::Old => return true,
        PolicyStatus::Warn => (MessageType::AuthorWarning, format!("{}\n", policy_warning(CMP0055))),
        _ => (MessageType::FatalError, String::new()),
    };
    ev.issue_message(t, &format!("{prefix}{text}"));
    t != MessageType::FatalError
}

pub fn break_command(ev: &mut Evaluator, args: &[ExpandedArgument], status: &mut ExecutionStatus) -> Result<()> {
    if !ev.is_loop_block()
        && !report_break_misuse(
            ev,
            "A BREAK command was found outside of a proper FOREACH or WHILE loop scope.",
        )
    {
        return Ok(());
    }
    status.break_invoked = true;
    if !args.is_empty() {
        report_break_misuse(ev, "The BREAK command does not accept any arguments.");
    }
    Ok(())
}

pub fn continue_command(ev: &mut Evaluator, args: &[ExpandedArgument], status: &mut ExecutionStatus) -> Result<()> {
    if !ev.is_loop_block() {
        ev.issue_message(
            MessageType::FatalError,
            "A CONTINUE command was found outside of a proper FOREACH or WHILE loop scope.",
        );
        return Ok(());
    }
    status.continue_invoked = true;
    if !args.is_empty() {
        ev.issue_message(MessageType::FatalError, "The CONTINUE command does not accept any arguments.");
    }
    Ok(())
}

pub fn return_command(_: &mut Evaluator, _: &[ExpandedArgument], status: &mut ExecutionStatus) -> Result<()> {
    status.return_invoked = true;
    Ok(())
}

// Variables.

pub fn set_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let variable = args[0].as_str();
    if let Some(name) = env_var_name(variable) {
        let current = std::env::var(name).ok();
        match args.get(1).filter(|v| !v.is_empty()) {
            Some(value) => {
                if current.as_deref() != Some(value.as_str()) {
                    put_env(name, Some(value));
                }
            }
            None => {
                if current.is_some() {
                    put_env(name, Some(""));
                }
            }
        }
        return Ok(());
    }

    if args.len() == 1 {
        ev.remove_definition(variable);
        return Ok(());
    }
    let last = args[args.len() - 1].as_str();
    if args.len() == 2 && last == "PARENT_SCOPE" {
        ev.raise_scope(variable, None);
        return Ok(());
    }

    let mut parent_scope = false;
    let mut force = false;
    let mut cache = false;
    let mut ignore_last = 0;
    if last == "PARENT_SCOPE" {
        parent_scope = true;
        ignore_last += 1;
    } else {
        if args.len() > 4 && last == "FORCE" {
            force = true;
            ignore_last += 1;
        }
        if args.len() > 3 && args[args.len() - 3 - usize::from(force)] == "CACHE" {
            cache = true;
            ignore_last += 3;
        }
    }
    let value = args[1..args.len() - ignore_last].join(";");

    if parent_scope {
        ev.raise_scope(variable, Some(&value));
        return Ok(());
    }
    if last == "CACHE" || args[args.len() - 2] == "CACHE" || (force && !cache) {
        error!("given invalid arguments for CACHE mode.");
    }
    if !cache {
        ev.add_definition(variable, &value);
        return Ok(());
    }

    let cache_start = args.len() - 3 - usize::from(force);
    let ty = CacheEntryType::parse(&args[cache_start + 1]).unwrap_or(CacheEntryType::String);
    let doc = args[cache_start + 2].clone();
    let exists = ev
        .cache
        .get(variable)
        .is_some_and(|e| e.ty != CacheEntryType::Uninitialized);
    if exists && ty != CacheEntryType::Internal && !force {
        return Ok(());
    }
    ev.add_cache_definition(variable, &value, &doc, ty, force);
    Ok(())
}

pub fn unset_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() || args.len() > 2 {
        error!("called with incorrect number of arguments");
    }
    let variable = args[0].as_str();
    if let Some(name) = env_var_name(variable) {
        put_env(name, None);
        return Ok(());
    }
    match args.get(1).map(String::as_str) {
        None => ev.remove_definition(variable),
        Some("CACHE") => ev.remove_cache_definition(variable),
        Some("PARENT_SCOPE") => ev.raise_scope(variable, None),
        Some(_) => error!("called with an invalid second argument"),
    }
    Ok(())
}

pub fn option_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 || args.len() > 3 {
        error!("called with incorrect number of arguments: {}", args.join(" "));
    }
    let name = args[0].as_str();
    let exists_before = ev.vars.get(name).is_some();
    let check_and_warn = match ev.policy_status(CMP0077) {
        PolicyStatus::Warn => exists_before,
        PolicyStatus::Old => false,
        _ => {
            if exists_before {
                return Ok(());
            }
            false
        }
    };

    let existing = ev.cache.get(name).map(|e| (e.value.clone(), e.ty));
    if let Some((_, ty)) = &existing {
        if *ty != CacheEntryType::Uninitialized {
            if let Some(entry) = ev.cache.get_mut(name) {
                entry.set_property("HELPSTRING", &args[1]);
            }
            return Ok(());
        }
    }
    let mut initial = existing.map_or_else(|| "Off".to_string(), |(v, _)| v);
    if let Some(v) = args.get(2) {
        initial = v.clone();
    }
    ev.add_cache_definition(name, bool_value(is_on(&initial)), &args[1], CacheEntryType::Bool, false);

    if check_and_warn && ev.vars.get(name).is_none() {
        let text = format!(
            "{}\nFor compatibility with older versions of CMake, option is clearing the normal \
             variable '{name}'.",
            policy_warning(CMP0077)
        );
        ev.issue_message(MessageType::AuthorWarning, &text);
    }
    Ok(())
}

pub fn mark_as_advanced_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let (value, overwrite, names) = match args[0].as_str() {
        "CLEAR" => ("0", true, &args[1..]),
        "FORCE" => ("1", true, &args[1..]),
        _ => ("1", false, &args[..]),
    };
    for name in names {
        if ev.cache.get(name).is_none() {
            ev.cache.set(name, "", CacheEntryType::Uninitialized, None);
        }
        if let Some(entry) = ev.cache.get_mut(name) {
            if overwrite || entry.get_property("ADVANCED").is_none() {
                entry.set_property("ADVANCED", value);
            }
        }
    }
    Ok(())
}

/// Escapes `;` so a value survives being stored in a list.
fn escape_semicolons(s: &str) -> String {
    s.replace(';', "\\;")
}

pub fn cmake_parse_arguments_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 4 {
        error!("must be called with at least 4 arguments.");
    }
    let mut rest = args.as_slice();
    let mut argv_start = None;
    if rest[0] == "PARSE_ARGV" {
        if args.len() != 6 {
            ev.issue_message(MessageType::FatalError, "PARSE_ARGV must be called with exactly 6 arguments.");
            return Ok(());
        }
        let Ok(n) = rest[1].parse::<usize>() else {
            let text = format!("PARSE_ARGV index '{}' is not an unsigned integer", rest[1]);
            ev.issue_message(MessageType::FatalError, &text);
            return Ok(());
        };
        argv_start = Some(n);
        rest = &rest[2..];
    }
    let prefix = format!("{}_", rest[0]);

    let mut seen = std::collections::HashSet::new();
    let mut keywords = |list: &str, ev: &mut Evaluator| -> Vec<String> {
        let names = expand_list_argument(list, false);
        for name in &names {
            if !seen.insert(name.clone()) {
                ev.issue_message(MessageType::Warning, &format!("keyword defined more than once: {name}"));
            }
        }
        names
    };
    let mut options: BTreeMap<String, bool> = keywords(&rest[1], &mut *ev).into_iter().map(|k| (k, false)).collect();
    let mut singles: BTreeMap<String, Option<String>> =
        keywords(&rest[2], &mut *ev).into_iter().map(|k| (k, None)).collect();
    let mut multis: BTreeMap<String, Vec<String>> =
        keywords(&rest[3], &mut *ev).into_iter().map(|k| (k, Vec::new())).collect();

    let values: Vec<String> = match argv_start {
        None => rest[4..]
            .iter()
            .flat_map(|a| expand_list_argument(a, false))
            .collect(),
        Some(start) => {
            let argc = ev.get_safe_definition("ARGC");
            let Ok(count) = argc.parse::<usize>() else {
                let text = format!("PARSE_ARGV called with ARGC='{argc}' that is not an unsigned integer");
                ev.issue_message(MessageType::FatalError, &text);
                return Ok(());
            };
            let mut values = Vec::new();
            for i in start..count {
                let name = format!("ARGV{i}");
                let Some(v) = ev.get_definition(&name) else {
                    ev.issue_message(MessageType::FatalError, &format!("PARSE_ARGV called with {name} not set"));
                    return Ok(());
                };
                values.push(v.to_string());
            }
            values
        }
    };
    let escape = |v: &str| if argv_start.is_some() { escape_semicolons(v) } else { v.to_string() };

    enum Inside {
        None,
        Single(String),
        Multi(String),
    }
    let mut inside = Inside::None;
    let mut unparsed = Vec::new();
    for value in &values {
        if let Some(set) = options.get_mut(value) {
            *set = true;
            inside = Inside::None;
            continue;
        }
        if singles.contains_key(value) {
            inside = Inside::Single(value.clone());
            continue;
        }
        if multis.contains_key(value) {
            inside = Inside::Multi(value.clone());
            continue;
        }
        match &inside {
            Inside::Single(key) => {
                singles.insert(key.clone(), Some(value.clone()));
                inside = Inside::None;
            }
            Inside::Multi(key) => {
                if let Some(list) = multis.get_mut(key) {
                    list.push(escape(value));
                }
            }
            Inside::None => unparsed.push(escape(value)),
        }
    }

    for (key, set) in &options {
        ev.add_definition(&format!("{prefix}{key}"), if *set { "TRUE" } else { "FALSE" });
    }
    for (key, value) in &singles {
        match value.as_deref().filter(|v| !v.is_empty()) {
            Some(v) => ev.add_definition(&format!("{prefix}{key}"), v),
            None => ev.remove_definition(&format!("{prefix}{key}")),
        }
    }
    for (key, list) in &multis {
        if list.is_empty() {
            ev.remove_definition(&format!("{prefix}{key}"));
        } else {
            ev.add_definition(&format!("{prefix}{key}"), &list.join(";"));
        }
    }
    let name = format!("{prefix}UNPARSED_ARGUMENTS");
    if unparsed.is_empty() {
        ev.remove_definition(&name);
    } else {
        ev.add_definition(&name, &unparsed.join(";"));
    }
    Ok(())
}

/// Splits a command line the way a POSIX shell tokenizes words.
pub fn parse_unix_command_line(cmd: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = cmd.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => cur.push(c),
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
                in_word = true;
            }
            (Some('"'), '"') => quote = None,
            (Some(_), _) => cur.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_ascii_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut cur));
                    in_word = false;
                }
            }
            (None, _) => {
                cur.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        out.push(cur);
    }
    out
}

/// Splits a command line with the MSVC runtime's quoting rules.
pub fn parse_windows_command_line(cmd: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut in_quotes = false;
    let mut backslashes = 0usize;
    for c in cmd.chars() {
        if c == '\\' {
            backslashes += 1;
            in_word = true;
            continue;
        }
        if c == '"' {
            cur.extend(std::iter::repeat_n('\\', backslashes / 2));
            if backslashes % 2 == 1 {
                cur.push('"');
            } else {
                in_quotes = !in_quotes;
            }
            backslashes = 0;
            in_word = true;
            continue;
        }
        cur.extend(std::iter::repeat_n('\\', backslashes));
        backslashes = 0;
        if !in_quotes && (c == ' ' || c == '\t') {
            if in_word {
                out.push(std::mem::take(&mut cur));
                in_word = false;
            }
        } else {
            cur.push(c);
            in_word = true;
        }
    }
    cur.extend(std::iter::repeat_n('\\', backslashes));
    if in_word {
        out.push(cur);
    }
    out
}

pub fn separate_arguments_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("must be given at least one argument.");
    }
    #[derive(PartialEq)]
    enum Mode {
        Old,
        Unix,
        Windows,
    }
    let var = &args[0];
    let mut mode = Mode::Old;
    let mut command = None;
    for arg in &args[1..] {
        if mode == Mode::Old && command.is_none() {
            mode = match arg.as_str() {
                "NATIVE_COMMAND" | "UNIX_COMMAND" => Mode::Unix,
                "WINDOWS_COMMAND" => Mode::Windows,
                _ => error!("given unknown argument {arg}"),
            };
        } else if command.is_none() {
            command = Some(arg.as_str());
        } else {
            error!("given unknown argument {arg}");
        }
    }
    if mode == Mode::Old {
        if let Some(value) = ev.get_definition(var) {
            let value = value.replace(' ', ";");
            ev.add_definition(var, &value);
        }
        return Ok(());
    }
    let command = command.unwrap_or_default();
    let words = if mode == Mode::Unix {
        parse_unix_command_line(command)
    } else {
        parse_windows_command_line(command)
    };
    let value = words
        .iter()
        .map(|w| escape_semicolons(w))
        .collect::<Vec<_>>()
        .join(";");
    ev.add_definition(var, &value);
    Ok(())
}

// Diagnostics.

pub fn message_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let mut fatal = false;
    let mut kind = None;
    let mut status = false;
    let mut rest = &args[1..];
    match args[0].as_str() {
        "SEND_ERROR" => kind = Some(MessageType::FatalError),
        "FATAL_ERROR" => {
            fatal = true;
            kind = Some(MessageType::FatalError);
        }
        "WARNING" => kind = Some(MessageType::Warning),
        "AUTHOR_WARNING" => {
            if ev.is_definition_set("CMAKE_SUPPRESS_DEVELOPER_ERRORS")
                && !ev.is_on("CMAKE_SUPPRESS_DEVELOPER_ERRORS")
            {
                fatal = true;
                kind = Some(MessageType::AuthorError);
            } else if !ev.is_on("CMAKE_SUPPRESS_DEVELOPER_WARNINGS") {
                kind = Some(MessageType::AuthorWarning);
            } else {
                return Ok(());
            }
        }
        "STATUS" => status = true,
        "DEPRECATION" => {
            if ev.is_on("CMAKE_ERROR_DEPRECATED") {
                fatal = true;
                kind = Some(MessageType::DeprecationError);
            } else if !ev.is_definition_set("CMAKE_WARN_DEPRECATED") || ev.is_on("CMAKE_WARN_DEPRECATED") {
                kind = Some(MessageType::DeprecationWarning);
            } else {
                return Ok(());
            }
        }
        _ => rest = &args[..],
    }
    let text = rest.concat();
    match kind {
        Some(t) => ev.display_message(t, &text),
        None if status => ev.messenger.display_status(&text),
        None => ev.messenger.display_plain(&text),
    }
    if fatal {
        ev.set_fatal_error();
    }
    Ok(())
}

// Files and directories.

/// Looks for `<name>` in `CMAKE_MODULE_PATH`, then in `CMAKE_ROOT/Modules`.
fn find_module_file(ev: &Evaluator, name: &str) -> Option<String> {
    let mut dirs = expand_list_argument(&ev.get_safe_definition("CMAKE_MODULE_PATH"), false);
    if let Some(root) = ev.get_definition("CMAKE_ROOT") {
        dirs.push(format!("{root}/Modules"));
    }
    dirs.into_iter()
        .map(|d| format!("{}/{name}", d.replace('\\', "/")))
        .find(|p| Path::new(p).is_file())
}

pub fn include_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() || args.len() > 4 {
        error!("called with wrong number of arguments.  include() only takes one file.");
    }
    let mut optional = false;
    let mut no_policy_scope = false;
    let mut result_var: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "OPTIONAL" => {
                if optional {
                    error!("called with invalid arguments: OPTIONAL used twice");
                }
                optional = true;
            }
            "RESULT_VARIABLE" => {
                if result_var.is_some() {
                    error!("called with invalid arguments: only one result variable allowed");
                }
                i += 1;
                match args.get(i) {
                    Some(v) => result_var = Some(v.clone()),
                    None => error!("called with no value for RESULT_VARIABLE."),
                }
            }
            "NO_POLICY_SCOPE" => no_policy_scope = true,
            other if i > 1 => error!("called with invalid argument: {other}"),
            _ => {}
        }
        i += 1;
    }

    let mut fname = args[0].clone();
    if fname.is_empty() {
        ev.issue_message(MessageType::AuthorWarning, "include() given empty file name (ignored).");
        return Ok(());
    }
    if !is_full_path(&fname) {
        if let Some(module) = find_module_file(ev, &format!("{fname}.cmake")) {
            fname = module;
        }
    }
    let list_file = collapse_full_path(&fname, &ev.current_source_dir());
    if optional && !Path::new(&list_file).exists() {
        if let Some(var) = &result_var {
            ev.add_definition(var, "NOTFOUND");
        }
        return Ok(());
    }

    let read = ev.read_dependent_file(&list_file, no_policy_scope);
    if let Some(var) = &result_var {
        ev.add_definition(var, if read { &list_file } else { "NOTFOUND" });
    }
    if !optional && !read && !ev.fatal_error_occurred() {
        error!("could not find load file:\n  {fname}");
    }
    Ok(())
}

/// The variable or property recording that a file was already included.
fn include_guard_name(file: &str) -> String {
    let sanitized: String = file
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__INCGUARD_{sanitized}__")
}

pub fn include_guard_command(ev: &mut Evaluator, args: &[ExpandedArgument], status: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() > 1 {
        error!("given an invalid number of arguments. The command takes at most 1 argument.");
    }
    let guard = include_guard_name(&ev.get_safe_definition("CMAKE_CURRENT_LIST_FILE"));
    let already = match args.first().map(String::as_str) {
        None => {
            let set = ev.is_definition_set(&guard);
            if !set {
                ev.add_definition(&guard, "ON");
            }
            set
        }
        Some("DIRECTORY") => {
            let set = ev.dirs.iter().any(|d| d.properties.contains_key(&guard));
            if !set {
                ev.directory_properties_mut().insert(guard, "TRUE".to_string());
            }
            set
        }
        Some("GLOBAL") => {
            let set = ev.global_properties.contains_key(&guard);
            if !set {
                ev.global_properties.insert(guard, "TRUE".to_string());
            }
            set
        }
        Some(other) => error!("given an invalid argument: {other}"),
    };
    if already {
        status.return_invoked = true;
    }
    Ok(())
}

pub fn add_subdirectory_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let src_arg = &args[0];
    let mut bin_arg: Option<&String> = None;
    for arg in &args[1..] {
        if arg == "EXCLUDE_FROM_ALL" {
            continue;
        }
        if bin_arg.is_some() {
            error!("called with incorrect number of arguments");
        }
        bin_arg = Some(arg);
    }

    let current_src = ev.current_source_dir();
    let current_bin = ev.current_binary_dir();
    let src_path = if is_full_path(src_arg) {
        src_arg.clone()
    } else {
        format!("{current_src}/{src_arg}")
    };
    if !Path::new(&src_path).is_dir() {
        error!("given source \"{src_arg}\" which is not an existing directory.");
    }
    let src_path = collapse_full_path(&src_path, &current_src);

    let bin_path = match bin_arg {
        Some(b) if is_full_path(b) => b.clone(),
        Some(b) => format!("{current_bin}/{b}"),
        None => {
            let src_root = current_src.trim_end_matches('/');
            let Some(rel) = src_path.strip_prefix(src_root).filter(|r| r.is_empty() || r.starts_with('/')) else {
                error!(
                    "not given a binary directory but the given source directory \"{src_path}\" \
                     is not a subdirectory of \"{current_src}\".  When specifying an out-of-tree \
                     source a binary directory must be explicitly specified."
                );
            };
            format!("{}{rel}", current_bin.trim_end_matches('/'))
        }
    };
    let bin_path = collapse_full_path(&bin_path, &current_bin);

    if !Path::new(&src_path).join("CMakeLists.txt").is_file() {
        let mut text = format!("The source directory\n  {src_path}\ndoes not contain a CMakeLists.txt file.");
        match ev.policy_status(CMP0014) {
            PolicyStatus::Old => ev.issue_message(MessageType::AuthorWarning, &text),
            PolicyStatus::Warn => {
                text.push('\n');
                text.push_str(&policy_warning(CMP0014));
                ev.issue_message(MessageType::AuthorWarning, &text);
            }
            _ => ev.issue_message(MessageType::FatalError, &text),
        }
        return Ok(());
    }
    ev.process_subdirectory(&src_path, &bin_path);
    Ok(())
}

// Policies.

/// Applies `min[...max]`: policies up to `max` (capped at the running
/// version) become NEW.
fn set_policy_version_range(ev: &mut Evaluator, version: &str) -> Result<bool> {
    let (min, max) = match version.split_once("...") {
        Some((min, max)) => {
            if min.is_empty() || max.is_empty() {
                error!("VERSION \"{version}\" does not have a version on both sides of \"...\".");
            }
            (min, Some(max))
        }
        None => (version, None),
    };
    let effective = match max {
        Some(max) if version_compare(max, min).is_lt() => {
            let text = format!("Policy VERSION range \"{version}\" specifies a larger minimum than maximum.");
            ev.issue_message(MessageType::FatalError, &text);
            return Ok(false);
        }
        Some(max) if version_compare(max, CMAKE_VERSION).is_gt() => {
            // Validate the minimum before capping.
            if !ev.set_policy_version(min) {
                return Ok(false);
            }
            CMAKE_VERSION
        }
        Some(max) => max,
        None => min,
    };
    Ok(ev.set_policy_version(effective))
}

pub fn cmake_minimum_required_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    let mut version = String::new();
    let mut doing_version = false;
    let mut unknown = Vec::new();
    for arg in &args {
        if arg == "VERSION" {
            doing_version = true;
        } else if arg == "FATAL_ERROR" {
            if doing_version {
                error!("called with no value for VERSION.");
            }
        } else if doing_version {
            doing_version = false;
            version = arg.clone();
        } else {
            unknown.push(arg.clone());
        }
    }
    if doing_version {
        error!("called with no value for VERSION.");
    }
    let enforce_unknown = |unknown: &[String]| -> Result<()> {
        if let Some(first) = unknown.first() {
            error!("called with unknown argument \"{first}\".");
        }
        Ok(())
    };
    if version.is_empty() {
        return enforce_unknown(&unknown);
    }

    let min = version.split_once("...").map_or(version.as_str(), |(min, _)| min);
    if let Some((lo, hi)) = version.split_once("...") {
        if lo.is_empty() || hi.is_empty() {
            error!("VERSION \"{version}\" does not have a version on both sides of \"...\".");
        }
    }
    ev.add_definition("CMAKE_MINIMUM_REQUIRED_VERSION", min);

    let parts: Vec<&str> = min.split('.').collect();
    let numeric = parts
        .iter()
        .take_while(|p| !p.is_empty() && p.bytes().all(|c| c.is_ascii_digit()))
        .count();
    if numeric < 2 {
        error!("could not parse VERSION \"{min}\".");
    }
    if version_compare(min, CMAKE_VERSION).is_gt() {
        let text = format!("CMake {min} or higher is required.  You are running version {CMAKE_VERSION}");
        ev.issue_message(MessageType::FatalError, &text);
        return Ok(());
    }
    enforce_unknown(&unknown)?;

    if version_compare(min, "2.4").is_lt() {
        ev.issue_message(
            MessageType::AuthorWarning,
            "Compatibility with CMake < 2.4 is not supported by CMake >= 3.0.",
        );
        ev.set_policy_version("2.4");
    } else {
        set_policy_version_range(ev, &version)?;
    }
    Ok(())
}

pub fn cmake_policy_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(mode) = args.first() else {
        error!("requires at least one argument.");
    };
    match mode.as_str() {
        "SET" => {
            if args.len() != 3 {
                error!("SET must be given exactly 2 additional arguments.");
            }
            let Some(status) = parse_status(&args[2]) else {
                error!("SET given unrecognized policy status \"{}\"", args[2]);
            };
            let Some(id) = PolicyId::parse(&args[1]) else {
                let text = format!("Policy \"{}\" is not known to this version of CMake.", args[1]);
                ev.issue_message(MessageType::FatalError, &text);
                error!("SET failed to set policy.");
            };
            if !ev.set_policy(id, status) {
                error!("SET failed to set policy.");
            }
            if id == PolicyId(1)
                && status == PolicyStatus::Old
                && ev.cache.value("CMAKE_BACKWARDS_COMPATIBILITY").is_none()
            {
                ev.add_cache_definition(
                    "CMAKE_BACKWARDS_COMPATIBILITY",
                    "2.4",
                    "For backwards compatibility, what version of CMake commands and syntax \
                     should this version of CMake try to support.",
                    CacheEntryType::String,
                    false,
                );
            }
        }
        "GET" => {
            if args.len() != 3 {
                error!("GET must be given exactly 2 additional arguments.");
            }
            let Some(id) = PolicyId::parse(&args[1]).filter(|id| crate::policy::policy_info(*id).is_some()) else {
                error!("GET given policy \"{}\" which is not known to this version of CMake.", args[1]);
            };
            match ev.policy_status(id) {
                PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => {
                    let text = format!(
                        "{}\nThe call to cmake_policy(GET {} ...) at which this error appears \
                         requests the policy, and this version of CMake requires that the policy \
                         be set to NEW before it is checked.",
                        crate::policy::required_policy_error(id),
                        args[1]
                    );
                    ev.issue_message(MessageType::FatalError, &text);
                }
                status => ev.add_definition(&args[2], status.as_str()),
            }
        }
        "PUSH" => {
            if args.len() > 1 {
                error!("PUSH may not be given additional arguments.");
            }
            ev.push_policy();
        }
        "POP" => {
            if args.len() > 1 {
                error!("POP may not be given additional arguments.");
            }
            ev.pop_policy();
        }
        "VERSION" => {
            if args.len() <= 1 {
                error!("VERSION not given an argument");
            }
            if args.len() >= 3 {
                error!("VERSION given too many arguments");
            }
            set_policy_version_range(ev, &args[1])?;
        }
        other => error!("given unknown first argument \"{other}\""),
    }
    Ok(())
}

// Commands kept for old projects. They are reachable only while the
// policy that removed them is not NEW.

pub fn build_name_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(var) = args.first() else {
        error!("called with incorrect number of arguments");
    };
    let sanitize = |s: &str| s.replace(['/', '(', ')'], "_");
    if let Some(value) = ev.get_definition(var).map(str::to_string) {
        if value.contains(['/', '(', ')']) {
            ev.add_cache_definition(var, &sanitize(&value), "Name of build.", CacheEntryType::String, false);
        }
        return Ok(());
    }
    let (system, processor) = host_system_info();
    let compiler = ev.get_safe_definition("CMAKE_CXX_COMPILER");
    let compiler_name = compiler.rsplit('/').next().unwrap_or_default();
    let name = sanitize(&format!("{system}-{processor}-{compiler_name}"));
    ev.add_cache_definition(var, &name, "Name of build.", CacheEntryType::String, false);
    Ok(())
}

pub fn subdir_depends_command(_: &mut Evaluator, _: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    Ok(())
}

pub fn variable_requires_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 3 {
        error!("called with incorrect number of arguments");
    }
    let test_var = &args[0];
    if !ev.is_on(test_var) {
        return Ok(());
    }
    let result_var = &args[1];
    let mut not_set = String::new();
    let mut has_advanced = false;
    for name in &args[2..] {
        if !ev.is_on(name) {
            not_set.push_str(name);
            not_set.push('\n');
            if ev.cache.get(name).is_some_and(|e| e.is_advanced()) {
                has_advanced = true;
            }
        }
    }
    let met = not_set.is_empty();
    let update = match ev.get_definition(result_var) {
        None => true,
        Some(v) => !met && ev.is_on(v),
    };
    if update {
        ev.add_definition(result_var, bool_value(met));
    }
    if !met {
        let mut text = format!(
            "Variable assertion failed:\n{test_var} Requires that the following unset variables \
             are set:\n{not_set}\nPlease set them, or set {test_var} to false, and re-configure.\n"
        );
        if has_advanced {
            text.push_str(
                "One or more of the required variables is advanced.  To set the variable, you \
                 must turn on advanced mode in cmake.",
            );
        }
        ev.display_message(MessageType::FatalError, &text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};

    fn errors(ev: &Evaluator) -> Vec<String> {
        ev.messenger
            .texts(MessageType::FatalError)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_set_and_unset() {
        let ev = run("set(A a b c)\nmessage(\"${A}\")\nset(A)\nmessage(\"[${A}]\")\nset(B x)\nunset(B)\nmessage(\"[${B}]\")\n");
        assert_eq!(output(&ev), vec!["a;b;c", "[]", "[]"]);
    }

    #[test]
    fn test_set_parent_scope() {
        let ev = run(
            "function(f)\n set(R inner PARENT_SCOPE)\n set(L local)\nendfunction()\nf()\n\
             message(\"${R}|${L}\")\n",
        );
        assert_eq!(output(&ev), vec!["inner|"]);
    }

    #[test]
    fn test_set_cache_keeps_existing_value() {
        let ev = run(
            "set(C first CACHE STRING \"doc\")\nset(C second CACHE STRING \"doc\")\n\
             message(${C})\nset(C third CACHE STRING \"doc\" FORCE)\nmessage(${C})\n",
        );
        assert_eq!(output(&ev), vec!["first", "third"]);
        assert_eq!(ev.cache.value("C"), Some("third"));
    }

    #[test]
    fn test_set_invalid_cache_arguments() {
        let ev = run("set(C v CACHE STRING)\n");
        assert_eq!(errors(&ev), vec!["set given invalid arguments for CACHE mode."]);
    }

    #[test]
    fn test_unset_invalid_second_argument() {
        let ev = run("unset(A B)\n");
        assert_eq!(errors(&ev), vec!["unset called with an invalid second argument"]);
    }

    #[test]
    fn test_env_variables() {
        let ev = run(
            "set(ENV{CMSCRIPT_FUNC_TEST} hello)\nmessage($ENV{CMSCRIPT_FUNC_TEST})\n\
             unset(ENV{CMSCRIPT_FUNC_TEST})\nif(NOT DEFINED ENV{CMSCRIPT_FUNC_TEST})\n \
             message(gone)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["hello", "gone"]);
    }

    #[test]
    fn test_foreach_forms() {
        let ev = run(
            "set(L a b)\nforeach(x IN LISTS L ITEMS c d)\n message(${x})\nendforeach()\n\
             foreach(i RANGE 1 7 3)\n message(${i})\nendforeach()\n",
        );
        assert_eq!(output(&ev), vec!["a", "b", "c", "d", "1", "4", "7"]);
    }

    #[test]
    fn test_foreach_range_rejects_wrong_direction() {
        let ev = run("foreach(i RANGE 1 5 -2)\nendforeach()\n");
        assert_eq!(
            errors(&ev),
            vec!["foreach called with incorrect range specification: start 1, stop 5, step -2"]
        );
        let ev = run("foreach(i RANGE 5 1 2)\nendforeach()\n");
        assert_eq!(
            errors(&ev),
            vec!["foreach called with incorrect range specification: start 5, stop 1, step 2"]
        );
    }

    #[test]
    fn test_foreach_range_near_integer_limit() {
        let ev = run(
            "foreach(x RANGE 9223372036854775806 9223372036854775807 5)\n message(${x})\nendforeach()\n",
        );
        assert_eq!(output(&ev), vec!["9223372036854775806"]);
    }

    #[test]
    fn test_foreach_unknown_in_argument() {
        let ev = run("foreach(x IN FOO a)\nendforeach()\n");
        assert_eq!(errors(&ev)[0], "Unknown argument:\n  FOO\n");
    }

    #[test]
    fn test_if_error_is_prefixed() {
        let ev = run("if(1 2)\nendif()\n");
        assert_eq!(
            errors(&ev),
            vec!["if given arguments:\n  \"1\" \"2\"\nUnknown arguments specified"]
        );
    }

    #[test]
    fn test_break_outside_loop_follows_cmp0055() {
        let ev = run("cmake_policy(SET CMP0055 NEW)\nbreak()\nmessage(after)\n");
        assert_eq!(
            errors(&ev),
            vec!["A BREAK command was found outside of a proper FOREACH or WHILE loop scope."]
        );
        assert!(output(&ev).is_empty());

        let ev = run("cmake_policy(SET CMP0055 OLD)\nbreak()\nmessage(after)\n");
        assert!(errors(&ev).is_empty());
    }

    #[test]
    fn test_continue_outside_loop() {
        let ev = run("continue()\n");
        assert_eq!(
            errors(&ev),
            vec!["A CONTINUE command was found outside of a proper FOREACH or WHILE loop scope."]
        );
    }

    #[test]
    fn test_quoted_arguments_under_policy_versions() {
        let script = "set(X 1)\nif(\"X\" STREQUAL \"1\")\n message(deref)\nelse()\n message(literal)\nendif()\n";
        let ev = run(&format!("cmake_minimum_required(VERSION 2.8)\n{script}"));
        assert_eq!(output(&ev), vec!["deref"]);
        assert_eq!(ev.messenger.texts(MessageType::AuthorWarning).len(), 1);
        let ev = run(&format!("cmake_minimum_required(VERSION 3.13)\n{script}"));
        assert_eq!(output(&ev), vec!["literal"]);
    }

    #[test]
    fn test_cmake_policy_get_set() {
        let ev = run(
            "cmake_policy(GET CMP0054 a)\ncmake_policy(SET CMP0054 NEW)\ncmake_policy(GET CMP0054 b)\n\
             cmake_policy(PUSH)\ncmake_policy(SET CMP0054 OLD)\ncmake_policy(POP)\n\
             cmake_policy(GET CMP0054 c)\nmessage(\"[${a}] ${b} ${c}\")\n",
        );
        assert_eq!(output(&ev), vec!["[] NEW NEW"]);
    }

    #[test]
    fn test_cmake_policy_errors() {
        let ev = run("cmake_policy(SET CMP9999 NEW)\n");
        assert_eq!(errors(&ev), vec!["Policy \"CMP9999\" is not known to this version of CMake."]);
        let ev = run("cmake_policy(FOO)\n");
        assert_eq!(errors(&ev), vec!["cmake_policy given unknown first argument \"FOO\""]);
        let ev = run("cmake_policy(POP)\n");
        assert_eq!(errors(&ev), vec!["cmake_policy POP without matching PUSH"]);
    }

    #[test]
    fn test_cmake_minimum_required() {
        let ev = run("cmake_minimum_required(VERSION 99.0)\nmessage(after)\n");
        assert_eq!(
            errors(&ev),
            vec!["CMake 99.0 or higher is required.  You are running version 3.13.4"]
        );
        assert!(output(&ev).is_empty());

        let ev = run("cmake_minimum_required(VERSION 3.5 FATAL_ERROR)\nmessage(${CMAKE_MINIMUM_REQUIRED_VERSION})\n");
        assert_eq!(output(&ev), vec!["3.5"]);
        assert_eq!(ev.policy_status(crate::policy::CMP0054), PolicyStatus::New);

        let ev = run("cmake_minimum_required(VERSION)\n");
        assert_eq!(errors(&ev), vec!["cmake_minimum_required called with no value for VERSION."]);
    }

    #[test]
    fn test_option() {
        let ev = run("option(O1 \"doc\")\noption(O2 \"doc\" ON)\nmessage(\"${O1} ${O2}\")\n");
        assert_eq!(output(&ev), vec!["OFF ON"]);

        let ev = run("cmake_policy(SET CMP0077 NEW)\nset(O3 keep)\noption(O3 \"doc\" ON)\nmessage(${O3})\n");
        assert_eq!(output(&ev), vec!["keep"]);
        assert!(ev.cache.get("O3").is_none());
    }

    #[test]
    fn test_message_modes() {
        let ev = run("message(STATUS \"a\" b)\nmessage(WARNING w)\nmessage(SEND_ERROR e)\nmessage(plain)\n");
        assert_eq!(output(&ev), vec!["-- ab", "plain"]);
        assert_eq!(ev.messenger.texts(MessageType::Warning), vec!["w"]);
        assert!(ev.error_occurred());
        assert!(!ev.fatal_error_occurred());

        let ev = run("message(FATAL_ERROR stop)\nmessage(after)\n");
        assert!(output(&ev).is_empty());
        assert!(ev.fatal_error_occurred());
    }

    #[test]
    fn test_cmake_parse_arguments() {
        let ev = run(
            "cmake_parse_arguments(P \"OPT;NOPE\" \"ONE\" \"MANY\" OPT ONE x MANY a b extra)\n\
             message(\"${P_OPT} ${P_NOPE} ${P_ONE} ${P_MANY}\")\n",
        );
        assert_eq!(output(&ev), vec!["TRUE FALSE x a;b;extra"]);

        let ev = run(
            "function(f)\n cmake_parse_arguments(PARSE_ARGV 0 P \"\" \"\" \"L\")\n \
             message(\"${P_L}|${P_UNPARSED_ARGUMENTS}\")\nendfunction()\nf(u L \"a;b\" c)\n",
        );
        assert_eq!(output(&ev), vec!["a\\;b;c|u"]);
    }

    #[test]
    fn test_separate_arguments() {
        let ev = run(
            "separate_arguments(V UNIX_COMMAND \"cc -DX='a b' \\\"q r\\\"\")\nmessage(\"${V}\")\n\
             set(O \"x y z\")\nseparate_arguments(O)\nmessage(\"${O}\")\n",
        );
        assert_eq!(output(&ev), vec!["cc;-DX=a b;q r", "x;y;z"]);
    }

    #[test]
    fn test_command_line_parsers() {
        assert_eq!(parse_unix_command_line(r#"a\ b 'c d' "e\"f""#), vec!["a b", "c d", "e\"f"]);
        assert_eq!(parse_windows_command_line(r#"a\\b "c d" e\"f"#), vec!["a\\\\b", "c d", "e\"f"]);
    }

    #[test]
    fn test_include_with_result_variable() {
        let dir = tempfile::tempdir().unwrap();
        let inc = dir.path().join("inc.cmake");
        std::fs::write(&inc, "message(included)\n").unwrap();
        let path = inc.to_str().unwrap();
        let ev = run(&format!(
            "include({path} RESULT_VARIABLE R)\nmessage(${{R}})\n\
             include({path}.missing OPTIONAL RESULT_VARIABLE M)\nmessage(${{M}})\n"
        ));
        assert_eq!(output(&ev), vec!["included", path, "NOTFOUND"]);
    }

    #[test]
    fn test_include_errors() {
        let ev = run("include(/no/such/file.cmake)\n");
        assert_eq!(errors(&ev), vec!["include could not find load file:\n  /no/such/file.cmake"]);
        let ev = run("include(a OPTIONAL OPTIONAL)\n");
        assert_eq!(errors(&ev), vec!["include called with invalid arguments: OPTIONAL used twice"]);
    }

    #[test]
    fn test_include_module_path_and_guard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Mod.cmake"),
            "include_guard(GLOBAL)\nmessage(loaded)\n",
        )
        .unwrap();
        let ev = run(&format!(
            "set(CMAKE_MODULE_PATH {})\ninclude(Mod)\ninclude(Mod)\n",
            dir.path().display()
        ));
        assert_eq!(output(&ev), vec!["loaded"]);
    }

    #[test]
    fn test_mark_as_advanced() {
        let ev = run("set(A 1 CACHE BOOL \"\")\nmark_as_advanced(A)\n");
        assert!(ev.cache.get("A").is_some_and(|e| e.is_advanced()));
        let ev = run("set(A 1 CACHE BOOL \"\")\nmark_as_advanced(A)\nmark_as_advanced(CLEAR A)\n");
        assert!(!ev.cache.get("A").is_some_and(|e| e.is_advanced()));
    }
}
