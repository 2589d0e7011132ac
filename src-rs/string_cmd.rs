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

//! `string()`, plus the regex replacement and configure helpers shared with
//! `list()` and `configure_file()`.

use std::cmp::Ordering;
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};

use crate::error;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::expand::ExpandOptions;
use crate::stmt::{ExpandedArgument, argument_values};
use crate::strutil::{is_off, parse_leading_int};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    UnknownEscape(char),
    OutOfRange,
    EmptyMatch,
}

impl ReplaceError {
    /// The diagnostic for replacing `re` by `with`.
    pub fn describe(&self, re: &Regex, with: &str) -> String {
        match self {
            ReplaceError::UnknownEscape(c) => format!("Unknown escape \"\\{c}\" in replace-expression"),
            ReplaceError::OutOfRange => format!(
                "replace expression \"{with}\" contains an out-of-range escape for regex \"{}\"",
                re.as_str()
            ),
            ReplaceError::EmptyMatch => format!("regex \"{}\" matched an empty string", re.as_str()),
        }
    }
}

enum Piece<'a> {
    Literal(&'a str),
    Newline,
    Backslash,
    Group(usize),
}

fn parse_replacement(with: &str) -> Result<Vec<Piece<'_>>, ReplaceError> {
    let mut pieces = Vec::new();
    let mut rest = with;
    while let Some(pos) = rest.find('\\') {
        if pos > 0 {
            pieces.push(Piece::Literal(&rest[..pos]));
        }
        let mut chars = rest[pos + 1..].chars();
        match chars.next() {
            Some(c @ '0'..='9') => pieces.push(Piece::Group(c as usize - '0' as usize)),
            Some('n') => pieces.push(Piece::Newline),
            Some('\\') => pieces.push(Piece::Backslash),
            Some(c) => return Err(ReplaceError::UnknownEscape(c)),
            None => {
                pieces.push(Piece::Literal("\\"));
                return Ok(pieces);
            }
        }
        rest = chars.as_str();
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// Replaces every match of `re` in `input`. `\0`..`\9` in `with` name
/// capture groups. Each search restarts on the remaining input, so `^`
/// anchors at every replacement point. `on_match` sees every match.
pub fn regex_replace_with(
    re: &Regex,
    input: &str,
    with: &str,
    on_match: &mut dyn FnMut(&Captures),
) -> Result<String, ReplaceError> {
    let pieces = parse_replacement(with)?;
    let mut out = String::with_capacity(input.len());
    let mut base = 0;
    while base <= input.len() {
        let Some(caps) = re.captures(&input[base..]) else {
            break;
        };
        let Some(m) = caps.get(0) else {
            break;
        };
        if m.start() == m.end() {
            return Err(ReplaceError::EmptyMatch);
        }
        on_match(&caps);
        out.push_str(&input[base..base + m.start()]);
        for piece in &pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Newline => out.push('\n'),
                Piece::Backslash => out.push('\\'),
                Piece::Group(n) => {
                    if *n >= caps.len() {
                        return Err(ReplaceError::OutOfRange);
                    }
                    if let Some(g) = caps.get(*n) {
                        out.push_str(g.as_str());
                    }
                }
            }
        }
        base += m.end();
    }
    if base < input.len() {
        out.push_str(&input[base..]);
    }
    Ok(out)
}

/// [`regex_replace_with`], leaving the last match in `CMAKE_MATCH_<n>`.
pub fn regex_replace_storing(
    ev: &mut Evaluator,
    re: &Regex,
    input: &str,
    with: &str,
) -> Result<String, ReplaceError> {
    let mut last: Vec<Option<String>> = Vec::new();
    let result = regex_replace_with(re, input, with, &mut |caps| {
        last = caps.iter().map(|m| m.map(|m| m.as_str().to_string())).collect();
    });
    if !last.is_empty() {
        for (i, m) in last.iter().enumerate().take(10) {
            ev.add_definition(&format!("CMAKE_MATCH_{i}"), m.as_deref().unwrap_or(""));
        }
        let highest = last.iter().take(10).rposition(Option::is_some).unwrap_or(0);
        ev.add_definition("CMAKE_MATCH_COUNT", &highest.to_string());
    }
    result
}

/// Removes `$<...>` generator expressions, then any empty list elements
/// they leave behind.
pub fn genex_strip(input: &str) -> String {
    let b = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut last = 0;
    let mut nesting = 0;
    while let Some(found) = input[last..].find("$<") {
        let start = last + found;
        result.push_str(&input[last..start]);
        let mut i = start + 2;
        nesting = 1;
        while i < b.len() {
            if b[i] == b'$' && b.get(i + 1) == Some(&b'<') {
                nesting += 1;
                i += 2;
                continue;
            }
            if b[i] == b'>' {
                nesting -= 1;
                if nesting == 0 {
                    break;
                }
            }
            i += 1;
        }
        if i >= b.len() {
            result.push_str(&input[start..]);
            last = b.len();
            break;
        }
        last = i + 1;
    }
    if nesting == 0 {
        result.push_str(&input[last..]);
    }
    if !result.contains(';') {
        return result;
    }
    result.split(';').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(";")
}

static CMAKEDEFINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([ \t]*)cmakedefine[ \t]+([A-Za-z_0-9]*)").unwrap());
static CMAKEDEFINE01: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([ \t]*)cmakedefine01[ \t]+([A-Za-z_0-9]*)").unwrap());

/// Processes `#cmakedefine` lines, then replaces `${VAR}` and `@VAR@`
/// references (only the latter with `at_only`).
pub fn configure_string(ev: &mut Evaluator, input: &str, at_only: bool, escape_quotes: bool) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if let Some(caps) = CMAKEDEFINE.captures(body) {
            let indent = &caps[1];
            let name = &caps[2];
            if ev.get_definition(name).is_some_and(|v| !is_off(v)) {
                output.push_str(&body.replace(&format!("#{indent}cmakedefine"), &format!("#{indent}define")));
            } else {
                output.push_str(&format!("/* #undef {name} */"));
            }
        } else if let Some(caps) = CMAKEDEFINE01.captures(body) {
            let indent = &caps[1];
            let on = ev.get_definition(&caps[2]).is_some_and(|v| !is_off(v));
            output.push_str(&body.replace(&format!("#{indent}cmakedefine01"), &format!("#{indent}define")));
            output.push_str(if on { " 1" } else { " 0" });
        } else {
            output.push_str(body);
        }
        output.push_str(newline);
    }
    let opts = ExpandOptions {
        escape_quotes,
        no_escapes: true,
        at_only,
        replace_at: true,
        filename: None,
        line: -1,
    };
    ev.expand_string(&output, &opts)
}

/// Turns `s` into a valid C identifier.
pub fn make_c_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }));
    out
}

pub fn string_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(sub) = args.first() else {
        error!("must be called with at least one argument.");
    };
    match sub.as_str() {
        "REGEX" => regex_command(ev, &args),
        "REPLACE" => replace(ev, &args),
        "FIND" => find(ev, &args),
        "TOLOWER" => to_case(ev, &args, false),
        "TOUPPER" => to_case(ev, &args, true),
        "COMPARE" => compare(ev, &args),
        "ASCII" => ascii(ev, &args),
        "CONFIGURE" => configure(ev, &args),
        "LENGTH" => length(ev, &args),
        "APPEND" => append(ev, &args, false),
        "PREPEND" => append(ev, &args, true),
        "CONCAT" => concat(ev, &args),
        "JOIN" => join(ev, &args),
        "SUBSTRING" => substring(ev, &args),
        "STRIP" => strip(ev, &args),
        "REPEAT" => repeat(ev, &args),
        "MAKE_C_IDENTIFIER" => {
            if args.len() != 3 {
                error!("sub-command MAKE_C_IDENTIFIER requires two arguments.");
            }
            ev.add_definition(&args[2], &make_c_identifier(&args[1]));
            Ok(())
        }
        "GENEX_STRIP" => {
            if args.len() != 3 {
                error!("sub-command GENEX_STRIP requires two arguments.");
            }
            ev.add_definition(&args[2], &genex_strip(&args[1]));
            Ok(())
        }
        other => error!("does not recognize sub-command {other}"),
    }
}

fn compile(pattern: &str, mode: &str) -> Result<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Ok(re),
        Err(_) => error!("sub-command REGEX, mode {mode} failed to compile regex \"{pattern}\"."),
    }
}

fn regex_command(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    let Some(mode) = args.get(1) else {
        error!("sub-command REGEX requires a mode to be specified.");
    };
    match mode.as_str() {
        "MATCH" | "MATCHALL" => {
            if args.len() < 5 {
                error!("sub-command REGEX, mode {mode} needs at least 5 arguments total to command.");
            }
            let re = compile(&args[2], mode)?;
            let input = args[4..].concat();
            ev.clear_matches();
            let output = if mode == "MATCH" {
                match re.captures(&input) {
                    Some(caps) => {
                        ev.store_matches(&caps);
                        caps.get(0).map_or_else(String::new, |m| m.as_str().to_string())
                    }
                    None => String::new(),
                }
            } else {
                let mut found = Vec::new();
                for caps in re.captures_iter(&input) {
                    ev.store_matches(&caps);
                    let Some(m) = caps.get(0) else {
                        continue;
                    };
                    if m.is_empty() {
                        error!("sub-command REGEX, mode MATCHALL regex \"{}\" matched an empty string.", args[2]);
                    }
                    found.push(m.as_str().to_string());
                }
                found.join(";")
            };
            ev.add_definition(&args[3], &output);
            Ok(())
        }
        "REPLACE" => {
            if args.len() < 6 {
                error!("sub-command REGEX, mode REPLACE needs at least 6 arguments total to command.");
            }
            let re = compile(&args[2], mode)?;
            let input = args[5..].concat();
            ev.clear_matches();
            let output = match regex_replace_storing(ev, &re, &input, &args[3]) {
                Ok(output) => output,
                Err(e) => error!("sub-command REGEX, mode REPLACE: {}.", e.describe(&re, &args[3])),
            };
            ev.add_definition(&args[4], &output);
            Ok(())
        }
        other => error!("sub-command REGEX does not recognize mode {other}"),
    }
}

fn replace(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 5 {
        error!("sub-command REPLACE requires at least four arguments.");
    }
    let input = args[4..].concat();
    let output = if args[1].is_empty() {
        input
    } else {
        input.replace(&args[1], &args[2])
    };
    ev.add_definition(&args[3], &output);
    Ok(())
}

fn find(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 4 || args.len() > 5 {
        error!("sub-command FIND requires 3 or 4 parameters.");
    }
    let reverse = args.len() == 5;
    if reverse && args[4] != "REVERSE" {
        error!("sub-command FIND: unknown last parameter {}", args[4]);
    }
    let var = &args[3];
    if var == "REVERSE" {
        error!(
            "sub-command FIND does not allow one to select REVERSE as the output variable.  \
             Maybe you missed the actual output variable?"
        );
    }
    let (haystack, needle) = (&args[1], &args[2]);
    let pos = if reverse { haystack.rfind(needle.as_str()) } else { haystack.find(needle.as_str()) };
    let pos = pos.map_or(-1, |p| p as i64);
    ev.add_definition(var, &pos.to_string());
    Ok(())
}

fn to_case(ev: &mut Evaluator, args: &[String], upper: bool) -> Result<()> {
    if args.len() < 3 {
        error!("no output variable specified");
    }
    let output = if upper { args[1].to_ascii_uppercase() } else { args[1].to_ascii_lowercase() };
    ev.add_definition(&args[2], &output);
    Ok(())
}

fn compare(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    let Some(mode) = args.get(1) else {
        error!("sub-command COMPARE requires a mode to be specified.");
    };
    let wanted: &[Ordering] = match mode.as_str() {
        "EQUAL" => &[Ordering::Equal],
        "NOTEQUAL" => &[Ordering::Less, Ordering::Greater],
        "LESS" => &[Ordering::Less],
        "LESS_EQUAL" => &[Ordering::Less, Ordering::Equal],
        "GREATER" => &[Ordering::Greater],
        "GREATER_EQUAL" => &[Ordering::Greater, Ordering::Equal],
        other => error!("sub-command COMPARE does not recognize mode {other}"),
    };
    if args.len() < 5 {
        error!("sub-command COMPARE, mode {mode} needs at least 5 arguments total to command.");
    }
    let result = wanted.contains(&args[2].cmp(&args[3]));
    ev.add_definition(&args[4], if result { "1" } else { "0" });
    Ok(())
}

fn ascii(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("No output variable specified");
    }
    let mut output = String::new();
    for code in &args[1..args.len() - 1] {
        let n = parse_leading_int(code);
        match u8::try_from(n) {
            Ok(b) if b > 0 => output.push(char::from(b)),
            _ => error!("Character with code {code} does not exist."),
        }
    }
    ev.add_definition(&args[args.len() - 1], &output);
    Ok(())
}

fn configure(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        error!("No input string specified.");
    }
    if args.len() < 3 {
        error!("No output variable specified.");
    }
    let mut at_only = false;
    let mut escape_quotes = false;
    for option in &args[3..] {
        match option.as_str() {
            "@ONLY" => at_only = true,
            "ESCAPE_QUOTES" => escape_quotes = true,
            other => error!("Unrecognized argument \"{other}\""),
        }
    }
    let output = configure_string(ev, &args[1], at_only, escape_quotes)?;
    ev.add_definition(&args[2], &output);
    Ok(())
}

fn length(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 3 {
        error!("sub-command LENGTH requires two arguments.");
    }
    ev.add_definition(&args[2], &args[1].len().to_string());
    Ok(())
}

fn append(ev: &mut Evaluator, args: &[String], prepend: bool) -> Result<()> {
    if args.len() < 2 {
        error!("sub-command {} requires at least one argument.", args[0]);
    }
    if args.len() == 2 {
        return Ok(());
    }
    let var = &args[1];
    let added = args[2..].concat();
    let current = ev.get_safe_definition(var);
    let value = if prepend { added + &current } else { current + &added };
    ev.add_definition(var, &value);
    Ok(())
}

fn concat(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        error!("sub-command CONCAT requires at least one argument.");
    }
    ev.add_definition(&args[1], &args[2..].concat());
    Ok(())
}

fn join(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("sub-command JOIN requires at least two arguments.");
    }
    ev.add_definition(&args[2], &args[3..].join(&args[1]));
    Ok(())
}

fn substring(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 5 {
        error!("sub-command SUBSTRING requires four arguments.");
    }
    let s = &args[1];
    let begin = parse_leading_int(&args[2]);
    let len = parse_leading_int(&args[3]);
    let size = s.len() as i64;
    if begin < 0 || begin > size {
        error!("begin index: {begin} is out of range 0 - {size}");
    }
    if len < -1 {
        error!("end index: {len} is out of range -1 - {size}");
    }
    let begin = begin as usize;
    let end = if len == -1 { s.len() } else { (begin + len as usize).min(s.len()) };
    let bytes = &s.as_bytes()[begin..end];
    ev.add_definition(&args[4], &String::from_utf8_lossy(bytes));
    Ok(())
}

fn strip(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 3 {
        error!("sub-command STRIP requires two arguments.");
    }
    ev.add_definition(&args[2], args[1].trim_matches(|c: char| c.is_ascii_whitespace()));
    Ok(())
}

fn repeat(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 4 {
        error!("sub-command REPEAT requires three arguments.");
    }
    let Ok(count) = args[2].trim().parse::<usize>() else {
        error!("repeat count is not a positive number.");
    };
    ev.add_definition(&args[3], &args[1].repeat(count));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};
    use crate::message::MessageType;

    fn regex_replace(re: &Regex, input: &str, with: &str) -> Result<String, ReplaceError> {
        regex_replace_with(re, input, with, &mut |_| {})
    }

    #[test]
    fn test_regex_replace_references() {
        let re = Regex::new("([a-z]+)=([0-9]+)").unwrap();
        assert_eq!(regex_replace(&re, "a=1, b=22", "\\2:\\1").unwrap(), "1:a, 22:b");
        assert_eq!(regex_replace(&re, "x", "\\1").unwrap(), "x");
        assert_eq!(regex_replace(&re, "a=1", "\\q"), Err(ReplaceError::UnknownEscape('q')));
        assert_eq!(regex_replace(&re, "a=1", "\\5"), Err(ReplaceError::OutOfRange));
        let empty = Regex::new("x*").unwrap();
        assert_eq!(regex_replace(&empty, "abc", "y"), Err(ReplaceError::EmptyMatch));
    }

    #[test]
    fn test_regex_replace_anchor_restarts() {
        let re = Regex::new("^a").unwrap();
        assert_eq!(regex_replace(&re, "aab", "b").unwrap(), "bbb");
    }

    #[test]
    fn test_genex_strip() {
        assert_eq!(genex_strip("a;$<CONFIG:Debug>;b"), "a;b");
        assert_eq!(genex_strip("x$<IF:$<BOOL:1>,y,z>w"), "xw");
        assert_eq!(genex_strip("keep"), "keep");
        assert_eq!(genex_strip("a$<open"), "a$<open");
    }

    #[test]
    fn test_make_c_identifier() {
        assert_eq!(make_c_identifier("1foo-bar.h"), "_1foo_bar_h");
        assert_eq!(make_c_identifier("ok_name"), "ok_name");
    }

    #[test]
    fn test_basic_operations() {
        let ev = run(
            "string(LENGTH \"hello\" n)\nmessage(${n})\n\
             string(TOUPPER abc u)\nmessage(${u})\n\
             string(SUBSTRING \"hello world\" 6 -1 s)\nmessage(${s})\n\
             string(SUBSTRING hello 1 3 t)\nmessage(${t})\n\
             string(FIND \"a.b.c\" . f)\nstring(FIND \"a.b.c\" . r REVERSE)\nmessage(\"${f} ${r}\")\n\
             string(REPLACE o 0 rep \"foo\" \"bar\")\nmessage(${rep})\n\
             string(STRIP \"  x y  \" st)\nmessage(\"[${st}]\")\n\
             string(REPEAT ab 3 rp)\nmessage(${rp})\n",
        );
        assert_eq!(output(&ev), vec!["5", "ABC", "world", "ell", "1 3", "f00bar", "[x y]", "ababab"]);
    }

    #[test]
    fn test_append_concat_join() {
        let ev = run(
            "string(APPEND s a b)\nstring(PREPEND s z)\nmessage(${s})\n\
             string(CONCAT c x y z)\nmessage(${c})\nstring(JOIN - j a b c)\nmessage(${j})\n",
        );
        assert_eq!(output(&ev), vec!["zab", "xyz", "a-b-c"]);
    }

    #[test]
    fn test_regex_match_sets_cmake_match() {
        let ev = run(
            "string(REGEX MATCH \"([0-9]+)\\\\.([0-9]+)\" v \"version 3.13\")\n\
             message(\"${v} ${CMAKE_MATCH_1} ${CMAKE_MATCH_2} ${CMAKE_MATCH_COUNT}\")\n\
             string(REGEX MATCHALL \"[0-9]\" all \"a1b2c3\")\nmessage(\"${all}\")\n\
             string(REGEX REPLACE \"([a-z])\" \"<\\\\1>\" out \"a1b\")\nmessage(${out})\n",
        );
        assert_eq!(output(&ev), vec!["3.13 3 13 2", "1;2;3", "<a>1<b>"]);
    }

    #[test]
    fn test_compare_and_ascii() {
        let ev = run(
            "string(COMPARE LESS a b r1)\nstring(COMPARE EQUAL a b r2)\nmessage(\"${r1}${r2}\")\n\
             string(ASCII 72 105 hi)\nmessage(${hi})\n",
        );
        assert_eq!(output(&ev), vec!["10", "Hi"]);
    }

    #[test]
    fn test_configure() {
        let ev = run(
            "set(NAME world)\nstring(CONFIGURE \"hello @NAME@ \\${NAME}\" out @ONLY)\nmessage(\"${out}\")\n",
        );
        assert_eq!(output(&ev), vec!["hello world ${NAME}"]);
    }

    #[test]
    fn test_configure_cmakedefine() {
        let mut ev = crate::eval::testutil::script_evaluator();
        ev.add_definition("HAVE_A", "1");
        ev.add_definition("HAVE_B", "OFF");
        let out = configure_string(
            &mut ev,
            "#cmakedefine HAVE_A\n#cmakedefine HAVE_B\n#  cmakedefine01 HAVE_A\n#cmakedefine01 HAVE_C\n",
            false,
            false,
        )
        .unwrap();
        assert_eq!(out, "#define HAVE_A\n/* #undef HAVE_B */\n#  define HAVE_A 1\n#define HAVE_C 0\n");
    }

    #[test]
    fn test_errors() {
        let ev = run("string(SUBSTRING abc 5 1 x)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["string begin index: 5 is out of range 0 - 3"]
        );
        let ev = run("string(BOGUS x)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["string does not recognize sub-command BOGUS"]
        );
    }
}
