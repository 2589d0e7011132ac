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

//! `file()`, `get_filename_component()` and `configure_file()`.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Result;
use regex::Regex;

use crate::cache::CacheEntryType;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::fileutil::{GlobOptions, glob, real_path, relative_path};
use crate::find::find_program_on_path;
use crate::message::MessageType;
use crate::policy::{CMP0009, PolicyStatus, policy_warning};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::string_cmd::configure_string;
use crate::strutil::{
    collapse_full_path, filename_extension, filename_name, filename_path, filename_without_extension,
    is_full_path, is_not_found, is_off, is_on, parse_leading_int,
};
use crate::{error, log};

fn source_path(ev: &Evaluator, path: &str) -> String {
    if is_full_path(path) {
        path.to_string()
    } else {
        format!("{}/{path}", ev.current_source_dir())
    }
}

pub fn file_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("must be called with at least two arguments.");
    }
    match args[0].as_str() {
        "WRITE" => write(ev, &args, false),
        "APPEND" => write(ev, &args, true),
        "READ" => read(ev, &args),
        "STRINGS" => strings(ev, &args),
        "GLOB" => glob_command(ev, &args, false),
        "GLOB_RECURSE" => glob_command(ev, &args, true),
        "MAKE_DIRECTORY" => make_directory(ev, &args),
        "RENAME" => rename(ev, &args),
        "COPY_FILE" => copy_file(ev, &args),
        "REMOVE" => remove(ev, &args, false),
        "REMOVE_RECURSE" => remove(ev, &args, true),
        "RELATIVE_PATH" => relative_path_command(ev, &args),
        "TO_CMAKE_PATH" => convert_path(ev, &args, false),
        "TO_NATIVE_PATH" => convert_path(ev, &args, true),
        other => error!("does not recognize sub-command {other}"),
    }
}

fn write(ev: &mut Evaluator, args: &[String], append: bool) -> Result<()> {
    let path = source_path(ev, &args[1]);
    let dir = filename_path(&path);
    if !dir.is_empty() {
        let _ = std::fs::create_dir_all(dir);
    }
    let content = args[2..].concat();
    let result = if append {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| std::io::Write::write_all(&mut f, content.as_bytes()))
    } else {
        std::fs::write(&path, content.as_bytes())
    };
    if let Err(e) = result {
        error!("failed to open for writing ({e}):\n  {path}");
    }
    Ok(())
}

fn read(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("READ must be called with at least two additional arguments");
    }
    let path = source_path(ev, &args[1]);
    let var = &args[2];
    let mut offset = 0i64;
    let mut limit = -1i64;
    let mut hex = false;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "OFFSET" if i + 1 < args.len() => {
                offset = parse_leading_int(&args[i + 1]);
                i += 1;
            }
            "LIMIT" if i + 1 < args.len() => {
                limit = parse_leading_int(&args[i + 1]);
                i += 1;
            }
            "HEX" => hex = true,
            _ => {}
        }
        i += 1;
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) => error!("failed to open for reading ({e}):\n  {path}"),
    };
    let mut data = Vec::new();
    let read = file
        .seek(SeekFrom::Start(offset.max(0) as u64))
        .and_then(|_| file.read_to_end(&mut data));
    if let Err(e) = read {
        error!("failed to open for reading ({e}):\n  {path}");
    }
    if limit >= 0 {
        data.truncate(limit as usize);
    }
    let output = if hex {
        data.iter().map(|b| format!("{b:02x}")).collect()
    } else {
        String::from_utf8_lossy(&data).into_owned()
    };
    ev.add_definition(var, &output);
    Ok(())
}

#[derive(Default)]
struct StringsOptions {
    limit_input: Option<usize>,
    limit_output: Option<usize>,
    limit_count: Option<usize>,
    min_len: usize,
    max_len: usize,
    regex: Option<Regex>,
    newline_consume: bool,
}

impl StringsOptions {
    fn accepts(&self, s: &str) -> bool {
        s.len() >= self.min_len && self.regex.as_ref().is_none_or(|re| re.is_match(s))
    }
}

/// Splits `data` into runs of printable text the way `file(STRINGS)` does.
fn extract_strings(data: &[u8], opts: &StringsOptions) -> Vec<String> {
    let data = match opts.limit_input {
        Some(n) => &data[..n.min(data.len())],
        None => data,
    };
    let mut strings = Vec::new();
    let mut output_size = 0;
    let mut s = String::new();
    // Returns false once LIMIT_OUTPUT is reached.
    let mut flush = |s: &mut String, strings: &mut Vec<String>, allow_empty: bool| -> bool {
        if (allow_empty || !s.is_empty()) && opts.accepts(s) {
            output_size += s.len() + 1;
            if opts.limit_output.is_some_and(|limit| output_size >= limit) {
                s.clear();
                return false;
            }
            strings.push(std::mem::take(s));
        }
        s.clear();
        true
    };
    for &c in data {
        if opts.limit_count.is_some_and(|n| strings.len() >= n) {
            break;
        }
        if c == b'\r' {
            continue;
        }
        let printable = c.is_ascii_graphic() || c == b' ' || c == b'\t' || (c == b'\n' && opts.newline_consume);
        if c == b'\n' && !opts.newline_consume {
            if !flush(&mut s, &mut strings, true) {
                return strings;
            }
        } else if !printable {
            if !flush(&mut s, &mut strings, false) {
                return strings;
            }
        } else {
            s.push(c as char);
        }
        if opts.max_len > 0 && s.len() == opts.max_len && !flush(&mut s, &mut strings, true) {
            return strings;
        }
    }
    if !opts.limit_count.is_some_and(|n| strings.len() >= n) {
        flush(&mut s, &mut strings, false);
    }
    strings
}

fn strings(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("STRINGS requires a file name and output variable");
    }
    let path = source_path(ev, &args[1]);
    let mut opts = StringsOptions::default();
    let mut i = 3;
    while i < args.len() {
        let option = args[i].as_str();
        match option {
            "NEWLINE_CONSUME" => {
                opts.newline_consume = true;
                i += 1;
                continue;
            }
            "NO_HEX_CONVERSION" => {
                i += 1;
                continue;
            }
            "LIMIT_INPUT" | "LIMIT_OUTPUT" | "LIMIT_COUNT" | "LENGTH_MINIMUM" | "LENGTH_MAXIMUM"
            | "REGEX" | "ENCODING" => {}
            other => error!("STRINGS given unknown argument \"{other}\""),
        }
        let Some(value) = args.get(i + 1) else {
            break;
        };
        i += 2;
        if option == "REGEX" {
            match Regex::new(value) {
                Ok(re) => opts.regex = Some(re),
                Err(_) => error!("STRINGS option REGEX value \"{value}\" could not be compiled."),
            }
            continue;
        }
        if option == "ENCODING" {
            if !matches!(value.as_str(), "UTF-8" | "UTF-16LE" | "UTF-16BE" | "UTF-32LE" | "UTF-32BE") {
                error!("STRINGS option ENCODING \"{value}\" not recognized.");
            }
            continue;
        }
        let Ok(n) = value.trim().parse::<usize>() else {
            error!("STRINGS option {option} value \"{value}\" is not an unsigned integer.");
        };
        match option {
            "LIMIT_INPUT" => opts.limit_input = Some(n),
            "LIMIT_OUTPUT" => opts.limit_output = Some(n),
            "LIMIT_COUNT" => opts.limit_count = Some(n).filter(|n| *n > 0),
            "LENGTH_MINIMUM" => opts.min_len = n,
            _ => opts.max_len = n,
        }
    }
    let Ok(data) = std::fs::read(&path) else {
        error!("STRINGS file \"{path}\" cannot be read.");
    };
    let found = extract_strings(&data, &opts);
    let escaped: Vec<String> = found.iter().map(|s| s.replace(';', "\\;")).collect();
    ev.add_definition(&args[2], &escaped.join(";"));
    Ok(())
}

fn glob_command(ev: &mut Evaluator, args: &[String], recurse: bool) -> Result<()> {
    let var = &args[1];
    let cmp0009 = ev.policy_status(CMP0009);
    let mut opts = GlobOptions {
        recurse,
        list_directories: !recurse,
        follow_symlinks: recurse && matches!(cmp0009, PolicyStatus::Old | PolicyStatus::Warn),
    };
    let mut explicit_follow = false;
    let mut relative: Option<String> = None;
    let mut files = Vec::new();
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "LIST_DIRECTORIES" => {
                let value = args.get(i + 1).map(String::as_str);
                match value {
                    Some(v) if is_on(v) => opts.list_directories = true,
                    Some(v) if is_off(v) => opts.list_directories = false,
                    _ => error!("LIST_DIRECTORIES missing bool value."),
                }
                i += 2;
            }
            "FOLLOW_SYMLINKS" => {
                i += 1;
                if recurse {
                    explicit_follow = true;
                    opts.follow_symlinks = true;
                    if i == args.len() {
                        error!("GLOB_RECURSE requires a glob expression after FOLLOW_SYMLINKS.");
                    }
                }
            }
            "RELATIVE" => {
                let Some(dir) = args.get(i + 1) else {
                    error!("GLOB requires a directory after the RELATIVE tag.");
                };
                relative = Some(dir.clone());
                i += 2;
                if i == args.len() {
                    error!("GLOB requires a glob expression after the directory.");
                }
            }
            "CONFIGURE_DEPENDS" => {
                ev.issue_message(
                    MessageType::FatalError,
                    "CONFIGURE_DEPENDS is invalid for script and find package modes.",
                );
                return Ok(());
            }
            pattern => {
                let expr = source_path(ev, pattern);
                let found = glob(&expr, opts);
                match &relative {
                    Some(base) => files.extend(found.iter().map(|f| relative_path(base, f))),
                    None => files.extend(found),
                }
                i += 1;
            }
        }
    }
    if recurse && !explicit_follow && cmp0009 == PolicyStatus::Warn {
        log!("GLOB_RECURSE followed symlinks under CMP0009 WARN");
    }
    files.sort();
    files.dedup();
    ev.add_definition(var, &files.join(";"));
    Ok(())
}

fn make_directory(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    for dir in &args[1..] {
        let path = source_path(ev, dir);
        if std::fs::create_dir_all(&path).is_err() {
            error!("problem creating directory: {path}");
        }
    }
    Ok(())
}

fn rename(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 3 {
        error!("RENAME given incorrect number of arguments.");
    }
    let old = source_path(ev, &args[1]);
    let new = source_path(ev, &args[2]);
    if let Err(e) = std::fs::rename(&old, &new) {
        error!("RENAME failed to rename\n  {old}\nto\n  {new}\nbecause: {e}\n");
    }
    Ok(())
}

fn copy_file(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        error!("COPY_FILE must be called with at least two additional arguments");
    }
    let old = source_path(ev, &args[1]);
    let new = source_path(ev, &args[2]);
    let mut result_var: Option<&str> = None;
    let mut only_if_different = false;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "RESULT" => {
                let Some(var) = args.get(i + 1) else {
                    error!("COPY_FILE RESULT requires a variable name");
                };
                result_var = Some(var);
                i += 1;
            }
            "ONLY_IF_DIFFERENT" => only_if_different = true,
            other => error!("COPY_FILE unknown argument:\n  {other}"),
        }
        i += 1;
    }

    let outcome = if Path::new(&old).is_dir() {
        Err(format!("cannot copy a directory\n  {old}\nas a file"))
    } else if Path::new(&new).is_dir() {
        Err(format!("cannot copy to a directory\n  {new}\nas a file"))
    } else if only_if_different && std::fs::read(&old).ok().is_some_and(|a| std::fs::read(&new).is_ok_and(|b| a == b)) {
        Ok(())
    } else {
        std::fs::copy(&old, &new).map(|_| ()).map_err(|e| e.to_string())
    };
    match (outcome, result_var) {
        (Ok(()), Some(var)) => ev.add_definition(var, "0"),
        (Ok(()), None) => {}
        (Err(e), Some(var)) => ev.add_definition(var, &e),
        (Err(e), None) => error!("COPY_FILE failed to copy\n  {old}\nto\n  {new}\nbecause: {e}\n"),
    }
    Ok(())
}

fn remove(ev: &mut Evaluator, args: &[String], recurse: bool) -> Result<()> {
    for name in &args[1..] {
        if name.is_empty() {
            continue;
        }
        let path = source_path(ev, name);
        let p = Path::new(&path);
        let is_link = p.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink());
        if recurse && p.is_dir() && !is_link {
            let _ = std::fs::remove_dir_all(p);
        } else {
            let _ = std::fs::remove_file(p);
        }
    }
    Ok(())
}

fn relative_path_command(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    if args.len() != 4 {
        error!("RELATIVE_PATH called with incorrect number of arguments");
    }
    let (dir, file) = (&args[2], &args[3]);
    if !is_full_path(dir) {
        error!("RELATIVE_PATH must be passed a full path to the directory: {dir}");
    }
    if !is_full_path(file) {
        error!("RELATIVE_PATH must be passed a full path to the file: {file}");
    }
    ev.add_definition(&args[1], &relative_path(dir, file));
    Ok(())
}

fn convert_path(ev: &mut Evaluator, args: &[String], native: bool) -> Result<()> {
    if args.len() != 3 {
        error!(
            "FILE([TO_CMAKE_PATH|TO_NATIVE_PATH] path result) must be called with exactly three \
             arguments."
        );
    }
    let separator = if native { ';' } else { ':' };
    let converted: Vec<String> = args[1]
        .split(separator)
        .map(|p| {
            if native {
                p.to_string()
            } else {
                let mut s = p.replace('\\', "/");
                while s.len() > 1 && s.ends_with('/') {
                    s.pop();
                }
                s
            }
        })
        .collect();
    ev.add_definition(&args[2], &converted.join(";"));
    Ok(())
}

pub fn get_filename_component_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 3 {
        error!("called with incorrect number of arguments");
    }
    let cache = args.len() >= 4 && args.last().is_some_and(|a| a == "CACHE");
    if cache && ev.get_definition(&args[0]).is_some_and(|v| !is_not_found(v)) {
        return Ok(());
    }
    let var = &args[0];
    let filename = args[1].replace('\\', "/");
    let mut program_args_var: Option<&str> = None;
    let mut program_args = String::new();
    let result = match args[2].as_str() {
        "DIRECTORY" | "PATH" => filename_path(&filename).to_string(),
        "NAME" => filename_name(&filename).to_string(),
        "EXT" => filename_extension(&filename).to_string(),
        "NAME_WE" => filename_without_extension(&filename).to_string(),
        "PROGRAM" => {
            if args.get(3).is_some_and(|a| a == "PROGRAM_ARGS") {
                program_args_var = args.get(4).map(String::as_str);
            }
            if Path::new(&filename).is_file() {
                filename.clone()
            } else {
                let (program, rest) = match filename.split_once(' ') {
                    Some((p, r)) => (p, r),
                    None => (filename.as_str(), ""),
                };
                program_args = rest.to_string();
                find_program_on_path(program).unwrap_or_default()
            }
        }
        "ABSOLUTE" | "REALPATH" => {
            let base = if args.get(3).is_some_and(|a| a == "BASE_DIR") {
                args.get(4).cloned().unwrap_or_default()
            } else {
                ev.current_source_dir()
            };
            let base = collapse_full_path(&base, &ev.current_source_dir());
            let full = collapse_full_path(&filename, &base);
            if args[2] == "REALPATH" { real_path(&full) } else { full }
        }
        other => error!("unknown component {other}"),
    };
    if let Some(args_var) = program_args_var {
        if cache {
            ev.add_cache_definition(args_var, &program_args, "", CacheEntryType::String, false);
        } else {
            ev.add_definition(args_var, &program_args);
        }
    }
    if cache {
        let ty = if args[2] == "PATH" { CacheEntryType::FilePath } else { CacheEntryType::String };
        ev.add_cache_definition(var, &result, "", ty, false);
    } else {
        ev.add_definition(var, &result);
    }
    Ok(())
}

pub fn configure_file_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments, expected 2");
    }
    let input = collapse_full_path(&args[0], &ev.current_source_dir());
    if Path::new(&input).is_dir() {
        error!("input location\n  {input}\nis a directory but a file was expected.");
    }
    let mut output = collapse_full_path(&args[1], &ev.current_binary_dir());
    if Path::new(&output).is_dir() {
        output = format!("{output}/{}", filename_name(&input));
    }

    let mut copy_only = false;
    let mut at_only = false;
    let mut escape_quotes = false;
    let mut unknown = Vec::new();
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "COPYONLY" => copy_only = true,
            "@ONLY" => at_only = true,
            "ESCAPE_QUOTES" => escape_quotes = true,
            "NEWLINE_STYLE" => i += 1,
            "IMMEDIATE" => {}
            other => unknown.push(other.to_string()),
        }
        i += 1;
    }
    if !unknown.is_empty() {
        let text = format!("configure_file called with unknown argument(s):\n  {}\n", unknown.join("\n  "));
        ev.issue_message(MessageType::AuthorWarning, &text);
    }

    let Ok(content) = std::fs::read(&input) else {
        error!("Problem configuring file");
    };
    let result = if copy_only {
        content
    } else {
        let text = String::from_utf8_lossy(&content);
        configure_string(ev, &text, at_only, escape_quotes)?.into_bytes()
    };
    if std::fs::read(&output).ok().as_ref() == Some(&result) {
        return Ok(());
    }
    let dir = filename_path(&output);
    if !dir.is_empty() {
        let _ = std::fs::create_dir_all(dir);
    }
    if std::fs::write(&output, &result).is_err() {
        error!("Problem configuring file");
    }
    log!("configured {input} -> {output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};
    use crate::strutil::path_to_string;

    fn tmp() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = path_to_string(dir.path());
        (dir, root)
    }

    #[test]
    fn test_write_append_read() {
        let (_dir, root) = tmp();
        let ev = run(&format!(
            "file(WRITE {root}/a.txt \"hello\\n\")\nfile(APPEND {root}/a.txt world)\n\
             file(READ {root}/a.txt content)\nmessage(\"${{content}}\")\n\
             file(READ {root}/a.txt part OFFSET 1 LIMIT 3)\nmessage(${{part}})\n\
             file(READ {root}/a.txt h LIMIT 2 HEX)\nmessage(${{h}})\n"
        ));
        assert_eq!(output(&ev), vec!["hello\nworld", "ell", "6865"]);
    }

    #[test]
    fn test_strings() {
        let opts = StringsOptions {
            min_len: 3,
            ..Default::default()
        };
        let data = b"abc\x01de\nlonger line\n\nxyz";
        assert_eq!(extract_strings(data, &opts), vec!["abc", "longer line", "xyz"]);

        let opts = StringsOptions {
            regex: Some(Regex::new("^l").unwrap()),
            ..Default::default()
        };
        assert_eq!(extract_strings(data, &opts), vec!["longer line"]);

        let opts = StringsOptions {
            limit_count: Some(1),
            ..Default::default()
        };
        assert_eq!(extract_strings(b"one\ntwo\n", &opts), vec!["one"]);
    }

    #[test]
    fn test_glob_relative() {
        let (_dir, root) = tmp();
        std::fs::create_dir_all(format!("{root}/src/sub")).unwrap();
        for f in ["src/a.c", "src/b.c", "src/sub/c.c", "src/x.h"] {
            std::fs::write(format!("{root}/{f}"), "").unwrap();
        }
        let ev = run(&format!(
            "file(GLOB g RELATIVE {root}/src {root}/src/*.c)\nmessage(\"${{g}}\")\n\
             file(GLOB_RECURSE r RELATIVE {root} {root}/src/*.c)\nmessage(\"${{r}}\")\n"
        ));
        assert_eq!(output(&ev), vec!["a.c;b.c", "src/a.c;src/b.c;src/sub/c.c"]);
    }

    #[test]
    fn test_make_directory_rename_remove() {
        let (_dir, root) = tmp();
        let ev = run(&format!(
            "file(MAKE_DIRECTORY {root}/d/e)\nfile(WRITE {root}/d/e/f \"x\")\n\
             file(RENAME {root}/d/e/f {root}/d/g)\nfile(COPY_FILE {root}/d/g {root}/d/h RESULT res)\n\
             message(${{res}})\nfile(REMOVE_RECURSE {root}/d/e)\nfile(REMOVE {root}/d/g)\n"
        ));
        assert_eq!(output(&ev), vec!["0"]);
        assert!(!Path::new(&format!("{root}/d/e")).exists());
        assert!(!Path::new(&format!("{root}/d/g")).exists());
        assert!(Path::new(&format!("{root}/d/h")).exists());
    }

    #[test]
    fn test_path_conversions() {
        let ev = run(
            "file(RELATIVE_PATH r /a/b /a/b/c/d.txt)\nmessage(${r})\n\
             file(TO_CMAKE_PATH \"/usr/bin:/opt/bin/\" p)\nmessage(\"${p}\")\n",
        );
        assert_eq!(output(&ev), vec!["c/d.txt", "/usr/bin;/opt/bin"]);
    }

    #[test]
    fn test_get_filename_component() {
        let ev = run(
            "get_filename_component(d /a/b/c.tar.gz DIRECTORY)\n\
             get_filename_component(n /a/b/c.tar.gz NAME)\n\
             get_filename_component(e /a/b/c.tar.gz EXT)\n\
             get_filename_component(w /a/b/c.tar.gz NAME_WE)\n\
             get_filename_component(x ../y/z ABSOLUTE BASE_DIR /p/q)\n\
             message(\"${d} ${n} ${e} ${w} ${x}\")\n",
        );
        assert_eq!(output(&ev), vec!["/a/b c.tar.gz .tar.gz c /p/y/z"]);
    }

    #[test]
    fn test_get_filename_component_unknown() {
        let ev = run("get_filename_component(v /a BOGUS)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["get_filename_component unknown component BOGUS"]
        );
    }

    #[test]
    fn test_configure_file() {
        let (_dir, root) = tmp();
        std::fs::write(
            format!("{root}/config.h.in"),
            "#cmakedefine HAVE_FOO\n#define NAME \"@NAME@\"\n#define VER ${VER}\n",
        )
        .unwrap();
        let ev = run(&format!(
            "set(HAVE_FOO 1)\nset(NAME demo)\nset(VER 2)\n\
             configure_file({root}/config.h.in {root}/out/config.h @ONLY)\n"
        ));
        assert!(ev.messenger.texts(MessageType::FatalError).is_empty());
        let out = std::fs::read_to_string(format!("{root}/out/config.h")).unwrap();
        assert_eq!(out, "#define HAVE_FOO\n#define NAME \"demo\"\n#define VER ${VER}\n");
    }
}
