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

//! Variable reference expansion and list splitting.

use anyhow::Result;

use crate::error;

/// Where the expander reads variable values from.
pub trait VariableSource {
    /// A normal variable, falling back to the cache.
    fn definition(&self, name: &str) -> Option<&str>;
    fn cache_definition(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions<'a> {
    pub escape_quotes: bool,
    pub no_escapes: bool,
    /// Only `@VAR@` references are replaced.
    pub at_only: bool,
    pub replace_at: bool,
    pub filename: Option<&'a str>,
    pub line: i32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Expansion {
    pub value: String,
    /// Names that were referenced but had no value.
    pub undefined: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Normal,
    Environment,
    Cache,
}

fn is_var_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'/' | b'.' | b'+' | b'-')
}

pub fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn syntax_error(src: &str, opts: &ExpandOptions, line: i32, msg: &str) -> anyhow::Error {
    let mut e = String::from("Syntax error in cmake code ");
    if let Some(filename) = opts.filename {
        e.push_str(&format!("at\n  {filename}:{line}\n"));
    }
    e.push_str(&format!("when parsing string\n  {src}\n{msg}"));
    anyhow::format_err!(e)
}

pub fn expand_variables(
    src: &str,
    vars: &dyn VariableSource,
    opts: &ExpandOptions,
) -> Result<Expansion> {
    let b = src.as_bytes();
    let mut result = String::with_capacity(src.len());
    let mut undefined = Vec::new();
    let mut openstack: Vec<(Domain, usize)> = Vec::new();
    let mut last = 0;
    let mut line = opts.line;
    let mut i = 0;

    while i < b.len() {
        let c = b[i];
        let mut check_name = false;
        match c {
            b'}' if !opts.at_only && !openstack.is_empty() => {
                let Some((domain, loc)) = openstack.pop() else {
                    break;
                };
                result.push_str(&src[last..i]);
                let lookup = result[loc..].to_string();
                let value: Option<String> = match domain {
                    Domain::Normal
                        if opts.filename.is_some() && lookup == "CMAKE_CURRENT_LIST_LINE" =>
                    {
                        Some(opts.line.to_string())
                    }
                    Domain::Normal => vars.definition(&lookup).map(str::to_string),
                    Domain::Environment => std::env::var(&lookup).ok(),
                    Domain::Cache => vars.cache_definition(&lookup).map(str::to_string),
                };
                result.truncate(loc);
                match value {
                    Some(v) if opts.escape_quotes => result.push_str(&escape_quotes(&v)),
                    Some(v) => result.push_str(&v),
                    None => {
                        if domain == Domain::Normal {
                            undefined.push(lookup);
                        }
                    }
                }
                last = i + 1;
                i += 1;
                continue;
            }
            b'$' if !opts.at_only => {
                let rest = &src[i + 1..];
                let start = if rest.starts_with('{') {
                    Some((Domain::Normal, i + 2))
                } else if rest.starts_with("ENV{") {
                    Some((Domain::Environment, i + 5))
                } else if rest.starts_with("CACHE{") {
                    Some((Domain::Cache, i + 7))
                } else {
                    let name_len = rest.bytes().take_while(|c| c.is_ascii_alphabetic()).count();
                    if name_len > 0 && rest[name_len..].starts_with('{') {
                        return Err(syntax_error(
                            src,
                            opts,
                            line,
                            &format!(
                                "Syntax ${}{{}} is not supported.  Only ${{}}, $ENV{{}}, and \
                                 $CACHE{{}} are allowed.",
                                &rest[..name_len]
                            ),
                        ));
                    }
                    None
                };
                if let Some((domain, start)) = start {
                    result.push_str(&src[last..i]);
                    openstack.push((domain, result.len()));
                    last = start;
                    i = start;
                    continue;
                }
            }
            b'\\' if !opts.no_escapes => {
                let next = b.get(i + 1).copied();
                match next {
                    Some(n @ (b't' | b'n' | b'r')) => {
                        result.push_str(&src[last..i]);
                        result.push(match n {
                            b't' => '\t',
                            b'n' => '\n',
                            _ => '\r',
                        });
                        last = i + 2;
                    }
                    // Left for list splitting to handle.
                    Some(b';') if openstack.is_empty() => {}
                    None => {
                        return Err(syntax_error(
                            src,
                            opts,
                            line,
                            "Invalid character escape '\\' (at end of input).",
                        ));
                    }
                    Some(n) if n.is_ascii_alphanumeric() => {
                        return Err(syntax_error(
                            src,
                            opts,
                            line,
                            &format!("Invalid character escape '\\{}'.", n as char),
                        ));
                    }
                    Some(n) if !n.is_ascii() && !openstack.is_empty() => {
                        result.push_str(&src[last..i]);
                        let name = openstack.last().map_or("", |(_, loc)| &result[*loc..]);
                        let ch = src[i + 1..].chars().next().unwrap_or('?');
                        return Err(syntax_error(
                            src,
                            opts,
                            line,
                            &format!("Invalid character ('{ch}') in a variable name: '{name}'"),
                        ));
                    }
                    Some(_) => {
                        result.push_str(&src[last..i]);
                        last = i + 1;
                    }
                }
                // Skip the escaped character, which may span several bytes.
                i += 1 + src[i + 1..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            b'@' if opts.replace_at || opts.at_only => {
                let name_len = b[i + 1..].iter().take_while(|&&c| is_var_char(c)).count();
                let end = i + 1 + name_len;
                if name_len > 0 && b.get(end) == Some(&b'@') {
                    let name = &src[i + 1..end];
                    let value = vars.definition(name).unwrap_or("");
                    result.push_str(&src[last..i]);
                    if opts.escape_quotes {
                        result.push_str(&escape_quotes(value));
                    } else {
                        result.push_str(value);
                    }
                    i = end + 1;
                    last = i;
                    continue;
                }
                check_name = true;
            }
            b'\n' => line += 1,
            b'$' | b'\\' => {}
            _ => check_name = true,
        }
        if check_name && !opts.at_only && !openstack.is_empty() && !is_var_char(c) {
            result.push_str(&src[last..i]);
            let name = openstack.last().map_or("", |(_, loc)| &result[*loc..]);
            let ch = src[i..].chars().next().unwrap_or('?');
            return Err(syntax_error(
                src,
                opts,
                line,
                &format!("Invalid character ('{ch}') in a variable name: '{name}'"),
            ));
        }
        i += 1;
    }

    if !openstack.is_empty() {
        return Err(syntax_error(
            src,
            opts,
            line,
            "There is an unterminated variable reference.",
        ));
    }
    result.push_str(&src[last.min(src.len())..]);
    Ok(Expansion {
        value: result,
        undefined,
    })
}

/// Splits a `;`-separated list. Semicolons inside square brackets do not
/// split, and `\;` yields a literal semicolon. Empty elements are kept only
/// when `keep_empty` is set.
pub fn expand_list_argument(arg: &str, keep_empty: bool) -> Vec<String> {
    let mut out = Vec::new();
    if arg.is_empty() {
        if keep_empty {
            out.push(String::new());
        }
        return out;
    }
    if !arg.contains(';') {
        out.push(arg.to_string());
        return out;
    }
    let b = arg.as_bytes();
    let mut cur = String::new();
    let mut nesting = 0i32;
    let mut last = 0;
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            b'\\' if b.get(i + 1) == Some(&b';') => {
                cur.push_str(&arg[last..i]);
                last = i + 1;
                i += 2;
                continue;
            }
            b'[' => nesting += 1,
            b']' => nesting -= 1,
            b';' if nesting == 0 => {
                cur.push_str(&arg[last..i]);
                last = i + 1;
                if !cur.is_empty() || keep_empty {
                    out.push(std::mem::take(&mut cur));
                }
            }
            _ => {}
        }
        i += 1;
    }
    cur.push_str(&arg[last..]);
    if !cur.is_empty() || keep_empty {
        out.push(cur);
    }
    out
}

/// Whether splitting `arg` would produce any empty element.
pub fn has_empty_elements(arg: &str) -> bool {
    let all = expand_list_argument(arg, true);
    all.len() > 1 && all.iter().any(|s| s.is_empty())
}

/// Turns `\;` into `;` for quoted arguments, which are never split.
pub fn unescape_semicolons(s: &str) -> String {
    if !s.contains("\\;") {
        return s.to_string();
    }
    s.replace("\\;", ";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Vars(HashMap<&'static str, &'static str>, HashMap<&'static str, &'static str>);

    impl VariableSource for Vars {
        fn definition(&self, name: &str) -> Option<&str> {
            self.0.get(name).or_else(|| self.1.get(name)).copied()
        }
        fn cache_definition(&self, name: &str) -> Option<&str> {
            self.1.get(name).copied()
        }
    }

    fn vars() -> Vars {
        Vars(
            HashMap::from([("A", "1"), ("B", "A"), ("L", "x;y"), ("Q", "say \"hi\"")]),
            HashMap::from([("A", "cached"), ("C", "only-cache")]),
        )
    }

    fn expand(s: &str) -> Result<String> {
        Ok(expand_variables(s, &vars(), &ExpandOptions::default())?.value)
    }

    #[test]
    fn test_simple_and_nested() {
        assert_eq!(expand("${A}").unwrap(), "1");
        assert_eq!(expand("<${A}>").unwrap(), "<1>");
        assert_eq!(expand("${${B}}").unwrap(), "1");
        assert_eq!(expand("${C}").unwrap(), "only-cache");
        assert_eq!(expand("$CACHE{A}").unwrap(), "cached");
        assert_eq!(expand("no refs").unwrap(), "no refs");
        assert_eq!(expand("$ alone").unwrap(), "$ alone");
    }

    #[test]
    fn test_undefined() {
        let e = expand_variables("[${NOPE}]", &vars(), &ExpandOptions::default()).unwrap();
        assert_eq!(e.value, "[]");
        assert_eq!(e.undefined, vec!["NOPE".to_string()]);
    }

    #[test]
    fn test_env() {
        assert_eq!(expand("$ENV{CMSCRIPT_SURELY_UNSET_VAR}").unwrap(), "");
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(expand("$ENV{PATH}").unwrap(), path);
        }
    }

    #[test]
    fn test_escapes() {
        assert_eq!(expand(r"a\tb").unwrap(), "a\tb");
        assert_eq!(expand(r"a\nb").unwrap(), "a\nb");
        assert_eq!(expand(r#"\"q\""#).unwrap(), "\"q\"");
        assert_eq!(expand(r"\${A}").unwrap(), "${A}");
        assert_eq!(expand(r"a\;b").unwrap(), r"a\;b");
        assert_eq!(expand(r"a\\b").unwrap(), r"a\b");
        assert!(expand(r"\q").is_err());
        assert!(expand("x\\").is_err());
    }

    #[test]
    fn test_escaped_multibyte_char() {
        assert_eq!(expand("a\\éb").unwrap(), "aéb");
        let err = expand("${a\\é}").unwrap_err().to_string();
        assert!(err.contains("Invalid character ('é') in a variable name: 'a'"), "{err}");
    }

    #[test]
    fn test_errors() {
        let err = expand("${A").unwrap_err().to_string();
        assert!(err.contains("unterminated variable reference"), "{err}");
        let err = expand("${A B}").unwrap_err().to_string();
        assert!(err.contains("Invalid character (' ') in a variable name: 'A'"), "{err}");
        let err = expand("$FOO{x}").unwrap_err().to_string();
        assert!(err.contains("is not supported"), "{err}");
    }

    #[test]
    fn test_error_location() {
        let opts = ExpandOptions {
            filename: Some("CMakeLists.txt"),
            line: 3,
            ..Default::default()
        };
        let err = expand_variables("${", &vars(), &opts).unwrap_err().to_string();
        assert!(
            err.starts_with("Syntax error in cmake code at\n  CMakeLists.txt:3\n"),
            "{err}"
        );
    }

    #[test]
    fn test_current_list_line() {
        let opts = ExpandOptions {
            filename: Some("f.cmake"),
            line: 42,
            ..Default::default()
        };
        let e = expand_variables("${CMAKE_CURRENT_LIST_LINE}", &vars(), &opts).unwrap();
        assert_eq!(e.value, "42");
    }

    #[test]
    fn test_at_replacement() {
        let opts = ExpandOptions {
            at_only: true,
            no_escapes: true,
            ..Default::default()
        };
        let e = expand_variables("@A@ ${A} @ @NOPE@ a@b", &vars(), &opts).unwrap();
        assert_eq!(e.value, "1 ${A} @  a@b");

        let opts = ExpandOptions {
            replace_at: true,
            escape_quotes: true,
            ..Default::default()
        };
        let e = expand_variables("@Q@/${A}", &vars(), &opts).unwrap();
        assert_eq!(e.value, "say \\\"hi\\\"/1");
    }

    #[test]
    fn test_expand_list_argument() {
        assert_eq!(expand_list_argument("a;b;c", false), vec!["a", "b", "c"]);
        assert_eq!(expand_list_argument("a;;b", false), vec!["a", "b"]);
        assert_eq!(expand_list_argument("a;;b", true), vec!["a", "", "b"]);
        assert_eq!(expand_list_argument("", false), Vec::<String>::new());
        assert_eq!(expand_list_argument("", true), vec![""]);
        assert_eq!(expand_list_argument(r"a\;b;c", false), vec!["a;b", "c"]);
        assert_eq!(expand_list_argument("[a;b];c", false), vec!["[a;b]", "c"]);
        assert_eq!(expand_list_argument("single", false), vec!["single"]);
    }

    #[test]
    fn test_has_empty_elements() {
        assert!(has_empty_elements("a;;b"));
        assert!(has_empty_elements("a;"));
        assert!(!has_empty_elements("a;b"));
        assert!(!has_empty_elements(""));
    }
}
