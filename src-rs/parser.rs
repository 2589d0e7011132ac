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

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use memchr::{memchr, memchr_iter};

use crate::{
    collect_stats, error_loc,
    loc::Loc,
    stmt::{Argument, CommandRecord, Delimiter, Stmt},
    symtab::Symbol,
    warn_loc,
};

struct Parser {
    buf: Bytes,
    l: usize,
    loc: Loc,
    stmts: Vec<Stmt>,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn describe(c: Option<u8>) -> String {
    match c {
        None => "end of file".to_string(),
        Some(b'\n') => "newline".to_string(),
        Some(c) if c.is_ascii_graphic() => format!("'{}'", c as char),
        Some(c) => format!("byte 0x{c:02x}"),
    }
}

impl Parser {
    fn with_buf(buf: &Bytes, loc: Loc) -> Self {
        Self {
            buf: buf.clone(),
            l: 0,
            loc,
            stmts: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.l).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.buf.get(self.l + off).copied()
    }

    fn count_lines(&mut self, from: usize, to: usize) {
        self.loc.line += memchr_iter(b'\n', &self.buf[from..to]).count() as i32;
    }

    fn parse(&mut self) -> Result<()> {
        if self.buf.starts_with(b"\xef\xbb\xbf") {
            self.l = 3;
        }
        loop {
            self.skip_blank(true)?;
            let Some(c) = self.peek() else {
                break;
            };
            if !is_ident_start(c) {
                error_loc!(
                    Some(&self.loc),
                    "Parse error.  Expected a command name, got {}.",
                    describe(Some(c))
                );
            }
            self.parse_command()?;
        }
        Ok(())
    }

    /// Skips spaces, tabs and comments. Newlines are skipped only when
    /// `newlines` is set.
    fn skip_blank(&mut self, newlines: bool) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' => self.l += 1,
                b'\n' if newlines => {
                    self.l += 1;
                    self.loc.line += 1;
                }
                b'#' => self.skip_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<()> {
        // Positioned on '#'.
        self.l += 1;
        if self.peek() == Some(b'[')
            && let Some(eq) = self.bracket_open_len()
        {
            let start_loc = self.loc;
            self.l += eq + 2;
            if self.skip_bracket_body(eq).is_none() {
                error_loc!(
                    Some(&start_loc),
                    "Parse error.  Unterminated bracket comment."
                );
            }
            return Ok(());
        }
        let rest = &self.buf[self.l..];
        self.l += memchr(b'\n', rest).unwrap_or(rest.len());
        Ok(())
    }

    /// When positioned on a `[`, returns the number of `=` in a bracket
    /// opening such as `[==[`.
    fn bracket_open_len(&self) -> Option<usize> {
        let rest = self.buf.get(self.l + 1..)?;
        let eq = rest.iter().take_while(|&&c| c == b'=').count();
        (rest.get(eq) == Some(&b'[')).then_some(eq)
    }

    /// Consumes everything up to and including the closing bracket with `eq`
    /// equal signs. Returns the body, or None at end of file.
    fn skip_bracket_body(&mut self, eq: usize) -> Option<(usize, usize)> {
        let start = self.l;
        let mut search = start;
        loop {
            let off = memchr(b']', &self.buf[search..])?;
            let close = search + off;
            let tail = &self.buf[close + 1..];
            if tail.len() > eq && tail[..eq].iter().all(|&c| c == b'=') && tail[eq] == b']' {
                self.count_lines(start, close);
                self.l = close + eq + 2;
                return Some((start, close));
            }
            search = close + 1;
        }
    }

    fn parse_command(&mut self) -> Result<()> {
        let line = self.loc.line;
        let start = self.l;
        while self.peek().is_some_and(is_ident_char) {
            self.l += 1;
        }
        let name = String::from_utf8_lossy(&self.buf[start..self.l]).into_owned();
        self.skip_blank(false)?;
        if self.peek() != Some(b'(') {
            error_loc!(
                Some(&self.loc),
                "Parse error.  Expected \"(\" after command \"{name}\", got {}.",
                describe(self.peek())
            );
        }
        self.l += 1;

        let mut args = Vec::new();
        let mut depth = 0;
        // Set right after a quoted or bracket argument ends so that a token
        // glued onto it can be reported.
        let mut glued = false;
        loop {
            let before = self.l;
            self.skip_blank(true)?;
            if self.l != before {
                glued = false;
            }
            let Some(c) = self.peek() else {
                error_loc!(
                    Some(&self.loc),
                    "Parse error.  Function missing ending \")\".  End of file reached."
                );
            };
            if glued && c != b')' {
                warn_loc!(
                    Some(&self.loc),
                    "Syntax Warning: Argument not separated from preceding token by whitespace."
                );
            }
            glued = false;
            match c {
                b'(' => {
                    depth += 1;
                    args.push(Argument::new("(", Delimiter::Unquoted, self.loc.line));
                    self.l += 1;
                }
                b')' => {
                    self.l += 1;
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    args.push(Argument::new(")", Delimiter::Unquoted, self.loc.line));
                }
                b'"' => {
                    args.push(self.parse_quoted()?);
                    glued = true;
                }
                b'[' if self.bracket_open_len().is_some() => {
                    args.push(self.parse_bracket()?);
                    glued = true;
                }
                _ => args.push(self.parse_unquoted()?),
            }
        }

        let loc = Loc {
            filename: self.loc.filename,
            line,
        };
        self.stmts.push(Arc::new(CommandRecord::new(name, loc, args)));
        Ok(())
    }

    fn parse_quoted(&mut self) -> Result<Argument> {
        let start_loc = self.loc;
        self.l += 1;
        let mut value = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                error_loc!(
                    Some(&start_loc),
                    "Parse error.  Unterminated quoted argument."
                );
            };
            match c {
                b'"' => {
                    self.l += 1;
                    break;
                }
                b'\\' => match self.peek_at(1) {
                    // A backslash before a newline continues the line.
                    Some(b'\n') => {
                        self.l += 2;
                        self.loc.line += 1;
                    }
                    Some(b'\r') if self.peek_at(2) == Some(b'\n') => {
                        self.l += 3;
                        self.loc.line += 1;
                    }
                    Some(n) => {
                        value.extend_from_slice(&[b'\\', n]);
                        self.l += 2;
                    }
                    None => {
                        value.push(b'\\');
                        self.l += 1;
                    }
                },
                b'\n' => {
                    value.push(c);
                    self.l += 1;
                    self.loc.line += 1;
                }
                _ => {
                    value.push(c);
                    self.l += 1;
                }
            }
        }
        Ok(Argument::new(
            String::from_utf8_lossy(&value).into_owned(),
            Delimiter::Quoted,
            start_loc.line,
        ))
    }

    fn parse_bracket(&mut self) -> Result<Argument> {
        let start_loc = self.loc;
        let Some(eq) = self.bracket_open_len() else {
            error_loc!(Some(&start_loc), "Parse error.  Invalid bracket argument.");
        };
        self.l += eq + 2;
        // A newline right after the opening bracket is not part of the value.
        if self.buf[self.l..].starts_with(b"\r\n") {
            self.l += 2;
            self.loc.line += 1;
        } else if self.peek() == Some(b'\n') {
            self.l += 1;
            self.loc.line += 1;
        }
        let Some((start, end)) = self.skip_bracket_body(eq) else {
            error_loc!(
                Some(&start_loc),
                "Parse error.  Unterminated bracket argument."
            );
        };
        Ok(Argument::new(
            String::from_utf8_lossy(&self.buf[start..end]).into_owned(),
            Delimiter::Bracket,
            start_loc.line,
        ))
    }

    fn parse_unquoted(&mut self) -> Result<Argument> {
        let line = self.loc.line;
        let mut value = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'#' => break,
                b'\\' => {
                    value.push(c);
                    self.l += 1;
                    if let Some(n) = self.peek() {
                        if n == b'\n' {
                            self.loc.line += 1;
                        }
                        value.push(n);
                        self.l += 1;
                    }
                }
                // Legacy form: quotes inside an unquoted argument, as in
                // -DFOO="a b", are kept verbatim.
                b'"' => {
                    let start_loc = self.loc;
                    value.push(c);
                    self.l += 1;
                    loop {
                        let Some(q) = self.peek() else {
                            error_loc!(
                                Some(&start_loc),
                                "Parse error.  Unterminated quoted argument."
                            );
                        };
                        value.push(q);
                        self.l += 1;
                        match q {
                            b'"' => break,
                            b'\n' => self.loc.line += 1,
                            b'\\' => {
                                if let Some(n) = self.peek() {
                                    value.push(n);
                                    self.l += 1;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {
                    value.push(c);
                    self.l += 1;
                }
            }
        }
        Ok(Argument::new(
            String::from_utf8_lossy(&value).into_owned(),
            Delimiter::Unquoted,
            line,
        ))
    }
}

pub fn parse_file(buf: &Bytes, filename: Symbol) -> Result<Vec<Stmt>> {
    collect_stats!("parse file time");
    let loc = Loc { filename, line: 1 };
    parse_buf_no_stats(buf, loc)
}

/// Parses `buf` as if it started at `loc`. Used for code that does not come
/// from a file on disk, such as `-C` initial cache scripts given inline.
pub fn parse_buf(buf: &Bytes, loc: Loc) -> Result<Vec<Stmt>> {
    collect_stats!("parse buf time");
    parse_buf_no_stats(buf, loc)
}

pub fn parse_buf_no_stats(buf: &Bytes, loc: Loc) -> Result<Vec<Stmt>> {
    let mut p = Parser::with_buf(buf, loc);
    p.parse()?;
    Ok(p.stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::intern;

    fn parse(s: &'static str) -> Result<Vec<Stmt>> {
        parse_file(&Bytes::from_static(s.as_bytes()), intern("test.cmake"))
    }

    fn values(stmt: &Stmt) -> Vec<(&str, Delimiter)> {
        stmt.args
            .iter()
            .map(|a| (a.value.as_str(), a.delim))
            .collect()
    }

    #[test]
    fn test_one_command_per_line() {
        let stmts = parse("a()\nb(x)\nc(x y)\nd()\n").unwrap();
        assert_eq!(stmts.len(), 4);
        for (i, stmt) in stmts.iter().enumerate() {
            assert_eq!(stmt.line(), i as i32 + 1);
        }
        assert_eq!(stmts[2].name, "c");
        assert_eq!(stmts[2].args.len(), 2);
    }

    #[test]
    fn test_argument_kinds() {
        let stmts = parse("set(A \"x;y\" [==[raw ${B}]==] u;v)").unwrap();
        assert_eq!(
            values(&stmts[0]),
            vec![
                ("A", Delimiter::Unquoted),
                ("x;y", Delimiter::Quoted),
                ("raw ${B}", Delimiter::Bracket),
                ("u;v", Delimiter::Unquoted),
            ]
        );
    }

    #[test]
    fn test_bracket_argument_spans_lines() {
        let stmts = parse("message([[\nline1\nline2]])\nnext()").unwrap();
        assert_eq!(stmts[0].args[0].value, "line1\nline2");
        assert_eq!(stmts[1].line(), 4);
    }

    #[test]
    fn test_bracket_needs_matching_equals() {
        let stmts = parse("f([=[a]]b]=])").unwrap();
        assert_eq!(stmts[0].args[0].value, "a]]b");
    }

    #[test]
    fn test_comments() {
        let stmts = parse("# leading\nf(a # trailing\n  b) #[[ block\ncomment ]] g()").unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(values(&stmts[0]), vec![("a", Delimiter::Unquoted), ("b", Delimiter::Unquoted)]);
        assert_eq!(stmts[1].name, "g");
        assert_eq!(stmts[1].line(), 4);
    }

    #[test]
    fn test_nested_parens_become_arguments() {
        let stmts = parse("if((A OR B) AND C)").unwrap();
        let v: Vec<&str> = stmts[0].args.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(v, vec!["(", "A", "OR", "B", ")", "AND", "C"]);
    }

    #[test]
    fn test_escapes_are_kept_raw() {
        let stmts = parse(r#"f("a\"b" c\;d)"#).unwrap();
        assert_eq!(stmts[0].args[0].value, r#"a\"b"#);
        assert_eq!(stmts[0].args[1].value, r"c\;d");
    }

    #[test]
    fn test_quoted_line_continuation() {
        let stmts = parse("f(\"a\\\nb\")\ng()").unwrap();
        assert_eq!(stmts[0].args[0].value, "ab");
        assert_eq!(stmts[1].line(), 3);
    }

    #[test]
    fn test_argument_lines() {
        let stmts = parse("f(a\n  b\n  \"c\")").unwrap();
        let lines: Vec<i32> = stmts[0].args.iter().map(|a| a.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_legacy_quotes_in_unquoted() {
        let stmts = parse("f(-DX=\"a b\" y)").unwrap();
        assert_eq!(stmts[0].args[0].value, "-DX=\"a b\"");
        assert_eq!(stmts[0].args[1].value, "y");
    }

    #[test]
    fn test_errors() {
        let err = parse("f(\"abc)\n").unwrap_err().to_string();
        assert!(err.contains("Unterminated quoted argument"), "{err}");
        let err = parse("f(a b\n").unwrap_err().to_string();
        assert!(err.contains("missing ending"), "{err}");
        let err = parse("f([[abc)\n").unwrap_err().to_string();
        assert!(err.contains("Unterminated bracket"), "{err}");
        let err = parse("f()\n\"x\"\n").unwrap_err().to_string();
        assert!(err.starts_with("test.cmake:2:"), "{err}");
        let err = parse("f\ng()").unwrap_err().to_string();
        assert!(err.contains("Expected \"(\""), "{err}");
    }

    #[test]
    fn test_case_preserved_and_lowered() {
        let stmts = parse("MESSAGE(hi)").unwrap();
        assert_eq!(stmts[0].name, "MESSAGE");
        assert_eq!(stmts[0].lower_name, "message");
    }
}
