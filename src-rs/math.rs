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

//! `math(EXPR)`: 64-bit integer arithmetic with C operator precedence.

use anyhow::Result;

use crate::error;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::message::MessageType;
use crate::stmt::{ExpandedArgument, argument_values};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(i64),
    Op(u8),
    Shl,
    Shr,
}

struct Lexer {
    tokens: Vec<Token>,
    warnings: Vec<String>,
}

fn lex(expr: &str) -> Result<Lexer> {
    let b = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut warnings = Vec::new();
    let mut i = 0;
    while i < b.len() {
        let c = b[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'0'..=b'9' => {
                let start = i;
                let hex = c == b'0' && matches!(b.get(i + 1), Some(b'x' | b'X'));
                let value = if hex {
                    i += 2;
                    while i < b.len() && b[i].is_ascii_hexdigit() {
                        i += 1;
                    }
                    u64::from_str_radix(&expr[start + 2..i], 16).map(|v| v as i64).ok()
                } else {
                    while i < b.len() && b[i].is_ascii_digit() {
                        i += 1;
                    }
                    expr[start..i].parse::<i64>().ok()
                };
                let Some(value) = value else {
                    error!("invalid number \"{}\"", &expr[start..i]);
                };
                tokens.push(Token::Number(value));
            }
            b'<' | b'>' if b.get(i + 1) == Some(&c) => {
                tokens.push(if c == b'<' { Token::Shl } else { Token::Shr });
                i += 2;
            }
            b'+' | b'-' | b'*' | b'/' | b'%' | b'|' | b'&' | b'^' | b'~' | b'(' | b')' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            _ => {
                let ch = expr[i..].chars().next().unwrap_or('?');
                warnings.push(format!("Unexpected character in expression at position {}: {ch}", i + 1));
                i += ch.len_utf8();
            }
        }
    }
    Ok(Lexer { tokens, warnings })
}

/// Recursive descent over the binary operator levels, lowest first.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

const LEVELS: &[&[Token]] = &[
    &[Token::Op(b'|')],
    &[Token::Op(b'^')],
    &[Token::Op(b'&')],
    &[Token::Shl, Token::Shr],
    &[Token::Op(b'+'), Token::Op(b'-')],
    &[Token::Op(b'*'), Token::Op(b'/'), Token::Op(b'%')],
];

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn unexpected(&self) -> anyhow::Error {
        match self.peek() {
            None => anyhow::format_err!("syntax error, unexpected end of input"),
            Some(Token::Number(n)) => anyhow::format_err!("syntax error, unexpected number {n}"),
            Some(Token::Op(c)) => anyhow::format_err!("syntax error, unexpected '{}'", c as char),
            Some(Token::Shl) => anyhow::format_err!("syntax error, unexpected '<<'"),
            Some(Token::Shr) => anyhow::format_err!("syntax error, unexpected '>>'"),
        }
    }

    fn parse(&mut self) -> Result<i64> {
        let value = self.binary(0)?;
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(value)
    }

    fn binary(&mut self, level: usize) -> Result<i64> {
        if level == LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = self.peek().filter(|t| LEVELS[level].contains(t)) {
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64> {
        match self.peek() {
            Some(Token::Op(b'+')) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Op(b'-')) => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some(Token::Op(b'~')) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Token::Op(b'(')) => {
                self.pos += 1;
                let value = self.binary(0)?;
                if self.peek() != Some(Token::Op(b')')) {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn apply(op: Token, lhs: i64, rhs: i64) -> Result<i64> {
    Ok(match op {
        Token::Op(b'|') => lhs | rhs,
        Token::Op(b'^') => lhs ^ rhs,
        Token::Op(b'&') => lhs & rhs,
        Token::Shl => lhs.wrapping_shl(rhs as u32),
        Token::Shr => lhs.wrapping_shr(rhs as u32),
        Token::Op(b'+') => lhs.wrapping_add(rhs),
        Token::Op(b'-') => lhs.wrapping_sub(rhs),
        Token::Op(b'*') => lhs.wrapping_mul(rhs),
        Token::Op(b'/') | Token::Op(b'%') if rhs == 0 => error!("divide by zero"),
        Token::Op(b'/') => lhs.wrapping_div(rhs),
        Token::Op(b'%') => lhs.wrapping_rem(rhs),
        _ => error!("syntax error"),
    })
}

/// Evaluates `expr`, returning the value and any lexer warnings.
pub fn evaluate(expr: &str) -> Result<(i64, Vec<String>)> {
    let lexer = lex(expr)?;
    let mut parser = Parser {
        tokens: &lexer.tokens,
        pos: 0,
    };
    let value = parser.parse()?;
    Ok((value, lexer.warnings))
}

pub fn math_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(sub) = args.first() else {
        error!("must be called with at least one argument.");
    };
    if sub != "EXPR" {
        error!("MATH does not recognize sub-command {sub}");
    }
    if args.len() < 3 {
        error!("EXPR called with incorrect arguments.");
    }
    let (var, expr) = (&args[1], &args[2]);
    let mut hex = false;
    match &args[3..] {
        [] => {}
        [opt] if opt == "OUTPUT_FORMAT" => error!("OUTPUT_FORMAT specified but no format."),
        [opt, format] if opt == "OUTPUT_FORMAT" => match format.as_str() {
            "DECIMAL" => {}
            "HEXADECIMAL" => hex = true,
            other => error!("Unknown format \"{other}\""),
        },
        [opt, ..] => error!("Option \"{opt}\" is unknown."),
    }

    let (value, warnings) = match evaluate(expr) {
        Ok(result) => result,
        Err(e) => error!("cannot parse the expression: \"{expr}\": {e}."),
    };
    if !warnings.is_empty() {
        let text = format!("Error in expression \"{expr}\":\n{}", warnings.join("\n"));
        ev.issue_message(MessageType::AuthorWarning, &text);
    }
    let text = if hex { format!("0x{:x}", value) } else { value.to_string() };
    ev.add_definition(var, &text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};

    fn eval(expr: &str) -> i64 {
        evaluate(expr).unwrap().0
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7);
        assert_eq!(eval("(1 + 2) * 3"), 9);
        assert_eq!(eval("1 | 2 ^ 3 & 4"), 3);
        assert_eq!(eval("1 << 2 + 1"), 8);
        assert_eq!(eval("-3 % 2"), -1);
        assert_eq!(eval("~0"), -1);
        assert_eq!(eval("10 - 4 - 3"), 3);
        assert_eq!(eval("0x10 + 0xff"), 271);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("(1").is_err());
        assert!(evaluate("1 2").is_err());
    }

    #[test]
    fn test_unexpected_character_warns() {
        let (value, warnings) = evaluate("1 + 2 $").unwrap();
        assert_eq!(value, 3);
        assert_eq!(warnings, vec!["Unexpected character in expression at position 7: $"]);
    }

    #[test]
    fn test_math_command() {
        let ev = run(
            "math(EXPR x \"5 * (3 + 1)\")\nmessage(${x})\n\
             math(EXPR h \"255\" OUTPUT_FORMAT HEXADECIMAL)\nmessage(${h})\n",
        );
        assert_eq!(output(&ev), vec!["20", "0xff"]);
    }

    #[test]
    fn test_math_command_errors() {
        let ev = run("math(EXPR x \"1 / 0\")\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["math cannot parse the expression: \"1 / 0\": divide by zero."]
        );
        let ev = run("math(EXPR x 1 OUTPUT_FORMAT OCTAL)\n");
        assert_eq!(ev.messenger.texts(MessageType::FatalError), vec!["math Unknown format \"OCTAL\""]);
    }
}
