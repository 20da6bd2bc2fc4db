//! Expression evaluation for debugger commands.
//!
//! Numbers default to hexadecimal; `0x`, `$` and a trailing `h` force hex,
//! while `#` or a trailing `.` force decimal. Identifiers resolve in order:
//! variable, register, symbol, and finally a bare hex number.

use nom::{space, IResult};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("undefined symbol: {0}")]
    Undefined(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
}

/// Resolves the names an expression may refer to.
pub trait EvalContext {
    fn lookup_variable(&self, name: &str) -> Option<i64>;
    fn lookup_register(&self, name: &str) -> Option<i64>;
    fn lookup_symbol(&self, name: &str) -> Option<i64>;

    /// Backs the `[addr]` byte dereference.
    fn read_byte(&self, addr: u16) -> u8;
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Ident(String),
    Op(String),
}

pub fn evaluate(text: &str, ctx: &dyn EvalContext) -> Result<i64, ExprError> {
    let tokens = tokenize(text.trim().as_bytes())?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        ctx,
    };

    let value = parser.expression(1)?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(token) => Err(ExprError::UnexpectedToken(token.describe())),
    }
}

/// Parses a numeric literal using the debugger's radix rules.
pub fn parse_number(text: &str) -> Option<i64> {
    let lower = text.to_ascii_lowercase();

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix('$') {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix('#') {
        (rest, 10)
    } else if let Some(rest) = lower.strip_suffix('.') {
        (rest, 10)
    } else if let Some(rest) = lower.strip_suffix('h') {
        (rest, 16)
    } else {
        (lower.as_str(), 16)
    };

    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl Token {
    fn describe(&self) -> String {
        match *self {
            Token::Number(value) => format!("{:X}", value),
            Token::Ident(ref name) => name.clone(),
            Token::Op(ref op) => op.clone(),
        }
    }
}

//
// lexer
//

named!(
    operator<&[u8]>,
    alt_complete!(
        tag!("||") | tag!("&&") | tag!("==") | tag!("!=") |
        tag!("<=") | tag!(">=") | tag!("<<") | tag!(">>") |
        tag!("|")  | tag!("^")  | tag!("&")  | tag!("<")  |
        tag!(">")  | tag!("+")  | tag!("-")  | tag!("*")  |
        tag!("/")  | tag!("%")  | tag!("!")  | tag!("~")  |
        tag!("(")  | tag!(")")  | tag!("[")  | tag!("]")
    )
);

#[inline]
fn word(input: &[u8]) -> IResult<&[u8], &[u8]> {
    is_a!(
        input,
        &b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_"[..]
    )
}

fn tokenize(mut input: &[u8]) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();

    loop {
        if let IResult::Done(rest, _) = space(input) {
            input = rest;
        }

        let first = match input.first() {
            Some(&byte) => byte,
            None => break,
        };

        // `$` and `#` introduce literals; everything else alphanumeric is a word
        let (prefix, body) = match first {
            b'$' | b'#' => (Some(first), &input[1..]),
            _ => (None, input),
        };

        if prefix.is_some() || first.is_ascii_alphanumeric() || first == b'_' {
            let (rest, raw) = match word(body) {
                IResult::Done(rest, raw) if !raw.is_empty() => (rest, raw),
                _ => return Err(ExprError::InvalidNumber(lossy(input))),
            };
            let mut text = lossy(raw);
            let mut rest = rest;

            if let Some(p) = prefix {
                text.insert(0, p as char);
            } else if raw[0].is_ascii_digit() && rest.first() == Some(&b'.') {
                text.push('.');
                rest = &rest[1..];
            }

            let token = if prefix.is_some() || raw[0].is_ascii_digit() {
                Token::Number(parse_number(&text).ok_or(ExprError::InvalidNumber(text))?)
            } else {
                Token::Ident(text)
            };
            tokens.push(token);
            input = rest;
            continue;
        }

        match operator(input) {
            IResult::Done(rest, op) => {
                tokens.push(Token::Op(lossy(op)));
                input = rest;
            }
            _ => return Err(ExprError::UnexpectedToken(lossy(&input[..1]))),
        }
    }

    Ok(tokens)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

//
// parser
//

fn binary_precedence(op: &str) -> Option<u8> {
    let prec = match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | "<=" | ">" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    };
    Some(prec)
}

fn apply_binary(op: &str, lhs: i64, rhs: i64) -> Result<i64, ExprError> {
    let value = match op {
        "||" => (lhs != 0 || rhs != 0) as i64,
        "&&" => (lhs != 0 && rhs != 0) as i64,
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "<" => (lhs < rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">" => (lhs > rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err(ExprError::DivisionByZero),
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => return Err(ExprError::UnexpectedToken(op.to_string())),
    };
    Ok(value)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a dyn EvalContext,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, close: &str) -> Result<(), ExprError> {
        match self.next()? {
            Token::Op(ref op) if op == close => Ok(()),
            other => Err(ExprError::UnexpectedToken(other.describe())),
        }
    }

    fn expression(&mut self, min_prec: u8) -> Result<i64, ExprError> {
        let mut lhs = self.unary()?;

        loop {
            let (op, prec) = match self.tokens.get(self.pos) {
                Some(Token::Op(op)) => match binary_precedence(op) {
                    Some(prec) if prec >= min_prec => (op.clone(), prec),
                    _ => break,
                },
                _ => break,
            };
            self.pos += 1;

            let rhs = self.expression(prec + 1)?;
            lhs = apply_binary(&op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, ExprError> {
        match self.next()? {
            Token::Number(value) => Ok(value),
            Token::Ident(name) => self.resolve(&name),
            Token::Op(op) => match op.as_str() {
                "-" => Ok(self.unary()?.wrapping_neg()),
                "+" => self.unary(),
                "!" => Ok((self.unary()? == 0) as i64),
                "~" => Ok(!self.unary()?),
                "(" => {
                    let value = self.expression(1)?;
                    self.expect(")")?;
                    Ok(value)
                }
                "[" => {
                    let addr = self.expression(1)?;
                    self.expect("]")?;
                    Ok(self.ctx.read_byte(addr as u16) as i64)
                }
                _ => Err(ExprError::UnexpectedToken(op.clone())),
            },
        }
    }

    fn resolve(&self, name: &str) -> Result<i64, ExprError> {
        self.ctx
            .lookup_variable(name)
            .or_else(|| self.ctx.lookup_register(name))
            .or_else(|| self.ctx.lookup_symbol(name))
            .or_else(|| parse_number(name))
            .ok_or_else(|| ExprError::Undefined(name.to_string()))
    }
}
