//! Filter expression tokenizer
//!
//! Keywords are case-insensitive. String literals use single quotes with
//! `''` as the escape for a quote. Every token carries its byte offset for
//! error reporting.

use crate::errors::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Not,
    Like,
    In,
    Is,
    Null,
    True,
    False,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits the input into tokens; always ends with `Eof`
pub fn tokenize(input: &str) -> QueryResult<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'=' => {
                i += if bytes.get(i + 1) == Some(&b'=') { 2 } else { 1 };
                TokenKind::Eq
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Ne
            }
            b'<' => match bytes.get(i + 1) {
                Some(b'=') => {
                    i += 2;
                    TokenKind::Le
                }
                Some(b'>') => {
                    i += 2;
                    TokenKind::Ne
                }
                _ => {
                    i += 1;
                    TokenKind::Lt
                }
            },
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    TokenKind::Ge
                } else {
                    i += 1;
                    TokenKind::Gt
                }
            }
            b'\'' => {
                let (s, end) = read_string(input, i)?;
                i = end;
                TokenKind::Str(s)
            }
            b'0'..=b'9' => {
                let (kind, end) = read_number(input, i)?;
                i = end;
                kind
            }
            b'-' if bytes.get(i + 1).map_or(false, u8::is_ascii_digit) => {
                let (kind, end) = read_number(input, i)?;
                i = end;
                kind
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                keyword_or_ident(&input[start..i])
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(QueryError::syntax(i, format!("unexpected character {:?}", ch)));
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: input.len(),
    });

    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word.to_ascii_uppercase().as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "LIKE" => TokenKind::Like,
        "IN" => TokenKind::In,
        "IS" => TokenKind::Is,
        "NULL" => TokenKind::Null,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        _ => TokenKind::Ident(word.to_string()),
    }
}

fn read_string(input: &str, start: usize) -> QueryResult<(String, usize)> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch == '\'' {
            if let Some((_, '\'')) = chars.peek() {
                chars.next();
                out.push('\'');
                continue;
            }
            return Ok((out, start + 1 + offset + 1));
        }
        out.push(ch);
    }

    Err(QueryError::syntax(start, "unterminated string literal"))
}

fn read_number(input: &str, start: usize) -> QueryResult<(TokenKind, usize)> {
    let bytes = input.as_bytes();
    let mut i = start;
    if bytes[i] == b'-' {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }

    let mut is_float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }

    if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return Err(QueryError::syntax(start, "malformed number"));
    }

    let text = &input[start..i];
    let kind = if is_float {
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| QueryError::syntax(start, format!("invalid number {:?}", text)))?
    } else {
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| QueryError::syntax(start, format!("number {} out of range", text)))?
    };

    Ok((kind, i))
}
