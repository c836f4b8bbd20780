// SPDX-License-Identifier: MIT

//! Tokenizer for bracket expressions
//!
//! `[>="5"|mx(10)-f]&&[<"9"]` becomes
//! `[ >= "5" | mx ( 10 ) - f ] && [ < "9" ]`. Every token keeps its byte span
//! so the parser can report where things went wrong.

use super::ast::Span;
use crate::rdk::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    LParen,
    RParen,
    /// &&
    And,
    /// ||
    Or,
    /// |
    Pipe,
    Comma,
    /// `-` introducing a flag
    Dash,
    /// Comparison symbol
    Op(String),
    /// Text between matching quotes, without the quotes
    Quoted(String),
    /// Bare run of characters: identifiers, numbers, dates, `column.value`
    Word(String),
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dash => "'-'".to_string(),
            TokenKind::Op(op) => format!("operator '{}'", op),
            TokenKind::Quoted(s) => format!("literal \"{}\"", s),
            TokenKind::Word(w) => format!("'{}'", w),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn is_special(c: char) -> bool {
    matches!(
        c,
        '[' | ']' | '(' | ')' | '|' | ',' | '"' | '\'' | '&' | '=' | '<' | '>' | '!'
    )
}

/// Split an expression string into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let end_of = |i: usize| chars.get(i).map(|(pos, _)| *pos).unwrap_or(input.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (kind, len) = match c {
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            ',' => (TokenKind::Comma, 1),
            '|' if next == Some('|') => (TokenKind::Or, 2),
            '|' => (TokenKind::Pipe, 1),
            '&' if next == Some('&') => (TokenKind::And, 2),
            '>' | '<' | '!' if next == Some('=') => (TokenKind::Op(format!("{}=", c)), 2),
            '<' if next == Some('>') => (TokenKind::Op("<>".to_string()), 2),
            '=' | '>' | '<' => (TokenKind::Op(c.to_string()), 1),
            '"' | '\'' => {
                let quote = c;
                let mut j = i + 1;
                while j < chars.len() && chars[j].1 != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ParseError::new(
                        ParseErrorKind::UnterminatedQuote,
                        &input[start..],
                        start,
                    ));
                }
                let text = input[end_of(i + 1)..chars[j].0].to_string();
                (TokenKind::Quoted(text), j - i + 1)
            }
            '-' if !next.is_some_and(|n| n.is_ascii_digit() || n == '.') => (TokenKind::Dash, 1),
            '&' | '!' => {
                return Err(ParseError::new(
                    ParseErrorKind::Unexpected {
                        expected: "expression".to_string(),
                        found: format!("'{}'", c),
                    },
                    &input[start..end_of(i + 1)],
                    start,
                ));
            }
            _ => {
                let mut j = i + 1;
                while j < chars.len() {
                    let ch = chars[j].1;
                    let continues = if ch == '-' {
                        chars.get(j + 1).is_some_and(|(_, n)| n.is_ascii_digit())
                    } else {
                        !ch.is_whitespace() && !is_special(ch)
                    };
                    if !continues {
                        break;
                    }
                    j += 1;
                }
                let word = input[start..end_of(j)].to_string();
                (TokenKind::Word(word), j - i)
            }
        };

        tokens.push(Token {
            kind,
            span: Span::new(start, end_of(i + len)),
        });
        i += len;
    }

    Ok(tokens)
}
