// SPDX-License-Identifier: MIT

//! Recursive-descent parser for bracket expressions
//!
//! Grammar (modifier codes are case-insensitive):
//! ```text
//! chain    := unit (('&&' | '||') unit)*
//! unit     := bracket | '(' chain ')'
//! bracket  := '[' OPERAND? TARGET? ('|' CODE ('(' params? ')')?)* ('-' FLAGS)* ']'
//! params   := param (',' param)*
//! ```
//! A chain of one unit compiles to that unit. A longer chain compiles to a
//! node holding one group whose join kind is the first join token seen; later
//! join tokens of the other kind do not change it.

use super::ast::{
    ColumnRef, Expression, ExpressionFlags, ExpressionGroup, JoinKind, Member, Modifier,
    ModifierFlags, Operand, Span, Target,
};
use super::lexer::{tokenize, Token, TokenKind};
use crate::rdk::config::EngineConfig;
use crate::rdk::error::{ParseError, ParseErrorKind};
use crate::rdk::value::{compare_loose, Value};
use std::cmp::Ordering;

/// Compiles expression text into an [`Expression`] tree
#[derive(Debug, Clone)]
pub struct ExpressionParser {
    max_depth: usize,
}

impl ExpressionParser {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }

    pub fn compile(&self, input: &str) -> Result<Expression, ParseError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, input, 0));
        }

        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
            max_depth: self.max_depth,
        };
        let expr = parser.parse_chain(0)?;

        if let Some(extra) = parser.peek() {
            return Err(parser.unexpected("end of input", extra));
        }

        log::debug!(
            "Compiled expression '{}' ({} groups)",
            input,
            expr.groups.len()
        );
        Ok(expr)
    }
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// Parameter text as written inside `code(...)`
#[derive(Debug, Clone)]
struct RawParam {
    text: String,
    quoted: bool,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str, token: &Token) -> ParseError {
        ParseError::new(
            ParseErrorKind::Unexpected {
                expected: expected.to_string(),
                found: token.kind.describe(),
            },
            &self.input[token.span.start..token.span.end],
            token.span.start,
        )
    }

    fn unexpected_end(&self, expected: &str) -> ParseError {
        let tail_start = self
            .tokens
            .last()
            .map(|t| t.span.start)
            .unwrap_or_default();
        ParseError::new(
            ParseErrorKind::Unexpected {
                expected: expected.to_string(),
                found: "end of input".to_string(),
            },
            &self.input[tail_start..],
            self.input.len(),
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(self.unexpected(expected, &token)),
            None => Err(self.unexpected_end(expected)),
        }
    }

    fn slice(&self, span: Span) -> &'a str {
        &self.input[span.start..span.end]
    }

    fn parse_chain(&mut self, depth: usize) -> Result<Expression, ParseError> {
        let first_token = self.pos;
        let first = self.parse_unit(depth)?;
        let mut members = vec![first];
        let mut join: Option<JoinKind> = None;

        while let Some(kind) = self.peek_kind() {
            let next = match kind {
                TokenKind::And => JoinKind::And,
                TokenKind::Or => JoinKind::Or,
                _ => break,
            };
            match join {
                None => join = Some(next),
                Some(current) if current != next => {
                    log::warn!(
                        "Mixed '&&'/'||' joins in '{}': keeping '{}' for the whole chain",
                        self.input,
                        current
                    );
                }
                Some(_) => {}
            }
            self.advance();
            members.push(self.parse_unit(depth)?);
        }

        if members.len() == 1 {
            return Ok(members.remove(0));
        }

        let span = Span::new(
            self.tokens[first_token].span.start,
            self.tokens[self.pos - 1].span.end,
        );
        Ok(Expression::with_groups(
            self.slice(span),
            span,
            vec![ExpressionGroup::new(join.unwrap_or_default(), members)],
        ))
    }

    fn parse_unit(&mut self, depth: usize) -> Result<Expression, ParseError> {
        match self.peek().cloned() {
            Some(Token {
                kind: TokenKind::LBracket,
                ..
            }) => self.parse_bracket(),
            Some(
                open @ Token {
                    kind: TokenKind::LParen,
                    ..
                },
            ) => {
                if depth + 1 > self.max_depth {
                    return Err(ParseError::new(
                        ParseErrorKind::TooDeep(self.max_depth),
                        self.slice(open.span),
                        open.span.start,
                    ));
                }
                self.advance();
                let inner = self.parse_chain(depth + 1)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            Some(other) => Err(self.unexpected("'[' or '('", &other)),
            None => Err(self.unexpected_end("'[' or '('")),
        }
    }

    fn parse_bracket(&mut self) -> Result<Expression, ParseError> {
        let open = self.expect(TokenKind::LBracket, "'['")?;

        let mut operand = None;
        if let Some(TokenKind::Op(symbol)) = self.peek_kind().cloned() {
            let token = self.advance().unwrap_or_else(|| open.clone());
            operand = match Operand::from_symbol(&symbol) {
                Some(op) => Some((op, token)),
                None => return Err(self.unexpected("comparison operator", &token)),
            };
        }

        let target = match self.peek_kind().cloned() {
            Some(TokenKind::Quoted(text)) => {
                self.advance();
                if text.eq_ignore_ascii_case("this") {
                    Target::This
                } else {
                    Target::Literal(Value::Text(text))
                }
            }
            Some(TokenKind::Word(word)) => {
                self.advance();
                if word.eq_ignore_ascii_case("this") {
                    Target::This
                } else {
                    Target::Literal(Value::parse_literal(&word))
                }
            }
            _ => Target::None,
        };

        let operand = match (operand, &target) {
            (None, Target::None) => Operand::None,
            (None, _) => Operand::Equals,
            (Some((_, token)), Target::None) => {
                return Err(match self.peek().cloned() {
                    Some(next) => self.unexpected("target after operator", &next),
                    None => self.unexpected("target after operator", &token),
                });
            }
            (Some((op, _)), _) => op,
        };

        let mut modifiers: Vec<Modifier> = Vec::new();
        let mut modifier_flags = ModifierFlags::NONE;
        while self.peek_kind() == Some(&TokenKind::Pipe) {
            self.advance();
            let code = match self.advance() {
                Some(Token {
                    kind: TokenKind::Word(word),
                    span,
                }) => (word, span),
                Some(other) => return Err(self.unexpected("modifier code", &other)),
                None => return Err(self.unexpected_end("modifier code")),
            };
            let params = if self.peek_kind() == Some(&TokenKind::LParen) {
                Some(self.parse_params()?)
            } else {
                None
            };

            let end = self.tokens[self.pos - 1].span.end;
            let fragment = &self.input[code.1.start..end];
            let modifier = build_modifier(&code.0, params, fragment, code.1.start)?;
            if modifier_flags.contains(modifier.flag()) {
                return Err(ParseError::new(
                    ParseErrorKind::DuplicateModifier(modifier.code().to_string()),
                    fragment,
                    code.1.start,
                ));
            }
            modifier_flags |= modifier.flag();
            modifiers.push(modifier);
        }
        modifiers.sort_by_key(Modifier::rank);

        let mut flags = ExpressionFlags::default();
        while self.peek_kind() == Some(&TokenKind::Dash) {
            self.advance();
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Word(word),
                    span,
                }) => {
                    for c in word.chars() {
                        match c.to_ascii_lowercase() {
                            'f' => flags.force = true,
                            other => {
                                return Err(ParseError::new(
                                    ParseErrorKind::UnknownFlag(other.to_string()),
                                    word.as_str(),
                                    span.start,
                                ))
                            }
                        }
                    }
                }
                Some(other) => return Err(self.unexpected("flag", &other)),
                None => return Err(self.unexpected_end("flag")),
            }
        }

        let close = self.expect(TokenKind::RBracket, "']'")?;
        let span = Span::new(open.span.start, close.span.end);

        Ok(Expression {
            source: self.slice(span).to_string(),
            span,
            target,
            operand,
            modifiers,
            modifier_flags,
            flags,
            groups: Vec::new(),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<RawParam>, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.peek_kind() == Some(&TokenKind::RParen) {
            self.advance();
            return Ok(params);
        }

        loop {
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Quoted(text),
                    ..
                }) => params.push(RawParam { text, quoted: true }),
                Some(Token {
                    kind: TokenKind::Word(text),
                    ..
                }) => params.push(RawParam {
                    text,
                    quoted: false,
                }),
                Some(other) => return Err(self.unexpected("parameter", &other)),
                None => return Err(self.unexpected_end("parameter")),
            }
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => break,
                Some(other) => return Err(self.unexpected("',' or ')'", &other)),
                None => return Err(self.unexpected_end("')'")),
            }
        }
        Ok(params)
    }
}

fn invalid(code: &str, argument: &str, reason: &str, fragment: &str, position: usize) -> ParseError {
    ParseError::new(
        ParseErrorKind::InvalidArgument {
            modifier: code.to_string(),
            argument: argument.to_string(),
            reason: reason.to_string(),
        },
        fragment,
        position,
    )
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn param_value(param: &RawParam) -> Value {
    if param.quoted {
        Value::Text(param.text.clone())
    } else {
        Value::parse_literal(&param.text)
    }
}

/// Check a modifier's parameters against its declared arity and kinds
fn build_modifier(
    code: &str,
    params: Option<Vec<RawParam>>,
    fragment: &str,
    position: usize,
) -> Result<Modifier, ParseError> {
    let code = code.to_ascii_lowercase();
    let params = params.unwrap_or_default();
    let missing = || {
        ParseError::new(
            ParseErrorKind::MissingArgument(code.clone()),
            fragment,
            position,
        )
    };

    let modifier = match code.as_str() {
        "u" | "l" | "i" | "r" | "e" => {
            if let Some(extra) = params.first() {
                return Err(invalid(&code, &extra.text, "takes no arguments", fragment, position));
            }
            match code.as_str() {
                "u" => Modifier::Uppercase,
                "l" => Modifier::Lowercase,
                "i" => Modifier::CaseInsensitive,
                "r" => Modifier::Required,
                _ => Modifier::Email,
            }
        }
        "mx" | "mn" => {
            let param = match params.as_slice() {
                [] => return Err(missing()),
                [single] => single,
                [_, extra, ..] => {
                    return Err(invalid(
                        &code,
                        &extra.text,
                        "expects exactly one argument",
                        fragment,
                        position,
                    ))
                }
            };
            let limit = param
                .text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| invalid(&code, &param.text, "not a number", fragment, position))?;
            if code == "mx" {
                Modifier::Max(limit)
            } else {
                Modifier::Min(limit)
            }
        }
        "in" => {
            if params.is_empty() {
                return Err(missing());
            }
            let members = params
                .iter()
                .map(|p| match p.text.split_once('.') {
                    Some((column, value))
                        if !p.quoted && is_identifier(column) && !value.is_empty() =>
                    {
                        Member::Field {
                            column: column.to_string(),
                            value: Value::parse_literal(value),
                        }
                    }
                    _ => Member::Value(param_value(p)),
                })
                .collect();
            Modifier::In(members)
        }
        "indb" => {
            if params.is_empty() {
                return Err(missing());
            }
            let mut columns = Vec::with_capacity(params.len());
            for p in &params {
                match p.text.split_once('.') {
                    Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                        columns.push(ColumnRef {
                            table: table.trim().to_string(),
                            column: column.trim().to_string(),
                        })
                    }
                    _ => {
                        return Err(invalid(
                            &code,
                            &p.text,
                            "expected table.column",
                            fragment,
                            position,
                        ))
                    }
                }
            }
            Modifier::InDb(columns)
        }
        "ru" | "rd" => {
            let digits = match params.as_slice() {
                [] => 0,
                [single] => single
                    .text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d <= 15)
                    .ok_or_else(|| {
                        invalid(&code, &single.text, "expected digits 0-15", fragment, position)
                    })?,
                [_, extra, ..] => {
                    return Err(invalid(
                        &code,
                        &extra.text,
                        "expects at most one argument",
                        fragment,
                        position,
                    ))
                }
            };
            if code == "ru" {
                Modifier::RoundUp(digits)
            } else {
                Modifier::RoundDown(digits)
            }
        }
        "b" => {
            let (low, high) = match params.as_slice() {
                [] => return Err(missing()),
                [low, high] => (low, high),
                [_] => {
                    return Err(invalid(
                        &code,
                        fragment,
                        "expects a lower and an upper bound",
                        fragment,
                        position,
                    ))
                }
                [_, _, extra, ..] => {
                    return Err(invalid(
                        &code,
                        &extra.text,
                        "expects exactly two arguments",
                        fragment,
                        position,
                    ))
                }
            };
            let bound = |p: &RawParam| {
                let value = Value::parse_literal(&p.text);
                if value.as_f64().is_some() || value.as_date().is_some() {
                    Ok(value)
                } else {
                    Err(invalid(&code, &p.text, "expected a number or date", fragment, position))
                }
            };
            let (low, high) = (bound(low)?, bound(high)?);
            if compare_loose(&low, &high, false) == Ordering::Greater {
                return Err(invalid(
                    &code,
                    fragment,
                    "lower bound exceeds upper bound",
                    fragment,
                    position,
                ));
            }
            Modifier::Between(low, high)
        }
        _ => {
            return Err(ParseError::new(
                ParseErrorKind::UnknownModifier(code.clone()),
                fragment,
                position,
            ))
        }
    };

    Ok(modifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(input: &str) -> Result<Expression, ParseError> {
        ExpressionParser::default().compile(input)
    }

    #[test]
    fn test_parse_simple_equality() {
        let expr = compile(r#"[="5"]"#).unwrap();
        assert!(expr.is_leaf());
        assert_eq!(expr.operand, Operand::Equals);
        assert_eq!(expr.target, Target::Literal(Value::text("5")));
        assert!(expr.modifiers.is_empty());
        assert_eq!(expr.source, r#"[="5"]"#);
        assert_eq!(expr.span, Span::new(0, 6));
    }

    #[test]
    fn test_absent_operand_defaults_to_equals() {
        let expr = compile(r#"["abc"]"#).unwrap();
        assert_eq!(expr.operand, Operand::Equals);
    }

    #[test]
    fn test_no_target_no_operand_is_none() {
        let expr = compile("[|mx(10)]").unwrap();
        assert_eq!(expr.operand, Operand::None);
        assert_eq!(expr.target, Target::None);
        assert_eq!(expr.modifiers, vec![Modifier::Max(10.0)]);
        assert!(expr.has_modifier(ModifierFlags::MAX));
    }

    #[test]
    fn test_operand_without_target_is_error() {
        let err = compile("[>|mx(10)]").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { .. }));
    }

    #[test]
    fn test_this_target() {
        assert_eq!(compile(r#"[="this"|r]"#).unwrap().target, Target::This);
        assert_eq!(compile("[=this|r]").unwrap().target, Target::This);
    }

    #[test]
    fn test_all_operands() {
        for (symbol, operand) in [
            ("=", Operand::Equals),
            (">", Operand::GreaterThan),
            ("<", Operand::LessThan),
            (">=", Operand::GreaterOrEqual),
            ("<=", Operand::LessOrEqual),
            ("!=", Operand::NotEqual),
            ("<>", Operand::NotEqual),
        ] {
            let expr = compile(&format!("[{}\"1\"]", symbol)).unwrap();
            assert_eq!(expr.operand, operand, "symbol {}", symbol);
        }
    }

    #[test]
    fn test_modifiers_sorted_into_application_order() {
        let expr = compile(r#"[|r|MX(5)|u]"#).unwrap();
        let codes: Vec<&str> = expr.modifiers.iter().map(Modifier::code).collect();
        assert_eq!(codes, vec!["u", "mx", "r"]);
        assert!(expr.has_modifier(ModifierFlags::UPPERCASE | ModifierFlags::REQUIRED));
    }

    #[test]
    fn test_in_members() {
        let expr = compile(r#"[|in(a, "b.c", 1.5, status.active)]"#).unwrap();
        assert_eq!(
            expr.modifiers,
            vec![Modifier::In(vec![
                Member::Value(Value::text("a")),
                Member::Value(Value::text("b.c")),
                Member::Value(Value::Decimal(1.5)),
                Member::Field {
                    column: "status".to_string(),
                    value: Value::text("active"),
                },
            ])]
        );
    }

    #[test]
    fn test_indb_columns() {
        let expr = compile("[|indb(Users.Email)]").unwrap();
        assert_eq!(
            expr.modifiers,
            vec![Modifier::InDb(vec![ColumnRef {
                table: "Users".to_string(),
                column: "Email".to_string(),
            }])]
        );
        assert!(compile("[|indb(Users)]").is_err());
    }

    #[test]
    fn test_between_and_rounding() {
        let expr = compile("[|b(5,10)|ru(2)|rd]").unwrap();
        assert_eq!(
            expr.modifiers,
            vec![
                Modifier::RoundUp(2),
                Modifier::RoundDown(0),
                Modifier::Between(Value::Integer(5), Value::Integer(10)),
            ]
        );
        assert!(compile("[|b(10,5)]").is_err());
        assert!(compile("[|b(a,b)]").is_err());
    }

    #[test]
    fn test_missing_arguments() {
        for input in ["[|mx]", "[|mn()]", "[|in]", "[|indb]", "[|b]"] {
            let err = compile(input).unwrap_err();
            assert!(
                matches!(err.kind, ParseErrorKind::MissingArgument(_)),
                "{} gave {:?}",
                input,
                err
            );
        }
        let err = compile("[|mx]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingArgument("mx".to_string()));
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_invalid_modifier_arguments() {
        assert!(compile("[|mx(ten)]").is_err());
        assert!(compile("[|mx(1,2)]").is_err());
        assert!(compile("[|u(1)]").is_err());
        assert!(compile("[|ru(x)]").is_err());
    }

    #[test]
    fn test_unknown_modifier_and_flag() {
        let err = compile("[|zz]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownModifier("zz".to_string()));

        let err = compile(r#"[="a"-x]"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownFlag("x".to_string()));
    }

    #[test]
    fn test_duplicate_modifier() {
        let err = compile("[|u|u]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateModifier("u".to_string()));
    }

    #[test]
    fn test_force_flag() {
        let expr = compile(r#"[|u-f]"#).unwrap();
        assert!(expr.flags.force);
        let expr = compile(r#"[="a"|mx(3) -F]"#).unwrap();
        assert!(expr.flags.force);
    }

    #[test]
    fn test_single_group_and() {
        let expr = compile(r#"[>"1"]&&[<"10"]"#).unwrap();
        assert!(!expr.is_leaf());
        assert_eq!(expr.groups.len(), 1);
        assert_eq!(expr.groups[0].join, JoinKind::And);
        assert_eq!(expr.groups[0].members.len(), 2);
        assert_eq!(expr.groups[0].members[1].source, r#"[<"10"]"#);
    }

    #[test]
    fn test_mixed_joins_keep_first() {
        let expr = compile(r#"[="a"]||[="b"]&&[="c"]"#).unwrap();
        assert_eq!(expr.groups[0].join, JoinKind::Or);
        assert_eq!(expr.groups[0].members.len(), 3);
    }

    #[test]
    fn test_multi_group() {
        let expr = compile(r#"([>"1"]&&[<"10"])||([="20"])"#).unwrap();
        assert_eq!(expr.groups.len(), 1);
        let outer = &expr.groups[0];
        assert_eq!(outer.join, JoinKind::Or);
        assert_eq!(outer.members.len(), 2);

        let first = &outer.members[0];
        assert_eq!(first.groups[0].join, JoinKind::And);
        assert_eq!(first.groups[0].members.len(), 2);

        // A parenthesised single bracket unwraps to the leaf
        assert!(outer.members[1].is_leaf());
        assert_eq!(outer.members[1].source, r#"[="20"]"#);
    }

    #[test]
    fn test_nesting_limit() {
        let parser = ExpressionParser::new(&EngineConfig {
            max_depth: 2,
            ..Default::default()
        });
        assert!(parser.compile(r#"(([="a"]))"#).is_ok());
        let err = parser.compile(r#"((([="a"])))"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep(2));
    }

    #[test]
    fn test_syntax_errors_are_explicit() {
        assert_eq!(compile("").unwrap_err().kind, ParseErrorKind::Empty);
        assert!(compile(r#"[="5""#).is_err());
        assert!(compile(r#"[="5"] junk"#).is_err());
        assert!(compile(r#"[="5"]&&"#).is_err());
        assert!(compile(r#"([="5"]"#).is_err());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = r#"([>"1"|mx(3)]&&[<"10"|r])||([="20"|in(a,b)-f])"#;
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}
