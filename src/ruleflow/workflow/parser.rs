// SPDX-License-Identifier: MIT

//! Parser for workflow instructions
//!
//! ```text
//! instruction := action ('=>' action ('=>' action)?)?
//! action      := '!'* NAME ('(' (param (',' param)*)? ')')?
//! param       := quoted | '[' NAME '|' object '.' property ']' | expression | action | literal
//! ```
//! Splitting on `=>` and `,` only happens at the top level: separators inside
//! quotes, brackets or parentheses belong to the enclosing parameter.

use super::ast::{ActionKind, Instruction, Param, WorkflowAction};
use crate::rdk::config::EngineConfig;
use crate::rdk::error::{ParseError, ParseErrorKind};
use crate::rdk::value::Value;
use crate::ruleflow::expression::ExpressionParser;

const CHAIN_SEPARATOR: &str = "=>";

/// Compiles instruction text into an [`Instruction`]
#[derive(Debug, Clone)]
pub struct WorkflowParser {
    expressions: ExpressionParser,
    max_depth: usize,
}

impl WorkflowParser {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            expressions: ExpressionParser::new(config),
            max_depth: config.max_depth,
        }
    }

    pub fn parse(&self, input: &str) -> Result<Instruction, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, input, 0));
        }

        let parts = split_top_level(input, 0, CHAIN_SEPARATOR)?;
        let mut actions = Vec::with_capacity(parts.len());
        for (offset, part) in &parts {
            actions.push(self.parse_action(part, *offset, 0)?);
        }

        let instruction = match actions.len() {
            1 => Instruction::Action(actions.remove(0)),
            2 | 3 => {
                let mut iter = actions.into_iter();
                let (Some(mut condition), Some(then_branch)) = (iter.next(), iter.next()) else {
                    return Err(ParseError::new(ParseErrorKind::Empty, input, 0));
                };
                condition.is_test_action = true;
                Instruction::Test {
                    condition,
                    then_branch,
                    else_branch: iter.next(),
                }
            }
            _ => {
                let (offset, _) = parts[3];
                return Err(ParseError::new(
                    ParseErrorKind::ChainTooLong,
                    &input[offset..],
                    offset,
                ));
            }
        };

        log::debug!(
            "Parsed instruction '{}' ({} actions)",
            input,
            instruction.actions().len()
        );
        Ok(instruction)
    }

    fn parse_action(
        &self,
        text: &str,
        offset: usize,
        depth: usize,
    ) -> Result<WorkflowAction, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::TooDeep(self.max_depth),
                text,
                offset,
            ));
        }

        let (lead, body) = trim_with_offset(text);
        let start = offset + lead;
        if body.is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, text, offset));
        }

        let mut negative = false;
        let mut rest = body;
        let mut rest_offset = start;
        while let Some(stripped) = rest.strip_prefix('!') {
            negative = !negative;
            let (lead, trimmed) = trim_with_offset(stripped);
            rest_offset += 1 + lead;
            rest = trimmed;
        }

        let name_len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        if name.is_empty() {
            return Err(unexpected("action name", rest, rest_offset));
        }
        let kind = ActionKind::from_name(name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnknownAction(name.to_string()),
                name,
                rest_offset,
            )
        })?;

        let after_name = &rest[name_len..];
        let params = if after_name.trim().is_empty() {
            Vec::new()
        } else {
            let (lead, args) = trim_with_offset(after_name);
            let args_offset = rest_offset + name_len + lead;
            let inner = args
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| unexpected("'(' parameters ')'", args, args_offset))?;
            self.parse_params(kind, inner, args_offset + 1, depth)?
        };

        let (min, max) = kind.arity();
        if params.len() < min || max.is_some_and(|max| params.len() > max) {
            return Err(ParseError::new(
                ParseErrorKind::Arity {
                    action: kind.name().to_string(),
                    expected: kind.describe_arity(),
                    found: params.len(),
                },
                body,
                start,
            ));
        }
        for index in kind.action_params(params.len()) {
            if !matches!(params.get(index), Some(Param::Action(_))) {
                return Err(ParseError::new(
                    ParseErrorKind::ExpectedAction {
                        action: kind.name().to_string(),
                        index,
                    },
                    body,
                    start,
                ));
            }
        }

        Ok(WorkflowAction {
            kind,
            name: name.to_string(),
            params,
            negative,
            is_test_action: false,
            source: body.to_string(),
        })
    }

    fn parse_params(
        &self,
        kind: ActionKind,
        inner: &str,
        offset: usize,
        depth: usize,
    ) -> Result<Vec<Param>, ParseError> {
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        for (param_offset, raw) in split_top_level(inner, offset, ",")? {
            let (lead, text) = trim_with_offset(raw);
            let position = param_offset + lead;
            if text.is_empty() {
                return Err(unexpected(
                    &format!("parameter of '{}'", kind.name()),
                    raw,
                    param_offset,
                ));
            }
            params.push(self.parse_param(text, position, depth)?);
        }
        Ok(params)
    }

    fn parse_param(&self, text: &str, position: usize, depth: usize) -> Result<Param, ParseError> {
        let first = text.chars().next().unwrap_or_default();

        if first == '"' || first == '\'' {
            return match text[1..].strip_suffix(first) {
                Some(inner) if !inner.contains(first) => Ok(Param::Literal(Value::text(inner))),
                _ => Err(ParseError::new(
                    ParseErrorKind::UnterminatedQuote,
                    text,
                    position,
                )),
            };
        }

        if first == '[' || first == '(' {
            if let Some((object, property)) = parse_reference(text) {
                return Ok(Param::Reference { object, property });
            }
            return self
                .expressions
                .compile(text)
                .map(Param::Rule)
                .map_err(|mut err| {
                    err.position += position;
                    err
                });
        }

        if looks_like_action(text) {
            return self
                .parse_action(text, position, depth + 1)
                .map(Param::Action);
        }

        Ok(Param::Literal(Value::parse_literal(text)))
    }
}

impl Default for WorkflowParser {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn unexpected(expected: &str, found: &str, position: usize) -> ParseError {
    ParseError::new(
        ParseErrorKind::Unexpected {
            expected: expected.to_string(),
            found: format!("'{}'", found),
        },
        found,
        position,
    )
}

/// Strip surrounding whitespace, returning the number of leading bytes removed
fn trim_with_offset(text: &str) -> (usize, &str) {
    let trimmed_start = text.trim_start();
    (text.len() - trimmed_start.len(), trimmed_start.trim_end())
}

/// `NAME(`, or `!NAME(`
fn looks_like_action(text: &str) -> bool {
    let text = text.trim_start_matches('!').trim_start();
    match text.find('(') {
        Some(open) => {
            let name = text[..open].trim_end();
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// `[target|object.property]`
fn parse_reference(text: &str) -> Option<(String, String)> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let (target, path) = inner.split_once('|')?;
    let is_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_word(target.trim()) {
        return None;
    }
    let (object, property) = path.trim().split_once('.')?;
    if !is_word(object) || !property.split('.').all(is_word) {
        return None;
    }
    Some((object.to_string(), property.to_string()))
}

/// Whether a quote after `before` starts a token rather than sitting inside a word
///
/// Lets apostrophes through in bare literals such as `O'Brien`.
fn opens_token(before: &str) -> bool {
    match before.trim_end().chars().last() {
        None => true,
        Some(c) => matches!(c, '(' | '[' | ',' | '|' | '=' | '<' | '>' | '!'),
    }
}

/// Split on `separator` outside quotes, brackets and parentheses
///
/// Returns each piece with its byte offset, `base` added.
fn split_top_level<'a>(
    text: &'a str,
    base: usize,
    separator: &str,
) -> Result<Vec<(usize, &'a str)>, ParseError> {
    let mut pieces = Vec::new();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<(char, usize)> = None;
    let mut piece_start = 0;
    let mut skip_until = 0;

    for (i, c) in text.char_indices() {
        if i < skip_until {
            continue;
        }
        if let Some((q, _)) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' => quote = Some((c, i)),
            '\'' if opens_token(&text[..i]) => quote = Some((c, i)),
            '(' | '[' => stack.push((c, i)),
            ')' | ']' => {
                let open = if c == ')' { '(' } else { '[' };
                match stack.pop() {
                    Some((o, _)) if o == open => {}
                    _ => return Err(unexpected("balanced brackets", &text[i..], base + i)),
                }
            }
            _ if stack.is_empty() && text[i..].starts_with(separator) => {
                pieces.push((base + piece_start, &text[piece_start..i]));
                piece_start = i + separator.len();
                skip_until = piece_start;
            }
            _ => {}
        }
    }

    if let Some((_, at)) = quote {
        return Err(ParseError::new(
            ParseErrorKind::UnterminatedQuote,
            &text[at..],
            base + at,
        ));
    }
    if let Some((open, at)) = stack.pop() {
        let close = if open == '(' { "')'" } else { "']'" };
        return Err(ParseError::new(
            ParseErrorKind::Unexpected {
                expected: close.to_string(),
                found: "end of input".to_string(),
            },
            &text[at..],
            base + at,
        ));
    }

    pieces.push((base + piece_start, &text[piece_start..]));
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleflow::expression::Operand;

    fn parse(input: &str) -> Result<Instruction, ParseError> {
        WorkflowParser::default().parse(input)
    }

    fn single(input: &str) -> WorkflowAction {
        match parse(input).unwrap() {
            Instruction::Action(action) => action,
            other => panic!("expected single action, got {:?}", other),
        }
    }

    #[test]
    fn test_single_action() {
        let action = single("SET(1)");
        assert_eq!(action.kind, ActionKind::Set);
        assert_eq!(action.params, vec![Param::Literal(Value::Integer(1))]);
        assert!(!action.negative);
        assert!(!action.is_test_action);
        assert_eq!(action.source, "SET(1)");
    }

    #[test]
    fn test_two_part_chain() {
        match parse("gt(5)=>SET(1)").unwrap() {
            Instruction::Test {
                condition,
                then_branch,
                else_branch,
            } => {
                assert_eq!(condition.kind, ActionKind::Gt);
                assert!(condition.is_test_action);
                assert_eq!(then_branch.kind, ActionKind::Set);
                assert!(!then_branch.is_test_action);
                assert!(else_branch.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_three_part_chain_flattens_in_order() {
        let instruction = parse(r#"gt(5) => SET("big") => SET("small")"#).unwrap();
        let actions = instruction.actions();
        assert_eq!(actions.len(), 3);
        assert!(actions[0].is_test_action);
        assert_eq!(actions[2].params, vec![Param::Literal(Value::text("small"))]);
    }

    #[test]
    fn test_chain_too_long() {
        let err = parse("gt(1)=>gt(2)=>gt(3)=>gt(4)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ChainTooLong);
        assert_eq!(err.position, 21);
    }

    #[test]
    fn test_negation() {
        assert!(single("!CHECK(true)").negative);
        assert!(!single("!!CHECK(true)").negative);
    }

    #[test]
    fn test_case_insensitive_names() {
        assert_eq!(single("set(1)").kind, ActionKind::Set);
        assert_eq!(single("eom").kind, ActionKind::Eom);
        assert_eq!(single("Today()").kind, ActionKind::Today);
    }

    #[test]
    fn test_separator_inside_quotes_is_literal() {
        let action = single(r#"SET("a=>b, c")"#);
        assert_eq!(action.params, vec![Param::Literal(Value::text("a=>b, c"))]);
    }

    #[test]
    fn test_apostrophe_inside_bare_literal() {
        let action = single("SET(O'Brien)");
        assert_eq!(action.params, vec![Param::Literal(Value::text("O'Brien"))]);

        let action = single("SET(name, 'O, Brien')");
        assert_eq!(action.params[1], Param::Literal(Value::text("O, Brien")));

        let err = parse("SET('open)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedQuote);
    }

    #[test]
    fn test_rule_parameter() {
        let action = single(r#"CHECK([>"5"|mx(10)])"#);
        match &action.params[0] {
            Param::Rule(expr) => {
                assert_eq!(expr.operand, Operand::GreaterThan);
                assert_eq!(expr.modifiers.len(), 1);
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_parameter() {
        let action = single("SET(total, [target|order.total])");
        assert_eq!(
            action.params[1],
            Param::Reference {
                object: "order".to_string(),
                property: "total".to_string(),
            }
        );
    }

    #[test]
    fn test_nested_actions() {
        let action = single("IFTTT(gt(5), SET(GET(limit)), !SET(0))");
        assert_eq!(action.params.len(), 3);
        match &action.params[1] {
            Param::Action(set) => {
                assert_eq!(set.kind, ActionKind::Set);
                assert!(matches!(&set.params[0], Param::Action(get) if get.kind == ActionKind::Get));
            }
            other => panic!("expected action, got {:?}", other),
        }
        assert!(matches!(&action.params[2], Param::Action(a) if a.negative));
    }

    #[test]
    fn test_arity_is_checked() {
        let err = parse("CHECK()").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Arity {
                action: "CHECK".to_string(),
                expected: "1".to_string(),
                found: 0,
            }
        );
        assert!(parse("END(1)").is_err());
        assert!(parse("bw(1)").is_err());
    }

    #[test]
    fn test_branches_must_be_actions() {
        let err = parse("IFTTT(gt(5), 1)").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::ExpectedAction {
                action: "IFTTT".to_string(),
                index: 1,
            }
        );
        assert!(parse("EACH(3)").is_err());
    }

    #[test]
    fn test_unknown_action() {
        let err = parse("  FROB(1)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownAction("FROB".to_string()));
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_rule_error_position_is_absolute() {
        let err = parse("CHECK([|zz])").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownModifier("zz".to_string()));
        assert_eq!(err.position, 8);
    }

    #[test]
    fn test_unbalanced_input() {
        assert!(parse("SET(1").is_err());
        assert!(parse("SET(1))").is_err());
        assert!(parse(r#"SET("x)"#).is_err());
        assert!(parse("").is_err());
        assert!(parse("gt(5)=>").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let parser = WorkflowParser::new(&EngineConfig {
            max_depth: 2,
            ..Default::default()
        });
        assert!(parser.parse("CHECK(CHECK(CHECK(true)))").is_ok());
        let err = parser.parse("CHECK(CHECK(CHECK(CHECK(true))))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep(2));
    }
}
