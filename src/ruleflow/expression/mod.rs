// SPDX-License-Identifier: MIT

//! Bracket-expression rules: `[>="5"|mx(10)|r]&&[<"100"]`

pub mod ast;
pub mod context;
pub mod evaluator;
pub mod lexer;
pub mod lookup;
mod modifiers;
pub mod parser;

pub use ast::{
    ColumnRef, Expression, ExpressionFlags, ExpressionGroup, JoinKind, Member, Modifier,
    ModifierFlags, Operand, Span, Target,
};
pub use context::{
    format_messages, Evaluation, EvaluationContext, FailureKind, RuleFailure, ValidationResult,
};
pub use evaluator::Evaluator;
pub use lookup::{Lookup, MemoryLookup};
pub use parser::ExpressionParser;

use crate::rdk::error::ParseError;
use once_cell::sync::Lazy;

static DEFAULT_PARSER: Lazy<ExpressionParser> = Lazy::new(ExpressionParser::default);

/// Compile with the default configuration
pub fn compile(source: &str) -> Result<Expression, ParseError> {
    DEFAULT_PARSER.compile(source)
}
