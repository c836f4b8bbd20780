// SPDX-License-Identifier: MIT

//! Tests runtime values against compiled expressions

use super::ast::{Expression, ExpressionGroup, JoinKind, ModifierFlags, Operand, Target};
use super::context::{Evaluation, EvaluationContext, FailureKind, ValidationResult};
use super::lookup::Lookup;
use super::modifiers::{self, ModifierEnv};
use crate::rdk::config::{EngineConfig, OrSemantics};
use crate::rdk::error::EvalError;
use crate::rdk::value::{compare_loose, Value};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

static SHARED: Lazy<Evaluator> = Lazy::new(Evaluator::default);

/// Evaluates expressions; holds configuration and collaborators only
///
/// An evaluator keeps no per-call state, so one instance can serve any number
/// of threads.
#[derive(Clone, Default)]
pub struct Evaluator {
    config: EngineConfig,
    lookup: Option<Arc<dyn Lookup>>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

impl Evaluator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            lookup: None,
        }
    }

    /// Attach the collaborator used by the `indb` modifier
    pub fn with_lookup(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Process-wide evaluator with default configuration and no lookup
    pub fn shared() -> &'static Evaluator {
        &SHARED
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate(&self, expr: &Expression, value: &Value) -> Result<Evaluation, EvalError> {
        let mut ctx = EvaluationContext::new(value.clone());
        let passed = self.test(expr, &mut ctx, 0)?;
        log::trace!(
            "Evaluated '{}' against '{}': {}",
            expr.source,
            value,
            if passed { "pass" } else { "fail" }
        );
        Ok(ctx.finish(passed))
    }

    /// Test the value held by `ctx`, recording failures into it
    pub fn test(
        &self,
        expr: &Expression,
        ctx: &mut EvaluationContext,
        depth: usize,
    ) -> Result<bool, EvalError> {
        if expr.is_leaf() {
            return self.test_leaf(expr, ctx);
        }
        if depth > self.config.max_depth {
            return Err(EvalError::TooDeep(self.config.max_depth));
        }

        let mark = ctx.mark();
        let mut passed = true;
        for group in &expr.groups {
            if !self.test_group(group, ctx, depth + 1)? {
                passed = false;
            }
        }
        if passed {
            ctx.truncate(mark);
        }
        Ok(passed)
    }

    fn test_group(
        &self,
        group: &ExpressionGroup,
        ctx: &mut EvaluationContext,
        depth: usize,
    ) -> Result<bool, EvalError> {
        let mark = ctx.mark();
        let mut results = Vec::with_capacity(group.members.len());
        for member in &group.members {
            results.push(self.test(member, ctx, depth)?);
        }

        let passed = results.is_empty()
            || match (group.join, self.config.or_semantics) {
                (JoinKind::And, _) => results.iter().all(|r| *r),
                (JoinKind::Or, OrSemantics::LegacyAnyFalse) => results.iter().any(|r| !*r),
                (JoinKind::Or, OrSemantics::Conventional) => results.iter().any(|r| *r),
            };

        if passed {
            ctx.truncate(mark);
        }
        Ok(passed)
    }

    fn test_leaf(&self, expr: &Expression, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        let case_insensitive = expr.has_modifier(ModifierFlags::CASE_INSENSITIVE);
        let mut passed = true;

        let target = match &expr.target {
            Target::None => None,
            Target::This => Some(ctx.value().clone()),
            Target::Literal(v) => Some(v.clone()),
        };
        if let Some(target) = target.filter(|_| expr.operand != Operand::None) {
            let ordering = compare_loose(ctx.value(), &target, case_insensitive);
            if !expr.operand.holds(ordering) {
                let detail = format!("expected {} '{}'", expr.operand, target.to_text());
                let result = ValidationResult::failed(
                    FailureKind::OperandMismatch,
                    &expr.source,
                    ctx.value(),
                    &detail,
                );
                ctx.record(result);
                passed = false;
            }
        }

        let env = ModifierEnv {
            rule: &expr.source,
            force: expr.flags.force,
            case_insensitive,
            lookup: self.lookup.as_deref(),
        };
        for modifier in &expr.modifiers {
            if !modifiers::apply(modifier, &env, ctx)? {
                passed = false;
            }
        }

        Ok(passed)
    }
}
